//! Column names of the raw panel and the modeling dataset

#![allow(missing_docs)]

/// Trade-flow source columns, most preferred first.
pub const EXPORT_CANDIDATES: [&str; 3] = [
    "tradeflow_baci",
    "tradeflow_comtrade_d",
    "tradeflow_comtrade_o",
];

pub const YEAR: &str = "year";
pub const ISO3_O: &str = "iso3_o";
pub const ISO3_D: &str = "iso3_d";
pub const DIST: &str = "dist";
pub const CONTIG: &str = "contig";
pub const COMLANG: &str = "comlang_off";
pub const POP_O: &str = "pop_o";
pub const POP_D: &str = "pop_d";
pub const GDP_O: &str = "gdp_o";
pub const GDP_D: &str = "gdp_d";
pub const EU_O: &str = "eu_o";
pub const EU_D: &str = "eu_d";

pub const LOG_EXPORTS: &str = "log_exports";
pub const LOG_DIST: &str = "log_dist";
pub const LOG_GDP_O: &str = "log_gdp_o";
pub const LOG_GDP_D: &str = "log_gdp_d";
pub const LOG_POP_O: &str = "log_pop_o";
pub const LOG_POP_D: &str = "log_pop_d";

pub const LOG_GDP_O_X_LOG_GDP_D: &str = "log_gdp_o_x_log_gdp_d";
pub const LOG_DIST_X_CONTIG: &str = "log_dist_x_contig";
pub const LOG_DIST_X_COMLANG: &str = "log_dist_x_comlang";

/// Default regression target
pub const TARGET: &str = LOG_EXPORTS;

/// Float-valued columns of the modeling dataset, in schema order.
pub const NUMERIC: [&str; 13] = [
    EU_O,
    EU_D,
    CONTIG,
    COMLANG,
    LOG_EXPORTS,
    LOG_DIST,
    LOG_GDP_O,
    LOG_GDP_D,
    LOG_POP_O,
    LOG_POP_D,
    LOG_GDP_O_X_LOG_GDP_D,
    LOG_DIST_X_CONTIG,
    LOG_DIST_X_COMLANG,
];
