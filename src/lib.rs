//! # gravity-lab: Temporal Benchmarks for Gravity Trade Models
//!
//! **Version**: 0.1.0
//!
//! gravity-lab turns a bilateral trade panel (origin × destination × year)
//! into a leakage-free modeling dataset, splits it at a year boundary so
//! training strictly precedes testing, and benchmarks a fixed battery of
//! regressors on the holdout.
//!
//! ## Pipeline
//!
//! - **Load/clean** ([`panel`]): resolve the export column, drop rows with
//!   missing or non-positive values, derive log features
//! - **Split** ([`split`]): `year <= train_end` / `year >= test_start`
//! - **Fit** ([`models`]): OLS, Ridge, Lasso, random forest, gradient boosting
//! - **Evaluate** ([`evaluation`]): RMSE, R², residuals, importance rankings
//! - **Persist** ([`artifacts`], [`experiment`]): CSV tables, plot data, and
//!   the `experiments.json` tracking manifest
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use gravity_lab::config::{ExperimentConfig, PipelineConfig};
//! use gravity_lab::panel::load_gravity_data;
//! use gravity_lab::runner::ExperimentRunner;
//!
//! let config = PipelineConfig::default();
//! let dataset = load_gravity_data(&config.data_path, config.years())?;
//!
//! let mut runner = ExperimentRunner::new("results", 42);
//! let outcome = runner.run(&dataset, &ExperimentConfig::builder("baseline").build())?;
//! println!("best: {:?}", outcome.best.map(|b| b.name));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod artifacts;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod experiment;
pub mod models;
pub mod panel;
pub mod parallel;
pub mod runner;
pub mod split;
pub mod storage;
pub mod summary;

pub use error::{Error, Result};
