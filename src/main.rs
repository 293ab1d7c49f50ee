//! gravity-lab CLI
//!
//! Usage:
//!   gravity-lab run [--config gravity.toml] [--data PATH] [--results DIR] [--seed N]
//!   gravity-lab summarize [--config gravity.toml] [--results DIR]
//!
//! Environment:
//!   `RUST_LOG` - log filter (default: info)

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gravity_lab::config::PipelineConfig;
use gravity_lab::{runner, summary};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gravity-lab")]
#[command(about = "Temporal holdout benchmarks for gravity trade-flow models")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every configured experiment
    Run {
        /// TOML configuration file
        #[arg(long, env = "GRAVITY_CONFIG")]
        config: Option<PathBuf>,

        /// Raw panel file (CSV or Parquet)
        #[arg(long, env = "GRAVITY_DATA")]
        data: Option<PathBuf>,

        /// Results directory
        #[arg(long, env = "GRAVITY_RESULTS")]
        results: Option<PathBuf>,

        /// Estimator seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Summarize importance tables across experiments
    Summarize {
        /// TOML configuration file
        #[arg(long, env = "GRAVITY_CONFIG")]
        config: Option<PathBuf>,

        /// Results directory
        #[arg(long, env = "GRAVITY_RESULTS")]
        results: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            data,
            results,
            seed,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(data) = data {
                config.data_path = data;
            }
            if let Some(results) = results {
                config.results_dir = results;
            }
            if let Some(seed) = seed {
                config.seed = seed;
            }

            info!("Starting gravity-lab run");
            info!("  Data: {}", config.data_path.display());
            info!("  Results: {}", config.results_dir.display());
            info!("  Experiments: {}", config.experiments.len());

            let store = runner::run_pipeline(&config).context("experiment pipeline failed")?;
            info!(
                "Done: {} experiments, {} runs, {} artifacts",
                store.experiment_count(),
                store.run_count(),
                store.artifact_count()
            );
        }
        Command::Summarize { config, results } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(results) = results {
                config.results_dir = results;
            }

            let written = summary::summarize(&config.results_dir, &config.summary)
                .context("importance summary failed")?;
            for artifact in &written {
                info!("Saved: {}", config.results_dir.join(artifact.name()).display());
            }
        }
    }

    Ok(())
}
