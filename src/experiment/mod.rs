//! Experiment Tracking Schema
//!
//! Records what each experiment did: its configuration and partition sizes,
//! one run per model with its lifecycle and metrics, and every file written.
//! The runner fills an [`ExperimentStore`]; the CLI saves it as the
//! `experiments.json` manifest next to the artifacts.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRecord (1) ──< RunRecord (N, one per model)
//!        │                     └──< MetricRecord (rmse, r2)
//!        └──< ArtifactRecord (N)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use gravity_lab::experiment::{ExperimentRecord, ExperimentStore, MetricRecord, RunRecord, RunStatus};
//!
//! let mut store = ExperimentStore::new();
//! store.add_experiment(ExperimentRecord::new("baseline"));
//!
//! let mut run = RunRecord::new("baseline", "Ridge");
//! run.start();
//! store.add_metric(MetricRecord::new(run.run_id(), "rmse", 0.42));
//! run.succeed();
//! store.add_run(run);
//!
//! assert_eq!(store.best_run("baseline").unwrap().0.status(), RunStatus::Success);
//! ```

mod artifact_record;
mod experiment_record;
pub mod metric_record;
mod run_record;
mod store;

pub use artifact_record::{ArtifactKind, ArtifactRecord};
pub use experiment_record::{ExperimentRecord, ExperimentRecordBuilder};
pub use metric_record::MetricRecord;
pub use run_record::{RunRecord, RunStatus};
pub use store::ExperimentStore;
