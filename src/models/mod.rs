//! Model Registry
//!
//! Every estimator implements [`Regressor`] (fit/predict on a [`FeatureMatrix`]).
//! Tree ensembles additionally implement [`ImportanceRegressor`].
//!
//! Whether a model exposes importances is an explicit capability tag on the
//! registry entry ([`Estimator::TreeEnsemble`]), so the runner branches on a
//! variant instead of probing the model at runtime.
//!
//! # Example
//!
//! ```rust
//! use gravity_lab::models::get_models;
//!
//! let registry = get_models(42);
//! assert_eq!(
//!     registry.names(),
//!     vec!["LinearRegression", "Ridge", "Lasso", "RandomForest", "GradientBoosting"]
//! );
//! ```

pub mod boosting;
pub mod forest;
pub mod linear;
pub mod tree;

pub use boosting::GradientBoostingRegressor;
pub use forest::RandomForestRegressor;
pub use linear::{Lasso, LinearRegression, Ridge};

use crate::split::FeatureMatrix;
use crate::{Error, Result};
use std::fmt::Debug;

/// Fit/predict contract shared by every estimator.
pub trait Regressor: Send + Sync + Debug {
    /// Fit on a feature matrix and target vector of the same row count.
    ///
    /// # Errors
    /// Returns error on empty input, a length mismatch, or a numerical failure
    fn fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<()>;

    /// Predict one value per row of `x`.
    ///
    /// # Errors
    /// Returns [`Error::NotFitted`] before `fit`, or an error if `x` has a
    /// different column count than the training matrix
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>>;
}

/// Regressor that scores each input feature after fitting.
pub trait ImportanceRegressor: Regressor {
    /// Non-negative per-feature scores, in column order.
    ///
    /// # Errors
    /// Returns [`Error::NotFitted`] before `fit`
    fn feature_importances(&self) -> Result<Vec<f64>>;
}

/// Capability-tagged estimator.
#[derive(Debug)]
pub enum Estimator {
    /// Linear model; no importance notion
    Linear(Box<dyn Regressor>),
    /// Tree ensemble exposing feature importances
    TreeEnsemble(Box<dyn ImportanceRegressor>),
}

impl Estimator {
    /// Fit the wrapped model.
    ///
    /// # Errors
    /// Propagates the model's fit error
    pub fn fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<()> {
        match self {
            Self::Linear(model) => model.fit(x, y),
            Self::TreeEnsemble(model) => model.fit(x, y),
        }
    }

    /// Predict with the wrapped model.
    ///
    /// # Errors
    /// Propagates the model's predict error
    pub fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        match self {
            Self::Linear(model) => model.predict(x),
            Self::TreeEnsemble(model) => model.predict(x),
        }
    }

    /// Importances if the estimator has that capability.
    #[must_use]
    pub fn feature_importances(&self) -> Option<Result<Vec<f64>>> {
        match self {
            Self::Linear(_) => None,
            Self::TreeEnsemble(model) => Some(model.feature_importances()),
        }
    }

    /// Whether this estimator exposes importances.
    #[must_use]
    pub const fn has_importances(&self) -> bool {
        matches!(self, Self::TreeEnsemble(_))
    }
}

/// One named registry slot.
#[derive(Debug)]
pub struct RegistryEntry {
    /// Model name used in metrics and artifact names
    pub name: String,
    /// The unfitted estimator
    pub estimator: Estimator,
}

/// Ordered collection of named estimators.
///
/// Iteration order is insertion order, so metrics tables and best-model ties
/// are deterministic.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    entries: Vec<RegistryEntry>,
}

impl ModelRegistry {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a linear model (builder style).
    #[must_use]
    pub fn with_linear<M: Regressor + 'static>(mut self, name: impl Into<String>, model: M) -> Self {
        self.register(name, Estimator::Linear(Box::new(model)));
        self
    }

    /// Add a tree ensemble (builder style).
    #[must_use]
    pub fn with_ensemble<M: ImportanceRegressor + 'static>(
        mut self,
        name: impl Into<String>,
        model: M,
    ) -> Self {
        self.register(name, Estimator::TreeEnsemble(Box::new(model)));
        self
    }

    /// Append an entry. A duplicate name replaces the earlier entry in place.
    pub fn register(&mut self, name: impl Into<String>, estimator: Estimator) {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|e| e.name == name) {
            slot.estimator = estimator;
        } else {
            self.entries.push(RegistryEntry { name, estimator });
        }
    }

    /// Look up an entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Entry names in registry order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for ModelRegistry {
    type Item = RegistryEntry;
    type IntoIter = std::vec::IntoIter<RegistryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Build the fixed five-model battery.
///
/// Pure factory: call it once per experiment so no fitted state is ever
/// shared between runs. Both stochastic estimators take the same seed.
#[must_use]
pub fn get_models(seed: u64) -> ModelRegistry {
    ModelRegistry::new()
        .with_linear("LinearRegression", LinearRegression::new())
        .with_linear("Ridge", Ridge::new(1.0))
        .with_linear("Lasso", Lasso::new(0.001).with_max_iter(10_000))
        .with_ensemble("RandomForest", RandomForestRegressor::new(seed))
        .with_ensemble("GradientBoosting", GradientBoostingRegressor::new(seed))
}

/// Validate training input shared by all estimators.
pub(crate) fn check_training_input(model: &str, x: &FeatureMatrix, y: &[f64]) -> Result<()> {
    if x.n_rows() != y.len() {
        return Err(Error::LengthMismatch {
            expected: x.n_rows(),
            actual: y.len(),
        });
    }
    if x.is_empty() {
        return Err(Error::estimator(model, "cannot fit on zero rows"));
    }
    Ok(())
}

/// Validate that prediction input matches the fitted width.
pub(crate) fn check_prediction_input(model: &str, fitted_cols: usize, x: &FeatureMatrix) -> Result<()> {
    if x.n_cols() != fitted_cols {
        return Err(Error::estimator(
            model,
            format!(
                "fitted on {fitted_cols} features, got {}",
                x.n_cols()
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct MeanModel {
        mean: Option<f64>,
    }

    impl Regressor for MeanModel {
        #[allow(clippy::cast_precision_loss)]
        fn fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<()> {
            check_training_input("Mean", x, y)?;
            self.mean = Some(y.iter().sum::<f64>() / y.len() as f64);
            Ok(())
        }

        fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
            let mean = self.mean.ok_or(Error::NotFitted("Mean"))?;
            Ok(vec![mean; x.n_rows()])
        }
    }

    fn matrix(rows: &[Vec<f64>]) -> FeatureMatrix {
        FeatureMatrix::from_rows(vec!["a".into()], rows).unwrap()
    }

    #[test]
    fn test_registry_order_and_capabilities() {
        let registry = get_models(42);
        assert_eq!(registry.len(), 5);
        assert!(!registry.get("Ridge").unwrap().estimator.has_importances());
        assert!(registry.get("RandomForest").unwrap().estimator.has_importances());
        assert!(registry.get("GradientBoosting").unwrap().estimator.has_importances());
        assert!(registry.get("XGBoost").is_none());
    }

    #[test]
    fn test_register_duplicate_replaces_in_place() {
        let mut registry = ModelRegistry::new()
            .with_linear("a", MeanModel::default())
            .with_linear("b", MeanModel::default());
        registry.register("a", Estimator::Linear(Box::new(MeanModel::default())));
        assert_eq!(registry.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_estimator_dispatch() {
        let mut est = Estimator::Linear(Box::new(MeanModel::default()));
        let x = matrix(&[vec![0.0], vec![1.0]]);
        assert!(matches!(est.predict(&x), Err(Error::NotFitted(_))));

        est.fit(&x, &[1.0, 3.0]).unwrap();
        assert_eq!(est.predict(&x).unwrap(), vec![2.0, 2.0]);
        assert!(est.feature_importances().is_none());
    }

    #[test]
    fn test_training_input_checks() {
        let x = matrix(&[vec![0.0], vec![1.0]]);
        assert!(matches!(
            check_training_input("m", &x, &[1.0]),
            Err(Error::LengthMismatch { expected: 2, actual: 1 })
        ));
        let empty = matrix(&[]);
        assert!(check_training_input("m", &empty, &[]).is_err());
        assert!(check_prediction_input("m", 2, &x).is_err());
        assert!(check_prediction_input("m", 1, &x).is_ok());
    }
}
