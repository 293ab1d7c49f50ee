//! Gradient-boosted trees for squared error
//!
//! Starts from the target mean and adds `learning_rate`-shrunk depth-limited
//! trees fitted to the current residuals. Each round samples rows (Bernoulli,
//! rate `subsample`) and columns (`colsample_bytree` of the features) from a
//! single seeded ChaCha stream, so fits are reproducible.

use super::tree::{BinMapper, RegressionTree, TreeParams, MAX_BINS};
use super::{check_prediction_input, check_training_input, ImportanceRegressor, Regressor};
use crate::split::FeatureMatrix;
use crate::{Error, Result};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Boosted ensemble of histogram regression trees.
#[derive(Debug, Clone)]
pub struct GradientBoostingRegressor {
    n_estimators: usize,
    learning_rate: f64,
    subsample: f64,
    colsample_bytree: f64,
    seed: u64,
    params: TreeParams,
    fitted: Option<Booster>,
}

#[derive(Debug, Clone)]
struct Booster {
    base_score: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl GradientBoostingRegressor {
    const NAME: &'static str = "GradientBoosting";

    /// 500 rounds, learning rate 0.05, depth 6, 0.8 row/column sampling,
    /// leaf penalty 1.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            n_estimators: 500,
            learning_rate: 0.05,
            subsample: 0.8,
            colsample_bytree: 0.8,
            seed,
            params: TreeParams {
                max_depth: Some(6),
                min_samples_leaf: 1,
                reg_lambda: 1.0,
            },
            fitted: None,
        }
    }

    /// Set the number of boosting rounds.
    #[must_use]
    pub const fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    /// Set the shrinkage applied to each tree.
    #[must_use]
    pub const fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the per-round row and column sampling rates.
    #[must_use]
    pub const fn with_sampling(mut self, subsample: f64, colsample_bytree: f64) -> Self {
        self.subsample = subsample;
        self.colsample_bytree = colsample_bytree;
        self
    }

    /// Set the maximum tree depth.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.params.max_depth = Some(max_depth);
        self
    }

    fn validate(&self) -> Result<()> {
        let in_unit = |v: f64| v > 0.0 && v <= 1.0;
        if !in_unit(self.subsample) || !in_unit(self.colsample_bytree) {
            return Err(Error::estimator(Self::NAME, "sampling rates must be in (0, 1]"));
        }
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            return Err(Error::estimator(Self::NAME, "learning_rate must be positive"));
        }
        Ok(())
    }

    fn booster(&self) -> Result<&Booster> {
        self.fitted.as_ref().ok_or(Error::NotFitted(Self::NAME))
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn columns_per_tree(&self, n_features: usize) -> usize {
        ((self.colsample_bytree * n_features as f64).round() as usize).clamp(1, n_features)
    }
}

impl Regressor for GradientBoostingRegressor {
    #[allow(clippy::cast_precision_loss)]
    fn fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<()> {
        check_training_input(Self::NAME, x, y)?;
        self.validate()?;
        let n = u32::try_from(x.n_rows())
            .map_err(|_| Error::estimator(Self::NAME, "too many training rows"))?;

        let mapper = BinMapper::fit(x, MAX_BINS)?;
        let binned = mapper.transform(x)?;
        let n_features = x.n_cols();
        let k = self.columns_per_tree(n_features);

        let base_score = y.iter().sum::<f64>() / y.len() as f64;
        let mut predictions = vec![base_score; y.len()];
        let mut residuals = vec![0.0; y.len()];
        let mut trees = Vec::with_capacity(self.n_estimators);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        for _ in 0..self.n_estimators {
            for ((r, t), p) in residuals.iter_mut().zip(y).zip(&predictions) {
                *r = t - p;
            }

            let mut rows: Vec<u32> = (0..n)
                .filter(|_| rng.gen::<f64>() < self.subsample)
                .collect();
            if rows.is_empty() {
                rows = (0..n).collect();
            }
            let mut features = index::sample(&mut rng, n_features, k).into_vec();
            features.sort_unstable();

            let tree = RegressionTree::grow(&binned, &mapper, &residuals, rows, &features, &self.params);
            for (i, p) in predictions.iter_mut().enumerate() {
                *p += self.learning_rate * tree.predict_binned(&binned, i);
            }
            trees.push(tree);
        }

        debug!(
            rounds = trees.len(),
            base_score,
            columns_per_tree = k,
            "gradient boosting fitted"
        );
        self.fitted = Some(Booster {
            base_score,
            trees,
            n_features,
        });
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        let booster = self.booster()?;
        check_prediction_input(Self::NAME, booster.n_features, x)?;
        Ok(x.rows()
            .map(|row| {
                booster.base_score
                    + self.learning_rate
                        * booster.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
            })
            .collect())
    }
}

impl ImportanceRegressor for GradientBoostingRegressor {
    /// Average split gain per feature, normalized to sum to one.
    #[allow(clippy::cast_precision_loss)]
    fn feature_importances(&self) -> Result<Vec<f64>> {
        let booster = self.booster()?;
        let mut gains = vec![0.0; booster.n_features];
        let mut splits = vec![0usize; booster.n_features];
        for tree in &booster.trees {
            for (acc, g) in gains.iter_mut().zip(tree.feature_gains()) {
                *acc += g;
            }
            for (acc, s) in splits.iter_mut().zip(tree.split_counts()) {
                *acc += s;
            }
        }

        let mut average: Vec<f64> = gains
            .iter()
            .zip(&splits)
            .map(|(&g, &s)| if s > 0 { g / s as f64 } else { 0.0 })
            .collect();
        let total: f64 = average.iter().sum();
        if total > 0.0 {
            for v in &mut average {
                *v /= total;
            }
        }
        Ok(average)
    }
}
