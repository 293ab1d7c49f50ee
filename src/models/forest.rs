//! Random forest regressor
//!
//! Bootstrap-aggregated, fully grown squared-error trees over all features.
//! Tree `t` draws its bootstrap sample from a ChaCha stream keyed by
//! `(seed, t)`, so the fitted forest is identical for any worker count.

use super::tree::{BinMapper, RegressionTree, TreeParams, MAX_BINS};
use super::{check_prediction_input, check_training_input, ImportanceRegressor, Regressor};
use crate::parallel::{self, Workers};
use crate::split::FeatureMatrix;
use crate::{Error, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Random forest of histogram regression trees.
#[derive(Debug, Clone)]
pub struct RandomForestRegressor {
    n_estimators: usize,
    workers: Workers,
    seed: u64,
    params: TreeParams,
    fitted: Option<Forest>,
}

#[derive(Debug, Clone)]
struct Forest {
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForestRegressor {
    const NAME: &'static str = "RandomForest";

    /// 200 fully grown trees on all cores.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            n_estimators: 200,
            workers: Workers::All,
            seed,
            params: TreeParams::default(),
            fitted: None,
        }
    }

    /// Set the number of trees.
    #[must_use]
    pub const fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    /// Set the worker hint.
    #[must_use]
    pub const fn with_workers(mut self, workers: Workers) -> Self {
        self.workers = workers;
        self
    }

    /// Cap tree depth.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.params.max_depth = max_depth;
        self
    }

    /// Number of trees.
    #[must_use]
    pub const fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    fn forest(&self) -> Result<&Forest> {
        self.fitted.as_ref().ok_or(Error::NotFitted(Self::NAME))
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<()> {
        check_training_input(Self::NAME, x, y)?;
        if self.n_estimators == 0 {
            return Err(Error::estimator(Self::NAME, "n_estimators must be positive"));
        }
        let n = u32::try_from(x.n_rows())
            .map_err(|_| Error::estimator(Self::NAME, "too many training rows"))?;

        let mapper = BinMapper::fit(x, MAX_BINS)?;
        let binned = mapper.transform(x)?;
        let features: Vec<usize> = (0..x.n_cols()).collect();

        let trees = parallel::map_range(
            self.n_estimators,
            |t| {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
                rng.set_stream(t as u64);
                let sample: Vec<u32> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::grow(&binned, &mapper, y, sample, &features, &self.params)
            },
            self.workers,
        )?;

        debug!(
            trees = trees.len(),
            mean_leaves = trees.iter().map(RegressionTree::n_leaves).sum::<usize>() / trees.len(),
            "random forest fitted"
        );
        self.fitted = Some(Forest {
            trees,
            n_features: x.n_cols(),
        });
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        let forest = self.forest()?;
        check_prediction_input(Self::NAME, forest.n_features, x)?;
        let scale = forest.trees.len() as f64;
        parallel::map_range(
            x.n_rows(),
            |i| {
                let row = x.row(i);
                forest.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / scale
            },
            self.workers,
        )
    }
}

impl ImportanceRegressor for RandomForestRegressor {
    /// Mean over trees of each tree's normalized impurity decrease.
    #[allow(clippy::cast_precision_loss)]
    fn feature_importances(&self) -> Result<Vec<f64>> {
        let forest = self.forest()?;
        let mut totals = vec![0.0; forest.n_features];
        for tree in &forest.trees {
            let gains = tree.feature_gains();
            let tree_total: f64 = gains.iter().sum();
            if tree_total > 0.0 {
                for (acc, g) in totals.iter_mut().zip(gains) {
                    *acc += g / tree_total;
                }
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            for v in &mut totals {
                *v /= sum;
            }
        }
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// y depends on column 0 only; column 1 is noise-free filler.
    fn dataset() -> (FeatureMatrix, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..120)
            .map(|i| vec![f64::from(i % 12), f64::from((i * 7) % 5)])
            .collect();
        let y = rows.iter().map(|r| if r[0] < 6.0 { 1.0 } else { 10.0 }).collect();
        let x = FeatureMatrix::from_rows(vec!["signal".into(), "filler".into()], &rows).unwrap();
        (x, y)
    }

    #[test]
    fn test_forest_fits_step_and_ranks_signal_first() {
        let (x, y) = dataset();
        let mut model = RandomForestRegressor::new(42).with_n_estimators(20);
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(&y) {
            assert!((p - t).abs() < 1e-9);
        }
        let imp = model.feature_importances().unwrap();
        assert!(imp[0] > 0.99);
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_same_result_for_any_worker_count() {
        let (x, mut y) = dataset();
        for (i, v) in y.iter_mut().enumerate() {
            *v += f64::from(u32::try_from(i % 7).unwrap()) * 0.1;
        }
        let fit = |workers| {
            let mut m = RandomForestRegressor::new(7)
                .with_n_estimators(16)
                .with_workers(workers);
            m.fit(&x, &y).unwrap();
            (m.predict(&x).unwrap(), m.feature_importances().unwrap())
        };
        let sequential = fit(Workers::Sequential);
        assert_eq!(sequential, fit(Workers::All));
        assert_eq!(sequential, fit(Workers::Fixed(3)));
    }

    #[test]
    fn test_different_seeds_differ() {
        let (x, mut y) = dataset();
        for (i, v) in y.iter_mut().enumerate() {
            *v += f64::from(u32::try_from(i % 11).unwrap());
        }
        let fit = |seed| {
            let mut m = RandomForestRegressor::new(seed).with_n_estimators(8);
            m.fit(&x, &y).unwrap();
            m.predict(&x).unwrap()
        };
        assert_ne!(fit(1), fit(2));
    }

    #[test]
    fn test_unfitted_and_invalid() {
        let (x, y) = dataset();
        let model = RandomForestRegressor::new(0);
        assert!(matches!(model.predict(&x), Err(Error::NotFitted(_))));
        assert!(model.feature_importances().is_err());

        let mut empty = RandomForestRegressor::new(0).with_n_estimators(0);
        assert!(empty.fit(&x, &y).is_err());
    }
}
