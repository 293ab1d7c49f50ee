//! Linear estimators: OLS, Ridge, Lasso
//!
//! All three fit an unpenalized intercept by centering `X` and `y` first, then
//! recover `intercept = mean(y) - mean(X) · coef`.
//!
//! - OLS solves the centered least-squares problem with an SVD pseudo-inverse,
//!   so rank-deficient designs (collinear interactions) still fit.
//! - Ridge solves `(XᵀX + αI) w = Xᵀy` by Cholesky.
//! - Lasso minimizes `(1/2n)‖y − Xw‖² + α‖w‖₁` by cyclic coordinate descent,
//!   stopping on the duality gap.

use super::{check_prediction_input, check_training_input, Regressor};
use crate::split::FeatureMatrix;
use crate::{Error, Result};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

/// Fitted coefficients shared by the linear models.
#[derive(Debug, Clone, PartialEq)]
struct LinearFit {
    coef: Vec<f64>,
    intercept: f64,
}

impl LinearFit {
    fn from_centered(coef: Vec<f64>, centered: &Centered) -> Self {
        let shift: f64 = centered
            .x_mean
            .iter()
            .zip(&coef)
            .map(|(m, w)| m * w)
            .sum();
        Self {
            intercept: centered.y_mean - shift,
            coef,
        }
    }

    fn predict(&self, model: &str, x: &FeatureMatrix) -> Result<Vec<f64>> {
        check_prediction_input(model, self.coef.len(), x)?;
        Ok(x.rows()
            .map(|row| {
                self.intercept + row.iter().zip(&self.coef).map(|(v, w)| v * w).sum::<f64>()
            })
            .collect())
    }
}

/// Column-centered copy of the training data.
struct Centered {
    x: DMatrix<f64>,
    y: DVector<f64>,
    x_mean: Vec<f64>,
    y_mean: f64,
}

#[allow(clippy::cast_precision_loss)]
fn center(x: &FeatureMatrix, y: &[f64]) -> Centered {
    let n = x.n_rows() as f64;
    let mut x_mean = vec![0.0; x.n_cols()];
    for row in x.rows() {
        for (m, v) in x_mean.iter_mut().zip(row) {
            *m += v;
        }
    }
    for m in &mut x_mean {
        *m /= n;
    }
    let y_mean = y.iter().sum::<f64>() / n;

    Centered {
        x: DMatrix::from_fn(x.n_rows(), x.n_cols(), |i, j| x.row(i)[j] - x_mean[j]),
        y: DVector::from_iterator(y.len(), y.iter().map(|v| v - y_mean)),
        x_mean,
        y_mean,
    }
}

/// Ordinary least squares with intercept.
#[derive(Debug, Clone, Default)]
pub struct LinearRegression {
    fit: Option<LinearFit>,
}

impl LinearRegression {
    const NAME: &'static str = "LinearRegression";

    /// Create an unfitted model.
    #[must_use]
    pub const fn new() -> Self {
        Self { fit: None }
    }

    /// Fitted coefficients, in column order.
    #[must_use]
    pub fn coef(&self) -> Option<&[f64]> {
        self.fit.as_ref().map(|f| f.coef.as_slice())
    }

    /// Fitted intercept.
    #[must_use]
    pub fn intercept(&self) -> Option<f64> {
        self.fit.as_ref().map(|f| f.intercept)
    }
}

impl Regressor for LinearRegression {
    #[allow(clippy::cast_precision_loss)]
    fn fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<()> {
        check_training_input(Self::NAME, x, y)?;
        let centered = center(x, y);

        let svd = centered.x.clone().svd(true, true);
        let largest = svd.singular_values.max();
        let eps = f64::EPSILON * x.n_rows().max(x.n_cols()) as f64 * largest;
        let coef = svd
            .solve(&centered.y, eps)
            .map_err(|e| Error::estimator(Self::NAME, e))?;

        self.fit = Some(LinearFit::from_centered(
            coef.iter().copied().collect(),
            &centered,
        ));
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        self.fit
            .as_ref()
            .ok_or(Error::NotFitted(Self::NAME))?
            .predict(Self::NAME, x)
    }
}

/// L2-penalized least squares with unpenalized intercept.
#[derive(Debug, Clone)]
pub struct Ridge {
    alpha: f64,
    fit: Option<LinearFit>,
}

impl Ridge {
    const NAME: &'static str = "Ridge";

    /// Create an unfitted model with penalty strength `alpha`.
    #[must_use]
    pub const fn new(alpha: f64) -> Self {
        Self { alpha, fit: None }
    }

    /// Penalty strength.
    #[must_use]
    pub const fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Fitted coefficients, in column order.
    #[must_use]
    pub fn coef(&self) -> Option<&[f64]> {
        self.fit.as_ref().map(|f| f.coef.as_slice())
    }
}

impl Regressor for Ridge {
    fn fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<()> {
        check_training_input(Self::NAME, x, y)?;
        if self.alpha.is_nan() || self.alpha < 0.0 {
            return Err(Error::estimator(Self::NAME, "alpha must be non-negative"));
        }
        let centered = center(x, y);

        let mut gram = centered.x.tr_mul(&centered.x);
        for j in 0..gram.ncols() {
            gram[(j, j)] += self.alpha;
        }
        let rhs = centered.x.tr_mul(&centered.y);
        let coef = gram
            .cholesky()
            .ok_or_else(|| Error::estimator(Self::NAME, "normal equations not positive definite"))?
            .solve(&rhs);

        self.fit = Some(LinearFit::from_centered(
            coef.iter().copied().collect(),
            &centered,
        ));
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        self.fit
            .as_ref()
            .ok_or(Error::NotFitted(Self::NAME))?
            .predict(Self::NAME, x)
    }
}

/// L1-penalized least squares fit by coordinate descent.
#[derive(Debug, Clone)]
pub struct Lasso {
    alpha: f64,
    max_iter: usize,
    tol: f64,
    fit: Option<LinearFit>,
    n_iter: usize,
}

impl Lasso {
    const NAME: &'static str = "Lasso";

    /// Create an unfitted model with penalty strength `alpha`
    /// (`max_iter = 1000`, `tol = 1e-4`).
    #[must_use]
    pub const fn new(alpha: f64) -> Self {
        Self {
            alpha,
            max_iter: 1000,
            tol: 1e-4,
            fit: None,
            n_iter: 0,
        }
    }

    /// Set the sweep cap.
    #[must_use]
    pub const fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the convergence tolerance (relative to `‖y‖²`).
    #[must_use]
    pub const fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Fitted coefficients, in column order.
    #[must_use]
    pub fn coef(&self) -> Option<&[f64]> {
        self.fit.as_ref().map(|f| f.coef.as_slice())
    }

    /// Sweeps used by the last fit.
    #[must_use]
    pub const fn n_iter(&self) -> usize {
        self.n_iter
    }
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    value.signum() * (value.abs() - threshold).max(0.0)
}

/// Duality gap of the lasso problem, with the penalty already scaled by `n`.
fn duality_gap(x: &DMatrix<f64>, y: &DVector<f64>, r: &DVector<f64>, w: &[f64], alpha: f64) -> f64 {
    let dual_norm = x.tr_mul(r).amax();
    let r_norm2 = r.norm_squared();
    let (scale, mut gap) = if dual_norm > alpha {
        let scale = alpha / dual_norm;
        (scale, 0.5 * r_norm2 * (1.0 + scale * scale))
    } else {
        (1.0, r_norm2)
    };
    let l1: f64 = w.iter().map(|v| v.abs()).sum();
    gap += alpha * l1 - scale * r.dot(y);
    gap
}

impl Regressor for Lasso {
    #[allow(clippy::cast_precision_loss, clippy::float_cmp)]
    fn fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<()> {
        check_training_input(Self::NAME, x, y)?;
        if self.alpha.is_nan() || self.alpha < 0.0 {
            return Err(Error::estimator(Self::NAME, "alpha must be non-negative"));
        }
        let centered = center(x, y);
        let xc = &centered.x;
        let p = xc.ncols();

        let alpha = self.alpha * x.n_rows() as f64;
        let tol = self.tol * centered.y.norm_squared();
        let norms: Vec<f64> = (0..p).map(|j| xc.column(j).norm_squared()).collect();

        let mut w = vec![0.0; p];
        let mut r = centered.y.clone();
        let mut converged = false;
        let mut sweeps = 0;

        for iter in 0..self.max_iter {
            sweeps = iter + 1;
            let mut w_max = 0.0_f64;
            let mut dw_max = 0.0_f64;

            for j in 0..p {
                if norms[j] == 0.0 {
                    continue;
                }
                let col = xc.column(j);
                let old = w[j];
                if old != 0.0 {
                    r.axpy(old, &col, 1.0);
                }
                let new = soft_threshold(col.dot(&r), alpha) / norms[j];
                if new != 0.0 {
                    r.axpy(-new, &col, 1.0);
                }
                w[j] = new;
                dw_max = dw_max.max((new - old).abs());
                w_max = w_max.max(new.abs());
            }

            if w_max == 0.0 || dw_max / w_max < self.tol || iter + 1 == self.max_iter {
                let gap = duality_gap(xc, &centered.y, &r, &w, alpha);
                if gap < tol {
                    converged = true;
                    break;
                }
            }
        }

        if converged {
            debug!(sweeps, "lasso converged");
        } else {
            warn!(
                max_iter = self.max_iter,
                alpha = self.alpha,
                "Lasso did not converge; consider increasing max_iter"
            );
        }

        self.n_iter = sweeps;
        self.fit = Some(LinearFit::from_centered(w, &centered));
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        self.fit
            .as_ref()
            .ok_or(Error::NotFitted(Self::NAME))?
            .predict(Self::NAME, x)
    }
}
