//! Cyclic coordinate descent for the Lasso.
//!
//! Minimizes
//!
//! ```text
//! 0.5 * ||y - Xw||^2 + alpha * ||w||_1
//! ```
//!
//! keeping the residual `R = y - Xw` up to date after every coordinate
//! update, and using the duality gap as the final stopping criterion.

extern crate nalgebra as na;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::{
    problem::{Advisory, CoordinateDescentProblem, CoordinateDescentSolver, SolveResult, SweepStats},
    utils::{LassoError, abs_max, l1_norm, lasso_objective, soft_threshold},
};

/// Coordinate descent solver specialized to the Lasso.
pub type LassoSolver<'a> = CoordinateDescentSolver<LassoProblem<'a>>;

/// State of one Lasso solve.
///
/// The design matrix and target are borrowed for the duration of the solve;
/// the weights and residual are owned and updated in place.
pub struct LassoProblem<'a> {
    x: &'a na::DMatrix<f64>,
    y: &'a na::DVector<f64>,
    w: na::DVector<f64>,
    alpha: f64,
    /// Relative update tolerance, the caller's `tol`
    d_w_tol: f64,
    /// Gap tolerance, `tol * dot(y, y)` once precomputed
    tol: f64,
    norm_cols: Vec<f64>,
    residual: na::DVector<f64>,
    gap: f64,
    precomputed: bool,
    advisories: Vec<Advisory>,
}

impl<'a> LassoProblem<'a> {
    /// Creates a Lasso problem.
    ///
    /// # Arguments
    ///
    /// * `w` - Initial weights (n_features)
    /// * `alpha` - L1 regularization strength, `>= 0`
    /// * `x` - Design matrix (n_samples × n_features)
    /// * `y` - Target vector (n_samples)
    /// * `tol` - Relative update tolerance; the gap tolerance is `tol * dot(y, y)`
    ///
    /// # Returns
    ///
    /// * `Err(LassoError)` if the shapes disagree or a scalar is out of range
    pub fn new(
        w: na::DVector<f64>,
        alpha: f64,
        x: &'a na::DMatrix<f64>,
        y: &'a na::DVector<f64>,
        tol: f64,
    ) -> Result<Self, LassoError> {
        if w.len() != x.ncols() {
            return Err(LassoError::DimensionMismatch {
                what: "weights",
                expected: x.ncols(),
                found: w.len(),
            });
        }
        if y.len() != x.nrows() {
            return Err(LassoError::DimensionMismatch {
                what: "target",
                expected: x.nrows(),
                found: y.len(),
            });
        }
        if !(alpha.is_finite() && alpha >= 0.0) {
            return Err(LassoError::InvalidParameter {
                name: "alpha",
                reason: format!("must be finite and non-negative, got {}", alpha),
            });
        }
        if !(tol.is_finite() && tol > 0.0) {
            return Err(LassoError::InvalidParameter {
                name: "tol",
                reason: format!("must be positive and finite, got {}", tol),
            });
        }

        Ok(LassoProblem {
            x,
            y,
            residual: na::DVector::zeros(x.nrows()),
            w,
            alpha,
            d_w_tol: tol,
            tol,
            norm_cols: Vec::new(),
            gap: tol + 1.0,
            precomputed: false,
            advisories: Vec::new(),
        })
    }

    /// Squared norms of the columns of `X`; empty before `precompute`.
    pub fn norm_cols(&self) -> &[f64] {
        &self.norm_cols
    }

    /// The incrementally maintained residual `y - Xw`.
    pub fn residual(&self) -> &na::DVector<f64> {
        &self.residual
    }

    /// Current value of the Lasso objective, computed from scratch.
    pub fn objective(&self) -> f64 {
        lasso_objective(self.x, self.y, &self.w, self.alpha)
    }

    /// Duality gap at the current weights and residual.
    ///
    /// The dual point is the residual rescaled so that `||X^T R||_inf <= alpha`.
    pub fn duality_gap(&self) -> f64 {
        let xt_a = self.x.tr_mul(&self.residual);
        let dual_norm_xt_a = abs_max(xt_a.as_slice());

        let r_norm2 = self.residual.norm_squared();

        let (constant, mut gap) = if dual_norm_xt_a > self.alpha {
            let constant = self.alpha / dual_norm_xt_a;
            let a_norm2 = r_norm2 * constant * constant;
            (constant, 0.5 * (r_norm2 + a_norm2))
        } else {
            (1.0, r_norm2)
        };

        gap += self.alpha * l1_norm(&self.w) - constant * self.residual.dot(self.y);
        gap
    }
}

impl CoordinateDescentProblem for LassoProblem<'_> {
    fn name(&self) -> &'static str {
        "LassoSolver"
    }

    fn precompute(&mut self) -> Result<(), LassoError> {
        if self.precomputed {
            return Ok(());
        }

        self.norm_cols = self
            .x
            .column_iter()
            .map(|column| column.norm_squared())
            .collect();

        if self.alpha == 0.0 {
            let advisory = Advisory::DegenerateRegularization;
            log::warn!("[LassoSolver] {}", advisory);
            self.advisories.push(advisory);
        }

        self.residual = self.y - self.x * &self.w;
        self.tol = self.d_w_tol * self.y.dot(self.y);
        self.precomputed = true;
        Ok(())
    }

    fn sweep(&mut self) -> Result<SweepStats, LassoError> {
        self.precompute()?;

        let x = self.x;
        let mut stats = SweepStats::default();

        for ii in 0..x.ncols() {
            if self.norm_cols[ii] == 0.0 {
                continue;
            }

            let column = x.column(ii);
            let w_ii = self.w[ii];

            if w_ii != 0.0 {
                self.residual.axpy(w_ii, &column, 1.0);
            }

            let rho = column.dot(&self.residual);
            let new_w = soft_threshold(rho, self.alpha) / self.norm_cols[ii];
            self.w[ii] = new_w;

            if new_w != 0.0 {
                self.residual.axpy(-new_w, &column, 1.0);
            }

            stats.record(w_ii, new_w);
        }

        Ok(stats)
    }

    fn check_stopping_criteria(&mut self, stats: &SweepStats, last_iteration: bool) -> bool {
        // Only pay for the gap once the updates have become small.
        if stats.w_max == 0.0 || stats.d_w_max / stats.w_max < self.d_w_tol || last_iteration {
            self.gap = self.duality_gap();
            if self.gap < self.tol {
                return true;
            }
        }
        false
    }

    fn gap(&self) -> f64 {
        self.gap
    }

    fn tol(&self) -> f64 {
        self.tol
    }

    fn alpha(&self) -> f64 {
        self.alpha
    }

    fn weights(&self) -> &na::DVector<f64> {
        &self.w
    }

    fn take_advisories(&mut self) -> Vec<Advisory> {
        std::mem::take(&mut self.advisories)
    }
}

/// Coordinate descent algorithm for Lasso regression.
///
/// # Arguments
///
/// * `w` - Initial weights (n_features), consumed and returned fitted
/// * `alpha` - L1 regularization strength
/// * `x` - Design matrix (n_samples × n_features)
/// * `y` - Target vector (n_samples)
/// * `max_iter` - Maximum number of sweeps
/// * `tol` - Relative update tolerance; the returned `tol` is scaled by `dot(y, y)`
///
/// # Example
///
/// ```rust
/// # use nalgebra as na;
/// # use bilasso_core::lasso::lasso_coordinate_descent;
/// let x = na::DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
/// let y = na::DVector::from_vec(vec![3.0, 0.2, 0.0]);
///
/// let result = lasso_coordinate_descent(na::DVector::zeros(2), 1.0, &x, &y, 100, 1e-4).unwrap();
/// let (w, _gap, _tol, n_iter) = result.into_tuple();
///
/// assert_eq!(w[0], 2.0);
/// assert_eq!(w[1], 0.0);
/// assert!(n_iter <= 100);
/// ```
pub fn lasso_coordinate_descent(
    w: na::DVector<f64>,
    alpha: f64,
    x: &na::DMatrix<f64>,
    y: &na::DVector<f64>,
    max_iter: usize,
    tol: f64,
) -> Result<SolveResult, LassoError> {
    let problem = LassoProblem::new(w, alpha, x, y, tol)?;
    let mut solver = CoordinateDescentSolver::new(problem, max_iter);
    solver.solve()
}

/// Fits one Lasso per `alpha`, each from zero initial weights.
///
/// The fits are independent of each other; with the `rayon` feature they
/// run in parallel. Results are returned in the order of `alphas`.
pub fn lasso_path(
    x: &na::DMatrix<f64>,
    y: &na::DVector<f64>,
    alphas: &[f64],
    max_iter: usize,
    tol: f64,
) -> Result<Vec<SolveResult>, LassoError> {
    let fit = |&alpha: &f64| {
        lasso_coordinate_descent(na::DVector::zeros(x.ncols()), alpha, x, y, max_iter, tol)
    };

    #[cfg(feature = "rayon")]
    {
        alphas.par_iter().map(fit).collect()
    }

    #[cfg(not(feature = "rayon"))]
    {
        alphas.iter().map(fit).collect()
    }
}
