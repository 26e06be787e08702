//! Coordinate descent for the biclustering Lasso.
//!
//! Sample-indexed and feature-indexed unknowns are stacked into one vector
//! `w = [u; v]` of length `n_samples + n_features` and coupled through the
//! Jordan-Wielandt matrix of `X`:
//!
//! ```text
//!        | 0   X |
//! 0.5 *  |       |
//!        | X^T 0 |
//! ```
//!
//! Both diagonal blocks are zero, so the closed-form coordinate update,
//! which divides by the diagonal entry, is undefined whenever it does not
//! collapse to zero. [`DiagonalPolicy`] decides what happens then. No
//! duality gap is computed for this solver; the reported gap is always `0.0`.

extern crate nalgebra as na;

use serde::{Deserialize, Serialize};

use crate::{
    problem::{Advisory, CoordinateDescentProblem, CoordinateDescentSolver, SolveResult, SweepStats},
    utils::LassoError,
};

/// Coordinate descent solver specialized to the biclustering Lasso.
pub type BiclusteringLassoSolver<'a> = CoordinateDescentSolver<BiclusteringLassoProblem<'a>>;

/// What to do when a coordinate update must divide by a zero diagonal entry.
///
/// The branches that set a coordinate to zero never divide and behave the
/// same under every policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagonalPolicy {
    /// Divide anyway and let IEEE-754 infinities and NaNs propagate.
    #[default]
    Propagate,
    /// Leave the coordinate at its previous value.
    Skip,
}

/// Builds `0.5 * [[0, X], [X^T, 0]]`, sample coordinates first.
///
/// # Example
///
/// ```rust
/// # use nalgebra as na;
/// # use bilasso_core::biclustering::jordan_wielandt;
/// let x = na::DMatrix::from_row_slice(1, 2, &[2.0, 4.0]);
/// let m = jordan_wielandt(&x);
///
/// assert_eq!(m.shape(), (3, 3));
/// assert_eq!(m[(0, 2)], 2.0);
/// assert_eq!(m[(2, 0)], 2.0);
/// assert_eq!(m[(1, 1)], 0.0);
/// ```
pub fn jordan_wielandt(x: &na::DMatrix<f64>) -> na::DMatrix<f64> {
    let n_samples = x.nrows();
    let n_features = x.ncols();
    let n = n_samples + n_features;

    let mut m = na::DMatrix::<f64>::zeros(n, n);
    m.view_mut((0, n_samples), (n_samples, n_features)).copy_from(x);
    m.view_mut((n_samples, 0), (n_features, n_samples)).copy_from(&x.transpose());
    m *= 0.5;
    m
}

/// State of one biclustering Lasso solve.
pub struct BiclusteringLassoProblem<'a> {
    x: &'a na::DMatrix<f64>,
    w: na::DVector<f64>,
    alpha: f64,
    tol: f64,
    policy: DiagonalPolicy,
    augmented: na::DMatrix<f64>,
    precomputed: bool,
    instability_reported: bool,
    advisories: Vec<Advisory>,
}

impl<'a> BiclusteringLassoProblem<'a> {
    /// Creates a biclustering Lasso problem with [`DiagonalPolicy::Propagate`].
    ///
    /// # Arguments
    ///
    /// * `w` - Initial weights, sample coordinates first (n_samples + n_features)
    /// * `alpha` - L1 regularization strength
    /// * `x` - Data matrix (n_samples × n_features)
    /// * `tol` - Absolute tolerance on the largest coordinate change of a sweep
    pub fn new(
        w: na::DVector<f64>,
        alpha: f64,
        x: &'a na::DMatrix<f64>,
        tol: f64,
    ) -> Result<Self, LassoError> {
        let n = x.nrows() + x.ncols();
        if w.len() != n {
            return Err(LassoError::DimensionMismatch {
                what: "weights",
                expected: n,
                found: w.len(),
            });
        }
        if !alpha.is_finite() {
            return Err(LassoError::InvalidParameter {
                name: "alpha",
                reason: format!("must be finite, got {}", alpha),
            });
        }
        if !(tol.is_finite() && tol > 0.0) {
            return Err(LassoError::InvalidParameter {
                name: "tol",
                reason: format!("must be positive and finite, got {}", tol),
            });
        }

        Ok(BiclusteringLassoProblem {
            x,
            w,
            alpha,
            tol,
            policy: DiagonalPolicy::default(),
            augmented: na::DMatrix::zeros(0, 0),
            precomputed: false,
            instability_reported: false,
            advisories: Vec::new(),
        })
    }

    pub fn with_policy(mut self, policy: DiagonalPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> DiagonalPolicy {
        self.policy
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// The augmented matrix; empty before `precompute`.
    pub fn augmented(&self) -> &na::DMatrix<f64> {
        &self.augmented
    }

    fn report_zero_diagonal(&mut self, coordinate: usize) {
        if self.instability_reported {
            return;
        }
        self.instability_reported = true;

        let advisory = Advisory::NumericalInstability {
            coordinate,
            policy: self.policy,
        };
        log::warn!("[BiclusteringLassoSolver] {}", advisory);
        self.advisories.push(advisory);
    }
}

impl CoordinateDescentProblem for BiclusteringLassoProblem<'_> {
    fn name(&self) -> &'static str {
        "BiclusteringLassoSolver"
    }

    fn precompute(&mut self) -> Result<(), LassoError> {
        if self.precomputed {
            return Ok(());
        }
        self.augmented = jordan_wielandt(self.x);
        self.precomputed = true;
        Ok(())
    }

    fn sweep(&mut self) -> Result<SweepStats, LassoError> {
        self.precompute()?;

        let mut stats = SweepStats::default();

        for ii in 0..self.w.len() {
            let w_ii = self.w[ii];
            let diagonal = self.augmented[(ii, ii)];

            // The matrix is symmetric, so column ii doubles as row ii.
            let tmp = self.augmented.column(ii).dot(&self.w) - diagonal * w_ii;

            // A NaN tmp fails the comparison and lands in the zero branch.
            let numerator = if tmp.abs() > self.alpha {
                if tmp >= 0.0 {
                    Some(-self.alpha - tmp)
                } else {
                    Some(self.alpha - tmp)
                }
            } else {
                None
            };

            let new_w = match numerator {
                None => 0.0,
                Some(numerator) if diagonal == 0.0 => {
                    self.report_zero_diagonal(ii);
                    match self.policy {
                        DiagonalPolicy::Propagate => numerator / diagonal,
                        DiagonalPolicy::Skip => w_ii,
                    }
                }
                Some(numerator) => numerator / diagonal,
            };
            self.w[ii] = new_w;

            stats.record(w_ii, new_w);
        }

        Ok(stats)
    }

    fn check_stopping_criteria(&mut self, stats: &SweepStats, _last_iteration: bool) -> bool {
        stats.d_w_max < self.tol
    }

    fn gap(&self) -> f64 {
        0.0
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

/// Coordinate descent for the biclustering Lasso.
///
/// Stops once the largest coordinate change of a sweep drops below `tol`.
/// Returns the weights with sample coordinates first; `gap` is always `0.0`
/// and `tol` is returned unchanged.
pub fn biclustering_lasso_coordinate_descent(
    w: na::DVector<f64>,
    alpha: f64,
    x: &na::DMatrix<f64>,
    max_iter: usize,
    tol: f64,
) -> Result<SolveResult, LassoError> {
    let problem = BiclusteringLassoProblem::new(w, alpha, x, tol)?;
    let mut solver = CoordinateDescentSolver::new(problem, max_iter);
    solver.solve()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_x() -> na::DMatrix<f64> {
        na::DMatrix::from_row_slice(
            3,
            5,
            &[
                2.1, 0.4, 1.2, 0.3, 1.1, //
                2.1, -0.7, 2.3, 0.4, 2.2, //
                2.4, 0.5, 3.2, 0.7, 3.3,
            ],
        )
    }

    #[test]
    fn jordan_wielandt_layout() {
        let x = example_x();
        let m = jordan_wielandt(&x);

        assert_eq!(m.shape(), (8, 8));
        assert_eq!(m, m.transpose());
        for i in 0..8 {
            assert_eq!(m[(i, i)], 0.0);
        }
        // sample-sample and feature-feature blocks vanish
        assert!(m.view((0, 0), (3, 3)).iter().all(|&v| v == 0.0));
        assert!(m.view((3, 3), (5, 5)).iter().all(|&v| v == 0.0));
        assert_eq!(m[(1, 3 + 1)], 0.5 * -0.7);
        assert_eq!(m[(3 + 4, 2)], 0.5 * 3.3);
    }

    #[test]
    fn below_threshold_coordinates_are_zeroed() {
        let x = example_x();
        let mut w = na::DVector::zeros(8);
        w[0] = 1.0;

        let mut problem = BiclusteringLassoProblem::new(w, 5.0, &x, 1e-4).unwrap();
        assert_eq!(problem.augmented().shape(), (0, 0));

        // the first sweep builds the augmented matrix itself
        let stats = problem.sweep().unwrap();

        assert_eq!(problem.augmented().shape(), (8, 8));
        assert!(problem.weights().iter().all(|&v| v == 0.0));
        assert_eq!(stats.d_w_max, 1.0);
        assert_eq!(stats.w_max, 0.0);
        assert!(problem.take_advisories().is_empty());
    }

    #[test]
    fn propagate_policy_divides_by_zero_diagonal() {
        let x = example_x();
        let w = na::DVector::from_element(8, 1.0);

        let problem = BiclusteringLassoProblem::new(w, 0.01, &x, 1e-4).unwrap();
        assert_eq!(problem.policy(), DiagonalPolicy::Propagate);
        let mut solver = CoordinateDescentSolver::new(problem, 1);
        let result = solver.solve().unwrap();

        // tmp = 0.5 * sum(X[0, :]) = 2.55 > alpha, numerator negative, diagonal +0.0
        assert_eq!(result.weights[0], f64::NEG_INFINITY);
        assert!(!result.converged);
        assert_eq!(
            result.advisories[0],
            Advisory::NumericalInstability {
                coordinate: 0,
                policy: DiagonalPolicy::Propagate
            }
        );
        assert!(matches!(result.advisories[1], Advisory::NonConvergence { .. }));
    }

    #[test]
    fn skip_policy_leaves_coordinates_unchanged() {
        let x = example_x();
        let w = na::DVector::from_element(8, 1.0);

        let problem = BiclusteringLassoProblem::new(w, 0.01, &x, 1e-4)
            .unwrap()
            .with_policy(DiagonalPolicy::Skip);
        assert_eq!(problem.policy(), DiagonalPolicy::Skip);
        let mut solver = CoordinateDescentSolver::new(problem, 100);
        let result = solver.solve().unwrap();

        assert!(result.converged);
        assert_eq!(result.n_iter, 1);
        assert!(result.weights.iter().all(|&v| v == 1.0));
        assert_eq!(
            result.advisories,
            vec![Advisory::NumericalInstability {
                coordinate: 0,
                policy: DiagonalPolicy::Skip
            }]
        );
    }

    #[test]
    fn gap_is_placeholder_and_tol_is_unscaled() {
        let x = example_x();
        let result =
            biclustering_lasso_coordinate_descent(na::DVector::zeros(8), 5.0, &x, 10, 1e-4)
                .unwrap();

        assert_eq!(result.gap, 0.0);
        assert_eq!(result.tol, 1e-4);
        assert_eq!(result.n_iter, 1);
        assert!(result.converged);
    }

    #[test]
    fn rejects_bad_inputs() {
        let x = example_x();
        assert!(matches!(
            BiclusteringLassoProblem::new(na::DVector::zeros(5), 1.0, &x, 1e-4),
            Err(LassoError::DimensionMismatch {
                expected: 8,
                found: 5,
                ..
            })
        ));
        assert!(BiclusteringLassoProblem::new(na::DVector::zeros(8), f64::NAN, &x, 1e-4).is_err());
        assert!(BiclusteringLassoProblem::new(na::DVector::zeros(8), 1.0, &x, -1.0).is_err());
    }
}
