extern crate nalgebra as na;

#[cfg(feature = "linfa")]
use std::time::Instant;

#[cfg(feature = "linfa")]
use linfa::prelude::*;
#[cfg(feature = "linfa")]
use linfa_elasticnet::ElasticNet;
#[cfg(feature = "linfa")]
use ndarray::{Array, Array1};
use thiserror::Error;

/// Error type for solver setup, problem files and reference fits.
///
/// `LassoError` is only produced for malformed inputs or I/O failures.
/// Conditions a caller may reasonably ignore (no convergence, zero
/// regularization, unstable coordinates) are reported as
/// [`Advisory`](crate::problem::Advisory) values on the solve result instead.
///
/// # Example
///
/// ```rust
/// # use bilasso_core::utils::LassoError;
///
/// fn might_fail(max_iter: usize) -> Result<(), LassoError> {
///     if max_iter == 0 {
///         return Err(LassoError::InvalidParameter {
///             name: "max_iter",
///             reason: "must be positive".to_string(),
///         });
///     }
///     Ok(())
/// }
///
/// assert!(might_fail(0).is_err());
/// ```
#[derive(Debug, Error)]
pub enum LassoError {
    /// An input vector or matrix does not match the shape implied by `X`
    #[error("dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// A scalar parameter is outside of its admissible range
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A data matrix file has a bad header or a truncated body
    #[error("malformed data matrix file: {0}")]
    MalformedFile(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "linfa")]
    #[error("linfa reference fit failed: {0}")]
    Linfa(String),
}

/// Sign function with `fsign(0.0) == 0.0`.
#[inline]
pub fn fsign(f: f64) -> f64 {
    if f == 0.0 {
        0.0
    } else if f > 0.0 {
        1.0
    } else {
        -1.0
    }
}

/// Largest absolute value in `a`, `0.0` for an empty slice.
///
/// NaN entries after the first element never win the comparison, so a
/// single NaN in the middle of the slice does not poison the result.
pub fn abs_max(a: &[f64]) -> f64 {
    let mut iter = a.iter();
    let Some(first) = iter.next() else {
        return 0.0;
    };

    let mut m = first.abs();
    for v in iter {
        let d = v.abs();
        if d > m {
            m = d;
        }
    }
    m
}

/// Soft thresholding operator, `sign(x) * max(|x| - threshold, 0)`.
///
/// This is the exact minimizer of `0.5 * (z - x)^2 + threshold * |z|`.
#[inline]
pub fn soft_threshold(x: f64, threshold: f64) -> f64 {
    fsign(x) * (x.abs() - threshold).max(0.0)
}

/// L1 norm of a weight vector.
pub fn l1_norm(w: &na::DVector<f64>) -> f64 {
    w.iter().map(|v| v.abs()).sum()
}

/// Lasso objective `0.5 * ||y - Xw||^2 + alpha * ||w||_1`.
///
/// # Arguments
///
/// * `x` - The design matrix (n_samples × n_features)
/// * `y` - The target vector (n_samples)
/// * `w` - The weights to evaluate (n_features)
/// * `alpha` - The L1 regularization strength
pub fn lasso_objective(
    x: &na::DMatrix<f64>,
    y: &na::DVector<f64>,
    w: &na::DVector<f64>,
    alpha: f64,
) -> f64 {
    let residual = y - x * w;
    0.5 * residual.norm_squared() + alpha * l1_norm(w)
}

/// Computes `||X^T y||_inf`, the smallest `alpha` for which `w = 0` solves the Lasso.
///
/// # Example
///
/// ```rust
/// # use nalgebra as na;
/// # use bilasso_core::utils::alpha_max;
///
/// let x = na::DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 2.0]);
/// let y = na::DVector::from_vec(vec![3.0, -1.0]);
///
/// assert_eq!(alpha_max(&x, &y), 3.0);
/// ```
pub fn alpha_max(x: &na::DMatrix<f64>, y: &na::DVector<f64>) -> f64 {
    abs_max(x.tr_mul(y).as_slice())
}

/// Computes the optimal Lasso objective value using the linfa library.
///
/// The reference fit comes from `linfa-elasticnet`, an independent coordinate
/// descent implementation, and is meant for validating this crate's solvers,
/// not for production use.
///
/// # Arguments
///
/// * `x` - The design matrix (n_samples × n_features)
/// * `y` - The target vector (n_samples)
/// * `alpha` - The L1 regularization parameter
///
/// # Returns
///
/// The objective value p* = 0.5 * ||y - Xw*||² + α||w*||₁
///
/// linfa minimizes the sample-averaged loss, so its penalty is `alpha / n_samples`.
#[cfg(feature = "linfa")]
pub fn find_p_star_linfa(
    x: &na::DMatrix<f64>,
    y: &na::DVector<f64>,
    alpha: f64,
) -> Result<f64, LassoError> {
    log::info!("[Reference] Finding p* using linfa");
    let start_time = Instant::now();
    let m = x.nrows();
    let n = x.ncols();

    let x_ndarray = Array::from_shape_fn((m, n), |(i, j)| x[(i, j)]);
    let y_ndarray = Array1::from_vec(y.as_slice().to_vec());

    let dataset = Dataset::new(x_ndarray.clone(), y_ndarray.clone());

    let model = ElasticNet::lasso()
        .penalty(alpha / m as f64)
        .with_intercept(false)
        .fit(&dataset)
        .map_err(|e| LassoError::Linfa(e.to_string()))?;

    let w_star = model.hyperplane().to_owned();

    let residual = x_ndarray.dot(&w_star) - y_ndarray;
    let sq_norm = residual.mapv(|v| v.powi(2)).sum();
    let w_l1 = w_star.mapv(|v| v.abs()).sum();

    log::info!(
        "[Reference] Fit model w/ linfa and calculated p* in {:?}",
        start_time.elapsed()
    );

    Ok(0.5 * sq_norm + alpha * w_l1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn fsign_maps_zero_to_zero() {
        assert_eq!(fsign(0.0), 0.0);
        assert_eq!(fsign(-0.0), 0.0);
        assert_eq!(fsign(3.5), 1.0);
        assert_eq!(fsign(-1e-300), -1.0);
    }

    #[test]
    fn abs_max_handles_empty_and_negative() {
        assert_eq!(abs_max(&[]), 0.0);
        assert_eq!(abs_max(&[0.5, -4.0, 3.0]), 4.0);
        assert_eq!(abs_max(&[-2.0]), 2.0);
    }

    #[test]
    fn abs_max_skips_trailing_nan() {
        assert_eq!(abs_max(&[1.0, f64::NAN, -3.0]), 3.0);
    }

    #[test]
    fn soft_threshold_shrinks_and_zeroes() {
        assert_abs_diff_eq!(soft_threshold(3.0, 1.0), 2.0);
        assert_abs_diff_eq!(soft_threshold(-3.0, 1.0), -2.0);
        assert_eq!(soft_threshold(0.5, 1.0), 0.0);
        assert_eq!(soft_threshold(-1.0, 1.0), 0.0);
    }

    #[test]
    fn objective_matches_hand_computation() {
        let x = na::DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let y = na::DVector::from_vec(vec![1.0, 1.0]);
        let w = na::DVector::from_vec(vec![1.0, -1.0]);
        // residual = [1 - (-1), 1 - (-1)] = [2, 2]
        assert_abs_diff_eq!(lasso_objective(&x, &y, &w, 0.5), 4.0 + 1.0, epsilon = 1e-12);
    }

    #[test]
    fn alpha_max_is_largest_correlation() {
        let x = na::DMatrix::from_row_slice(
            3,
            5,
            &[
                2.1, 0.4, 1.2, 0.3, 1.1, //
                2.1, -0.7, 2.3, 0.4, 2.2, //
                2.4, 0.5, 3.2, 0.7, 3.3,
            ],
        );
        let y = na::DVector::from_vec(vec![1.0, 2.0, 3.0]);
        assert_abs_diff_eq!(alpha_max(&x, &y), 15.4, epsilon = 1e-12);
    }
}
