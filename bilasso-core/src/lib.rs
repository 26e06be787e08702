//! bilasso-core
//!
//! This library provides cyclic coordinate descent solvers for the Lasso and
//! for the biclustering Lasso, together with the data handling around them.
//! Solves are synchronous and single-threaded; the `rayon` feature only
//! parallelizes independent fits.
//!
//! # Functionality
//!
//! - Lasso coordinate descent with a duality-gap stopping rule
//! - Biclustering Lasso coordinate descent on the Jordan-Wielandt matrix
//! - Regularization paths over caller-supplied alphas
//! - Synthetic problem generation and a binary data-matrix file format
//! - Timing and logging
//!
//! # Features
//!
//! - `linfa` - Reference optimum from `linfa-elasticnet` for validation
//! - `rayon` - Parallel regularization paths and problem generation
//!
//! # Example
//!
//! ```rust
//! # use nalgebra as na;
//! use bilasso_core::lasso::lasso_coordinate_descent;
//!
//! let x = na::DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
//! let y = na::DVector::from_vec(vec![1.0, 2.0, 3.0]);
//!
//! let result = lasso_coordinate_descent(na::DVector::zeros(2), 0.1, &x, &y, 1000, 1e-6)?;
//! assert!(result.converged);
//! # Ok::<(), bilasso_core::utils::LassoError>(())
//! ```

/// Coordinate descent for the biclustering Lasso
pub mod biclustering;

/// Coordinate descent for the Lasso
pub mod lasso;

/// Problem formulation and the shared solver driver
pub mod problem;

/// Binary problem files on the local file system
pub mod storage;

/// Synthetic problem generation
pub mod synthetic;

/// Timing and logging utilities
pub mod timing;

/// Errors and numeric helpers for Lasso problems
pub mod utils;

pub use biclustering::{
    BiclusteringLassoProblem, BiclusteringLassoSolver, DiagonalPolicy,
    biclustering_lasso_coordinate_descent,
};
pub use lasso::{LassoProblem, LassoSolver, lasso_coordinate_descent, lasso_path};
pub use problem::{Advisory, CoordinateDescentSolver, SolveResult, SolverConfig};
pub use utils::LassoError;
