//! Seeded synthetic Lasso problems.
//!
//! `X` has i.i.d. standard normal entries with every column scaled to unit
//! norm, `x_true` has `k` standard normal entries at random positions and
//! `y = X x_true + v` with Gaussian noise `v ~ N(0, 0.03162^2)`.

extern crate nalgebra as na;

use rand::prelude::*;
use rand_distr::{Normal, StandardNormal};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::utils::LassoError;

/// Standard deviation of the additive noise.
pub const NOISE_STD: f64 = 0.03162;

/// A generated problem together with the sparse vector that produced it.
#[derive(Debug, Clone)]
pub struct SyntheticProblem {
    pub x: na::DMatrix<f64>,
    pub y: na::DVector<f64>,
    pub x_true: na::DVector<f64>,
}

/// Generates an `m × n` problem whose ground truth has `k` non-zeros.
///
/// Column `j` of `X` is drawn from its own generator seeded with `seed + 1 + j`,
/// so the matrix is identical with and without the `rayon` feature.
///
/// # Example
///
/// ```rust
/// # use bilasso_core::synthetic::generate_lasso_problem;
/// let problem = generate_lasso_problem(20, 10, 3, 42)?;
///
/// assert_eq!(problem.x.shape(), (20, 10));
/// assert_eq!(problem.x_true.iter().filter(|v| **v != 0.0).count(), 3);
/// # Ok::<(), bilasso_core::utils::LassoError>(())
/// ```
pub fn generate_lasso_problem(
    m: usize,
    n: usize,
    k: usize,
    seed: u64,
) -> Result<SyntheticProblem, LassoError> {
    if k > n {
        return Err(LassoError::InvalidParameter {
            name: "k",
            reason: format!("cannot place {} non-zeros in {} features", k, n),
        });
    }

    let mut x = na::DMatrix::<f64>::zeros(m, n);

    #[cfg(feature = "rayon")]
    {
        let columns: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|j| normalized_gaussian_column(m, column_seed(seed, j)))
            .collect();
        for (j, column_data) in columns.into_iter().enumerate() {
            x.column_mut(j).copy_from_slice(&column_data);
        }
    }

    #[cfg(not(feature = "rayon"))]
    {
        for j in 0..n {
            let column_data = normalized_gaussian_column(m, column_seed(seed, j));
            x.column_mut(j).copy_from_slice(&column_data);
        }
    }

    let mut rng = SmallRng::seed_from_u64(seed);

    let mut x_true = na::DVector::<f64>::zeros(n);
    let indices = rand::seq::index::sample(&mut rng, n, k).into_vec();
    for idx in indices {
        x_true[idx] = rng.sample(StandardNormal);
    }

    let noise_dist = Normal::new(0.0, NOISE_STD).map_err(|e| LassoError::InvalidParameter {
        name: "noise_std",
        reason: e.to_string(),
    })?;
    let noise = na::DVector::from_fn(m, |_, _| rng.sample(noise_dist));

    let y = &x * &x_true + noise;

    Ok(SyntheticProblem { x, y, x_true })
}

fn column_seed(seed: u64, j: usize) -> u64 {
    seed.wrapping_add(1).wrapping_add(j as u64)
}

fn normalized_gaussian_column(m: usize, seed: u64) -> Vec<f64> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut values: Vec<f64> = (0..m).map(|_| rng.sample(StandardNormal)).collect();

    let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        values.iter_mut().for_each(|v| *v /= norm);
    }
    values
}
