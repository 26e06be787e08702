extern crate nalgebra as na;

use bilasso_core::{
    biclustering::{
        BiclusteringLassoProblem, BiclusteringLassoSolver, DiagonalPolicy,
        biclustering_lasso_coordinate_descent,
    },
    problem::Advisory,
};

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
fn ones_start_propagates_and_collapses_to_zero() {
    let x = example_x();
    let result = biclustering_lasso_coordinate_descent(
        na::DVector::from_element(8, 1.0),
        5.0,
        &x,
        1000,
        1e-4,
    )
    .unwrap();

    // Sample 2 has 0.5 * sum(X[2, :]) = 5.05 > alpha and divides by the zero
    // diagonal; the resulting infinities turn later products into NaN, which
    // zero every coordinate by the third sweep.
    assert!(result.converged);
    assert_eq!(result.n_iter, 3);
    assert!(result.weights.iter().all(|&v| v == 0.0));
    assert_eq!(result.gap, 0.0);
    assert_eq!(result.tol, 1e-4);
    assert_eq!(
        result.advisories,
        vec![Advisory::NumericalInstability {
            coordinate: 2,
            policy: DiagonalPolicy::Propagate
        }]
    );
}

#[test]
fn skip_policy_keeps_weights_finite() {
    let x = example_x();
    let problem = BiclusteringLassoProblem::new(na::DVector::from_element(8, 1.0), 5.0, &x, 1e-4)
        .unwrap()
        .with_policy(DiagonalPolicy::Skip);
    let mut solver = BiclusteringLassoSolver::new(problem, 1000);
    let result = solver.solve().unwrap();

    // Sample 2 is held during the first sweep and zeroed in the second, once
    // every feature coordinate has dropped below the threshold.
    assert!(result.converged);
    assert_eq!(result.n_iter, 3);
    assert!(result.weights.iter().all(|&v| v == 0.0));
    assert_eq!(
        result.advisories,
        vec![Advisory::NumericalInstability {
            coordinate: 2,
            policy: DiagonalPolicy::Skip
        }]
    );
}

#[test]
fn exhausted_budget_reports_non_convergence() {
    let x = example_x();
    let result = biclustering_lasso_coordinate_descent(
        na::DVector::from_element(8, 1.0),
        5.0,
        &x,
        2,
        1e-4,
    )
    .unwrap();

    assert!(!result.converged);
    assert_eq!(result.n_iter, 2);
    assert!(result.has_advisory(|a| matches!(
        a,
        Advisory::NonConvergence {
            n_iter: 2,
            unregularized: false,
            ..
        }
    )));
}

#[test]
fn augmented_matrix_is_available_after_solve() {
    let x = example_x();
    let problem =
        BiclusteringLassoProblem::new(na::DVector::zeros(8), 1.0, &x, 1e-4).unwrap();
    let mut solver = BiclusteringLassoSolver::new(problem, 10);
    solver.solve().unwrap();

    let problem = solver.into_problem();
    assert_eq!(problem.n_samples(), 3);
    assert_eq!(problem.n_features(), 5);
    assert_eq!(problem.augmented()[(0, 3)], 0.5 * 2.1);
    assert_eq!(problem.augmented()[(3, 0)], 0.5 * 2.1);
}
