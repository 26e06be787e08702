extern crate nalgebra as na;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::{
    biclustering::DiagonalPolicy,
    timing::{TimingTracker, time_fn},
    utils::LassoError,
};

/// Scalar settings shared by both solvers.
///
/// Missing fields take their defaults when deserializing, so a JSON file
/// containing only `{"alpha": 0.5}` is a valid configuration.
///
/// # Example
///
/// ```rust
/// # use bilasso_core::problem::SolverConfig;
///
/// let config: SolverConfig = serde_json::from_str(r#"{"alpha": 0.5}"#).unwrap();
/// assert_eq!(config.alpha, 0.5);
/// assert_eq!(config.max_iter, 1000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// L1 regularization strength
    pub alpha: f64,
    /// Upper bound on the number of full sweeps
    pub max_iter: usize,
    /// Convergence tolerance, interpreted by each solver
    pub tol: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            alpha: 1.0,
            max_iter: 1000,
            tol: 1e-4,
        }
    }
}

impl SolverConfig {
    pub fn new(alpha: f64, max_iter: usize, tol: f64) -> Self {
        SolverConfig {
            alpha,
            max_iter,
            tol,
        }
    }

    /// Loads a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, LassoError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Checks the parameters every solver requires: a positive `max_iter`
    /// a positive, finite `tol` and a finite `alpha`. The Lasso additionally
    /// rejects negative `alpha` when the problem is built.
    pub fn validate(&self) -> Result<(), LassoError> {
        if self.max_iter == 0 {
            return Err(LassoError::InvalidParameter {
                name: "max_iter",
                reason: "must be positive".to_string(),
            });
        }
        if !(self.tol.is_finite() && self.tol > 0.0) {
            return Err(LassoError::InvalidParameter {
                name: "tol",
                reason: format!("must be positive and finite, got {}", self.tol),
            });
        }
        if !self.alpha.is_finite() {
            return Err(LassoError::InvalidParameter {
                name: "alpha",
                reason: format!("must be finite, got {}", self.alpha),
            });
        }
        Ok(())
    }
}

/// Non-fatal diagnostics raised during a solve.
///
/// Advisories never abort a solve; they travel on [`SolveResult::advisories`]
/// and are also logged with `log::warn!` when raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Advisory {
    /// `alpha == 0` was requested for the Lasso
    DegenerateRegularization,
    /// `max_iter` sweeps ran without the stopping criterion being met
    NonConvergence {
        gap: f64,
        tol: f64,
        n_iter: usize,
        /// `alpha` was numerically zero
        unregularized: bool,
    },
    /// A closed-form update needed a division by a zero diagonal entry
    NumericalInstability {
        /// First coordinate where it happened
        coordinate: usize,
        policy: DiagonalPolicy,
    },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::DegenerateRegularization => write!(
                f,
                "Coordinate descent with no regularization may lead to unexpected results \
                 and is discouraged."
            ),
            Advisory::NonConvergence {
                gap,
                tol,
                n_iter,
                unregularized,
            } => {
                write!(
                    f,
                    "Objective did not converge after {} iterations. You might want to increase \
                     the number of iterations, check the scale of the features or consider \
                     increasing regularisation. Duality gap: {:.3e}, tolerance: {:.3e}",
                    n_iter, gap, tol
                )?;
                if *unregularized {
                    write!(
                        f,
                        " Linear regression models with null weight for the l1 regularization \
                         term are more efficiently fitted using an ordinary least-squares or \
                         ridge solver instead."
                    )?;
                }
                Ok(())
            }
            Advisory::NumericalInstability {
                coordinate,
                policy: DiagonalPolicy::Propagate,
            } => write!(
                f,
                "Coordinate {} was divided by a zero diagonal entry; non-finite weights are \
                 propagating.",
                coordinate
            ),
            Advisory::NumericalInstability {
                coordinate,
                policy: DiagonalPolicy::Skip,
            } => write!(
                f,
                "Coordinate {} needs a division by a zero diagonal entry and was left unchanged.",
                coordinate
            ),
        }
    }
}

/// Bookkeeping produced by one full sweep over the coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SweepStats {
    /// Largest absolute change of any coordinate during the sweep
    pub d_w_max: f64,
    /// Largest absolute weight seen during the sweep
    pub w_max: f64,
}

impl SweepStats {
    /// Folds one coordinate update into the running maxima.
    #[inline]
    pub fn record(&mut self, old: f64, new: f64) {
        self.d_w_max = self.d_w_max.max((new - old).abs());
        self.w_max = self.w_max.max(new.abs());
    }
}

/// Outcome of a solve: the fitted weights plus convergence information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveResult {
    pub weights: na::DVector<f64>,
    /// Duality gap estimate at the last check
    pub gap: f64,
    /// Tolerance the gap or update was compared against
    pub tol: f64,
    /// Number of sweeps performed, 1-indexed
    pub n_iter: usize,
    pub converged: bool,
    pub advisories: Vec<Advisory>,
}

impl SolveResult {
    /// The `(w, gap, tol, n_iter)` tuple.
    pub fn into_tuple(self) -> (na::DVector<f64>, f64, f64, usize) {
        (self.weights, self.gap, self.tol, self.n_iter)
    }

    pub fn has_advisory(&self, predicate: impl Fn(&Advisory) -> bool) -> bool {
        self.advisories.iter().any(predicate)
    }
}

/// Interface of a cyclic coordinate descent problem.
///
/// Each method corresponds to one phase of the solve loop driven by
/// [`CoordinateDescentSolver`]:
/// 1. `precompute` - one-time setup (column norms, residuals, augmented matrices)
/// 2. `sweep` - update every coordinate once, in a fixed cyclic order
/// 3. `check_stopping_criteria` - decide whether the solve is finished
pub trait CoordinateDescentProblem {
    /// Short name used as the log tag.
    fn name(&self) -> &'static str;

    /// Performs one-time setup before the first sweep.
    ///
    /// Implementations must be idempotent: calling `precompute` again must
    /// not change the problem state.
    fn precompute(&mut self) -> Result<(), LassoError>;

    /// Updates every coordinate once and reports the sweep maxima.
    ///
    /// Runs `precompute` first if it has not happened yet.
    fn sweep(&mut self) -> Result<SweepStats, LassoError>;

    /// Checks whether the solve should stop after a sweep.
    ///
    /// `last_iteration` is true on the final sweep allowed by `max_iter`,
    /// so implementations can refresh their gap estimate unconditionally.
    fn check_stopping_criteria(&mut self, stats: &SweepStats, last_iteration: bool) -> bool;

    /// Most recent duality gap estimate.
    fn gap(&self) -> f64;

    /// Tolerance reported alongside the gap.
    fn tol(&self) -> f64;

    fn alpha(&self) -> f64;

    fn weights(&self) -> &na::DVector<f64>;

    /// Drains the advisories the problem raised so far.
    fn take_advisories(&mut self) -> Vec<Advisory>;
}

/// Solver that drives a [`CoordinateDescentProblem`] to convergence.
///
/// `CoordinateDescentSolver` runs at most `max_iter` sweeps, records timings
/// for every phase and turns an exhausted iteration budget into an
/// [`Advisory::NonConvergence`]. The problem stays accessible after solving,
/// e.g. to inspect residuals or run further sweeps.
///
/// # Example
///
/// ```rust
/// # use nalgebra as na;
/// # use bilasso_core::lasso::LassoProblem;
/// # use bilasso_core::problem::CoordinateDescentSolver;
/// # fn example() -> Result<(), bilasso_core::utils::LassoError> {
/// let x = na::DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
/// let y = na::DVector::from_vec(vec![2.0, 0.5]);
/// let w = na::DVector::zeros(2);
///
/// let problem = LassoProblem::new(w, 1.0, &x, &y, 1e-6)?;
/// let mut solver = CoordinateDescentSolver::new(problem, 100);
/// let result = solver.solve()?;
///
/// assert!(result.converged);
/// assert_eq!(result.weights[1], 0.0);
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub struct CoordinateDescentSolver<P>
where
    P: CoordinateDescentProblem,
{
    problem: P,
    max_iter: usize,
    timing_tracker: TimingTracker,
}

impl<P> CoordinateDescentSolver<P>
where
    P: CoordinateDescentProblem,
{
    pub fn new(problem: P, max_iter: usize) -> Self {
        CoordinateDescentSolver {
            problem,
            max_iter,
            timing_tracker: TimingTracker::new(),
        }
    }

    /// Sweeps until the stopping criterion holds or `max_iter` is exhausted.
    ///
    /// # Returns
    ///
    /// * `Ok(SolveResult)` with the best-effort weights, converged or not
    /// * `Err(LassoError)` if `max_iter` is zero or precomputation fails
    pub fn solve(&mut self) -> Result<SolveResult, LassoError> {
        if self.max_iter == 0 {
            return Err(LassoError::InvalidParameter {
                name: "max_iter",
                reason: "must be positive".to_string(),
            });
        }

        let problem = &mut self.problem;
        let tracker = &mut self.timing_tracker;

        time_fn(tracker, "precompute", || problem.precompute())?;

        let mut n_iter = 0;
        let mut converged = false;
        for iteration in 0..self.max_iter {
            tracker.start_iteration();
            n_iter = iteration + 1;

            let stats = time_fn(tracker, "sweep", || problem.sweep())?;
            let last_iteration = n_iter == self.max_iter;
            let should_stop = time_fn(tracker, "check_stopping_criteria", || {
                problem.check_stopping_criteria(&stats, last_iteration)
            });

            log::debug!(
                "[{}] sweep {}: d_w_max={:.3e}, w_max={:.3e}",
                problem.name(),
                n_iter,
                stats.d_w_max,
                stats.w_max
            );

            if should_stop {
                converged = true;
                break;
            }
        }

        let mut advisories = problem.take_advisories();
        if !converged {
            let advisory = Advisory::NonConvergence {
                gap: problem.gap(),
                tol: problem.tol(),
                n_iter,
                unregularized: problem.alpha() < f64::EPSILON,
            };
            log::warn!("[{}] {}", problem.name(), advisory);
            advisories.push(advisory);
        }

        log::info!(
            "[{}] finished after {} sweeps (converged: {}, gap: {:.3e}, tol: {:.3e})",
            problem.name(),
            n_iter,
            converged,
            problem.gap(),
            problem.tol()
        );

        Ok(SolveResult {
            weights: problem.weights().clone(),
            gap: problem.gap(),
            tol: problem.tol(),
            n_iter,
            converged,
            advisories,
        })
    }

    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    pub fn problem(&self) -> &P {
        &self.problem
    }

    pub fn problem_mut(&mut self) -> &mut P {
        &mut self.problem
    }

    pub fn into_problem(self) -> P {
        self.problem
    }

    pub fn timing_tracker(&self) -> &TimingTracker {
        &self.timing_tracker
    }

    /// Exports step timing data to a CSV file.
    pub fn export_step_timings(&self, filename: impl AsRef<Path>) -> Result<(), LassoError> {
        self.timing_tracker.write_step_timings_to_csv(filename)
    }

    /// Prints average, maximum and count for every solver step.
    pub fn print_timing_summary(&self) {
        println!("\n=== {} Step Timing Summary ===", self.problem.name());
        let mut step_stats = self
            .timing_tracker
            .get_step_statistics()
            .into_iter()
            .collect::<Vec<_>>();
        step_stats.sort_by(|a, b| a.0.cmp(&b.0));
        for (step, (avg, max, count)) in step_stats {
            println!(
                "{}: avg={:.3}ms, max={:.3}ms, count={}",
                step, avg, max, count
            );
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Halves a single weight every sweep and stops once it drops below `stop_below`.
    struct Halving {
        w: na::DVector<f64>,
        stop_below: f64,
        alpha: f64,
        precompute_calls: usize,
        last_iteration_seen: Vec<bool>,
    }

    impl Halving {
        fn new(stop_below: f64, alpha: f64) -> Self {
            Halving {
                w: na::DVector::from_element(1, 1.0),
                stop_below,
                alpha,
                precompute_calls: 0,
                last_iteration_seen: Vec::new(),
            }
        }
    }

    impl CoordinateDescentProblem for Halving {
        fn name(&self) -> &'static str {
            "Halving"
        }

        fn precompute(&mut self) -> Result<(), LassoError> {
            self.precompute_calls += 1;
            Ok(())
        }

        fn sweep(&mut self) -> Result<SweepStats, LassoError> {
            let mut stats = SweepStats::default();
            let old = self.w[0];
            self.w[0] = old / 2.0;
            stats.record(old, self.w[0]);
            Ok(stats)
        }

        fn check_stopping_criteria(&mut self, stats: &SweepStats, last_iteration: bool) -> bool {
            self.last_iteration_seen.push(last_iteration);
            stats.w_max < self.stop_below
        }

        fn gap(&self) -> f64 {
            self.w[0]
        }

        fn tol(&self) -> f64 {
            self.stop_below
        }

        fn alpha(&self) -> f64 {
            self.alpha
        }

        fn weights(&self) -> &na::DVector<f64> {
            &self.w
        }

        fn take_advisories(&mut self) -> Vec<Advisory> {
            Vec::new()
        }
    }

    #[test]
    fn stops_with_one_indexed_iteration_count() {
        // 1 -> 0.5 -> 0.25 -> 0.125: third sweep goes below 0.2
        let mut solver = CoordinateDescentSolver::new(Halving::new(0.2, 1.0), 10);
        let result = solver.solve().unwrap();

        assert!(result.converged);
        assert_eq!(result.n_iter, 3);
        assert!(result.advisories.is_empty());
        assert_eq!(result.weights[0], 0.125);
        assert_eq!(solver.problem().precompute_calls, 1);
        assert_eq!(solver.problem().last_iteration_seen, vec![false, false, false]);
    }

    #[test]
    fn exhausting_max_iter_raises_non_convergence() {
        let mut solver = CoordinateDescentSolver::new(Halving::new(1e-9, 0.0), 4);
        let result = solver.solve().unwrap();

        assert!(!result.converged);
        assert_eq!(result.n_iter, 4);
        assert_eq!(
            solver.problem().last_iteration_seen,
            vec![false, false, false, true]
        );
        match &result.advisories[..] {
            [Advisory::NonConvergence {
                n_iter,
                unregularized,
                gap,
                ..
            }] => {
                assert_eq!(*n_iter, 4);
                assert!(*unregularized);
                assert_eq!(*gap, 0.0625);
            }
            other => panic!("unexpected advisories: {:?}", other),
        }
    }

    #[test]
    fn zero_max_iter_is_rejected() {
        let mut solver = CoordinateDescentSolver::new(Halving::new(0.2, 1.0), 0);
        assert!(matches!(
            solver.solve(),
            Err(LassoError::InvalidParameter {
                name: "max_iter",
                ..
            })
        ));
    }

    #[test]
    fn timings_cover_every_phase() {
        let mut solver = CoordinateDescentSolver::new(Halving::new(0.2, 1.0), 10);
        solver.solve().unwrap();

        assert_eq!(solver.max_iter(), 10);
        assert_eq!(solver.timing_tracker().current_iteration(), 3);
        let stats = solver.timing_tracker().get_step_statistics();
        assert_eq!(stats["precompute"].2, 1);
        assert_eq!(stats["sweep"].2, 3);
        assert_eq!(stats["check_stopping_criteria"].2, 3);
    }

    #[test]
    fn non_convergence_message_mentions_gap_and_hint() {
        let advisory = Advisory::NonConvergence {
            gap: 0.5,
            tol: 1e-4,
            n_iter: 7,
            unregularized: true,
        };
        let message = advisory.to_string();
        assert!(message.starts_with("Objective did not converge after 7 iterations."));
        assert!(message.contains("Duality gap: 5.000e-1, tolerance: 1.000e-4"));
        assert!(message.contains("null weight for the l1 regularization term"));

        let regularized = Advisory::NonConvergence {
            gap: 0.5,
            tol: 1e-4,
            n_iter: 7,
            unregularized: false,
        };
        assert!(!regularized.to_string().contains("null weight"));
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: SolverConfig = serde_json::from_str(r#"{"tol": 1e-6}"#).unwrap();
        assert_eq!(config, SolverConfig::new(1.0, 1000, 1e-6));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_validation_rejects_bad_scalars() {
        assert!(SolverConfig::new(1.0, 0, 1e-4).validate().is_err());
        assert!(SolverConfig::new(1.0, 10, 0.0).validate().is_err());
        assert!(SolverConfig::new(1.0, 10, f64::NAN).validate().is_err());
        assert!(SolverConfig::new(f64::INFINITY, 10, 1e-4).validate().is_err());
    }

    #[test]
    fn config_loads_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"alpha": 5.0, "max_iter": 20}"#).unwrap();

        let config = SolverConfig::from_json_file(&path).unwrap();
        assert_eq!(config, SolverConfig::new(5.0, 20, 1e-4));
    }
}
