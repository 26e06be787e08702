/*
This program loads a problem written by generate_problem and solves it with
either coordinate descent solver.
*/

extern crate nalgebra as na;

use std::{fs::File, io::BufWriter, path::PathBuf, process::ExitCode, time::Instant};

use bilasso_core::{
    biclustering::{BiclusteringLassoProblem, DiagonalPolicy},
    lasso::LassoProblem,
    problem::{CoordinateDescentProblem, CoordinateDescentSolver, SolveResult, SolverConfig},
    storage::{LocalConfig, load_problem},
    utils::{LassoError, alpha_max, l1_norm, lasso_objective},
};
use clap::{Parser, ValueEnum};
use serde::Serialize;

#[derive(Clone, Copy, Debug, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
enum SolverKind {
    Lasso,
    Biclustering,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    Propagate,
    Skip,
}

impl From<PolicyArg> for DiagonalPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Propagate => DiagonalPolicy::Propagate,
            PolicyArg::Skip => DiagonalPolicy::Skip,
        }
    }
}

/// Program to run coordinate descent on a stored Lasso problem.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding the problem files
    #[arg(short, long, default_value = "data")]
    dir: PathBuf,

    /// The prefix of the problem files
    #[arg(short, long, default_value_t = ("lasso-").to_string())]
    prefix: String,

    /// Which solver to run
    #[arg(short, long, value_enum, default_value_t = SolverKind::Lasso)]
    solver: SolverKind,

    /// JSON file with alpha, max_iter and tol; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// L1 regularization strength
    #[arg(short, long)]
    alpha: Option<f64>,

    /// Maximum number of sweeps
    #[arg(long)]
    max_iter: Option<usize>,

    /// Convergence tolerance
    #[arg(long)]
    tol: Option<f64>,

    /// Value every initial weight is set to
    #[arg(long, default_value_t = 0.0)]
    init: f64,

    /// Handling of zero diagonal entries in the biclustering solver
    #[arg(long, value_enum, default_value_t = PolicyArg::Propagate)]
    policy: PolicyArg,

    /// Write per-step timings to this CSV file
    #[arg(long)]
    timings: Option<PathBuf>,

    /// Write a JSON report to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct Report<'a> {
    solver: SolverKind,
    config: SolverConfig,
    objective: Option<f64>,
    result: &'a SolveResult,
}

fn solver_config(args: &Args) -> Result<SolverConfig, LassoError> {
    let mut config = match &args.config {
        Some(path) => SolverConfig::from_json_file(path)?,
        None => SolverConfig::default(),
    };
    if let Some(alpha) = args.alpha {
        config.alpha = alpha;
    }
    if let Some(max_iter) = args.max_iter {
        config.max_iter = max_iter;
    }
    if let Some(tol) = args.tol {
        config.tol = tol;
    }
    config.validate()?;
    Ok(config)
}

fn run_solver<P: CoordinateDescentProblem>(
    problem: P,
    config: &SolverConfig,
    timings: Option<&PathBuf>,
) -> Result<SolveResult, LassoError> {
    let mut solver = CoordinateDescentSolver::new(problem, config.max_iter);
    let result = solver.solve()?;
    solver.print_timing_summary();
    if let Some(path) = timings {
        solver.export_step_timings(path)?;
        println!("[Main] Step timings written to {}", path.display());
    }
    Ok(result)
}

fn run(args: Args) -> Result<(), LassoError> {
    let config = solver_config(&args)?;

    let load_start = Instant::now();
    let storage = LocalConfig::new(&args.dir, &args.prefix);
    let (x, y) = load_problem(&storage)?;
    println!(
        "[Main] Loaded {}x{} problem in {:?}",
        x.nrows(),
        x.ncols(),
        load_start.elapsed()
    );
    println!("[Main] Alpha_max: {}", alpha_max(&x, &y));

    let solve_start = Instant::now();
    let (result, objective) = match args.solver {
        SolverKind::Lasso => {
            let w = na::DVector::from_element(x.ncols(), args.init);
            let problem = LassoProblem::new(w, config.alpha, &x, &y, config.tol)?;
            let result = run_solver(problem, &config, args.timings.as_ref())?;
            let objective = lasso_objective(&x, &y, &result.weights, config.alpha);
            (result, Some(objective))
        }
        SolverKind::Biclustering => {
            let w = na::DVector::from_element(x.nrows() + x.ncols(), args.init);
            let problem = BiclusteringLassoProblem::new(w, config.alpha, &x, config.tol)?
                .with_policy(args.policy.into());
            (run_solver(problem, &config, args.timings.as_ref())?, None)
        }
    };

    println!(
        "[Main] {} sweeps in {:?}, converged: {}",
        result.n_iter,
        solve_start.elapsed(),
        result.converged
    );
    println!(
        "[Main] Duality gap: {:.3e}, tolerance: {:.3e}",
        result.gap, result.tol
    );
    println!(
        "[Main] Non-zeros: {}, ||w||_1: {}",
        result.weights.iter().filter(|v| **v != 0.0).count(),
        l1_norm(&result.weights)
    );
    if let Some(objective) = objective {
        println!("[Main] Objective: {}", objective);
    }
    for advisory in &result.advisories {
        println!("[Main] Warning: {}", advisory);
    }

    if let Some(path) = &args.output {
        let report = Report {
            solver: args.solver,
            config,
            objective,
            result: &result,
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &report)?;
        println!("[Main] Report written to {}", path.display());
    }

    Ok(())
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[Main] Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
