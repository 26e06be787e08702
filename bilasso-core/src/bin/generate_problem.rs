/*
This program generates a synthetic Lasso problem and stores A, b and x_true in the local filesystem.
*/

use std::{path::PathBuf, process::ExitCode, time::Instant};

use bilasso_core::{
    storage::{LocalConfig, save_problem},
    synthetic::generate_lasso_problem,
    utils::{LassoError, alpha_max},
};
use clap::Parser;

/// Program to generate data matrices A and b for a Lasso problem.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The number of rows in A
    #[arg(short, long)]
    m: usize,

    /// The number of columns in A
    #[arg(short, long)]
    n: usize,

    /// The number of non-zero elements in x_true
    #[arg(short, long)]
    k: usize,

    /// Seed for the random number generators
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Directory the problem files are written to
    #[arg(short, long, default_value = "data")]
    dir: PathBuf,

    /// The prefix for the output files
    #[arg(short, long, default_value_t = ("lasso-").to_string())]
    prefix: String,
}

fn run(args: Args) -> Result<(), LassoError> {
    let start_time = Instant::now();

    println!(
        "[Main] Generating a {}x{} problem with {} non-zeros (seed {})...",
        args.m, args.n, args.k, args.seed
    );
    let problem = generate_lasso_problem(args.m, args.n, args.k, args.seed)?;
    println!("[Main] Problem generated in {:?}", start_time.elapsed());

    println!("[Main] Alpha_max: {}", alpha_max(&problem.x, &problem.y));

    let write_start = Instant::now();
    let config = LocalConfig::new(&args.dir, &args.prefix);
    save_problem(&config, &problem.x, &problem.y, Some(&problem.x_true))?;
    println!(
        "[Main] Wrote {} in {:?}",
        config.file_path("A").display(),
        write_start.elapsed()
    );

    println!(
        "[Main] Data generation complete in {:?}",
        start_time.elapsed()
    );
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
