use crate::utils::LassoError;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs::OpenOptions,
    io::{BufWriter, Write},
    path::Path,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

/// A record of timing information for one solver step.
///
/// Steps are the phases of a coordinate descent solve, e.g. `precompute`,
/// `sweep` or `check_stopping_criteria`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingRecord {
    /// Name of the solver step
    pub step_name: String,
    /// The sweep number when this step was executed, 0 for setup steps
    pub iteration: usize,
    /// Duration of the step in milliseconds
    pub duration_ms: f64,
    /// Unix timestamp when the step was recorded
    pub timestamp: u64,
}

/// Performance tracking for coordinate descent solves.
///
/// `TimingTracker` collects per-step timings, summarizes them and exports
/// them as CSV. [`CoordinateDescentSolver`](crate::problem::CoordinateDescentSolver)
/// owns one and records every phase automatically.
#[derive(Debug, Clone, Default)]
pub struct TimingTracker {
    step_timings: Vec<TimingRecord>,
    current_iteration: usize,
}

impl TimingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_iteration(&mut self) {
        self.current_iteration += 1;
    }

    pub fn current_iteration(&self) -> usize {
        self.current_iteration
    }

    pub fn record_step(&mut self, step_name: &str, duration: Duration) {
        let record = TimingRecord {
            step_name: step_name.to_string(),
            iteration: self.current_iteration,
            duration_ms: duration.as_secs_f64() * 1000.0,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };
        self.step_timings.push(record);
    }

    pub fn step_timings(&self) -> &[TimingRecord] {
        &self.step_timings
    }

    pub fn write_step_timings_to_csv(&self, filename: impl AsRef<Path>) -> Result<(), LassoError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(filename)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "step_name,iteration,duration_ms,timestamp")?;

        for record in &self.step_timings {
            writeln!(
                writer,
                "{},{},{:.3},{}",
                record.step_name, record.iteration, record.duration_ms, record.timestamp
            )?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Per-step `(average_ms, max_ms, count)`.
    pub fn get_step_statistics(&self) -> HashMap<String, (f64, f64, usize)> {
        let mut stats = HashMap::new();

        for record in &self.step_timings {
            let entry = stats
                .entry(record.step_name.clone())
                .or_insert((0.0f64, 0.0f64, 0));
            entry.0 += record.duration_ms;
            entry.1 = entry.1.max(record.duration_ms);
            entry.2 += 1;
        }

        // Convert to (average, max, count)
        for (_, stats) in stats.iter_mut() {
            stats.0 /= stats.2 as f64;
        }

        stats
    }
}

/// Runs `f`, recording its wall-clock duration under `name`.
pub fn time_fn<F, R>(tracker: &mut TimingTracker, name: &str, f: F) -> R
where
    F: FnOnce() -> R,
{
    let start = Instant::now();
    let result = f();
    tracker.record_step(name, start.elapsed());
    result
}
