//! Parallel execution of independent scenarios.
use std::path::PathBuf;
use std::sync::mpsc::channel;
use std::sync::Arc;

use threadpool::ThreadPool;

use crate::config::ExperimentConfig;
use crate::error::SimulationError;
use crate::simulation::{Report, SimulationCore};
use crate::sink::{CsvSink, NullSink, RecordSink};
use crate::trace::Trace;

/// Runs every scenario against the shared trace on a worker pool and returns
/// the reports in config order. Scenarios share nothing mutable; each gets
/// its own components and the common base seed. The first scenario error
/// aborts the whole batch.
pub fn run_experiments(
    trace: Arc<Trace>,
    configs: Vec<ExperimentConfig>,
    seed: u64,
    output_dir: Option<PathBuf>,
    threads: usize,
) -> Result<Vec<Report>, SimulationError> {
    let pool = ThreadPool::new(threads.max(1));
    let (sender, receiver) = channel();
    let n_scenarios = configs.len();
    for (idx, config) in configs.into_iter().enumerate() {
        let sender = sender.clone();
        let trace = trace.clone();
        let output_dir = output_dir.clone();
        pool.execute(move || {
            let result = run_scenario(trace, &config, seed, output_dir);
            let _ = sender.send((idx, result));
        });
    }
    drop(sender);
    let mut reports: Vec<Option<Report>> = (0..n_scenarios).map(|_| None).collect();
    for (idx, result) in receiver {
        reports[idx] = Some(result?);
    }
    pool.join();
    reports
        .into_iter()
        .map(|r| {
            r.ok_or_else(|| SimulationError::InvalidConfiguration("scenario produced no report".to_string()))
        })
        .collect()
}

fn run_scenario(
    trace: Arc<Trace>,
    config: &ExperimentConfig,
    seed: u64,
    output_dir: Option<PathBuf>,
) -> Result<Report, SimulationError> {
    let sink: Box<dyn RecordSink> = match output_dir {
        Some(dir) => Box::new(CsvSink::open(&dir.join(format!("{}.csv", config.name)))?),
        None => Box::new(NullSink),
    };
    SimulationCore::new(trace, config, seed, sink)?.run()
}
