//! Trace model and CSV loading.
//!
//! A trace is a directory with one CSV file per function. Every file holds an
//! ordered, fixed-interval time series of fragments; the cycle interval of the
//! simulation is derived from the spacing between consecutive ticks.
use std::fs::read_dir;
use std::path::Path;

use csv::ReaderBuilder;
use serde::Deserialize;

use crate::error::SimulationError;

/// One sampled slot of a function's invocation history.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct TraceFragment {
    pub tick: u64,
    pub invocations: u64,
    pub provisioned_cpu: u32,
    pub provisioned_memory: u32,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub duration: u64,
}

/// Full invocation history of a single function.
#[derive(Debug, Clone)]
pub struct FunctionTrace {
    pub name: String,
    pub fragments: Vec<TraceFragment>,
}

/// A complete workload trace, one entry per function. Function ids are the
/// indices into `functions`, assigned in sorted file-name order so that runs
/// are reproducible regardless of directory iteration order.
#[derive(Debug, Default, Clone)]
pub struct Trace {
    pub functions: Vec<FunctionTrace>,
}

impl Trace {
    pub fn from_dir(path: &Path) -> Result<Self, SimulationError> {
        let mut files = Vec::new();
        for entry in read_dir(path)? {
            let file = entry?.path();
            if file.as_path().is_file() {
                files.push(file);
            }
        }
        files.sort();
        if files.is_empty() {
            return Err(SimulationError::Trace(format!(
                "no trace files found in {}",
                path.display()
            )));
        }
        let mut functions = Vec::with_capacity(files.len());
        for file in files {
            let name = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_path(file.as_path())?;
            let mut fragments = Vec::new();
            for record in reader.deserialize() {
                let fragment: TraceFragment = record?;
                fragments.push(fragment);
            }
            functions.push(FunctionTrace { name, fragments });
        }
        Ok(Self { functions })
    }

    /// Sampling interval of the trace, i.e. the duration of one simulation
    /// cycle, derived from the tick spacing of the first function with at
    /// least two fragments.
    pub fn cycle_interval(&self) -> Result<u64, SimulationError> {
        for func in &self.functions {
            if func.fragments.len() >= 2 {
                let interval = func.fragments[1].tick - func.fragments[0].tick;
                if interval == 0 {
                    return Err(SimulationError::Trace(format!(
                        "function {} has duplicate ticks",
                        func.name
                    )));
                }
                return Ok(interval);
            }
        }
        Err(SimulationError::Trace(
            "trace too short to derive a cycle interval".to_string(),
        ))
    }

    /// Number of trace entries (cycles) in the longest function history.
    pub fn n_cycles(&self) -> usize {
        self.functions.iter().map(|f| f.fragments.len()).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "tick,invocations,provisioned_cpu,provisioned_memory,cpu_usage,memory_usage,duration";

    #[test]
    fn trace_is_loaded_in_sorted_file_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("b.csv"),
            format!("{}\n0,1,1000,1024,100.0,128.0,500\n60000,0,1000,1024,0.0,0.0,0\n", HEADER),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a.csv"),
            format!("{}\n0,2,2000,2048,200.0,256.0,700\n60000,1,2000,2048,200.0,256.0,700\n", HEADER),
        )
        .unwrap();
        let trace = Trace::from_dir(dir.path()).unwrap();
        assert_eq!(trace.functions.len(), 2);
        assert_eq!(trace.functions[0].name, "a");
        assert_eq!(trace.functions[1].name, "b");
        assert_eq!(trace.functions[0].fragments[0].invocations, 2);
        assert_eq!(trace.cycle_interval().unwrap(), 60000);
        assert_eq!(trace.n_cycles(), 2);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Trace::from_dir(dir.path()).is_err());
    }
}
