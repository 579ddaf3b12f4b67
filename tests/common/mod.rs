#![allow(dead_code)]
use std::sync::{Arc, Mutex};

use serverless_sim::config::{ExperimentConfig, MachineGroupConfig};
use serverless_sim::error::SimulationError;
use serverless_sim::forecast::ForecastProvider;
use serverless_sim::trace::{FunctionTrace, Trace, TraceFragment};

pub const INTERVAL: u64 = 1000;

pub fn fragment(tick: u64, invocations: u64, duration: u64) -> TraceFragment {
    TraceFragment {
        tick,
        invocations,
        provisioned_cpu: 1000,
        provisioned_memory: 1024,
        cpu_usage: 100.0,
        memory_usage: 128.0,
        duration,
    }
}

/// Trace with a single function; one (invocations, duration) row per cycle.
pub fn one_function_trace(rows: &[(u64, u64)]) -> Trace {
    Trace {
        functions: vec![function_trace("f0", rows)],
    }
}

pub fn function_trace(name: &str, rows: &[(u64, u64)]) -> FunctionTrace {
    FunctionTrace {
        name: name.to_string(),
        fragments: rows
            .iter()
            .enumerate()
            .map(|(i, &(invocations, duration))| fragment(i as u64 * INTERVAL, invocations, duration))
            .collect(),
    }
}

/// One machine, zero-delay cold starts, deterministic policies.
pub fn base_config(cpu: f64, memory: f64, management_policy: &str) -> ExperimentConfig {
    ExperimentConfig {
        name: "test".to_string(),
        machines: vec![MachineGroupConfig { cpu, memory, count: 1 }],
        pricing_model: "LAMBDA".to_string(),
        failure_model: "CUSTOM(0.0, 0.0, 0.0, 0.0)".to_string(),
        request_queue_size: 100,
        allocation_policy: "sequential".to_string(),
        routing_policy: "sequential".to_string(),
        management_policy: management_policy.to_string(),
        instance_idle_timeout: None,
        histogram_limit: None,
        histogram_class_width: None,
        histogram_oob_threshold: 0.5,
        prediction_error_margin: 0.1,
        forecast_error_margin: 0.15,
        idle_memory_penalty: 0.0,
        verbose: false,
    }
}

/// Forecast fake that always predicts a fixed value and records the series it
/// was fitted to. Callers clone the shared handles they want to inspect
/// before boxing the fake.
pub struct FixedForecast {
    pub value: f64,
    pub fit_calls: Arc<Mutex<usize>>,
    pub last_series: Arc<Mutex<Vec<f64>>>,
}

impl FixedForecast {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            fit_calls: Arc::new(Mutex::new(0)),
            last_series: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl ForecastProvider for FixedForecast {
    fn fit(&mut self, series: &[f64]) {
        *self.fit_calls.lock().unwrap() += 1;
        *self.last_series.lock().unwrap() = series.to_vec();
    }

    fn predict_next(&mut self) -> Result<f64, SimulationError> {
        Ok(self.value)
    }
}
