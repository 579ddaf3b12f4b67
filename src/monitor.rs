//! Per-function usage accounting.
use crate::cost::CostMonitor;
use crate::error::SimulationError;
use crate::histogram::RangeLimitedHistogram;
use crate::sink::{RecordSink, UsageRecord};
use crate::util::{median, Counter, FxIndexMap};

/// The (preWarm, keepAlive) window pair of a function. A `None` keep-alive
/// means never terminate; a zero pre-warm disables pre-warming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindows {
    pub prewarm: u64,
    pub keep_alive: Option<u64>,
}

impl TimeWindows {
    pub fn new(prewarm: u64, keep_alive: Option<u64>) -> Self {
        Self { prewarm, keep_alive }
    }
}

/// Rolling statistics of one function. Created once at monitor init and
/// cleared (never destroyed) at the end of every cycle.
pub struct FunctionProfile {
    pub name: String,
    // cycle-scoped counters, reset by clear_cycle
    pub cycle_invocations: u64,
    pub cycle_cold_starts: u64,
    pub cycle_delayed: u64,
    pub cycle_timely: u64,
    pub running_instances: u64,
    pub idle_instances: u64,
    pub terminated_instances: u64,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub wasted_memory_time: f64,
    pub cycle_execution_time: u64,
    pub cycle_cost: f64,
    pub cold_start_delays: Vec<u64>,
    // provisioned sizes from the latest trace fragment
    pub provisioned_cpu: u32,
    pub provisioned_memory: u32,
    // run-scoped aggregates
    pub total_invocations: u64,
    pub total_cold_starts: u64,
    pub total_delayed: u64,
    pub total_timely: u64,
    pub total_terminated: u64,
    pub total_execution_time: u64,
    pub total_cost: f64,
    pub avg_arrival_rate: f64,
    arrival_samples: u64,
    pub avg_time_in_system: f64,
    time_in_system_samples: u64,
    pub time_since_last_invocation: u64,
    // management-policy state
    pub windows: TimeWindows,
    pub pending_prewarms: Vec<u64>,
    pub histogram: Option<RangeLimitedHistogram>,
    pub forecast_series: Vec<f64>,
}

impl FunctionProfile {
    fn new(name: String) -> Self {
        Self {
            name,
            cycle_invocations: 0,
            cycle_cold_starts: 0,
            cycle_delayed: 0,
            cycle_timely: 0,
            running_instances: 0,
            idle_instances: 0,
            terminated_instances: 0,
            cpu_usage: 0.0,
            memory_usage: 0.0,
            wasted_memory_time: 0.0,
            cycle_execution_time: 0,
            cycle_cost: 0.0,
            cold_start_delays: Vec::new(),
            provisioned_cpu: 0,
            provisioned_memory: 0,
            total_invocations: 0,
            total_cold_starts: 0,
            total_delayed: 0,
            total_timely: 0,
            total_terminated: 0,
            total_execution_time: 0,
            total_cost: 0.0,
            avg_arrival_rate: 0.0,
            arrival_samples: 0,
            avg_time_in_system: 0.0,
            time_in_system_samples: 0,
            time_since_last_invocation: 0,
            windows: TimeWindows::default(),
            pending_prewarms: Vec::new(),
            histogram: None,
            forecast_series: Vec::new(),
        }
    }

    /// Folds the invocation count of one trace fragment into the online
    /// arrival-rate average.
    pub fn record_arrival_rate(&mut self, invocations: u64) {
        self.arrival_samples += 1;
        let delta = invocations as f64 - self.avg_arrival_rate;
        self.avg_arrival_rate += delta / self.arrival_samples as f64;
    }

    /// Records the total time one served invocation spent in the system.
    pub fn record_time_in_system(&mut self, time: u64) {
        self.time_in_system_samples += 1;
        let delta = time as f64 - self.avg_time_in_system;
        self.avg_time_in_system += delta / self.time_in_system_samples as f64;
    }

    fn clear_cycle(&mut self) {
        self.cycle_invocations = 0;
        self.cycle_cold_starts = 0;
        self.cycle_delayed = 0;
        self.cycle_timely = 0;
        self.running_instances = 0;
        self.idle_instances = 0;
        self.terminated_instances = 0;
        self.cpu_usage = 0.0;
        self.memory_usage = 0.0;
        self.wasted_memory_time = 0.0;
        self.cycle_execution_time = 0;
        self.cycle_cost = 0.0;
        self.cold_start_delays.clear();
    }
}

/// The single authoritative store of per-function statistics. Every component
/// holds only function ids and reads or updates profiles through the monitor.
pub struct UsageMonitor {
    profiles: FxIndexMap<usize, FunctionProfile>,
    cost: CostMonitor,
    sink: Box<dyn RecordSink>,
    pub instance_ids: Counter,
    pub total_invocations: u64,
    pub total_delayed: u64,
    pub total_timely: u64,
    pub total_cold_starts: u64,
    pub total_terminations: u64,
    pub failed_deploys: u64,
}

impl UsageMonitor {
    pub fn new<'a>(
        functions: impl Iterator<Item = (usize, &'a str)>,
        cost: CostMonitor,
        sink: Box<dyn RecordSink>,
    ) -> Self {
        let mut profiles = FxIndexMap::default();
        for (id, name) in functions {
            profiles.insert(id, FunctionProfile::new(name.to_string()));
        }
        Self {
            profiles,
            cost,
            sink,
            instance_ids: Counter::default(),
            total_invocations: 0,
            total_delayed: 0,
            total_timely: 0,
            total_cold_starts: 0,
            total_terminations: 0,
            failed_deploys: 0,
        }
    }

    pub fn profile(&self, func_id: usize) -> &FunctionProfile {
        &self.profiles[&func_id]
    }

    pub fn profile_mut(&mut self, func_id: usize) -> &mut FunctionProfile {
        &mut self.profiles[&func_id]
    }

    pub fn function_ids(&self) -> Vec<usize> {
        self.profiles.keys().copied().collect()
    }

    /// Counts one served invocation, delayed or timely.
    pub fn record_invocation(&mut self, func_id: usize, delayed: bool) {
        self.total_invocations += 1;
        let profile = self.profile_mut(func_id);
        profile.cycle_invocations += 1;
        profile.total_invocations += 1;
        if delayed {
            profile.cycle_delayed += 1;
            profile.total_delayed += 1;
            self.total_delayed += 1;
        } else {
            profile.cycle_timely += 1;
            profile.total_timely += 1;
            self.total_timely += 1;
        }
    }

    /// Counts one cold start along with its sampled delay.
    pub fn record_cold_start(&mut self, func_id: usize, delay: u64) {
        self.total_cold_starts += 1;
        let profile = self.profile_mut(func_id);
        profile.cycle_cold_starts += 1;
        profile.total_cold_starts += 1;
        profile.cold_start_delays.push(delay);
    }

    pub fn record_termination(&mut self, func_id: usize) {
        self.total_terminations += 1;
        let profile = self.profile_mut(func_id);
        profile.terminated_instances += 1;
        profile.total_terminated += 1;
    }

    /// Prices every profile, emits one usage record per function and clears
    /// the cycle-scoped counters.
    pub fn flush_cycle(&mut self, tick: u64) -> Result<(), SimulationError> {
        for profile in self.profiles.values_mut() {
            self.cost.update_cost(profile);
            let record = UsageRecord {
                tick,
                function: profile.name.clone(),
                invocations: profile.cycle_invocations,
                cold_starts: profile.cycle_cold_starts,
                delayed_invocations: profile.cycle_delayed,
                running_instances: profile.running_instances,
                idle_instances: profile.idle_instances,
                terminated_instances: profile.terminated_instances,
                provisioned_cpu: profile.provisioned_cpu,
                provisioned_memory: profile.provisioned_memory,
                cpu_usage: profile.cpu_usage,
                memory_usage: profile.memory_usage,
                wasted_memory_time: profile.wasted_memory_time,
                execution_time: profile.cycle_execution_time,
                median_cold_start_delay: median(&profile.cold_start_delays),
                cost: profile.cycle_cost,
            };
            self.sink.emit(record)?;
            profile.clear_cycle();
        }
        Ok(())
    }

    pub fn flush_sink(&mut self) -> Result<(), SimulationError> {
        self.sink.flush()
    }

    /// Sum of per-function total costs.
    pub fn total_cost(&self) -> f64 {
        self.profiles.values().map(|p| p.total_cost).sum()
    }

    /// Sum of per-function total execution times.
    pub fn total_execution_time(&self) -> u64 {
        self.profiles.values().map(|p| p.total_execution_time).sum()
    }

    /// True while any function still has a scheduled pre-warm instant.
    pub fn has_pending_prewarms(&self) -> bool {
        self.profiles.values().any(|p| !p.pending_prewarms.is_empty())
    }
}
