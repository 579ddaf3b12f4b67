//! The per-cycle simulation driver.
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::allocation::resolve_allocation_policy;
use crate::config::ExperimentConfig;
use crate::cost::{CostMonitor, PricingModel};
use crate::delay::DelayInjector;
use crate::deployer::FunctionDeployer;
use crate::error::SimulationError;
use crate::forecast::{ArimaForecast, ForecastProvider};
use crate::invocation::InvocationRequest;
use crate::machine::VirtualMachine;
use crate::management::{resolve_management_policy, ManagementPolicyConfig};
use crate::manager::ResourceManager;
use crate::monitor::UsageMonitor;
use crate::router::FunctionRouter;
use crate::routing::resolve_routing_policy;
use crate::scheduler::ResourceScheduler;
use crate::sink::RecordSink;
use crate::trace::Trace;

/// Lifecycle of one scenario run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Consuming trace entries.
    Active,
    /// Trace exhausted, instances still live or requests still queued.
    Draining,
    Done,
}

/// Final summary of one scenario.
#[derive(Debug, Clone)]
pub struct Report {
    pub parameters: String,
    pub duration: u64,
    pub execution_time: u64,
    pub invocations: u64,
    pub delayed_invocations: u64,
    pub timely_invocations: u64,
    pub cold_starts: u64,
    pub terminations: u64,
    pub failed_deploys: u64,
    pub total_cost: f64,
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== {} ===", self.parameters)?;
        writeln!(f, "simulated duration:   {} ms", self.duration)?;
        writeln!(f, "total execution time: {} ms", self.execution_time)?;
        writeln!(f, "invocations:          {}", self.invocations)?;
        writeln!(f, "  timely:             {}", self.timely_invocations)?;
        writeln!(f, "  delayed:            {}", self.delayed_invocations)?;
        writeln!(f, "cold starts:          {}", self.cold_starts)?;
        writeln!(f, "terminated instances: {}", self.terminations)?;
        writeln!(f, "failed deployments:   {}", self.failed_deploys)?;
        write!(f, "total cost:           {:.8}", self.total_cost)
    }
}

/// Owns every component of one scenario and drives the cycle loop.
pub struct SimulationCore {
    trace: Arc<Trace>,
    cycle_interval: u64,
    parameters: String,
    verbose: bool,
    pub phase: Phase,
    manager: ResourceManager,
    scheduler: ResourceScheduler,
    router: FunctionRouter,
    deployer: FunctionDeployer,
    monitor: UsageMonitor,
}

impl SimulationCore {
    pub fn new(
        trace: Arc<Trace>,
        config: &ExperimentConfig,
        seed: u64,
        sink: Box<dyn RecordSink>,
    ) -> Result<Self, SimulationError> {
        Self::with_forecast(trace, config, seed, sink, Box::new(ArimaForecast::new()))
    }

    /// Builds a scenario with an explicit forecast provider; tests use this
    /// to inject fakes.
    pub fn with_forecast(
        trace: Arc<Trace>,
        config: &ExperimentConfig,
        seed: u64,
        sink: Box<dyn RecordSink>,
        forecast: Box<dyn ForecastProvider>,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        let cycle_interval = trace.cycle_interval()?;
        let pricing: PricingModel = config.pricing_model.parse()?;
        let mut monitor = UsageMonitor::new(
            trace.functions.iter().enumerate().map(|(id, f)| (id, f.name.as_str())),
            CostMonitor::new(pricing),
            sink,
        );

        let mut machines = Vec::new();
        for group in &config.machines {
            for _ in 0..group.count {
                let id = machines.len();
                machines.push(VirtualMachine::new(
                    id,
                    group.cpu,
                    group.memory,
                    config.idle_memory_penalty,
                    cycle_interval,
                ));
            }
        }
        let manager = ResourceManager::new(machines);

        let allocation = resolve_allocation_policy(&config.allocation_policy, seed)?;
        let routing = resolve_routing_policy(&config.routing_policy, seed.wrapping_add(1))?;
        let management = resolve_management_policy(
            &ManagementPolicyConfig {
                name: &config.management_policy,
                instance_idle_timeout: config.instance_idle_timeout,
                histogram_limit: config.histogram_limit,
                histogram_class_width: config.histogram_class_width,
                histogram_oob_threshold: config.histogram_oob_threshold,
                prediction_error_margin: config.prediction_error_margin,
                forecast_error_margin: config.forecast_error_margin,
            },
            forecast,
        )?;
        let scheduler = ResourceScheduler::new(allocation, management, &mut monitor);

        let delay = DelayInjector::from_str(&config.failure_model, seed.wrapping_add(2))?;
        let deployer = FunctionDeployer::new(cycle_interval, delay);
        let router = FunctionRouter::new(config.request_queue_size, routing);

        Ok(Self {
            trace,
            cycle_interval,
            parameters: config.parameter_string(),
            verbose: config.verbose,
            phase: Phase::Active,
            manager,
            scheduler,
            router,
            deployer,
            monitor,
        })
    }

    /// Runs the scenario to completion and produces its report.
    pub fn run(&mut self) -> Result<Report, SimulationError> {
        info!("starting scenario [{}]", self.parameters);
        let n_cycles = self.trace.n_cycles();
        let interval = self.cycle_interval;
        let mut running = 0;
        let mut time = 0;
        for cycle in 0..n_cycles {
            time = cycle as u64 * interval;
            running = self.cycle(Some(cycle), time)?;
        }

        self.phase = Phase::Draining;
        self.scheduler.disable_prewarm();
        let mut last_queue_len = self.router.queue_len();
        while running > 0 || !self.router.queue_is_empty() || self.monitor.has_pending_prewarms() {
            time += interval;
            running = self.cycle(None, time)?;
            let stalled = running == 0
                && !self.monitor.has_pending_prewarms()
                && !self.router.queue_is_empty()
                && self.router.queue_len() == last_queue_len;
            if stalled {
                warn!(
                    "drain stalled with nothing running and {} queued requests, giving up",
                    self.router.queue_len()
                );
                break;
            }
            last_queue_len = self.router.queue_len();
        }

        self.phase = Phase::Done;
        self.monitor.flush_sink()?;
        info!("finished scenario [{}] at {} ms", self.parameters, time);
        Ok(Report {
            parameters: self.parameters.clone(),
            duration: time,
            execution_time: self.monitor.total_execution_time(),
            invocations: self.monitor.total_invocations,
            delayed_invocations: self.monitor.total_delayed,
            timely_invocations: self.monitor.total_timely,
            cold_starts: self.monitor.total_cold_starts,
            terminations: self.monitor.total_terminations,
            failed_deploys: self.monitor.failed_deploys,
            total_cost: self.monitor.total_cost(),
        })
    }

    /// One simulation cycle at `time`; `trace_cycle` is the trace entry to
    /// ingest, absent while draining. Returns the number of not-idle
    /// instances after the monitoring pass.
    fn cycle(&mut self, trace_cycle: Option<usize>, time: u64) -> Result<u64, SimulationError> {
        let interval = self.cycle_interval;
        // pre-pass: bring instance states up to the cycle start so instances
        // that have already finished are routable; anything still executing
        // stays off the routing views for this cycle
        self.manager.monitoring_cycle(time, &self.scheduler, &mut self.monitor);
        self.manager.compute_instance_views();

        if let Some(cycle) = trace_cycle {
            self.ingest_fragments(cycle, time)?;
        }

        self.router.handle_requests(
            time,
            &mut self.manager,
            &mut self.scheduler,
            &mut self.deployer,
            &mut self.monitor,
        );

        for (func_id, instant) in self.scheduler.take_due_prewarms(time, interval, &mut self.monitor) {
            self.deployer.deploy_prewarm(
                func_id,
                instant,
                &mut self.manager,
                &mut self.scheduler,
                &mut self.monitor,
            );
        }

        let running = self.manager.monitoring_cycle(time, &self.scheduler, &mut self.monitor);
        self.manager.profiling_cycle(time, &mut self.monitor);
        self.monitor.flush_cycle(time)?;
        if self.verbose {
            debug!(
                "cycle at {} ms: {} not idle, {} instances total, {} queued",
                time,
                running,
                self.manager.total_instances(),
                self.router.queue_len()
            );
        }
        Ok(running)
    }

    /// Feeds one trace entry per function into the system: refreshes
    /// provisioned sizes and rolling averages, lets the management policy see
    /// the idle gap before a new burst, and enqueues the burst.
    fn ingest_fragments(&mut self, cycle: usize, time: u64) -> Result<(), SimulationError> {
        let trace = self.trace.clone();
        for (func_id, function) in trace.functions.iter().enumerate() {
            let fragment = match function.fragments.get(cycle) {
                Some(fragment) => *fragment,
                None => continue,
            };
            let profile = self.monitor.profile_mut(func_id);
            profile.provisioned_cpu = fragment.provisioned_cpu;
            profile.provisioned_memory = fragment.provisioned_memory;
            profile.record_arrival_rate(fragment.invocations);
            if fragment.invocations == 0 {
                profile.time_since_last_invocation += self.cycle_interval;
                continue;
            }
            let idle_gap = profile.time_since_last_invocation;
            // the gap always spans at least the burst's own cycle, so bursts
            // k cycles apart observe a gap of k intervals
            profile.time_since_last_invocation = self.cycle_interval;
            self.scheduler.update_windows(func_id, time, idle_gap, &mut self.monitor)?;
            self.router.enqueue(InvocationRequest {
                func_id,
                remaining: fragment.invocations,
                arrived_at: time,
                duration: fragment.duration,
                provisioned_cpu: fragment.provisioned_cpu,
                provisioned_memory: fragment.provisioned_memory,
                required_cpu: fragment.cpu_usage,
                required_memory: fragment.memory_usage,
            })?;
        }
        Ok(())
    }
}
