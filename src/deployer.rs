//! Cold and pre-warm instance deployment.
use log::{debug, warn};

use crate::delay::DelayInjector;
use crate::instance::FunctionInstance;
use crate::invocation::InvocationRequest;
use crate::manager::ResourceManager;
use crate::monitor::UsageMonitor;
use crate::scheduler::ResourceScheduler;

/// Nominal footprint of a pre-warmed instance; the real size is unknown until
/// the next actual invocation re-provisions it.
const PREWARM_CPU: f64 = 10.0;
const PREWARM_MEMORY: f64 = 10.0;

/// Creates new instances, cold (serving a request, with injected start-up
/// delay) or pre-warmed (ahead of predicted demand).
pub struct FunctionDeployer {
    cycle_interval: u64,
    delay: DelayInjector,
}

impl FunctionDeployer {
    pub fn new(cycle_interval: u64, delay: DelayInjector) -> Self {
        Self { cycle_interval, delay }
    }

    /// Cold-deploys an instance for the request. Returns false when no
    /// machine fits or provisioning fails; the request stays queued and is
    /// retried next cycle.
    pub fn deploy(
        &mut self,
        request: &InvocationRequest,
        time: u64,
        manager: &mut ResourceManager,
        scheduler: &mut ResourceScheduler,
        monitor: &mut UsageMonitor,
    ) -> bool {
        let machine_idx =
            match scheduler.select_hypervisor(&manager.machines, request.required_cpu, request.required_memory) {
                Some(idx) => idx,
                None => {
                    monitor.failed_deploys += 1;
                    return false;
                }
            };
        let name = monitor.profile(request.func_id).name.clone();
        let id = monitor.instance_ids.increment();
        let mut instance = FunctionInstance::new(id, request.func_id, name);
        let delay = self.delay.cold_start_delay(request.provisioned_memory);
        if delay > self.cycle_interval {
            // keep the instance off the books until it can actually serve
            instance.sleep_until(time + delay);
        }
        instance.invoke(
            time + delay,
            time + request.duration + delay,
            request.required_cpu,
            request.required_memory,
        );
        let hypervisor = &mut manager.machines[machine_idx].hypervisor;
        if !hypervisor.provision(&instance, 0.0) {
            // the machine no longer fits, fail only this attempt
            monitor.failed_deploys += 1;
            return false;
        }
        debug!(
            "cold start of function {} on {} with delay {}",
            instance.name, hypervisor.host, delay
        );
        hypervisor.register(instance);
        manager.views.insert(id, machine_idx);
        monitor.record_cold_start(request.func_id, delay);
        monitor
            .profile_mut(request.func_id)
            .record_time_in_system(time + request.duration + delay - request.arrived_at);
        true
    }

    /// Deploys a pre-warmed, zero-usage instance of the function. Its end
    /// time equals the deployment instant so the keep-alive policy governs it
    /// from the next cycle on; cost and cold-start counters are untouched
    /// since pre-warming is not an invocation.
    pub fn deploy_prewarm(
        &mut self,
        func_id: usize,
        time: u64,
        manager: &mut ResourceManager,
        scheduler: &mut ResourceScheduler,
        monitor: &mut UsageMonitor,
    ) -> bool {
        let machine_idx = match scheduler.select_hypervisor(&manager.machines, PREWARM_CPU, PREWARM_MEMORY) {
            Some(idx) => idx,
            None => {
                warn!(
                    "pre-warm of function {} aborted, no machine fits",
                    monitor.profile(func_id).name
                );
                return false;
            }
        };
        let name = monitor.profile(func_id).name.clone();
        let id = monitor.instance_ids.increment();
        let mut instance = FunctionInstance::new(id, func_id, name);
        // never runs and holds no budget until a real invocation
        // re-provisions it; the nominal footprint is used for placement only
        instance.start_time = time;
        instance.end_time = time;
        let hypervisor = &mut manager.machines[machine_idx].hypervisor;
        debug!("pre-warmed function {} on {}", instance.name, hypervisor.host);
        hypervisor.register(instance);
        manager.views.insert(id, machine_idx);
        true
    }
}
