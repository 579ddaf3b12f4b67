//! Fleet-wide resource manager.
use crate::invocation::InvocationRequest;
use crate::machine::VirtualMachine;
use crate::monitor::UsageMonitor;
use crate::scheduler::ResourceScheduler;
use crate::util::FxIndexMap;

/// Fleet-wide instance visibility: instance id to machine index. Rebuilt once
/// per cycle; hypervisor membership changes out of band, so entries may go
/// stale between rebuilds and removals happen eagerly on termination.
pub type FleetView = FxIndexMap<usize, usize>;

/// A routing candidate: one idle instance and where it lives.
#[derive(Debug, Clone, Copy)]
pub struct InstanceView {
    pub instance_id: usize,
    pub machine_idx: usize,
    pub idle_time: u64,
}

/// Aggregates hypervisors across the fleet and drives per-cycle fan-out.
pub struct ResourceManager {
    pub machines: Vec<VirtualMachine>,
    pub views: FleetView,
}

impl ResourceManager {
    pub fn new(machines: Vec<VirtualMachine>) -> Self {
        Self {
            machines,
            views: FleetView::default(),
        }
    }

    /// Rebuilds the fleet-wide instance view from every hypervisor.
    pub fn compute_instance_views(&mut self) {
        self.views.clear();
        for (machine_idx, machine) in self.machines.iter().enumerate() {
            for instance_id in machine.hypervisor.instance_ids() {
                self.views.insert(instance_id, machine_idx);
            }
        }
    }

    /// Routing candidates for a request: idle instances of the same function
    /// living on machines with aggregate headroom for the request.
    pub fn filter_instances(&self, request: &InvocationRequest) -> Vec<InstanceView> {
        let mut candidates = Vec::new();
        for (&instance_id, &machine_idx) in &self.views {
            let hypervisor = &self.machines[machine_idx].hypervisor;
            if !hypervisor.fits(request.required_cpu, request.required_memory) {
                continue;
            }
            if let Some(inst) = hypervisor.instance(instance_id) {
                if inst.is_idle() && inst.func_id == request.func_id {
                    candidates.push(InstanceView {
                        instance_id,
                        machine_idx,
                        idle_time: inst.idle_time,
                    });
                }
            }
        }
        candidates
    }

    /// Fans out one monitoring pass and returns the total number of instances
    /// that are still not idle. Per-function usage gauges are recomputed from
    /// scratch on every pass.
    pub fn monitoring_cycle(&mut self, time: u64, scheduler: &ResourceScheduler, monitor: &mut UsageMonitor) -> u64 {
        for func_id in monitor.function_ids() {
            let profile = monitor.profile_mut(func_id);
            profile.running_instances = 0;
            profile.idle_instances = 0;
            profile.cpu_usage = 0.0;
            profile.memory_usage = 0.0;
        }
        let views = &mut self.views;
        let mut running = 0;
        for machine in &mut self.machines {
            running += machine.hypervisor.update_instances(time, scheduler, views, monitor);
        }
        running
    }

    /// Fans out one profiling pass.
    pub fn profiling_cycle(&mut self, time: u64, monitor: &mut UsageMonitor) {
        for machine in &mut self.machines {
            machine.hypervisor.profile_instances(time, monitor);
        }
    }

    pub fn total_instances(&self) -> usize {
        self.machines.iter().map(|m| m.hypervisor.instance_count()).sum()
    }
}
