//! Fleet-wide resource scheduler.
use crate::allocation::AllocationPolicy;
use crate::error::SimulationError;
use crate::instance::FunctionInstance;
use crate::machine::VirtualMachine;
use crate::management::ResourceManagementPolicy;
use crate::manager::FleetView;
use crate::monitor::UsageMonitor;

/// Couples the allocation and management policies. The scheduler never drives
/// deployments itself: the cycle driver collects due pre-warm instants from
/// it and passes each to the deployer, keeping the component wiring acyclic.
pub struct ResourceScheduler {
    allocation: Box<dyn AllocationPolicy>,
    management: Box<dyn ResourceManagementPolicy>,
    prewarm_enabled: bool,
}

impl ResourceScheduler {
    pub fn new(
        allocation: Box<dyn AllocationPolicy>,
        mut management: Box<dyn ResourceManagementPolicy>,
        monitor: &mut UsageMonitor,
    ) -> Self {
        management.init(monitor);
        Self {
            allocation,
            management,
            prewarm_enabled: true,
        }
    }

    /// Stops scheduling new pre-warm windows. Called once the trace is
    /// exhausted: no demand is left that a warm spare could serve.
    pub fn disable_prewarm(&mut self) {
        self.prewarm_enabled = false;
    }

    /// Machine for a new deployment, or `None` when nothing fits.
    pub fn select_hypervisor(&mut self, machines: &[VirtualMachine], cpu: f64, memory: f64) -> Option<usize> {
        self.allocation.select(machines, cpu, memory)
    }

    /// Feeds one idle-time observation to the management policy, which
    /// recomputes the function's windows.
    pub fn update_windows(
        &mut self,
        func_id: usize,
        time: u64,
        idle_time: u64,
        monitor: &mut UsageMonitor,
    ) -> Result<(), SimulationError> {
        self.management.update(func_id, time, idle_time, monitor)
    }

    /// Whether an idle instance should be retained. An undefined keep-alive
    /// window means never terminate. A negative decision also removes the
    /// instance from the fleet view so it cannot be routed to afterwards.
    pub fn keep_alive(&self, instance: &FunctionInstance, views: &mut FleetView, monitor: &UsageMonitor) -> bool {
        let windows = monitor.profile(instance.func_id).windows;
        let retain = match windows.keep_alive {
            None => true,
            Some(window) => instance.idle_time <= window,
        };
        if !retain {
            views.shift_remove(&instance.id);
        }
        retain
    }

    /// Schedules a pre-warm instant for the function unless its pre-warm
    /// window is zero, the policy's explicit "do not pre-warm" signal.
    pub fn set_prewarm_window(&self, time: u64, func_id: usize, monitor: &mut UsageMonitor) {
        if !self.prewarm_enabled {
            return;
        }
        let profile = monitor.profile_mut(func_id);
        if profile.windows.prewarm > 0 {
            let instant = time + profile.windows.prewarm;
            profile.pending_prewarms.push(instant);
        }
    }

    /// Pre-warm deployments due in `[time, time + interval)`, as (function,
    /// instant) pairs. Due and overdue instants are consumed.
    pub fn take_due_prewarms(&self, time: u64, interval: u64, monitor: &mut UsageMonitor) -> Vec<(usize, u64)> {
        let mut due = Vec::new();
        for func_id in monitor.function_ids() {
            let profile = monitor.profile_mut(func_id);
            profile.pending_prewarms.retain(|&instant| {
                if instant >= time + interval {
                    return true;
                }
                if instant >= time {
                    due.push((func_id, instant));
                }
                false
            });
        }
        due
    }
}
