//! Per-machine instance hypervisor.
use crate::instance::FunctionInstance;
use crate::manager::FleetView;
use crate::monitor::UsageMonitor;
use crate::scheduler::ResourceScheduler;
use crate::util::FxIndexMap;

/// Owns the instances of one machine and a bounded cpu/memory budget.
///
/// Aggregate usage is recomputed from scratch on every monitoring pass:
/// running instances contribute their full usage, retained idle instances
/// reserve a penalty-weighted share of their memory.
pub struct InstanceHypervisor {
    pub host: String,
    pub total_cpu: f64,
    pub total_memory: f64,
    pub current_cpu: f64,
    pub current_memory: f64,
    idle_memory_penalty: f64,
    cycle_interval: u64,
    instances: FxIndexMap<usize, FunctionInstance>,
}

impl InstanceHypervisor {
    pub fn new(host: String, cpu: f64, memory: f64, idle_memory_penalty: f64, cycle_interval: u64) -> Self {
        Self {
            host,
            total_cpu: cpu,
            total_memory: memory,
            current_cpu: 0.0,
            current_memory: 0.0,
            idle_memory_penalty,
            cycle_interval,
            instances: FxIndexMap::default(),
        }
    }

    pub fn idle_memory_penalty(&self) -> f64 {
        self.idle_memory_penalty
    }

    /// True if the projected aggregate usage stays within totals.
    pub fn fits(&self, cpu: f64, memory: f64) -> bool {
        self.current_cpu + cpu <= self.total_cpu && self.current_memory + memory <= self.total_memory
    }

    /// Admits a new instance's usage into the budget. The projected usage is
    /// checked against the totals before any previously reserved idle-memory
    /// penalty is released; the release happens only on success, so a failed
    /// provision leaves the budget untouched.
    pub fn provision(&mut self, instance: &FunctionInstance, prev_penalty: f64) -> bool {
        if instance.is_idle() {
            return false;
        }
        self.admit(instance.cpu_usage, instance.memory_usage, prev_penalty)
    }

    /// Same admission for an already-owned instance, looked up by id.
    pub fn provision_existing(&mut self, instance_id: usize, prev_penalty: f64) -> bool {
        let (cpu, memory) = match self.instances.get(&instance_id) {
            Some(inst) if !inst.is_idle() => (inst.cpu_usage, inst.memory_usage),
            _ => return false,
        };
        self.admit(cpu, memory, prev_penalty)
    }

    fn admit(&mut self, cpu: f64, memory: f64, prev_penalty: f64) -> bool {
        if !self.fits(cpu, memory) {
            return false;
        }
        self.current_memory -= prev_penalty;
        self.current_cpu += cpu;
        self.current_memory += memory;
        true
    }

    pub fn register(&mut self, instance: FunctionInstance) {
        self.instances.insert(instance.id, instance);
    }

    pub fn instance(&self, id: usize) -> Option<&FunctionInstance> {
        self.instances.get(&id)
    }

    pub fn instance_mut(&mut self, id: usize) -> Option<&mut FunctionInstance> {
        self.instances.get_mut(&id)
    }

    pub fn instance_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.instances.keys().copied()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Advances every owned instance by one cycle, rebuilds aggregate usage
    /// and evicts idle instances the scheduler declines to keep alive.
    /// Returns the number of instances that are not idle afterwards.
    pub fn update_instances(
        &mut self,
        time: u64,
        scheduler: &ResourceScheduler,
        views: &mut FleetView,
        monitor: &mut UsageMonitor,
    ) -> u64 {
        self.current_cpu = 0.0;
        self.current_memory = 0.0;
        let mut running = 0;
        let mut evicted = Vec::new();
        let ids: Vec<usize> = self.instances.keys().copied().collect();
        for id in ids {
            let inst = match self.instances.get_mut(&id) {
                Some(inst) => inst,
                None => continue,
            };
            inst.update(time, self.cycle_interval);
            let func_id = inst.func_id;
            if !inst.is_idle() {
                running += 1;
                if inst.is_running() {
                    self.current_cpu += inst.cpu_usage;
                    self.current_memory += inst.memory_usage;
                    let profile = monitor.profile_mut(func_id);
                    profile.running_instances += 1;
                    profile.cpu_usage += inst.cpu_usage;
                    profile.memory_usage += inst.memory_usage;
                }
            } else if scheduler.keep_alive(inst, views, monitor) {
                self.current_memory += inst.memory_usage * self.idle_memory_penalty;
                let just_finished = inst.finished_this_cycle;
                monitor.profile_mut(func_id).idle_instances += 1;
                if just_finished {
                    scheduler.set_prewarm_window(time, func_id, monitor);
                }
            } else {
                evicted.push(id);
            }
        }
        for id in evicted {
            if let Some(inst) = self.instances.shift_remove(&id) {
                monitor.record_termination(inst.func_id);
            }
        }
        running
    }

    /// Attributes this cycle's execution time and idle memory waste to the
    /// owning functions. An instance whose start or end falls inside the
    /// cycle window contributes only the overlapping part.
    pub fn profile_instances(&mut self, time: u64, monitor: &mut UsageMonitor) {
        let cycle_end = time + self.cycle_interval;
        for inst in self.instances.values() {
            if inst.is_idle() && inst.end_time <= time {
                // idle for the whole cycle
                let profile = monitor.profile_mut(inst.func_id);
                profile.memory_usage += inst.memory_usage * self.idle_memory_penalty;
                profile.wasted_memory_time += self.cycle_interval as f64;
            } else {
                let from = inst.start_time.max(time);
                let until = inst.end_time.min(cycle_end);
                let executed = until.saturating_sub(from);
                let profile = monitor.profile_mut(inst.func_id);
                profile.cycle_execution_time += executed;
                profile.total_execution_time += executed;
            }
        }
    }
}
