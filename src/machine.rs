//! Virtual machine: static capacity plus its hypervisor.
use crate::hypervisor::InstanceHypervisor;

/// A machine of the simulated fleet. Capacity is fixed for the whole run; all
/// dynamic state lives in the owned hypervisor.
pub struct VirtualMachine {
    pub id: usize,
    pub cpu: f64,
    pub memory: f64,
    pub hypervisor: InstanceHypervisor,
}

impl VirtualMachine {
    pub fn new(id: usize, cpu: f64, memory: f64, idle_memory_penalty: f64, cycle_interval: u64) -> Self {
        Self {
            id,
            cpu,
            memory,
            hypervisor: InstanceHypervisor::new(format!("vm-{}", id), cpu, memory, idle_memory_penalty, cycle_interval),
        }
    }
}
