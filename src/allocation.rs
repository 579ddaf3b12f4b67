//! Machine allocation policies for new deployments.
use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::error::SimulationError;
use crate::machine::VirtualMachine;

/// Picks a machine with enough headroom for a new deployment. Returns the
/// machine index or `None` when nothing fits (the expected "system busy"
/// outcome, not an error).
pub trait AllocationPolicy: Send {
    fn select(&mut self, machines: &[VirtualMachine], cpu: f64, memory: f64) -> Option<usize>;
}

/// First fitting machine in fleet order.
pub struct SequentialAllocation;

impl AllocationPolicy for SequentialAllocation {
    fn select(&mut self, machines: &[VirtualMachine], cpu: f64, memory: f64) -> Option<usize> {
        machines.iter().position(|m| m.hypervisor.fits(cpu, memory))
    }
}

/// Uniformly random fitting machine.
pub struct RandomAllocation {
    rng: Pcg64,
}

impl RandomAllocation {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
        }
    }
}

impl AllocationPolicy for RandomAllocation {
    fn select(&mut self, machines: &[VirtualMachine], cpu: f64, memory: f64) -> Option<usize> {
        let fitting: Vec<usize> = machines
            .iter()
            .enumerate()
            .filter(|(_, m)| m.hypervisor.fits(cpu, memory))
            .map(|(idx, _)| idx)
            .collect();
        fitting.choose(&mut self.rng).copied()
    }
}

pub fn resolve_allocation_policy(name: &str, seed: u64) -> Result<Box<dyn AllocationPolicy>, SimulationError> {
    match name {
        "sequential" => Ok(Box::new(SequentialAllocation)),
        "random" => Ok(Box::new(RandomAllocation::new(seed))),
        other => Err(SimulationError::InvalidConfiguration(format!(
            "unknown allocation policy: {}",
            other
        ))),
    }
}
