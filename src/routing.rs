//! Instance routing policies for warm invocations.
use std::cmp::Reverse;

use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::error::SimulationError;
use crate::manager::InstanceView;

/// Picks one of the pre-filtered routing candidates (idle instances of the
/// requested function on machines with headroom). Ties break by instance id
/// so runs stay deterministic.
pub trait RoutingPolicy: Send {
    fn select(&mut self, candidates: &[InstanceView]) -> Option<InstanceView>;
}

/// Lowest instance id first.
pub struct SequentialRouting;

impl RoutingPolicy for SequentialRouting {
    fn select(&mut self, candidates: &[InstanceView]) -> Option<InstanceView> {
        candidates.iter().min_by_key(|v| v.instance_id).copied()
    }
}

/// The most recently idle candidate.
pub struct LeastIdleTimeRouting;

impl RoutingPolicy for LeastIdleTimeRouting {
    fn select(&mut self, candidates: &[InstanceView]) -> Option<InstanceView> {
        candidates.iter().min_by_key(|v| (v.idle_time, v.instance_id)).copied()
    }
}

/// The longest idle candidate, so long-idle instances are drained first.
pub struct HighestIdleTimeRouting;

impl RoutingPolicy for HighestIdleTimeRouting {
    fn select(&mut self, candidates: &[InstanceView]) -> Option<InstanceView> {
        candidates
            .iter()
            .min_by_key(|v| (Reverse(v.idle_time), v.instance_id))
            .copied()
    }
}

/// Uniformly random candidate.
pub struct RandomRouting {
    rng: Pcg64,
}

impl RandomRouting {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
        }
    }
}

impl RoutingPolicy for RandomRouting {
    fn select(&mut self, candidates: &[InstanceView]) -> Option<InstanceView> {
        candidates.choose(&mut self.rng).copied()
    }
}

pub fn resolve_routing_policy(name: &str, seed: u64) -> Result<Box<dyn RoutingPolicy>, SimulationError> {
    match name {
        "sequential" => Ok(Box::new(SequentialRouting)),
        "least-idletime" => Ok(Box::new(LeastIdleTimeRouting)),
        "highest-idletime" => Ok(Box::new(HighestIdleTimeRouting)),
        "random" => Ok(Box::new(RandomRouting::new(seed))),
        other => Err(SimulationError::InvalidConfiguration(format!(
            "unknown routing policy: {}",
            other
        ))),
    }
}
