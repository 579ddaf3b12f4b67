//! Request routing and queue dispatch.
use log::debug;

use crate::deployer::FunctionDeployer;
use crate::error::SimulationError;
use crate::invocation::InvocationRequest;
use crate::manager::ResourceManager;
use crate::monitor::UsageMonitor;
use crate::queue::FiniteRequestQueue;
use crate::routing::RoutingPolicy;
use crate::scheduler::ResourceScheduler;

/// Owns the bounded request queue and the route-or-deploy dispatch loop.
pub struct FunctionRouter {
    queue: FiniteRequestQueue,
    routing: Box<dyn RoutingPolicy>,
}

impl FunctionRouter {
    pub fn new(queue_capacity: usize, routing: Box<dyn RoutingPolicy>) -> Self {
        Self {
            queue: FiniteRequestQueue::new(queue_capacity),
            routing,
        }
    }

    pub fn enqueue(&mut self, request: InvocationRequest) -> Result<(), SimulationError> {
        self.queue.push(request)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Routes one invocation to an existing idle instance of the function.
    /// Returns false on a routing miss (no candidate, or the provisioning
    /// race lost).
    pub fn route_request(
        &mut self,
        request: &InvocationRequest,
        time: u64,
        manager: &mut ResourceManager,
        monitor: &mut UsageMonitor,
    ) -> bool {
        let candidates = manager.filter_instances(request);
        let view = match self.routing.select(&candidates) {
            Some(view) => view,
            None => return false,
        };
        let hypervisor = &mut manager.machines[view.machine_idx].hypervisor;
        let penalty = hypervisor.idle_memory_penalty();
        let instance = match hypervisor.instance_mut(view.instance_id) {
            Some(instance) => instance,
            None => return false,
        };
        // release the idle-memory reservation of the previous usage so it is
        // not double-counted by the re-provision
        let prev_penalty = instance.memory_usage * penalty;
        instance.invoke(time, time + request.duration, request.required_cpu, request.required_memory);
        let instance_id = instance.id;
        if !hypervisor.provision_existing(instance_id, prev_penalty) {
            if let Some(instance) = hypervisor.instance_mut(instance_id) {
                instance.halt(time);
            }
            return false;
        }
        debug!(
            "routed invocation of function {} to instance {}",
            request.func_id, instance_id
        );
        monitor
            .profile_mut(request.func_id)
            .record_time_in_system(time + request.duration - request.arrived_at);
        true
    }

    /// Drains the queue head-first. Each head entry is served invocation by
    /// invocation, routing first and cold-deploying on a miss; the moment
    /// neither works the drain stops entirely and everything left, including
    /// the partially served head, waits for the next cycle. This keeps strict
    /// FIFO fairness and turns resource exhaustion into head-of-line
    /// backpressure instead of queue reordering.
    pub fn handle_requests(
        &mut self,
        time: u64,
        manager: &mut ResourceManager,
        scheduler: &mut ResourceScheduler,
        deployer: &mut FunctionDeployer,
        monitor: &mut UsageMonitor,
    ) {
        while let Some(mut request) = self.queue.pop() {
            while request.remaining > 0 {
                let served = self.route_request(&request, time, manager, monitor)
                    || deployer.deploy(&request, time, manager, scheduler, monitor);
                if !served {
                    self.queue.push_front(request);
                    return;
                }
                request.remaining -= 1;
                monitor.record_invocation(request.func_id, time > request.arrived_at);
            }
        }
    }
}
