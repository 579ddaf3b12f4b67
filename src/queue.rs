//! Capacity-bounded FIFO request queue.
use std::collections::VecDeque;

use crate::error::SimulationError;
use crate::invocation::InvocationRequest;

/// FIFO queue that refuses enqueues beyond its configured capacity. Overflow
/// is a distinct fatal error rather than a silent drop.
pub struct FiniteRequestQueue {
    capacity: usize,
    entries: VecDeque<InvocationRequest>,
}

impl FiniteRequestQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, request: InvocationRequest) -> Result<(), SimulationError> {
        if self.entries.len() >= self.capacity {
            return Err(SimulationError::QueueOverflow(self.capacity));
        }
        self.entries.push_back(request);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<InvocationRequest> {
        self.entries.pop_front()
    }

    pub fn push_front(&mut self, request: InvocationRequest) {
        self.entries.push_front(request);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
