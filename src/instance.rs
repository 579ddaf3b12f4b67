//! Function instance state machine.

/// Execution state of a deployed instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Running,
    Idle,
    /// Waiting out a cold-start delay longer than one cycle; the instance
    /// does not occupy resources and cannot serve requests until it wakes.
    Sleeping,
}

/// A single function instance living on one hypervisor.
#[derive(Debug, Clone)]
pub struct FunctionInstance {
    pub id: usize,
    pub func_id: usize,
    pub name: String,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub state: InstanceState,
    wake_at: Option<u64>,
    pub start_time: u64,
    pub end_time: u64,
    pub idle_time: u64,
    /// True for exactly the one update call in which a Running to Idle
    /// transition happened; gates the one-time pre-warm window registration.
    pub finished_this_cycle: bool,
}

impl FunctionInstance {
    pub fn new(id: usize, func_id: usize, name: String) -> Self {
        Self {
            id,
            func_id,
            name,
            cpu_usage: 0.0,
            memory_usage: 0.0,
            state: InstanceState::Idle,
            wake_at: None,
            start_time: 0,
            end_time: 0,
            idle_time: 0,
            finished_this_cycle: false,
        }
    }

    /// Starts serving one invocation over `[start, end]` with the given
    /// resource usage. A sleeping instance records the bounds but stays
    /// asleep; it starts running once its wake tick is reached.
    pub fn invoke(&mut self, start: u64, end: u64, cpu: f64, memory: f64) {
        self.start_time = start;
        self.end_time = end;
        self.cpu_usage = cpu;
        self.memory_usage = memory;
        self.idle_time = 0;
        if self.state != InstanceState::Sleeping {
            self.state = InstanceState::Running;
        }
    }

    /// Puts the instance to sleep until the given wake tick.
    pub fn sleep_until(&mut self, wake_at: u64) {
        self.state = InstanceState::Sleeping;
        self.wake_at = Some(wake_at);
    }

    /// Advances the state machine by one cycle.
    pub fn update(&mut self, time: u64, cycle_interval: u64) {
        self.finished_this_cycle = false;
        match self.state {
            InstanceState::Running if time >= self.end_time => {
                self.state = InstanceState::Idle;
                self.finished_this_cycle = true;
                self.idle_time = time - self.end_time;
            }
            InstanceState::Sleeping => {
                if let Some(wake_at) = self.wake_at {
                    if wake_at >= time && wake_at < time + cycle_interval {
                        self.state = InstanceState::Running;
                        self.wake_at = None;
                    }
                }
            }
            _ => {
                self.idle_time = time.saturating_sub(self.end_time);
            }
        }
    }

    /// Forced stop; the instance becomes idle immediately.
    pub fn halt(&mut self, time: u64) {
        self.state = InstanceState::Idle;
        self.idle_time = time.saturating_sub(self.end_time);
    }

    pub fn is_idle(&self) -> bool {
        self.state == InstanceState::Idle
    }

    pub fn is_running(&self) -> bool {
        self.state == InstanceState::Running
    }
}
