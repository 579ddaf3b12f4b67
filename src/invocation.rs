//! Invocation requests.

/// A batch of invocations of one function arriving at a single tick.
///
/// The router decrements `remaining` as individual invocations are served;
/// `arrived_at` keeps the original arrival tick so requests served in a later
/// cycle can be counted as delayed.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub func_id: usize,
    pub remaining: u64,
    pub arrived_at: u64,
    pub duration: u64,
    /// Provisioned resources, used for accounting and cost.
    pub provisioned_cpu: u32,
    pub provisioned_memory: u32,
    /// Measured resources, used for placement.
    pub required_cpu: f64,
    pub required_memory: f64,
}
