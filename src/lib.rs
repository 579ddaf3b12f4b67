//! Cycle-driven simulator for studying resource management in FaaS
//! platforms: pluggable allocation, routing and keep-alive/pre-warm policies
//! evaluated against recorded invocation traces.
pub mod allocation;
pub mod config;
pub mod cost;
pub mod delay;
pub mod deployer;
pub mod error;
pub mod forecast;
pub mod histogram;
pub mod hypervisor;
pub mod instance;
pub mod invocation;
pub mod machine;
pub mod management;
pub mod manager;
pub mod monitor;
pub mod parallel;
pub mod queue;
pub mod router;
pub mod routing;
pub mod scheduler;
pub mod simulation;
pub mod sink;
pub mod trace;
pub mod util;
