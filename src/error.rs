//! Simulation error type.
//!
//! Only genuinely fatal conditions surface as errors: configuration problems,
//! queue overflow, I/O failures. Resource exhaustion (no machine or instance
//! fits) is an expected outcome and is reported through `Option` returns.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("request queue exceeded its capacity of {0}")]
    QueueOverflow(usize),
    #[error("forecast provider unavailable: {0}")]
    ForecastUnavailable(String),
    #[error("malformed trace: {0}")]
    Trace(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}
