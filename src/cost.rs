//! Per-platform pricing functions and the cost monitor.
use std::str::FromStr;

use crate::error::SimulationError;
use crate::monitor::FunctionProfile;

/// Public pricing of the major FaaS platforms as of June 2020. Each model
/// prices a cycle from total execution time, provisioned resources and the
/// number of served requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingModel {
    Lambda,
    Azure,
    Google,
}

impl FromStr for PricingModel {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "LAMBDA" => Ok(Self::Lambda),
            "AZURE" => Ok(Self::Azure),
            "GOOGLE" => Ok(Self::Google),
            other => Err(SimulationError::InvalidConfiguration(format!(
                "unknown pricing model: {}",
                other
            ))),
        }
    }
}

impl PricingModel {
    /// Cost of one cycle given total execution time (ms), provisioned memory
    /// (MB), provisioned cpu (MHz) and the number of requests served.
    pub fn cycle_cost(&self, execution_time: u64, memory: u32, cpu: u32, requests: u64) -> f64 {
        let seconds = execution_time as f64 / 1000.0;
        let gb = memory as f64 / 1024.0;
        match self {
            Self::Lambda => seconds * gb * 0.00001667 + requests as f64 * 0.00000002,
            Self::Azure => seconds * gb * 0.000016 + requests as f64 * 0.00000002,
            Self::Google => {
                let ghz = cpu as f64 / 1000.0;
                seconds * gb * 0.0000025 + seconds * ghz * 0.0000100 + requests as f64 * 0.00000002
            }
        }
    }
}

/// Applies the configured pricing model to a function's per-cycle usage.
pub struct CostMonitor {
    model: PricingModel,
}

impl CostMonitor {
    pub fn new(model: PricingModel) -> Self {
        Self { model }
    }

    /// Prices the profile's current cycle and folds the result into both the
    /// cycle and running-total cost counters.
    pub fn update_cost(&self, profile: &mut FunctionProfile) {
        let cost = self.model.cycle_cost(
            profile.cycle_execution_time,
            profile.provisioned_memory,
            profile.provisioned_cpu,
            profile.cycle_invocations,
        );
        profile.cycle_cost = cost;
        profile.total_cost += cost;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lambda_pricing_matches_published_formula() {
        // 1000 ms at 1024 MB with one request
        let cost = PricingModel::Lambda.cycle_cost(1000, 1024, 1700, 1);
        let expected = 1.0 * 1.0 * 0.00001667 + 0.00000002;
        assert!((cost - expected).abs() < 1e-12);
    }

    #[test]
    fn google_pricing_charges_cpu_and_memory() {
        let cost = PricingModel::Google.cycle_cost(2000, 512, 800, 3);
        let expected = 2.0 * 0.5 * 0.0000025 + 2.0 * 0.8 * 0.0000100 + 3.0 * 0.00000002;
        assert!((cost - expected).abs() < 1e-12);
    }

    #[test]
    fn pricing_model_resolution() {
        assert_eq!("AZURE".parse::<PricingModel>().unwrap(), PricingModel::Azure);
        assert!("OPENWHISK".parse::<PricingModel>().is_err());
    }
}
