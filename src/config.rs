//! Experiment configuration.
use std::path::Path;

use serde::Deserialize;

use crate::error::SimulationError;

fn default_queue_size() -> usize {
    10000
}

fn default_oob_threshold() -> f64 {
    0.5
}

fn default_prediction_error_margin() -> f64 {
    0.1
}

fn default_forecast_error_margin() -> f64 {
    0.15
}

/// One homogeneous group of machines.
#[derive(Debug, Clone, Deserialize)]
pub struct MachineGroupConfig {
    pub cpu: f64,
    pub memory: f64,
    #[serde(default = "one")]
    pub count: usize,
}

fn one() -> usize {
    1
}

/// One simulated scenario, loaded from a YAML document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    #[serde(default)]
    pub name: String,
    pub machines: Vec<MachineGroupConfig>,
    pub pricing_model: String,
    pub failure_model: String,
    #[serde(default = "default_queue_size")]
    pub request_queue_size: usize,
    pub allocation_policy: String,
    pub routing_policy: String,
    pub management_policy: String,
    pub instance_idle_timeout: Option<u64>,
    pub histogram_limit: Option<u64>,
    pub histogram_class_width: Option<u64>,
    #[serde(default = "default_oob_threshold")]
    pub histogram_oob_threshold: f64,
    #[serde(default = "default_prediction_error_margin")]
    pub prediction_error_margin: f64,
    #[serde(default = "default_forecast_error_margin")]
    pub forecast_error_margin: f64,
    #[serde(default)]
    pub idle_memory_penalty: f64,
    #[serde(default)]
    pub verbose: bool,
}

impl ExperimentConfig {
    pub fn from_file(path: &Path) -> Result<Self, SimulationError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: ExperimentConfig = serde_yaml::from_str(&raw)?;
        if config.name.is_empty() {
            config.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "scenario".to_string());
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.machines.is_empty() {
            return Err(SimulationError::InvalidConfiguration(
                "at least one machine is required".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.idle_memory_penalty) {
            return Err(SimulationError::InvalidConfiguration(format!(
                "idle_memory_penalty must be within [0, 1], got {}",
                self.idle_memory_penalty
            )));
        }
        if !["sequential", "random"].contains(&self.allocation_policy.as_str()) {
            return Err(SimulationError::InvalidConfiguration(format!(
                "unknown allocation policy: {}",
                self.allocation_policy
            )));
        }
        if !["sequential", "least-idletime", "highest-idletime", "random"].contains(&self.routing_policy.as_str()) {
            return Err(SimulationError::InvalidConfiguration(format!(
                "unknown routing policy: {}",
                self.routing_policy
            )));
        }
        match self.management_policy.as_str() {
            "fixed-keep-alive" => {
                if self.instance_idle_timeout.is_none() {
                    return Err(SimulationError::InvalidConfiguration(
                        "fixed-keep-alive requires instance_idle_timeout".to_string(),
                    ));
                }
            }
            "no-termination" => {}
            "hybrid-histogram" => match (self.histogram_limit, self.histogram_class_width) {
                (Some(limit), Some(class_width)) => {
                    if limit == 0 || class_width == 0 {
                        return Err(SimulationError::InvalidConfiguration(
                            "histogram_limit and histogram_class_width must be at least 1".to_string(),
                        ));
                    }
                }
                _ => {
                    return Err(SimulationError::InvalidConfiguration(
                        "hybrid-histogram requires histogram_limit and histogram_class_width".to_string(),
                    ));
                }
            },
            other => {
                return Err(SimulationError::InvalidConfiguration(format!(
                    "unknown management policy: {}",
                    other
                )))
            }
        }
        Ok(())
    }

    /// One-line parameter summary for the final report.
    pub fn parameter_string(&self) -> String {
        format!(
            "{}: alloc={} routing={} management={} pricing={} failure={} penalty={}",
            self.name,
            self.allocation_policy,
            self.routing_policy,
            self.management_policy,
            self.pricing_model,
            self.failure_model,
            self.idle_memory_penalty
        )
    }
}

/// Loads every YAML config in a directory in sorted file-name order.
pub fn load_experiments(dir: &Path) -> Result<Vec<ExperimentConfig>, SimulationError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .map(|e| e == "yaml" || e == "yml")
            .unwrap_or(false);
        if path.is_file() && is_yaml {
            files.push(path);
        }
    }
    files.sort();
    if files.is_empty() {
        return Err(SimulationError::InvalidConfiguration(format!(
            "no experiment configs found in {}",
            dir.display()
        )));
    }
    files.iter().map(|f| ExperimentConfig::from_file(f)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ExperimentConfig {
        serde_yaml::from_str(
            r#"
            name: test
            machines:
              - cpu: 4000.0
                memory: 8192.0
                count: 2
            pricing_model: LAMBDA
            failure_model: LAMBDA
            allocation_policy: sequential
            routing_policy: least-idletime
            management_policy: no-termination
            "#,
        )
        .unwrap()
    }

    #[test]
    fn defaults_are_applied() {
        let config = base_config();
        assert_eq!(config.request_queue_size, 10000);
        assert!((config.histogram_oob_threshold - 0.5).abs() < 1e-12);
        assert!((config.prediction_error_margin - 0.1).abs() < 1e-12);
        assert!((config.forecast_error_margin - 0.15).abs() < 1e-12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn out_of_range_penalty_is_rejected() {
        let mut config = base_config();
        config.idle_memory_penalty = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn hybrid_histogram_requires_parameters() {
        let mut config = base_config();
        config.management_policy = "hybrid-histogram".to_string();
        assert!(config.validate().is_err());
        config.histogram_limit = Some(4_000_000);
        config.histogram_class_width = Some(60_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_histogram_parameters_are_rejected() {
        // a zero class width would make every histogram insertion divide by
        // zero, so it must never pass validation
        let mut config = base_config();
        config.management_policy = "hybrid-histogram".to_string();
        config.histogram_limit = Some(4_000_000);
        config.histogram_class_width = Some(0);
        assert!(config.validate().is_err());
        config.histogram_limit = Some(0);
        config.histogram_class_width = Some(60_000);
        assert!(config.validate().is_err());
        config.histogram_limit = Some(4_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_policies_are_rejected() {
        let mut config = base_config();
        config.routing_policy = "round-robin".to_string();
        assert!(config.validate().is_err());
    }
}
