//! Gaussian cold-start and lookup delay models.
use rand::prelude::*;
use rand_distr::Normal;
use rand_pcg::Pcg64;

use crate::error::SimulationError;

/// Cold-start parameter tables of existing FaaS platforms, keyed by
/// provisioned memory. Values for LAMBDA and GOOGLE come from "Peeking Behind
/// the Curtains of Serverless Platforms" (ATC'18); AZURE instantiates every
/// function with the same 1.5 GB footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureModel {
    Lambda,
    Azure,
    Google,
}

impl FailureModel {
    fn cold_start_params(&self, provisioned_memory: u32) -> (f64, f64) {
        match self {
            Self::Lambda => match provisioned_memory {
                128 => (265.21, 354.43),
                256 => (261.46, 334.23),
                512 => (257.71, 314.03),
                1024 => (253.96, 293.83),
                1536 => (250.07, 273.63),
                2048 => (246.11, 253.43),
                _ => (0.0, 1.0),
            },
            Self::Azure => (242.66, 340.67),
            Self::Google => match provisioned_memory {
                128 => (493.04, 345.8),
                256 => (416.59, 301.5),
                512 => (340.14, 257.2),
                1024 => (263.69, 212.9),
                1536 => (187.24, 168.6),
                2048 => (110.77, 124.3),
                _ => (0.0, 1.0),
            },
        }
    }
}

enum DelayModel {
    Platform(FailureModel),
    Custom { cold_start: Normal<f64>, lookup: Normal<f64> },
}

/// Samples instance deployment delays from per-platform (or custom) Gaussian
/// models. All randomness flows through one explicitly seeded generator.
pub struct DelayInjector {
    model: DelayModel,
    rng: Pcg64,
}

impl DelayInjector {
    /// Builds an injector from a failure-model config string: one of the
    /// platform names or `CUSTOM(meanCold, sdCold, meanLookup, sdLookup)`.
    pub fn from_str(model: &str, seed: u64) -> Result<Self, SimulationError> {
        let model = model.trim();
        if let Some(params) = model.strip_prefix("CUSTOM") {
            let inner = params
                .trim()
                .strip_prefix('(')
                .and_then(|s| s.strip_suffix(')'))
                .ok_or_else(|| {
                    SimulationError::InvalidConfiguration(format!("malformed custom failure model: {}", model))
                })?;
            let values = inner
                .split(',')
                .map(|t| t.trim().parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| {
                    SimulationError::InvalidConfiguration(format!("malformed custom failure model: {}", model))
                })?;
            if values.len() != 4 {
                return Err(SimulationError::InvalidConfiguration(format!(
                    "custom failure model requires 4 parameters, got {}",
                    values.len()
                )));
            }
            return Self::custom(seed, values[0], values[1], values[2], values[3]);
        }
        let platform = match model {
            "LAMBDA" => FailureModel::Lambda,
            "AZURE" => FailureModel::Azure,
            "GOOGLE" => FailureModel::Google,
            other => {
                return Err(SimulationError::InvalidConfiguration(format!(
                    "unknown failure model: {}",
                    other
                )))
            }
        };
        Ok(Self {
            model: DelayModel::Platform(platform),
            rng: Pcg64::seed_from_u64(seed),
        })
    }

    /// Builds an injector with custom distribution parameters.
    pub fn custom(
        seed: u64,
        mean_cold_start: f64,
        sd_cold_start: f64,
        mean_lookup: f64,
        sd_lookup: f64,
    ) -> Result<Self, SimulationError> {
        let bad = |e: rand_distr::NormalError| SimulationError::InvalidConfiguration(format!("bad delay parameters: {}", e));
        Ok(Self {
            model: DelayModel::Custom {
                cold_start: Normal::new(mean_cold_start, sd_cold_start).map_err(bad)?,
                lookup: Normal::new(mean_lookup, sd_lookup).map_err(bad)?,
            },
            rng: Pcg64::seed_from_u64(seed),
        })
    }

    /// Samples the cold-start delay for one deployment, in ticks. Samples are
    /// folded to their absolute value so the delay is never negative.
    pub fn cold_start_delay(&mut self, provisioned_memory: u32) -> u64 {
        let sample = match &self.model {
            DelayModel::Custom { cold_start, .. } => cold_start.sample(&mut self.rng),
            DelayModel::Platform(platform) => {
                let (mean, sd) = platform.cold_start_params(provisioned_memory);
                match Normal::new(mean, sd) {
                    Ok(dist) => dist.sample(&mut self.rng),
                    Err(_) => mean,
                }
            }
        };
        sample.abs() as u64
    }

    /// Samples the image lookup delay, in ticks.
    pub fn lookup_delay(&mut self) -> u64 {
        let sample = match &self.model {
            DelayModel::Custom { lookup, .. } => lookup.sample(&mut self.rng),
            // platform tables only model cold starts
            DelayModel::Platform(_) => 0.0,
        };
        sample.abs() as u64
    }
}
