use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_SIMULATION_DELTA: f64 = 1.0 / 60.0;
pub const DEFAULT_MAX_WALL_DELTA: f64 = 1.0 / 30.0;
pub const DEFAULT_METRICS_LOG_INTERVAL: f64 = 1.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to read loop config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid loop config at `{field}`: {source}")]
    Parse {
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{field} must be a positive finite number of seconds, got {value}")]
    InvalidSeconds { field: &'static str, value: f64 },
    #[error("max_wall_delta {max_wall_delta} must exceed simulation_delta {simulation_delta}")]
    ClampNotAboveStep {
        simulation_delta: f64,
        max_wall_delta: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "frameloop".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Timing options for a `FrameScheduler`, plus window options for the windowed runner.
///
/// All durations are seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopConfig {
    /// Fixed step handed to every update.
    pub simulation_delta: f64,
    /// Upper bound on the wall time consumed by one frame.
    pub max_wall_delta: f64,
    /// Keep the unconsumed part of a frame's wall time for the next frame.
    pub carry_remainder: bool,
    pub metrics_log_interval: f64,
    pub window: WindowConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            simulation_delta: DEFAULT_SIMULATION_DELTA,
            max_wall_delta: DEFAULT_MAX_WALL_DELTA,
            carry_remainder: false,
            metrics_log_interval: DEFAULT_METRICS_LOG_INTERVAL,
            window: WindowConfig::default(),
        }
    }
}

impl LoopConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let deserializer = &mut serde_json::Deserializer::from_str(raw);
        let config: LoopConfig =
            serde_path_to_error::deserialize(deserializer).map_err(|err| ConfigError::Parse {
                field: err.path().to_string(),
                source: err.into_inner(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Loads the file named by `var`, or the defaults when it is unset.
    pub fn load_from_env(var: &'static str) -> Result<Self, ConfigError> {
        match env::var(var) {
            Ok(value) => Self::load_from_path(Path::new(&value)),
            Err(env::VarError::NotPresent) => Ok(Self::default()),
            Err(source) => Err(ConfigError::EnvVar { var, source }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_seconds("simulation_delta", self.simulation_delta)?;
        check_seconds("max_wall_delta", self.max_wall_delta)?;
        check_seconds("metrics_log_interval", self.metrics_log_interval)?;
        if self.max_wall_delta <= self.simulation_delta {
            return Err(ConfigError::ClampNotAboveStep {
                simulation_delta: self.simulation_delta,
                max_wall_delta: self.max_wall_delta,
            });
        }
        Ok(())
    }

    /// Replaces invalid durations with their defaults. A clamp that does not exceed the step is
    /// widened to two steps.
    pub fn normalized(mut self) -> Self {
        self.simulation_delta = normalize_seconds(
            "simulation_delta",
            self.simulation_delta,
            DEFAULT_SIMULATION_DELTA,
        );
        self.max_wall_delta =
            normalize_seconds("max_wall_delta", self.max_wall_delta, DEFAULT_MAX_WALL_DELTA);
        self.metrics_log_interval = normalize_seconds(
            "metrics_log_interval",
            self.metrics_log_interval,
            DEFAULT_METRICS_LOG_INTERVAL,
        );
        if self.max_wall_delta <= self.simulation_delta {
            let widened = self.simulation_delta * 2.0;
            warn!(
                simulation_delta = self.simulation_delta,
                max_wall_delta = self.max_wall_delta,
                widened,
                "max_wall_delta does not exceed simulation_delta; widening"
            );
            self.max_wall_delta = widened;
        }
        self
    }
}

fn check_seconds(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidSeconds { field, value })
    }
}

fn normalize_seconds(field: &'static str, value: f64, fallback: f64) -> f64 {
    if check_seconds(field, value).is_ok() {
        value
    } else {
        warn!(field, value, fallback, "invalid loop config value; using default");
        fallback
    }
}
