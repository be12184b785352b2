//! Monitor configuration
//!
//! Values come from the environment with a `MONITOR_` prefix. Range checks
//! happen here, at the boundary: the core never sees a fleet size outside
//! the allowed set or a cadence outside the accepted range.

use anyhow::Result;
use monitor_lib::classifier::ClassifierArtifacts;
use monitor_lib::fleet::{self, ConfigError, FleetSize};
use monitor_lib::store::StoreConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Number of virtual machines simulated per tick
    #[serde(default = "default_fleet_size")]
    pub fleet_size: usize,

    /// Seconds between refresh ticks
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// API server port for health/metrics/query endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Path to the serialized classifier model (ONNX)
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    /// Path to the class-label table (JSON array)
    #[serde(default)]
    pub labels_path: Option<PathBuf>,

    /// Path to the optional feature scaler (JSON)
    #[serde(default)]
    pub scaler_path: Option<PathBuf>,

    /// Optional retention cap for the telemetry store
    #[serde(default)]
    pub store_capacity: Option<usize>,
}

fn default_fleet_size() -> usize {
    5
}

fn default_refresh_interval() -> u64 {
    3
}

fn default_api_port() -> u16 {
    8080
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            fleet_size: default_fleet_size(),
            refresh_interval_secs: default_refresh_interval(),
            api_port: default_api_port(),
            model_path: None,
            labels_path: None,
            scaler_path: None,
            store_capacity: None,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("MONITOR"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }

    /// Validated fleet size
    pub fn fleet(&self) -> Result<FleetSize, ConfigError> {
        FleetSize::new(self.fleet_size)
    }

    /// Validated refresh cadence
    pub fn refresh_interval(&self) -> Result<Duration, ConfigError> {
        fleet::validate_refresh_secs(self.refresh_interval_secs).map(Duration::from_secs)
    }

    /// Validated store configuration
    pub fn store(&self) -> Result<StoreConfig, ConfigError> {
        match self.store_capacity {
            Some(0) => Err(ConfigError::StoreCapacity),
            capacity => Ok(StoreConfig { capacity }),
        }
    }

    /// Classifier artifact locations
    pub fn artifacts(&self) -> ClassifierArtifacts {
        ClassifierArtifacts {
            model_path: self.model_path.clone(),
            labels_path: self.labels_path.clone(),
            scaler_path: self.scaler_path.clone(),
        }
    }
}
