//! Fleet roster and configuration boundaries
//!
//! The fleet is ephemeral: VM identifiers are re-derived from the configured
//! size on every tick, so there is no persistent identity beyond the label.
//! Changing the size between ticks changes which labels appear in new
//! batches; historical samples keep the ids they were written with.

use serde::Serialize;

/// Fleet sizes the configuration boundary accepts
pub const ALLOWED_FLEET_SIZES: [usize; 4] = [3, 5, 8, 10];

/// Inclusive bounds for the refresh cadence, in seconds
pub const MIN_REFRESH_SECS: u64 = 2;
pub const MAX_REFRESH_SECS: u64 = 10;

/// Configuration rejected at the boundary, before a session exists
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("fleet size must be one of {ALLOWED_FLEET_SIZES:?}, got {0}")]
    FleetSize(usize),
    #[error(
        "refresh interval must be between {MIN_REFRESH_SECS} and {MAX_REFRESH_SECS} seconds, got {0}"
    )]
    RefreshInterval(u64),
    #[error("store capacity must be non-zero when set")]
    StoreCapacity,
}

/// Validated number of virtual machines simulated per tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FleetSize(usize);

impl FleetSize {
    /// Validate a raw size against the allowed set
    pub fn new(size: usize) -> Result<Self, ConfigError> {
        if ALLOWED_FLEET_SIZES.contains(&size) {
            Ok(Self(size))
        } else {
            Err(ConfigError::FleetSize(size))
        }
    }

    pub fn get(self) -> usize {
        self.0
    }

    /// The roster for one tick: `VM-1` through `VM-<n>`, in order
    pub fn vm_ids(self) -> impl Iterator<Item = String> {
        (1..=self.0).map(|i| format!("VM-{i}"))
    }
}

impl Default for FleetSize {
    fn default() -> Self {
        Self(5)
    }
}

/// Validate a refresh cadence against the accepted range
pub fn validate_refresh_secs(secs: u64) -> Result<u64, ConfigError> {
    if (MIN_REFRESH_SECS..=MAX_REFRESH_SECS).contains(&secs) {
        Ok(secs)
    } else {
        Err(ConfigError::RefreshInterval(secs))
    }
}
