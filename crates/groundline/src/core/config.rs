//! # Batch Configuration
//!
//! Tuning for the ground polyline batch: whether primitive builds complete on
//! a later tick, how many ticks an asynchronous build takes, and the vertical
//! extent of terrain that ground-clamped geometry must cover.

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};

/// Lowest terrain height on earth used for ground-clamped volumes, in meters
pub const DEFAULT_MIN_TERRAIN_HEIGHT: f64 = -415.0;

/// Highest terrain height on earth used for ground-clamped volumes, in meters
pub const DEFAULT_MAX_TERRAIN_HEIGHT: f64 = 8_800.0;

/// # Ground Polyline Batch Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Build primitives over several ticks instead of on the first poll
    pub asynchronous: bool,
    /// Pending polls before an asynchronous build completes
    pub build_latency_frames: u32,
    /// Lower bound of the terrain height range, in meters
    pub min_terrain_height: f64,
    /// Upper bound of the terrain height range, in meters
    pub max_terrain_height: f64,
}

impl BatchConfig {
    /// Configuration whose builds complete on their first poll
    pub fn synchronous() -> Self {
        Self {
            asynchronous: false,
            ..Self::default()
        }
    }

    /// Set whether builds are asynchronous
    pub fn with_asynchronous(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }

    /// Set the number of pending polls for asynchronous builds
    pub fn with_build_latency_frames(mut self, frames: u32) -> Self {
        self.build_latency_frames = frames;
        self
    }

    /// Set the terrain height range
    pub fn with_terrain_heights(mut self, min: f64, max: f64) -> Self {
        self.min_terrain_height = min;
        self.max_terrain_height = max;
        self
    }

    /// Pending polls a newly started build will report
    pub fn effective_latency(&self) -> u32 {
        if self.asynchronous {
            self.build_latency_frames
        } else {
            0
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            asynchronous: true,
            build_latency_frames: 2,
            min_terrain_height: DEFAULT_MIN_TERRAIN_HEIGHT,
            max_terrain_height: DEFAULT_MAX_TERRAIN_HEIGHT,
        }
    }
}

impl Config for BatchConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_terrain_height.is_finite() || !self.max_terrain_height.is_finite() {
            return Err(ConfigError::Invalid(
                "Terrain heights must be finite".to_string(),
            ));
        }
        if self.min_terrain_height > self.max_terrain_height {
            return Err(ConfigError::Invalid(format!(
                "Terrain height range is inverted: {} > {}",
                self.min_terrain_height, self.max_terrain_height
            )));
        }
        Ok(())
    }
}
