//! Pipeline configuration
//!
//! Configuration is a plain serde struct so it can be built in code, loaded from a
//! JSON file, or overridden field by field from the command line. Every value is
//! checked by [`PipelineConfig::validate`] before a run starts.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time between cycles (milliseconds)
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Default number of samples per window
pub const DEFAULT_WINDOW_SIZE: usize = 50;

/// Default spacing between samples (milliseconds)
pub const DEFAULT_SAMPLE_SPACING_MS: u64 = 200;

/// Configuration for one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Time between scheduler ticks (milliseconds)
    pub tick_interval_ms: u64,
    /// Samples per generated window
    pub window_size: usize,
    /// Spacing between consecutive samples (milliseconds)
    pub sample_spacing_ms: u64,
    /// RNG seed; `None` seeds from OS entropy
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            window_size: DEFAULT_WINDOW_SIZE,
            sample_spacing_ms: DEFAULT_SAMPLE_SPACING_MS,
            seed: None,
        }
    }
}

impl PipelineConfig {
    pub fn new(tick_interval_ms: u64, window_size: usize, sample_spacing_ms: u64) -> Self {
        Self {
            tick_interval_ms,
            window_size,
            sample_spacing_ms,
            seed: None,
        }
    }

    /// Set a fixed RNG seed for reproducible runs
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Load configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, PipelineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject configurations that cannot drive a run
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.tick_interval_ms == 0 {
            return Err(PipelineError::InvalidConfig(
                "tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.window_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "window_size must be positive".to_string(),
            ));
        }
        if self.sample_spacing_ms == 0 {
            return Err(PipelineError::InvalidConfig(
                "sample_spacing_ms must be positive".to_string(),
            ));
        }
        // The oldest sample sits (window_size - 1) * spacing before "now"
        let span = (self.window_size as u64 - 1).checked_mul(self.sample_spacing_ms);
        if span.map_or(true, |s| s > i64::MAX as u64) {
            return Err(PipelineError::InvalidConfig(
                "window_size * sample_spacing_ms overflows the time range".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
