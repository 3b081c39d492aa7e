//! Player configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Initial volume (0.0 - 1.0)
    pub volume: f64,
    /// Accent color handed to the player chrome
    pub theme_color: String,
    /// Mini-player behavior
    pub mini: MiniModeConfig,
    /// Adaptive-stream engine settings
    pub stream: StreamEngineConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            volume: 0.7,
            theme_color: "#fa8c16".to_string(),
            mini: MiniModeConfig::default(),
            stream: StreamEngineConfig::default(),
        }
    }
}

impl PlayerConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PlayerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(Error::InvalidConfig(format!(
                "volume must be within 0..=1, got {}",
                self.volume
            )));
        }
        self.mini.validate()
    }
}

/// How the viewport position of the host element is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiniTrigger {
    /// Visible-ratio thresholds from an intersection observer
    #[default]
    Intersection,
    /// Bounding-rect edges sampled every animation frame
    BoundingRect,
}

/// Mini-player thresholds.
///
/// `enter_ratio < exit_ratio` forms the hysteresis band that keeps the
/// player from flickering around a single threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiniModeConfig {
    pub enabled: bool,
    pub trigger: MiniTrigger,
    /// Enter mini mode when the visible ratio drops below this
    pub enter_ratio: f64,
    /// Leave mini mode when the visible ratio rises above this
    pub exit_ratio: f64,
    /// Scroll offsets at or under this count as "back at the top"
    pub top_reset_px: f64,
    /// BoundingRect: enter when the element bottom is above this line
    pub enter_bottom_px: f64,
    /// BoundingRect: leave when the element top is below this line
    pub exit_top_px: f64,
    /// Viewports narrower than this (phones) never go mini
    pub min_viewport_width: f64,
}

impl Default for MiniModeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger: MiniTrigger::Intersection,
            enter_ratio: 0.1,
            exit_ratio: 0.5,
            top_reset_px: 0.0,
            enter_bottom_px: 100.0,
            exit_top_px: -50.0,
            min_viewport_width: 768.0,
        }
    }
}

impl MiniModeConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.enter_ratio) || !(0.0..=1.0).contains(&self.exit_ratio) {
            return Err(Error::InvalidConfig(
                "mini ratios must be within 0..=1".to_string(),
            ));
        }
        if self.enter_ratio >= self.exit_ratio {
            return Err(Error::InvalidConfig(format!(
                "mini enter_ratio ({}) must be below exit_ratio ({})",
                self.enter_ratio, self.exit_ratio
            )));
        }
        if self.top_reset_px < 0.0 {
            return Err(Error::InvalidConfig(
                "mini top_reset_px must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Thresholds an intersection observer should report on
    pub fn observer_thresholds(&self) -> [f64; 2] {
        [self.enter_ratio, self.exit_ratio]
    }
}

/// Adaptive-stream engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamEngineConfig {
    /// Let the stream engine demux in a web worker
    pub enable_worker: bool,
}

impl Default for StreamEngineConfig {
    fn default() -> Self {
        Self {
            enable_worker: true,
        }
    }
}
