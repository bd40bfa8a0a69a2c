//! Tunable thresholds for the stability detector.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Thresholds for deciding when a scene is steady enough to photograph.
///
/// All values are fixed constants loaded from configuration; none of them
/// are derived from the frames at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Width frames are downscaled to before analysis (aspect ratio kept)
    pub analysis_width: u32,
    /// Fraction of each dimension kept by the centered region of interest
    pub roi_fraction: f32,
    /// Per-pixel luma difference (after exposure compensation) counted as motion
    pub pixel_diff_threshold: f32,
    /// Percentage of moving pixels below which a frame counts as stable
    pub motion_pct_threshold: f32,
    /// Consecutive stable frames required before a capture is triggered
    pub stable_frames: u32,
    /// Mean luma must be strictly above this (rejects near-black frames)
    pub luma_min: f32,
    /// Mean luma must be strictly below this (rejects blown-out frames)
    pub luma_max: f32,
    /// Period between analysis ticks
    pub tick_interval_ms: u64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            analysis_width: 160,
            roi_fraction: 0.5,
            pixel_diff_threshold: 18.0,
            motion_pct_threshold: 2.0,
            stable_frames: 8,
            luma_min: 40.0,
            luma_max: 220.0,
            tick_interval_ms: 100,
        }
    }
}

impl StabilityConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Check the ranges the detector relies on.
    pub fn validate(&self) -> Result<(), String> {
        if self.analysis_width < 8 {
            return Err(format!(
                "stability.analysis_width must be at least 8, got {}",
                self.analysis_width
            ));
        }
        if !(self.roi_fraction > 0.0 && self.roi_fraction <= 1.0) {
            return Err(format!(
                "stability.roi_fraction must be in (0, 1], got {}",
                self.roi_fraction
            ));
        }
        if self.stable_frames == 0 {
            return Err("stability.stable_frames must be at least 1".to_string());
        }
        if self.luma_min >= self.luma_max {
            return Err(format!(
                "stability.luma_min ({}) must be below luma_max ({})",
                self.luma_min, self.luma_max
            ));
        }
        if self.pixel_diff_threshold < 0.0 || self.motion_pct_threshold < 0.0 {
            return Err("stability thresholds must not be negative".to_string());
        }
        Ok(())
    }
}
