//! Frame-by-frame stability state machine.

use crate::camera::Frame;

use super::config::StabilityConfig;
use super::luma::{motion_percent, sample_region, LumaSample};

/// Where the detector is in its capture cycle.
///
/// `Initializing -> Searching <-> Stable -> Capturing -> (hand-off) -> Searching`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectorState {
    /// No frame analysed yet
    #[default]
    Initializing,
    /// Scene is moving or badly lit
    Searching,
    /// Scene is steady; counting consecutive stable frames
    Stable,
    /// A trigger was emitted and is waiting to be handed off
    Capturing,
}

impl DetectorState {
    pub fn name(&self) -> &'static str {
        match self {
            DetectorState::Initializing => "init",
            DetectorState::Searching => "searching",
            DetectorState::Stable => "stable",
            DetectorState::Capturing => "capturing",
        }
    }
}

/// Result of one analysis tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Analysis {
    /// State after this tick
    pub state: DetectorState,
    /// Mean luma of the region of interest
    pub mean_luma: f32,
    /// Exposure-compensated percentage of moving pixels
    pub motion_pct: f32,
    /// Whether the mean luma was inside the accepted band
    pub light_ok: bool,
    /// Consecutive stable frames after this tick
    pub stable_count: u32,
    /// True on exactly the tick that asks for a capture
    pub triggered: bool,
}

/// Decides, frame by frame, when the scene is steady and well lit enough
/// to photograph.
#[derive(Debug)]
pub struct StabilityDetector {
    config: StabilityConfig,
    previous: Option<LumaSample>,
    stable_count: u32,
    state: DetectorState,
    /// False between a trigger and its hand-off
    armed: bool,
    last: Option<Analysis>,
}

impl StabilityDetector {
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            config,
            previous: None,
            stable_count: 0,
            state: DetectorState::Initializing,
            armed: true,
            last: None,
        }
    }

    pub fn config(&self) -> &StabilityConfig {
        &self.config
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Most recent analysis, for display.
    pub fn last_analysis(&self) -> Option<Analysis> {
        self.last
    }

    /// Analyse one frame.
    ///
    /// Returns `None` (and leaves all state untouched) when the frame has no
    /// usable dimensions yet. Otherwise the previous-frame sample is replaced
    /// with this frame's sample whatever the outcome.
    pub fn analyze(&mut self, frame: &Frame) -> Option<Analysis> {
        let sample = sample_region(frame, self.config.analysis_width, self.config.roi_fraction)?;

        // First frame, or a geometry change, has nothing to compare against.
        let motion_pct = self
            .previous
            .as_ref()
            .and_then(|prev| motion_percent(&sample, prev, self.config.pixel_diff_threshold))
            .unwrap_or(0.0);
        let light_ok = sample.mean > self.config.luma_min && sample.mean < self.config.luma_max;
        let mut triggered = false;

        if !self.armed {
            // Holding in Capturing until the pending trigger is handed off.
        } else if light_ok && motion_pct < self.config.motion_pct_threshold {
            self.stable_count += 1;
            self.state = DetectorState::Stable;

            if self.stable_count >= self.config.stable_frames.max(1) {
                self.state = DetectorState::Capturing;
                self.stable_count = 0;
                self.armed = false;
                triggered = true;
            }
        } else {
            self.stable_count = 0;
            self.state = DetectorState::Searching;
        }

        let analysis = Analysis {
            state: self.state,
            mean_luma: sample.mean,
            motion_pct,
            light_ok,
            stable_count: self.stable_count,
            triggered,
        };
        self.previous = Some(sample);
        self.last = Some(analysis);
        Some(analysis)
    }

    /// Acknowledge that the last trigger was taken care of (captured or
    /// suppressed) and re-arm for the next cycle.
    pub fn hand_off(&mut self) {
        if self.state == DetectorState::Capturing {
            self.state = DetectorState::Searching;
        }
        self.armed = true;
    }

    /// Forget everything, e.g. when the capture mode is toggled.
    pub fn reset(&mut self) {
        self.previous = None;
        self.stable_count = 0;
        self.state = DetectorState::Initializing;
        self.armed = true;
        self.last = None;
    }
}
