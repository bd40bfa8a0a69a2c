//! Decides when to photograph and hands shots to the dispatcher.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::camera::Frame;
use crate::dispatch::Dispatcher;
use crate::job::Job;
use crate::stability::{Analysis, StabilityConfig, StabilityDetector};

use super::cooldown::Cooldown;
use super::encoder::CaptureEncoder;
use super::errors::CaptureError;

/// What makes the device take a photograph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// When the stability detector fires
    #[default]
    Auto,
    /// On a fixed timer
    Periodic,
    /// Only on the shutter command
    Manual,
}

impl CaptureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMode::Auto => "auto",
            CaptureMode::Periodic => "periodic",
            CaptureMode::Manual => "manual",
        }
    }

    /// auto -> periodic -> manual -> auto
    pub fn next(self) -> Self {
        match self {
            CaptureMode::Auto => CaptureMode::Periodic,
            CaptureMode::Periodic => CaptureMode::Manual,
            CaptureMode::Manual => CaptureMode::Auto,
        }
    }
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What asked for a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Stability,
    Timer,
    Shutter,
}

/// Result of a capture attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A job was queued
    Queued(Uuid),
    /// Suppressed by the cooldown
    CoolingDown(Duration),
    /// No usable frame was available
    NoFrame,
}

/// Owns the detector and cooldown, and feeds the dispatcher.
pub struct CaptureController {
    mode: CaptureMode,
    detector: StabilityDetector,
    cooldown: Cooldown,
    encoder: CaptureEncoder,
    dispatcher: Dispatcher,
}

impl CaptureController {
    pub fn new(
        mode: CaptureMode,
        stability: StabilityConfig,
        cooldown: Cooldown,
        encoder: CaptureEncoder,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            mode,
            detector: StabilityDetector::new(stability),
            cooldown,
            encoder,
            dispatcher,
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    /// Switch mode. The detector starts over.
    pub fn set_mode(&mut self, mode: CaptureMode) {
        if mode != self.mode {
            log::info!("Capture mode: {} -> {}", self.mode, mode);
        }
        self.mode = mode;
        self.detector.reset();
    }

    pub fn cycle_mode(&mut self) -> CaptureMode {
        self.set_mode(self.mode.next());
        self.mode
    }

    pub fn detector(&self) -> &StabilityDetector {
        &self.detector
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// One analysis tick. Frames are only analysed in auto mode.
    pub fn on_frame(
        &mut self,
        frame: &Frame,
        now: Instant,
    ) -> Result<Option<(Analysis, CaptureOutcome)>, CaptureError> {
        if self.mode != CaptureMode::Auto {
            return Ok(None);
        }
        let Some(analysis) = self.detector.analyze(frame) else {
            return Ok(None);
        };
        if !analysis.triggered {
            return Ok(None);
        }

        let outcome = self.capture(Some(frame), Trigger::Stability, now);
        self.detector.hand_off();
        outcome.map(|o| Some((analysis, o)))
    }

    /// Periodic timer fired. Ignored outside periodic mode.
    pub fn on_timer(
        &mut self,
        frame: Option<&Frame>,
        now: Instant,
    ) -> Result<Option<CaptureOutcome>, CaptureError> {
        if self.mode != CaptureMode::Periodic {
            return Ok(None);
        }
        self.capture(frame, Trigger::Timer, now).map(Some)
    }

    /// Manual shutter. Works in every mode, bypassing the detector.
    pub fn shutter(
        &mut self,
        frame: Option<&Frame>,
        now: Instant,
    ) -> Result<CaptureOutcome, CaptureError> {
        self.capture(frame, Trigger::Shutter, now)
    }

    fn capture(
        &mut self,
        frame: Option<&Frame>,
        trigger: Trigger,
        now: Instant,
    ) -> Result<CaptureOutcome, CaptureError> {
        let Some(frame) = frame.filter(|f| f.is_usable()) else {
            log::debug!("{:?} capture skipped: no frame", trigger);
            return Ok(CaptureOutcome::NoFrame);
        };
        if !self.cooldown.is_ready(now) {
            let remaining = self.cooldown.remaining(now);
            log::debug!("{:?} capture suppressed, cooling down {:?}", trigger, remaining);
            return Ok(CaptureOutcome::CoolingDown(remaining));
        }

        let image = self.encoder.encode(frame)?;
        let job = Job::new(image);
        self.encoder.save_copy(&job);
        self.cooldown.mark(now);

        let size = job.image.len();
        let id = self.dispatcher.enqueue(job);
        log::info!("{:?} capture queued as {} ({} bytes)", trigger, id, size);
        Ok(CaptureOutcome::Queued(id))
    }
}
