//! Capture triggering: turning steady frames, timer ticks, and shutter
//! presses into queued jobs.

mod controller;
mod cooldown;
mod encoder;
mod errors;

pub use controller::{CaptureController, CaptureMode, CaptureOutcome, Trigger};
pub use cooldown::{Cooldown, DEFAULT_COOLDOWN};
pub use encoder::{CaptureEncoder, DEFAULT_JPEG_QUALITY};
pub use errors::CaptureError;
