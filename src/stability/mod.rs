//! Motion-stability detection.
//!
//! Each analysis tick downsamples the centered region of a frame to luma,
//! compares it with the previous tick after cancelling whole-frame exposure
//! shifts, and counts consecutive steady, well-lit frames. Reaching the
//! configured count emits a single capture trigger.

mod config;
mod detector;
mod luma;

pub use config::StabilityConfig;
pub use detector::{Analysis, DetectorState, StabilityDetector};
pub use luma::{luma, motion_percent, sample_region, LumaSample};
