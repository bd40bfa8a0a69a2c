//! Frame sources for the capture pipeline.
//!
//! - Live camera capture via [`FfmpegSource`]
//! - Still images via [`StillSource`]
//! - Rate-limited pulling via [`FrameSampler`]

mod ffmpeg;
mod source;
mod types;

pub use ffmpeg::{FfmpegSettings, FfmpegSource};
pub use source::{FrameSampler, FrameSource, StillSource};
pub use types::{Frame, FrameFormat, Resolution, SourceError};
