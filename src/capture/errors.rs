//! Error types for capture operations.

use std::path::PathBuf;

/// Errors that can occur while turning a frame into a queued job
#[derive(Debug)]
pub enum CaptureError {
    /// The frame's buffer does not match its dimensions
    InvalidFrame { width: u32, height: u32, len: usize },
    /// JPEG encoding failed
    Encode(image::ImageError),
    /// The save directory could not be created
    SaveDir { path: PathBuf, source: std::io::Error },
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::InvalidFrame { width, height, len } => write!(
                f,
                "Frame of {}x{} has only {} bytes of pixel data",
                width, height, len
            ),
            CaptureError::Encode(e) => write!(f, "Failed to encode capture: {}", e),
            CaptureError::SaveDir { path, source } => write!(
                f,
                "Cannot use save directory {}: {}\n\nCheck the path or remove `save_dir` from the config.",
                path.display(),
                source
            ),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Encode(e) => Some(e),
            CaptureError::SaveDir { source, .. } => Some(source),
            CaptureError::InvalidFrame { .. } => None,
        }
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(e: image::ImageError) -> Self {
        CaptureError::Encode(e)
    }
}
