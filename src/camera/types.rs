//! Frame and source types shared by every frame source.

use std::time::Instant;

/// Frame geometry requested from a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 1280x720, enough detail for a printed exam question.
    pub const HD: Resolution = Resolution {
        width: 1280,
        height: 720,
    };
}

impl Default for Resolution {
    fn default() -> Self {
        Self::HD
    }
}

/// Pixel format of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// RGB format (3 bytes per pixel)
    Rgb,
}

/// A captured camera frame at full source resolution.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw pixel data in RGB format, row-major
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel format
    pub format: FrameFormat,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl Frame {
    /// Build an RGB frame stamped with the current instant.
    pub fn rgb(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            format: FrameFormat::Rgb,
            timestamp: Instant::now(),
        }
    }

    /// Get the number of bytes per pixel (3 for RGB).
    pub fn bytes_per_pixel(&self) -> usize {
        match self.format {
            FrameFormat::Rgb => 3,
        }
    }

    /// True when the frame has non-zero dimensions and enough bytes to cover them.
    pub fn is_usable(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len()
                >= self.width as usize * self.height as usize * self.bytes_per_pixel()
    }
}

/// Errors that can occur while opening or reading a frame source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("FFmpeg not found. Install it (e.g. `brew install ffmpeg` or `apt install ffmpeg`)")]
    FfmpegNotFound,

    #[error("Failed to start capture process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Capture process exposes no stdout")]
    NoOutput,

    #[error("Invalid resolution {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    #[error("No images found in {0}")]
    NoImages(std::path::PathBuf),

    #[error("Failed to load image {path}: {source}")]
    ImageLoad {
        path: std::path::PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
