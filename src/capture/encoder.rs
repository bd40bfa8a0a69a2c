//! JPEG encoding of captured frames.

use std::fs;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::camera::Frame;
use crate::job::Job;

use super::errors::CaptureError;

/// Default JPEG quality.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Turns frames into JPEG bytes, optionally keeping a copy on disk.
#[derive(Debug, Clone)]
pub struct CaptureEncoder {
    quality: u8,
    save_dir: Option<PathBuf>,
}

impl CaptureEncoder {
    /// `quality` is clamped to 1..=100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            save_dir: None,
        }
    }

    /// Also write every encoded shot to `dir`, creating it if needed.
    pub fn with_save_dir(mut self, dir: PathBuf) -> Result<Self, CaptureError> {
        fs::create_dir_all(&dir).map_err(|source| CaptureError::SaveDir {
            path: dir.clone(),
            source,
        })?;
        self.save_dir = Some(dir);
        Ok(self)
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn save_dir(&self) -> Option<&Path> {
        self.save_dir.as_deref()
    }

    pub fn encode(&self, frame: &Frame) -> Result<Vec<u8>, CaptureError> {
        let expected =
            frame.width as usize * frame.height as usize * frame.bytes_per_pixel();
        if frame.width == 0 || frame.height == 0 || frame.data.len() < expected {
            return Err(CaptureError::InvalidFrame {
                width: frame.width,
                height: frame.height,
                len: frame.data.len(),
            });
        }

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality).encode(
            &frame.data[..expected],
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )?;
        Ok(jpeg)
    }

    /// Write `job` to the save directory, if one is set. Failures are logged.
    pub fn save_copy(&self, job: &Job) -> Option<PathBuf> {
        let dir = self.save_dir.as_ref()?;
        let path = dir.join(format!("shot_{}.jpg", job.captured_at_millis));
        match fs::write(&path, &job.image) {
            Ok(()) => {
                log::debug!("Saved {}", path.display());
                Some(path)
            }
            Err(e) => {
                log::warn!("Could not save {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl Default for CaptureEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}
