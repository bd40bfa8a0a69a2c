//! Frame sources and the rate-limited sampler that pulls from them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};

use super::types::{Frame, SourceError};

/// Image extensions accepted by [`StillSource`] when reading a directory.
const STILL_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Anything that can hand out the most recent full-resolution frame.
///
/// Implementations never block: a source that has not produced a frame yet
/// returns `None` and the caller retries on its next tick.
pub trait FrameSource: Send {
    /// Latest frame seen by the source, if any.
    fn latest_frame(&mut self) -> Option<Frame>;

    /// Short human-readable description for logs and the status line.
    fn describe(&self) -> String;

    /// Why the source stopped producing frames, once it has.
    fn failure(&self) -> Option<String> {
        None
    }
}

/// Serves decoded still images, cycling through them one per pull.
///
/// Pointed at a single file it behaves like a perfectly steady camera;
/// pointed at a directory it plays the images back in name order.
pub struct StillSource {
    frames: Vec<Frame>,
    cursor: usize,
    origin: String,
}

impl StillSource {
    /// Load a single image or every image in a directory.
    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        let files = if path.is_dir() {
            let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| has_still_extension(p))
                .collect();
            files.sort();
            files
        } else {
            vec![path.to_path_buf()]
        };

        if files.is_empty() {
            return Err(SourceError::NoImages(path.to_path_buf()));
        }

        let mut frames = Vec::with_capacity(files.len());
        for file in &files {
            let rgb = image::open(file)
                .map_err(|e| SourceError::ImageLoad {
                    path: file.clone(),
                    source: e,
                })?
                .to_rgb8();
            let (width, height) = rgb.dimensions();
            frames.push(Frame::rgb(rgb.into_raw(), width, height));
        }

        log::info!("Loaded {} still frame(s) from {}", frames.len(), path.display());
        Ok(Self {
            frames,
            cursor: 0,
            origin: path.display().to_string(),
        })
    }

    /// Build a source from frames already in memory.
    pub fn from_frames(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            cursor: 0,
            origin: "memory".to_string(),
        }
    }
}

impl FrameSource for StillSource {
    fn latest_frame(&mut self) -> Option<Frame> {
        if self.frames.is_empty() {
            return None;
        }
        let frame = self.frames[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.frames.len();
        Some(frame)
    }

    fn describe(&self) -> String {
        format!("still:{}", self.origin)
    }
}

fn has_still_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| STILL_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Pulls frames from a [`FrameSource`] no faster than a fixed period.
///
/// Missed ticks are skipped rather than bursted so a slow consumer never
/// sees a backlog of stale frames.
pub struct FrameSampler {
    source: Box<dyn FrameSource>,
    interval: Interval,
}

impl FrameSampler {
    /// Create a sampler. Must be called from within a tokio runtime.
    pub fn new(source: Box<dyn FrameSource>, period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { source, interval }
    }

    /// Wait for the next tick and pull a frame.
    ///
    /// Returns `None` when the source has no usable frame yet.
    pub async fn next(&mut self) -> Option<Frame> {
        self.interval.tick().await;
        self.sample()
    }

    /// Pull a frame immediately, outside the tick schedule.
    pub fn sample(&mut self) -> Option<Frame> {
        self.source.latest_frame().filter(Frame::is_usable)
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }

    pub fn failure(&self) -> Option<String> {
        self.source.failure()
    }
}
