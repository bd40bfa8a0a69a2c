//! Live camera source backed by an `ffmpeg` child process.
//!
//! FFmpeg reads the platform camera device and writes raw RGB24 frames of a
//! fixed size to stdout. A reader thread keeps only the most recent frame in a
//! shared buffer, so pulling a frame never blocks the event loop.

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::source::FrameSource;
use super::types::{Frame, Resolution, SourceError};

/// How long to wait for FFmpeg to exit after SIGINT before killing it.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Settings for an FFmpeg-backed camera.
#[derive(Debug, Clone)]
pub struct FfmpegSettings {
    /// Device identifier as the input format understands it ("0", "/dev/video0", ...)
    pub device: String,
    /// FFmpeg input format (`-f`); platform default when `None`
    pub input_format: Option<String>,
    /// Size frames are scaled to before they reach us
    pub resolution: Resolution,
    /// Requested capture frame rate
    pub fps: u32,
}

impl Default for FfmpegSettings {
    fn default() -> Self {
        Self {
            device: "0".to_string(),
            input_format: None,
            resolution: Resolution::default(),
            fps: 30,
        }
    }
}

impl FfmpegSettings {
    /// Input format used when none is configured.
    pub fn platform_input_format() -> &'static str {
        if cfg!(target_os = "macos") {
            "avfoundation"
        } else if cfg!(target_os = "windows") {
            "dshow"
        } else {
            "v4l2"
        }
    }

    /// Device path adjusted for the input format (bare indices become `/dev/videoN` on v4l2).
    fn device_path(&self, format: &str) -> String {
        match format {
            "v4l2" if self.device.chars().all(|c| c.is_ascii_digit()) => {
                format!("/dev/video{}", self.device)
            }
            "dshow" if !self.device.starts_with("video=") => format!("video={}", self.device),
            _ => self.device.clone(),
        }
    }

    /// Build the FFmpeg argument list (excluding the `ffmpeg` command itself).
    pub fn args(&self) -> Vec<String> {
        let format = self
            .input_format
            .clone()
            .unwrap_or_else(|| Self::platform_input_format().to_string());
        let device = self.device_path(&format);

        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            format,
            "-framerate".to_string(),
            self.fps.to_string(),
            "-i".to_string(),
            device,
            "-vf".to_string(),
            format!(
                "scale={}:{}",
                self.resolution.width, self.resolution.height
            ),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-".to_string(),
        ]
    }

    /// Bytes in one RGB24 frame at the configured resolution.
    pub fn frame_size(&self) -> usize {
        self.resolution.width as usize * self.resolution.height as usize * 3
    }
}

/// Camera handle backed by a running FFmpeg process.
pub struct FfmpegSource {
    child: Child,
    frame_buffer: Arc<Mutex<Option<Frame>>>,
    /// Set by the reader when the stream ends without being asked to stop
    failure: Arc<Mutex<Option<String>>>,
    /// Last line FFmpeg wrote to stderr
    last_stderr: Arc<Mutex<Option<String>>>,
    stop_signal: Arc<AtomicBool>,
    reader_thread: Option<JoinHandle<()>>,
    settings: FfmpegSettings,
}

impl std::fmt::Debug for FfmpegSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegSource")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl FfmpegSource {
    /// Spawn FFmpeg and start reading frames in a background thread.
    ///
    /// # Errors
    /// * `SourceError::InvalidResolution` - If either dimension is zero
    /// * `SourceError::FfmpegNotFound` - If `ffmpeg` is not on PATH
    /// * `SourceError::SpawnFailed` - If the process cannot be started
    pub fn spawn(settings: FfmpegSettings) -> Result<Self, SourceError> {
        let Resolution { width, height } = settings.resolution;
        if width == 0 || height == 0 {
            return Err(SourceError::InvalidResolution { width, height });
        }

        let mut child = Command::new("ffmpeg")
            .args(settings.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    SourceError::FfmpegNotFound
                } else {
                    SourceError::SpawnFailed(e)
                }
            })?;

        let last_stderr = Arc::new(Mutex::new(None));
        if let Some(stderr) = child.stderr.take() {
            let last = Arc::clone(&last_stderr);
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines() {
                    match line {
                        Ok(l) => {
                            log::debug!("[ffmpeg] {}", l);
                            if !l.trim().is_empty() {
                                *last.lock().unwrap_or_else(PoisonError::into_inner) = Some(l);
                            }
                        }
                        Err(_) => break,
                    }
                }
            });
        }

        let stdout = child.stdout.take().ok_or(SourceError::NoOutput)?;
        let frame_buffer = Arc::new(Mutex::new(None));
        let failure = Arc::new(Mutex::new(None));
        let stop_signal = Arc::new(AtomicBool::new(false));

        let reader = FrameReader {
            settings: settings.clone(),
            buffer: Arc::clone(&frame_buffer),
            failure: Arc::clone(&failure),
            stop: Arc::clone(&stop_signal),
        };
        let reader_thread = thread::spawn(move || reader.run(stdout));

        log::info!(
            "Camera started: device={} {}x{}@{}fps",
            settings.device,
            width,
            height,
            settings.fps
        );

        Ok(Self {
            child,
            frame_buffer,
            failure,
            last_stderr,
            stop_signal,
            reader_thread: Some(reader_thread),
            settings,
        })
    }

    /// Check if the FFmpeg process is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Stop FFmpeg: SIGINT first, then kill after a grace period.
    pub fn shutdown(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);

        #[cfg(unix)]
        {
            // SAFETY: the pid belongs to our own child process.
            unsafe {
                libc::kill(self.child.id() as i32, libc::SIGINT);
            }
        }

        #[cfg(not(unix))]
        {
            let _ = self.child.kill();
        }

        let start = Instant::now();
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) if start.elapsed() > SHUTDOWN_TIMEOUT => {
                    let _ = self.child.kill();
                    let _ = self.child.wait();
                    break;
                }
                Ok(None) => thread::sleep(Duration::from_millis(50)),
                Err(_) => break,
            }
        }

        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
        log::info!("Camera stopped");
    }
}

impl FrameSource for FfmpegSource {
    fn latest_frame(&mut self) -> Option<Frame> {
        self.frame_buffer.lock().ok()?.clone()
    }

    fn describe(&self) -> String {
        format!(
            "camera:{} {}x{}",
            self.settings.device, self.settings.resolution.width, self.settings.resolution.height
        )
    }

    /// The stream's end reason, preferring FFmpeg's own last complaint.
    fn failure(&self) -> Option<String> {
        let ended = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;
        let stderr = self
            .last_stderr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Some(stderr.unwrap_or(ended))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if self.is_running() {
            self.shutdown();
        }
    }
}

/// Reader-thread half of an [`FfmpegSource`].
struct FrameReader {
    settings: FfmpegSettings,
    buffer: Arc<Mutex<Option<Frame>>>,
    failure: Arc<Mutex<Option<String>>>,
    stop: Arc<AtomicBool>,
}

impl FrameReader {
    /// Read fixed-size RGB frames until EOF or stop, keeping only the newest.
    fn run(self, mut stream: impl Read) {
        let mut raw = vec![0u8; self.settings.frame_size()];

        while !self.stop.load(Ordering::Relaxed) {
            if let Err(e) = stream.read_exact(&mut raw) {
                if !self.stop.load(Ordering::Relaxed) {
                    log::warn!("Camera stream ended: {}", e);
                    *self.failure.lock().unwrap_or_else(PoisonError::into_inner) =
                        Some(format!("camera stream ended: {}", e));
                }
                break;
            }
            let frame = Frame::rgb(
                raw.clone(),
                self.settings.resolution.width,
                self.settings.resolution.height,
            );
            *self.buffer.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
        }
    }
}
