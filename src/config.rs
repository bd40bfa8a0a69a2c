//! Configuration file handling for quizcam.
//!
//! Loads configuration from `<config dir>/quizcam/config.toml` or a custom path.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::camera::{FfmpegSettings, Resolution};
use crate::capture::{CaptureMode, DEFAULT_COOLDOWN, DEFAULT_JPEG_QUALITY};
use crate::correlation::{DEFAULT_RETAIN, MAX_RETAIN, MIN_RETAIN};
use crate::scoring::AnswerKind;
use crate::stability::StabilityConfig;

/// Configuration file structure for quizcam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub stability: StabilityConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub scorer: ScorerConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub results: ResultsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub mode: CaptureMode,
    pub cooldown_ms: u64,
    /// Periodic-mode interval, also announced to viewers
    pub interval_secs: u32,
    pub jpeg_quality: u8,
    pub answer_mode: AnswerKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_dir: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mode: CaptureMode::Auto,
            cooldown_ms: DEFAULT_COOLDOWN.as_millis() as u64,
            interval_secs: 10,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            answer_mode: AnswerKind::MultipleChoice,
            save_dir: None,
        }
    }
}

impl CaptureConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_secs.max(1)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// ffmpeg `-f` input format; platform default when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_format: Option<String>,
    /// Image file or directory to serve instead of a camera
    #[serde(skip_serializing_if = "Option::is_none")]
    pub still: Option<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        let settings = FfmpegSettings::default();
        Self {
            device: settings.device,
            width: settings.resolution.width,
            height: settings.resolution.height,
            fps: settings.fps,
            input_format: None,
            still: None,
        }
    }
}

impl SourceConfig {
    pub fn ffmpeg_settings(&self) -> FfmpegSettings {
        FfmpegSettings {
            device: self.device.clone(),
            input_format: self.input_format.clone(),
            resolution: Resolution::new(self.width, self.height),
            fps: self.fps,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Base URL of the answer service; the mock scorer is used when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub connect_timeout_secs: u64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            url: None,
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BusConfig {
    /// `host:port` of a relay; events are not shared when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultsConfig {
    pub retain: usize,
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            retain: DEFAULT_RETAIN,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed or is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })?;
            config.validate().map_err(|message| ConfigError::Invalid {
                path: path.clone(),
                message,
            })?;
            Ok(config)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Config::default())
        }
    }

    /// Check value ranges. Also used after CLI overrides are applied.
    pub fn validate(&self) -> Result<(), String> {
        self.stability.validate()?;
        if self.capture.interval_secs < 1 {
            return Err("capture.interval_secs must be at least 1".to_string());
        }
        if !(1..=100).contains(&self.capture.jpeg_quality) {
            return Err(format!(
                "capture.jpeg_quality must be in 1..=100, got {}",
                self.capture.jpeg_quality
            ));
        }
        if !(MIN_RETAIN..=MAX_RETAIN).contains(&self.results.retain) {
            return Err(format!(
                "results.retain must be in {}..={}, got {}",
                MIN_RETAIN, MAX_RETAIN, self.results.retain
            ));
        }
        if self.source.width == 0 || self.source.height == 0 || self.source.fps == 0 {
            return Err("source.width, source.height and source.fps must be positive".to_string());
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeError)
    }

    /// Write the defaults to `path`, refusing to overwrite an existing file.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }
        let content = Config::default().to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    Invalid {
        path: PathBuf,
        message: String,
    },
    SerializeError(toml::ser::Error),
    AlreadyExists(PathBuf),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Invalid { path, message } => {
                write!(f, "Invalid config file '{}': {}", path.display(), message)
            }
            ConfigError::SerializeError(source) => {
                write!(f, "Failed to serialize config: {}", source)
            }
            ConfigError::AlreadyExists(path) => {
                write!(f, "Config file '{}' already exists", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::SerializeError(source) => Some(source),
            ConfigError::Invalid { .. } | ConfigError::AlreadyExists(_) => None,
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("quizcam").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/quizcam/config.toml")
        })
}
