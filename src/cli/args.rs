//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use crate::bus::DEFAULT_RELAY_ADDR;
use crate::config::Config;

use super::enums::{AnswerMode, Mode};

/// Photographs exam questions when the camera holds still and shares the answers
#[derive(Parser, Debug)]
#[command(name = "quizcam")]
#[command(version, about = "Hands-free question capture and answer relay", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Watch the camera and capture questions
    Capture(CaptureArgs),
    /// Follow a session's shots and answers from another device
    Watch {
        /// Session to follow
        #[arg(long)]
        session: Uuid,
        /// Relay address (host:port)
        #[arg(long)]
        relay: Option<String>,
    },
    /// Run a relay that carries session channels between devices
    Relay {
        /// Address to listen on
        #[arg(long, default_value = DEFAULT_RELAY_ADDR)]
        listen: String,
    },
    /// Score a single image file and print the answer
    Score {
        /// Image to score (JPEG)
        image: PathBuf,
        #[arg(long)]
        answer_mode: Option<AnswerMode>,
        /// Answer service base URL (mock scorer when absent)
        #[arg(long)]
        scorer_url: Option<String>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct CaptureArgs {
    /// Session id (a new one is generated when absent)
    #[arg(long)]
    pub session: Option<Uuid>,

    /// Capture trigger
    #[arg(long, short)]
    pub mode: Option<Mode>,

    /// Seconds between periodic captures
    #[arg(long, short, value_parser = clap::value_parser!(u32).range(1..))]
    pub interval: Option<u32>,

    /// Camera device (index or name)
    #[arg(long, short)]
    pub device: Option<String>,

    /// Serve an image file or directory instead of the camera
    #[arg(long)]
    pub still: Option<PathBuf>,

    #[arg(long)]
    pub answer_mode: Option<AnswerMode>,

    /// Answer service base URL (mock scorer when absent)
    #[arg(long)]
    pub scorer_url: Option<String>,

    /// Relay address (host:port) to share events on
    #[arg(long)]
    pub relay: Option<String>,

    /// Also keep every shot in this directory
    #[arg(long)]
    pub save_dir: Option<PathBuf>,
}

impl CaptureArgs {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(mode) = self.mode {
            config.capture.mode = mode.into();
        }
        if let Some(interval) = self.interval {
            config.capture.interval_secs = interval;
        }
        if let Some(device) = &self.device {
            config.source.device = device.clone();
        }
        if let Some(still) = &self.still {
            config.source.still = Some(still.clone());
        }
        if let Some(answer_mode) = self.answer_mode {
            config.capture.answer_mode = answer_mode.into();
        }
        if let Some(url) = &self.scorer_url {
            config.scorer.url = Some(url.clone());
        }
        if let Some(relay) = &self.relay {
            config.bus.relay = Some(relay.clone());
        }
        if let Some(dir) = &self.save_dir {
            config.capture.save_dir = Some(dir.clone());
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Create default config file
    Init,
}
