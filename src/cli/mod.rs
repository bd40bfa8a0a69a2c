//! Command-line interface definitions and helpers.
//!
//! This module contains all CLI argument parsing, enums, and subcommand handlers.

mod args;
mod commands;
mod enums;

pub use args::{Args, CaptureArgs, Command, ConfigAction};
pub use commands::{
    build_scorer, connect_bus, handle_config_action, open_source, run_capture, run_relay,
    run_watch_session, score_file,
};
pub use enums::{AnswerMode, Mode};
