use clap::Parser;
use tokio::sync::watch;

use quizcam::cli::{self, Args, Command};
use quizcam::config::Config;
use quizcam::event_loop::setup_ctrlc_handler;

/// Environment variable holding the log filter (env_logger syntax).
const LOG_ENV: &str = "QUIZCAM_LOG";

fn load_env() {
    // Load .env file, don't override existing env vars
    // dotenv::dotenv() returns Err if .env doesn't exist, which is fine
    let _ = dotenv::dotenv();
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or(LOG_ENV, "info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn run(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    setup_ctrlc_handler(shutdown_tx)
        .map_err(|e| format!("Failed to install Ctrl+C handler: {}", e))?;

    let load = || Config::load(args.config.as_deref());

    match args.command {
        Command::Capture(capture) => cli::run_capture(load()?, capture, shutdown_rx).await,
        Command::Watch { session, relay } => {
            cli::run_watch_session(load()?, session, relay, shutdown_rx).await
        }
        Command::Relay { listen } => cli::run_relay(&listen, shutdown_rx).await,
        Command::Score {
            image,
            answer_mode,
            scorer_url,
        } => cli::score_file(load()?, &image, answer_mode, scorer_url).await,
        Command::Config { action } => cli::handle_config_action(action, args.config.as_deref()),
    }
}

fn main() {
    // Load .env file before anything else
    load_env();
    init_logging();

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
