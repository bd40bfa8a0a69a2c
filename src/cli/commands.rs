//! Subcommand handlers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio::sync::watch;
use uuid::Uuid;

use super::args::{CaptureArgs, ConfigAction};
use super::enums::AnswerMode;
use crate::bus::{serve_relay, EventBus, NullBus, RelayBus, DEFAULT_RELAY_ADDR};
use crate::camera::{FfmpegSource, FrameSampler, FrameSource, SourceError, StillSource};
use crate::capture::{CaptureController, CaptureEncoder, Cooldown};
use crate::config::{default_path as get_config_path, BusConfig, Config, ScorerConfig, SourceConfig};
use crate::correlation::Correlator;
use crate::dispatch::{DispatchSettings, Dispatcher};
use crate::event_loop::{run_watch, CaptureLoop};
use crate::job::Session;
use crate::scoring::{AnswerKind, HttpScorer, MockScorer, ScoreError, ScoreRequest, Scorer};
use crate::status::StatusBar;

type CommandResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// The HTTP scorer when a URL is configured, the mock scorer otherwise.
pub fn build_scorer(config: &ScorerConfig) -> Result<Arc<dyn Scorer>, ScoreError> {
    match &config.url {
        Some(url) => {
            let timeout = Duration::from_secs(config.connect_timeout_secs);
            Ok(Arc::new(HttpScorer::new(url, timeout)?))
        }
        None => {
            log::warn!("No scorer URL configured, answers come from the mock scorer");
            Ok(Arc::new(MockScorer::new()))
        }
    }
}

/// Connect to the configured relay. Without one, or if it is unreachable,
/// events stay local.
pub async fn connect_bus(config: &BusConfig) -> Arc<dyn EventBus> {
    let Some(addr) = &config.relay else {
        log::info!("No relay configured, shots and answers stay on this device");
        return Arc::new(NullBus);
    };
    match RelayBus::connect(addr).await {
        Ok(bus) => Arc::new(bus),
        Err(e) => {
            log::warn!("{}; continuing without a relay", e);
            Arc::new(NullBus)
        }
    }
}

/// A still source when one is configured, the camera otherwise.
pub fn open_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>, SourceError> {
    match &config.still {
        Some(path) => Ok(Box::new(StillSource::from_path(path)?)),
        None => Ok(Box::new(FfmpegSource::spawn(config.ffmpeg_settings())?)),
    }
}

/// Run the capture loop until quit or Ctrl+C.
pub async fn run_capture(
    mut config: Config,
    args: CaptureArgs,
    shutdown: watch::Receiver<bool>,
) -> CommandResult {
    args.apply(&mut config);
    config.validate()?;

    let session = args.session.map(Session::from_id).unwrap_or_default();
    println!("Session: {}", session.id());
    println!("Follow it with: quizcam watch --session {}", session.id());
    println!("Commands: enter/s = shutter, m = next mode, q = quit");

    let scorer = build_scorer(&config.scorer)?;
    let bus = connect_bus(&config.bus).await;
    let correlator = Correlator::new(config.results.retain);
    let dispatcher = Dispatcher::start(
        DispatchSettings {
            session,
            interval_secs: config.capture.interval_secs,
            mode: config.capture.answer_mode,
        },
        scorer,
        bus,
        correlator,
    );

    let mut encoder = CaptureEncoder::new(config.capture.jpeg_quality);
    if let Some(dir) = &config.capture.save_dir {
        encoder = encoder.with_save_dir(dir.clone())?;
    }
    let controller = CaptureController::new(
        config.capture.mode,
        config.stability,
        Cooldown::new(config.capture.cooldown()),
        encoder,
        dispatcher,
    );

    let mut status = StatusBar::new();
    let sampler = match open_source(&config.source) {
        Ok(source) => {
            let sampler = FrameSampler::new(source, config.stability.tick_interval());
            log::info!("Reading frames from {}", sampler.describe());
            Some(sampler)
        }
        Err(e) => {
            log::error!("Camera unavailable: {}", e);
            status.set_camera_error(Some(e.to_string()));
            None
        }
    };

    CaptureLoop {
        controller,
        sampler,
        status,
        periodic_interval: config.capture.interval(),
        input: BufReader::new(tokio::io::stdin()),
    }
    .run(shutdown, std::io::stdout())
    .await
}

/// Follow a session from another device until Ctrl+C.
pub async fn run_watch_session(
    config: Config,
    session: Uuid,
    relay: Option<String>,
    shutdown: watch::Receiver<bool>,
) -> CommandResult {
    let addr = relay
        .or(config.bus.relay)
        .unwrap_or_else(|| DEFAULT_RELAY_ADDR.to_string());
    let bus = RelayBus::connect(&addr).await?;

    let session = Session::from_id(session);
    let correlator = Correlator::new(config.results.retain);
    let _subscription = correlator.attach(&bus, &session.channel());
    println!("Watching session {} via {}", session.id(), addr);

    run_watch(&correlator, &StatusBar::new(), shutdown, std::io::stdout()).await?;
    Ok(())
}

/// Serve relay connections until Ctrl+C.
pub async fn run_relay(listen: &str, mut shutdown: watch::Receiver<bool>) -> CommandResult {
    let listener = TcpListener::bind(listen).await?;
    tokio::select! {
        result = serve_relay(listener) => result?,
        _ = shutdown.wait_for(|stop| *stop) => log::info!("Relay stopped"),
    }
    Ok(())
}

/// Score one image file and print the verdict.
pub async fn score_file(
    config: Config,
    image: &Path,
    answer_mode: Option<AnswerMode>,
    scorer_url: Option<String>,
) -> CommandResult {
    let mut scorer_config = config.scorer;
    if scorer_url.is_some() {
        scorer_config.url = scorer_url;
    }
    let mode: AnswerKind = answer_mode
        .map(Into::into)
        .unwrap_or(config.capture.answer_mode);

    let bytes = std::fs::read(image)?;
    let scorer = build_scorer(&scorer_config)?;
    let verdict = scorer
        .score(ScoreRequest {
            image: &bytes,
            session_id: None,
            job_id: None,
            mode,
        })
        .await?;

    println!(
        "{} ({}) confidence {:.0}%",
        verdict.answer,
        verdict.kind,
        verdict.confidence * 100.0
    );
    Ok(())
}

/// Handle config subcommand actions.
pub fn handle_config_action(action: ConfigAction, config_path: Option<&Path>) -> CommandResult {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(get_config_path);

    match action {
        ConfigAction::Show => {
            let config = Config::load(Some(path.as_path()))?;
            if path.exists() {
                println!("# Config file: {} (exists)", path.display());
            } else {
                println!("# Config file: {} (not found, showing defaults)", path.display());
            }
            println!();
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Init => {
            Config::write_default(&path)?;
            println!("Created config file: {}", path.display());
        }
    }
    Ok(())
}
