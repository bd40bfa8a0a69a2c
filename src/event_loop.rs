//! Async loops for the long-running `capture` and `watch` commands.
//!
//! Everything runs cooperatively on one task: frame analysis, the periodic
//! timer, stdin commands, and the status display are multiplexed with
//! `tokio::select!`.

use std::io::Write;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::camera::{Frame, FrameSampler};
use crate::capture::{CaptureController, CaptureError, CaptureOutcome};
use crate::correlation::Correlator;
use crate::job::now_millis;
use crate::status::{StatusBar, StatusSnapshot};

/// How often the status line is redrawn.
pub const DISPLAY_INTERVAL: Duration = Duration::from_secs(1);

/// A line typed on stdin while capturing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdinCommand {
    Shutter,
    CycleMode,
    Quit,
}

impl StdinCommand {
    /// Empty line or `s` = shutter, `m` = next mode, `q` = quit.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "" | "s" => Some(StdinCommand::Shutter),
            "m" => Some(StdinCommand::CycleMode),
            "q" => Some(StdinCommand::Quit),
            _ => None,
        }
    }
}

/// Install a Ctrl+C handler that flips `shutdown` to true.
pub fn setup_ctrlc_handler(shutdown: watch::Sender<bool>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        let _ = shutdown.send(true);
        eprintln!("\nReceived Ctrl+C, shutting down...");
    })
}

async fn next_frame(sampler: &mut Option<FrameSampler>) -> Option<Frame> {
    match sampler {
        Some(sampler) => sampler.next().await,
        None => std::future::pending().await,
    }
}

async fn wait_shutdown(shutdown: &mut watch::Receiver<bool>) {
    if *shutdown.borrow() {
        return;
    }
    while shutdown.changed().await.is_ok() {
        if *shutdown.borrow() {
            return;
        }
    }
    // Sender gone: nothing can ask us to stop any more.
    std::future::pending::<()>().await
}

fn report(result: Result<Option<CaptureOutcome>, CaptureError>) {
    match result {
        Ok(Some(CaptureOutcome::NoFrame)) => log::warn!("No camera frame available yet"),
        Ok(_) => {}
        Err(e) => log::warn!("Capture failed: {}", e),
    }
}

/// Pieces the capture loop drives.
pub struct CaptureLoop<R> {
    pub controller: CaptureController,
    /// Absent when the camera could not be opened
    pub sampler: Option<FrameSampler>,
    pub status: StatusBar,
    pub periodic_interval: Duration,
    pub input: R,
}

impl<R: AsyncBufRead + Unpin> CaptureLoop<R> {
    /// Run until `q`, Ctrl+C, or shutdown. Stops the dispatcher on exit.
    pub async fn run(
        self,
        mut shutdown: watch::Receiver<bool>,
        mut out: impl Write,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let CaptureLoop {
            mut controller,
            mut sampler,
            mut status,
            periodic_interval,
            input,
        } = self;

        let mut periodic = tokio::time::interval_at(
            tokio::time::Instant::now() + periodic_interval,
            periodic_interval,
        );
        periodic.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut display = tokio::time::interval(DISPLAY_INTERVAL);
        display.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut lines = input.lines();
        let mut input_open = true;
        let mut latest: Option<Frame> = None;

        loop {
            tokio::select! {
                _ = wait_shutdown(&mut shutdown) => break,

                frame = next_frame(&mut sampler) => {
                    if let Some(frame) = frame {
                        let fired = controller.on_frame(&frame, Instant::now());
                        report(fired.map(|f| f.map(|(_, outcome)| outcome)));
                        latest = Some(frame);
                    }
                }

                _ = periodic.tick() => {
                    report(controller.on_timer(latest.as_ref(), Instant::now()));
                }

                line = lines.next_line(), if input_open => {
                    match line {
                        Ok(Some(line)) => match StdinCommand::parse(&line) {
                            Some(StdinCommand::Shutter) => {
                                let outcome = controller.shutter(latest.as_ref(), Instant::now());
                                report(outcome.map(Some));
                            }
                            Some(StdinCommand::CycleMode) => {
                                controller.cycle_mode();
                            }
                            Some(StdinCommand::Quit) => break,
                            None => log::warn!(
                                "Unknown command '{}' (enter/s = shutter, m = mode, q = quit)",
                                line.trim()
                            ),
                        },
                        Ok(None) => {
                            log::debug!("stdin closed");
                            input_open = false;
                        }
                        Err(e) => {
                            log::warn!("Failed to read stdin: {}", e);
                            input_open = false;
                        }
                    }
                }

                _ = display.tick() => {
                    sync_camera_error(sampler.as_ref(), &mut status);
                    render_capture(&controller, &status, &mut out)?;
                }
            }
        }

        render_capture(&controller, &status, &mut out)?;
        writeln!(out)?;
        controller.dispatcher().shutdown();
        Ok(())
    }
}

/// Raise the camera banner once a running source gives up.
fn sync_camera_error(sampler: Option<&FrameSampler>, status: &mut StatusBar) {
    if status.camera_error().is_some() {
        return;
    }
    if let Some(reason) = sampler.and_then(FrameSampler::failure) {
        log::error!("Camera unavailable: {}", reason);
        status.set_camera_error(Some(reason));
    }
}

fn render_capture(
    controller: &CaptureController,
    status: &StatusBar,
    out: &mut impl Write,
) -> std::io::Result<()> {
    let detector = controller.detector();
    let view = controller.dispatcher().correlator().view();
    let snapshot = StatusSnapshot {
        mode: Some(controller.mode()),
        detector: Some((detector.state(), detector.last_analysis())),
        queue: Some(controller.dispatcher().status()),
        view: &view,
        now_millis: now_millis(),
    };
    status.render(out, &snapshot)
}

/// Redraw a viewer's status line until shutdown.
///
/// The correlator must already be attached to the session channel.
pub async fn run_watch(
    correlator: &Correlator,
    status: &StatusBar,
    mut shutdown: watch::Receiver<bool>,
    mut out: impl Write,
) -> std::io::Result<()> {
    let mut display = tokio::time::interval(DISPLAY_INTERVAL);
    display.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut seen = 0;

    loop {
        tokio::select! {
            _ = wait_shutdown(&mut shutdown) => break,
            _ = display.tick() => {
                let view = correlator.view();
                if view.results.len() != seen {
                    if let Some(latest) = view.results.last() {
                        log::debug!("Latest result: {:?}", latest);
                    }
                    seen = view.results.len();
                }
                let snapshot = StatusSnapshot {
                    mode: None,
                    detector: None,
                    queue: None,
                    view: &view,
                    now_millis: now_millis(),
                };
                status.render(&mut out, &snapshot)?;
            }
        }
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(StdinCommand::parse(""), Some(StdinCommand::Shutter));
        assert_eq!(StdinCommand::parse("  s \n"), Some(StdinCommand::Shutter));
        assert_eq!(StdinCommand::parse("M"), Some(StdinCommand::CycleMode));
        assert_eq!(StdinCommand::parse("q"), Some(StdinCommand::Quit));
        assert_eq!(StdinCommand::parse("photo"), None);
    }

    struct DeadCamera;

    impl crate::camera::FrameSource for DeadCamera {
        fn latest_frame(&mut self) -> Option<Frame> {
            None
        }

        fn describe(&self) -> String {
            "dead".to_string()
        }

        fn failure(&self) -> Option<String> {
            Some("device busy".to_string())
        }
    }

    #[tokio::test]
    async fn test_failed_source_raises_banner() {
        let sampler = FrameSampler::new(Box::new(DeadCamera), Duration::from_millis(10));
        let mut status = StatusBar::new();

        sync_camera_error(Some(&sampler), &mut status);
        assert_eq!(status.camera_error(), Some("device busy"));
    }

    #[tokio::test]
    async fn test_healthy_source_leaves_banner_alone() {
        let still = crate::camera::StillSource::from_frames(Vec::new());
        let sampler = FrameSampler::new(Box::new(still), Duration::from_millis(10));
        let mut status = StatusBar::new();

        sync_camera_error(Some(&sampler), &mut status);
        sync_camera_error(None, &mut status);
        assert!(status.camera_error().is_none());
    }

    #[tokio::test]
    async fn test_wait_shutdown_returns_when_set() {
        let (tx, mut rx) = watch::channel(false);
        let waiter = tokio::spawn(async move { wait_shutdown(&mut rx).await });
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_watch_stops_on_shutdown() {
        let correlator = Correlator::default();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let mut out = Vec::new();
        run_watch(&correlator, &StatusBar::new(), rx, &mut out)
            .await
            .unwrap();
        assert!(out.ends_with(b"\n"));
    }
}
