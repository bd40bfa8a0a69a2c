//! One-line status display for the capture and watch loops.

use std::io::Write;

use crate::capture::CaptureMode;
use crate::correlation::CorrelationView;
use crate::dispatch::QueueStatus;
use crate::stability::{Analysis, DetectorState};

/// Number of recent results shown.
pub const RESULT_TAIL: usize = 8;

/// Everything the status line shows, gathered once per display tick.
#[derive(Debug, Clone)]
pub struct StatusSnapshot<'a> {
    /// Capture mode; absent when only watching
    pub mode: Option<CaptureMode>,
    pub detector: Option<(DetectorState, Option<Analysis>)>,
    pub queue: Option<QueueStatus>,
    pub view: &'a CorrelationView,
    pub now_millis: i64,
}

/// Status line at the bottom of the terminal.
///
/// Shows: [camera banner] | mode | detector | queue | countdown | pending | results
#[derive(Debug, Clone, Default)]
pub struct StatusBar {
    /// Shown before the status while the frame source is unavailable
    camera_error: Option<String>,
}

impl StatusBar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_camera_error(&mut self, error: Option<String>) {
        self.camera_error = error;
    }

    pub fn camera_error(&self) -> Option<&str> {
        self.camera_error.as_deref()
    }

    /// Format the status text.
    pub fn format(&self, snapshot: &StatusSnapshot<'_>) -> String {
        let mut parts = Vec::new();

        if let Some(error) = &self.camera_error {
            parts.push(format!("camera unavailable: {}", error));
        }
        if let Some(mode) = snapshot.mode {
            parts.push(mode.to_string());
        }
        if let Some((state, analysis)) = snapshot.detector {
            match analysis {
                Some(a) if !a.light_ok => {
                    parts.push(format!("{} (light {:.0})", state.name(), a.mean_luma))
                }
                Some(a) => parts.push(format!("{} {:.1}%", state.name(), a.motion_pct)),
                None => parts.push(state.name().to_string()),
            }
        }
        if let Some(queue) = snapshot.queue {
            parts.push(format!(
                "queue {}{}",
                queue.queued,
                if queue.sending { " sending" } else { "" }
            ));
        }

        match snapshot.view.next_capture_in(snapshot.now_millis) {
            Some(secs) => parts.push(format!("next {}s", secs)),
            None => parts.push("next -".to_string()),
        }
        parts.push(format!("pending {}", snapshot.view.pending.len()));

        let skip = snapshot.view.results.len().saturating_sub(RESULT_TAIL);
        let tail: Vec<&str> = snapshot
            .view
            .results
            .iter()
            .skip(skip)
            .map(|entry| entry.label())
            .collect();
        if !tail.is_empty() {
            parts.push(tail.join(" - "));
        }

        format!(" {} ", parts.join(" | "))
    }

    /// Redraw the status in place on `out`.
    pub fn render(
        &self,
        out: &mut impl Write,
        snapshot: &StatusSnapshot<'_>,
    ) -> std::io::Result<()> {
        write!(out, "\r\x1b[2K{}", self.format(snapshot))?;
        out.flush()
    }
}
