//! Matches answers to the shots that produced them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::bus::{BusEvent, EventBus, EventKind, Subscription};

use super::events::{AnswerEvent, ShotEvent};
use super::results::{ResultEntry, ResultLog};

/// Whole seconds until the next capture after `shot`, rounded up and never
/// negative.
pub fn countdown_secs(shot: &ShotEvent, now_millis: i64) -> u64 {
    let remaining = shot.due_at_millis().saturating_sub(now_millis);
    if remaining <= 0 {
        0
    } else {
        remaining.unsigned_abs().div_ceil(1000)
    }
}

#[derive(Debug)]
struct CorrelationState {
    pending: HashMap<String, ShotEvent>,
    last_shot: Option<ShotEvent>,
    results: ResultLog,
}

/// Snapshot of the correlation state, for display.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationView {
    /// Shots still waiting for an answer, oldest first.
    pub pending: Vec<ShotEvent>,
    pub last_shot: Option<ShotEvent>,
    /// Result log, oldest first.
    pub results: Vec<ResultEntry>,
}

impl CorrelationView {
    pub fn next_capture_in(&self, now_millis: i64) -> Option<u64> {
        self.last_shot
            .as_ref()
            .map(|shot| countdown_secs(shot, now_millis))
    }
}

/// Tracks pending shots, the last shot, and the result log.
///
/// Cheap to clone; clones share state. Events may arrive late, twice, or
/// never, and answers may arrive before their shot.
#[derive(Debug, Clone)]
pub struct Correlator {
    state: Arc<Mutex<CorrelationState>>,
}

impl Correlator {
    /// New correlator keeping at most `retain` results.
    pub fn new(retain: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(CorrelationState {
                pending: HashMap::new(),
                last_shot: None,
                results: ResultLog::new(retain),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CorrelationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a shot: it becomes pending and drives the countdown.
    pub fn observe_shot(&self, shot: ShotEvent) {
        let mut state = self.lock();
        state.pending.insert(shot.job_id.clone(), shot.clone());
        state.last_shot = Some(shot);
    }

    /// Record an answer: clears its pending shot (if any) and logs it.
    pub fn observe_answer(&self, answer: AnswerEvent) {
        let mut state = self.lock();
        if let Some(job_id) = &answer.job_id {
            state.pending.remove(job_id);
        }
        state.results.push(ResultEntry::Answer(answer));
    }

    /// Log a scoring failure. The shot stays pending.
    pub fn record_failure(&self, job_id: &str, message: impl Into<String>) {
        self.lock().results.push(ResultEntry::Failed {
            job_id: job_id.to_string(),
            message: message.into(),
        });
    }

    /// Decode and apply one bus event. Malformed payloads are logged and
    /// ignored.
    pub fn handle_event(&self, event: &BusEvent) {
        match event.kind {
            EventKind::Shot => match serde_json::from_value::<ShotEvent>(event.payload.clone()) {
                Ok(shot) => match shot.validate() {
                    Ok(()) => self.observe_shot(shot),
                    Err(e) => log::warn!("Ignoring invalid shot on {}: {}", event.channel, e),
                },
                Err(e) => log::warn!("Ignoring malformed shot on {}: {}", event.channel, e),
            },
            EventKind::Answer => {
                match serde_json::from_value::<AnswerEvent>(event.payload.clone()) {
                    Ok(answer) if answer.is_valid() => self.observe_answer(answer),
                    Ok(answer) => log::warn!(
                        "Ignoring invalid answer '{}' ({}) on {}",
                        answer.answer,
                        answer.confidence,
                        event.channel
                    ),
                    Err(e) => log::warn!("Ignoring malformed answer on {}: {}", event.channel, e),
                }
            }
        }
    }

    /// Follow `channel` on `bus` until the subscription is dropped.
    pub fn attach(&self, bus: &dyn EventBus, channel: &str) -> Subscription {
        let correlator = self.clone();
        bus.subscribe(channel, Arc::new(move |event| correlator.handle_event(event)))
    }

    pub fn is_pending(&self, job_id: &str) -> bool {
        self.lock().pending.contains_key(job_id)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn result_count(&self) -> usize {
        self.lock().results.len()
    }

    /// Seconds until the next expected capture, if any shot has been seen.
    pub fn next_capture_in(&self, now_millis: i64) -> Option<u64> {
        self.lock()
            .last_shot
            .as_ref()
            .map(|shot| countdown_secs(shot, now_millis))
    }

    pub fn view(&self) -> CorrelationView {
        let state = self.lock();
        let mut pending: Vec<ShotEvent> = state.pending.values().cloned().collect();
        pending.sort_by(|a, b| {
            a.captured_at_millis
                .cmp(&b.captured_at_millis)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        CorrelationView {
            pending,
            last_shot: state.last_shot.clone(),
            results: state.results.iter().cloned().collect(),
        }
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(super::results::DEFAULT_RETAIN)
    }
}
