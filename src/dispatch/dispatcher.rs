//! Sends queued jobs to the scorer one at a time.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{watch, Notify};
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::bus::{EventBus, EventKind};
use crate::correlation::{AnswerEvent, Correlator, ShotAnnouncement, ShotEvent};
use crate::job::{Job, Session};
use crate::scoring::{AnswerKind, ScoreRequest, Scorer};

use super::queue::{CaptureQueue, QueueStatus};

/// Per-session settings for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub session: Session,
    /// Announced with every shot so viewers can count down
    pub interval_secs: u32,
    pub mode: AnswerKind,
}

struct Shared {
    queue: Mutex<CaptureQueue>,
    wake: Notify,
    status: watch::Sender<QueueStatus>,
    worker: Mutex<Option<AbortHandle>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CaptureQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Context {
    settings: DispatchSettings,
    channel: String,
    bus: Arc<dyn EventBus>,
    correlator: Correlator,
}

/// Handle to the capture queue and its scoring worker.
///
/// Clones share the same queue.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
    ctx: Arc<Context>,
}

impl Dispatcher {
    /// Start the worker task. Must be called inside a tokio runtime.
    pub fn start(
        settings: DispatchSettings,
        scorer: Arc<dyn Scorer>,
        bus: Arc<dyn EventBus>,
        correlator: Correlator,
    ) -> Self {
        let (status, _) = watch::channel(QueueStatus::default());
        let shared = Arc::new(Shared {
            queue: Mutex::new(CaptureQueue::default()),
            wake: Notify::new(),
            status,
            worker: Mutex::new(None),
        });
        let ctx = Arc::new(Context {
            channel: settings.session.channel(),
            settings,
            bus,
            correlator,
        });

        log::info!("Dispatching to {}", scorer.describe());
        let task = tokio::spawn(run_worker(Arc::clone(&shared), Arc::clone(&ctx), scorer));
        *shared.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(task.abort_handle());

        Self { shared, ctx }
    }

    /// Queue `job`, announce it, and wake the worker. Returns the job id.
    pub fn enqueue(&self, job: Job) -> Uuid {
        let id = job.id;
        let shot = ShotEvent {
            job_id: id.to_string(),
            captured_at_millis: job.captured_at_millis,
            interval_seconds: self.ctx.settings.interval_secs,
        };

        {
            let mut queue = self.shared.lock();
            queue.push(job);
            self.shared.status.send_replace(queue.status());
        }

        self.ctx.correlator.observe_shot(shot.clone());
        self.announce(shot);
        self.shared.wake.notify_one();
        id
    }

    fn announce(&self, shot: ShotEvent) {
        let announcement = ShotAnnouncement::new(self.ctx.settings.session.id(), shot);
        if let Err(e) = announcement.validate() {
            log::warn!("Not announcing shot: {}", e);
            return;
        }
        let result = serde_json::to_value(&announcement)
            .map_err(Into::into)
            .and_then(|payload| {
                self.ctx
                    .bus
                    .publish(&self.ctx.channel, EventKind::Shot, payload)
            });
        if let Err(e) = result {
            log::debug!("Shot {} not announced: {}", announcement.shot.job_id, e);
        }
    }

    pub fn status(&self) -> QueueStatus {
        *self.shared.status.borrow()
    }

    /// Receiver that sees every status change.
    pub fn watch_status(&self) -> watch::Receiver<QueueStatus> {
        self.shared.status.subscribe()
    }

    /// Wait until the queue is empty and nothing is in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.watch_status();
        let _ = rx.wait_for(QueueStatus::is_idle).await;
    }

    pub fn session(&self) -> &Session {
        &self.ctx.settings.session
    }

    pub fn correlator(&self) -> &Correlator {
        &self.ctx.correlator
    }

    /// Stop the worker. Queued jobs are dropped.
    pub fn shutdown(&self) {
        if let Some(handle) = self
            .shared
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
            let queued = self.shared.lock().status().queued;
            if queued > 0 {
                log::info!("Dropping {} unsent capture(s)", queued);
            }
        }
    }
}

/// Clears the in-flight flag when the current request resolves, even if the
/// worker is aborted mid-request.
struct SendingGuard<'a> {
    shared: &'a Shared,
    ok: bool,
}

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        let mut queue = self.shared.lock();
        queue.finish(self.ok);
        self.shared.status.send_replace(queue.status());
    }
}

async fn run_worker(shared: Arc<Shared>, ctx: Arc<Context>, scorer: Arc<dyn Scorer>) {
    loop {
        let next = {
            let mut queue = shared.lock();
            let job = queue.begin_next();
            if job.is_some() {
                shared.status.send_replace(queue.status());
            }
            job
        };

        let Some(job) = next else {
            shared.wake.notified().await;
            continue;
        };

        let mut guard = SendingGuard {
            shared: &shared,
            ok: false,
        };
        let request = ScoreRequest {
            image: &job.image,
            session_id: Some(ctx.settings.session.id()),
            job_id: Some(job.id),
            mode: ctx.settings.mode,
        };

        match scorer.score(request).await {
            Ok(verdict) => {
                log::info!(
                    "Job {} answered {} ({:.0}%)",
                    job.id,
                    verdict.answer,
                    verdict.confidence * 100.0
                );
                let answer = AnswerEvent {
                    job_id: Some(job.id.to_string()),
                    kind: verdict.kind,
                    answer: verdict.answer,
                    confidence: verdict.confidence,
                };
                ctx.correlator.observe_answer(answer.clone());
                publish_answer(&ctx, &answer);
                guard.ok = true;
            }
            Err(e) => {
                log::warn!("Scoring job {} failed: {}", job.id, e);
                ctx.correlator.record_failure(&job.id.to_string(), e.to_string());
            }
        }
        drop(guard);
    }
}

fn publish_answer(ctx: &Context, answer: &AnswerEvent) {
    let result = serde_json::to_value(answer)
        .map_err(Into::into)
        .and_then(|payload| ctx.bus.publish(&ctx.channel, EventKind::Answer, payload));
    if let Err(e) = result {
        log::debug!("Answer for {:?} not published: {}", answer.job_id, e);
    }
}
