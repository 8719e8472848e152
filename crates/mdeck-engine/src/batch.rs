//! Sequential batch conversion.
//!
//! Jobs run one at a time in submission order. A failing job never stops
//! the batch; it is counted and the next spec starts. Aggregate progress
//! weights every job equally: `(completed + current_fraction) / total`.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use mdeck_models::{BatchReport, JobEvent, JobSpec, JobState};

use crate::config::EngineConfig;
use crate::controller::{JobController, JobHandle};
use crate::events::EventSink;

pub struct BatchScheduler {
    cancel_tx: watch::Sender<bool>,
    current: Arc<Mutex<Option<JobHandle>>>,
    task: JoinHandle<BatchReport>,
}

impl BatchScheduler {
    /// Start running `specs` sequentially. Per-job events are forwarded to
    /// the sink alongside the aggregate batch events.
    pub fn submit(specs: Vec<JobSpec>, sink: EventSink, config: EngineConfig) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let current = Arc::new(Mutex::new(None));
        let task = tokio::spawn(run_batch(specs, sink, config, cancel_rx, current.clone()));
        Self {
            cancel_tx,
            current,
            task,
        }
    }

    /// Cancel the in-flight job and discard everything still queued.
    pub fn cancel_all(&self) {
        let _ = self.cancel_tx.send(true);
        let handle = self
            .current
            .lock()
            .ok()
            .and_then(|guard| guard.clone());
        if let Some(handle) = handle {
            handle.cancel();
        }
    }

    /// Wait for the batch to finish and return its report.
    pub async fn wait(self) -> BatchReport {
        self.task.await.unwrap_or_default()
    }
}

async fn run_batch(
    specs: Vec<JobSpec>,
    sink: EventSink,
    config: EngineConfig,
    cancel_rx: watch::Receiver<bool>,
    current: Arc<Mutex<Option<JobHandle>>>,
) -> BatchReport {
    let total = specs.len();
    let mut report = BatchReport {
        total,
        ..Default::default()
    };
    let mut completed = 0usize;

    for spec in specs {
        if *cancel_rx.borrow() {
            break;
        }

        let (job_sink, mut job_rx) = EventSink::channel();
        let controller = JobController::start(spec, job_sink, config.clone());
        if let Ok(mut guard) = current.lock() {
            *guard = Some(controller.handle());
        }
        // A cancel_all between the check above and the handle registration
        // found no handle to cancel; re-checking here closes that window.
        if *cancel_rx.borrow() {
            controller.cancel();
        }

        // Forward the job's events, interleaving aggregate progress.
        while let Some(event) = job_rx.recv().await {
            if let JobEvent::Progress(progress) = &event {
                let fraction =
                    (completed as f64 + progress.fraction.unwrap_or(0.0)) / total as f64;
                sink.emit(event.clone());
                sink.emit(JobEvent::BatchProgress {
                    fraction,
                    completed,
                    total,
                });
            } else {
                sink.emit(event);
            }
        }

        let (state, _artifact) = controller.wait().await;
        match state {
            JobState::Done => report.succeeded += 1,
            // Cancellations are reconciled below together with the
            // discarded remainder of the queue
            JobState::Cancelled => {}
            _ => report.failed += 1,
        }
        completed += 1;
        sink.emit(JobEvent::BatchProgress {
            fraction: completed as f64 / total as f64,
            completed,
            total,
        });
    }

    if let Ok(mut guard) = current.lock() {
        *guard = None;
    }

    report.cancelled = total - report.succeeded - report.failed;
    info!(
        total = report.total,
        succeeded = report.succeeded,
        failed = report.failed,
        cancelled = report.cancelled,
        "batch finished"
    );
    sink.emit(JobEvent::BatchFinished(report.clone()));
    report
}
