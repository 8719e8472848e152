//! Event delivery toward the caller.
//!
//! Workers push typed events into an unbounded channel and never block on
//! a slow consumer. Events from one worker arrive in emission order; a
//! dropped receiver just means the caller went away, which is not an error.

use mdeck_models::{JobEvent, JobId, JobState, ProgressEvent};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl EventSink {
    /// Create a sink and the receiver the caller drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }

    pub fn state(&self, job_id: &JobId, state: JobState, message: Option<String>) {
        self.emit(JobEvent::State {
            job_id: job_id.clone(),
            state,
            message,
        });
    }

    pub fn progress(&self, event: ProgressEvent) {
        self.emit(JobEvent::Progress(event));
    }

    pub fn countdown(&self, job_id: &JobId, seconds_left: u32) {
        self.emit(JobEvent::Countdown {
            job_id: job_id.clone(),
            seconds_left,
        });
    }
}
