//! Events emitted by the engine toward the caller.
//!
//! The engine never touches caller-owned UI objects. Everything observable
//! happens through these typed events, delivered in order per job.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::job::JobId;
use crate::state::JobState;
use crate::timestamp::format_seconds;

/// One progress update for a running job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub job_id: JobId,
    /// Completion in `0.0..=1.0`, or None when the total duration is
    /// unknown (captures, streams without a known length).
    pub fraction: Option<f64>,
    /// Media time processed so far as reported by the tool.
    pub elapsed: Duration,
    pub message: Option<String>,
}

impl ProgressEvent {
    /// Human-readable elapsed time, e.g. `00:01:30`.
    pub fn elapsed_display(&self) -> String {
        format_seconds(self.elapsed.as_secs_f64())
    }
}

/// Everything a job or batch can report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    State {
        job_id: JobId,
        state: JobState,
        message: Option<String>,
    },
    Progress(ProgressEvent),
    /// Pre-roll tick before a recording starts. `seconds_left` counts down
    /// to 1; the process spawns after the last tick.
    Countdown { job_id: JobId, seconds_left: u32 },
    /// Aggregate progress across a batch, weighting each job equally.
    BatchProgress {
        fraction: f64,
        completed: usize,
        total: usize,
    },
    BatchFinished(BatchReport),
}

/// Outcome summary of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }
}
