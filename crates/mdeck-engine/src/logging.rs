//! Structured job logging.
//!
//! Every log line carries the job id and operation so runs can be filtered
//! in aggregated output.

use mdeck_models::{JobId, JobState};
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: &'static str,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &'static str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation,
        }
    }

    pub fn log_start(&self) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            "job started"
        );
    }

    pub fn log_state(&self, state: JobState) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            state = state.as_str(),
            "state changed"
        );
    }

    pub fn log_completion(&self) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            "job completed"
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = self.operation,
            error = message,
            "job failed"
        );
    }
}
