//! Media error types.

use std::path::PathBuf;

use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("invalid job spec: {0}")]
    InvalidSpec(String),

    #[error("input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("output file already exists: {0}")]
    OutputExists(PathBuf),

    #[error("failed to spawn process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("process failed: {message}")]
    ProcessFailed {
        message: String,
        /// Last diagnostic lines from the process, for error reporting.
        stderr_tail: Option<String>,
        /// None when the process was killed by a signal.
        exit_code: Option<i32>,
    },

    #[error("job cancelled")]
    Cancelled,

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn invalid_spec(msg: impl Into<String>) -> Self {
        Self::InvalidSpec(msg.into())
    }

    pub fn process_failed(
        message: impl Into<String>,
        stderr_tail: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::ProcessFailed {
            message: message.into(),
            stderr_tail,
            exit_code,
        }
    }
}
