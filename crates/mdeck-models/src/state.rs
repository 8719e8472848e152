//! Job lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State machine driven by the per-job controller:
///
/// `Idle -> Starting -> Running -> (Paused <-> Running) -> Completing`
/// and from `Completing` into one of the terminal states `Done`, `Error`
/// or `Cancelled`. Validation or spawn failures jump straight from
/// `Starting` to `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Starting,
    Running,
    Paused,
    Completing,
    Done,
    Error,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completing => "completing",
            Self::Done => "done",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal states accept no further control commands.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Cancelled)
    }

    /// True while the job owns a live process or is about to start one.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Starting | Self::Running | Self::Paused | Self::Completing
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
