//! Job execution engine for the MediaDeck suite.
//!
//! The engine turns inert job specs into running tool processes and
//! reports everything observable back through typed events:
//! - [`JobController`] drives one job through its lifecycle state machine
//! - [`BatchScheduler`] runs conversions sequentially with aggregate progress
//! - [`RecordingSession`] adds countdown, pause and artifact registration
//!   on top of a capture job
//! - [`ArtifactRegistry`] keeps a bounded window of recent outputs

pub mod artifacts;
pub mod batch;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod logging;
pub mod recording;

#[cfg(all(test, unix))]
pub(crate) mod test_util;

pub use artifacts::ArtifactRegistry;
pub use batch::BatchScheduler;
pub use config::{EngineConfig, PauseMode};
pub use controller::{JobController, JobHandle};
pub use error::{EngineError, EngineResult};
pub use events::EventSink;
pub use logging::JobLogger;
pub use recording::{RecordingOptions, RecordingSession};
