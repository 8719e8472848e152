//! Shared data models for the MediaDeck job engine.
//!
//! This crate provides serde-serializable types shared across the engine:
//! - Job specifications, identifiers and lifecycle states
//! - Capture modes and quality presets for screen/webcam recording
//! - Progress and state-change events, batch reports, artifacts
//! - Timestamp parsing shared with the progress parser

pub mod artifact;
pub mod capture;
pub mod event;
pub mod job;
pub mod state;
pub mod timestamp;

pub use artifact::Artifact;
pub use capture::{CaptureMode, CaptureSettings, QualityPreset};
pub use event::{BatchReport, JobEvent, ProgressEvent};
pub use job::{
    AudioCodec, EncoderPreset, JobId, JobSpec, MediaCategory, OutputFormat, OutputNaming,
    Resolution,
};
pub use state::JobState;
pub use timestamp::{format_seconds, parse_timestamp, TimestampError};
