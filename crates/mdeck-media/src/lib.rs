//! FFmpeg CLI wrapper for the MediaDeck job engine.
//!
//! This crate owns everything that touches the external tool:
//! - Deterministic argument construction from job specs
//! - Tolerant progress parsing from the diagnostic stream
//! - Child process lifecycle control (graceful quit, suspend/resume, kill)
//! - Output path derivation and filesystem contract checks

pub mod command;
pub mod error;
pub mod paths;
pub mod process;
pub mod progress;

pub use command::{build_args, check_ffmpeg, validate};
pub use error::{MediaError, MediaResult};
pub use paths::resolve_output;
pub use process::ProcessHandle;
pub use progress::{ProgressParser, ProgressUpdate};
