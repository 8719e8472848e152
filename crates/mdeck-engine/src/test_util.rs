//! Test support: stub shell scripts standing in for the real tool.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mdeck_models::{JobEvent, JobState, ProgressEvent};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::EngineConfig;

/// Write an executable `sh` script that the engine will spawn instead of
/// the real tool. Scripts can read their last argument to find the output
/// path, exactly like the real command line.
pub fn write_stub_tool(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-ffmpeg");
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Engine config pointing at a stub tool, with short timeouts so failure
/// paths stay fast.
pub fn stub_config(tool: &Path) -> EngineConfig {
    EngineConfig {
        ffmpeg_path: tool.to_path_buf(),
        grace_timeout: Duration::from_millis(500),
        countdown_seconds: 0,
        registry_capacity: 10,
        output_dir: None,
        pause_mode: Default::default(),
    }
}

/// Drain every event already queued, separating state transitions from
/// progress updates.
pub fn collect_states(
    rx: &mut UnboundedReceiver<JobEvent>,
) -> (Vec<JobState>, Vec<ProgressEvent>) {
    let mut states = Vec::new();
    let mut progress = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            JobEvent::State { state, .. } => states.push(state),
            JobEvent::Progress(p) => progress.push(p),
            _ => {}
        }
    }
    (states, progress)
}
