//! Continuous capture sessions.
//!
//! A recording is a capture job wrapped with the pieces interactive use
//! needs: a countdown before the process spawns, pause and resume without
//! restarting the tool, a graceful stop that keeps the file, and a cancel
//! that discards it. Finished recordings land in the artifact registry.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use mdeck_media::paths;
use mdeck_models::{Artifact, CaptureSettings, JobId, JobSpec, JobState, OutputFormat};

use crate::artifacts::ArtifactRegistry;
use crate::config::EngineConfig;
use crate::controller::{JobController, JobHandle};
use crate::events::EventSink;

#[derive(Debug, Clone)]
pub struct RecordingOptions {
    pub settings: CaptureSettings,
    /// Container for the recording file.
    pub format: OutputFormat,
    /// Where the recording lands. None falls back to the engine's
    /// configured output directory.
    pub output_dir: Option<PathBuf>,
    /// Pre-roll seconds before the process spawns. None uses the engine
    /// default; zero starts immediately.
    pub countdown_seconds: Option<u32>,
}

impl RecordingOptions {
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            settings,
            format: OutputFormat::Mp4H264,
            output_dir: None,
            countdown_seconds: None,
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionCtrl {
    Pause,
    Resume,
    Stop,
    Cancel,
}

pub struct RecordingSession {
    job_id: JobId,
    ctrl_tx: mpsc::UnboundedSender<SessionCtrl>,
    handle_slot: Arc<Mutex<Option<JobHandle>>>,
    task: JoinHandle<Option<Artifact>>,
}

impl RecordingSession {
    /// Begin a session: countdown first, then spawn the capture process.
    pub fn start(
        options: RecordingOptions,
        sink: EventSink,
        registry: Arc<ArtifactRegistry>,
        config: EngineConfig,
    ) -> Self {
        let mut spec = JobSpec::capture(options.settings, options.format);
        // An unset output directory surfaces as a spec error when the job
        // resolves its output path.
        spec.output_dir = options.output_dir.or_else(|| config.output_dir.clone());
        let job_id = spec.id.clone();
        let countdown = options
            .countdown_seconds
            .unwrap_or(config.countdown_seconds);
        let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel();
        let handle_slot = Arc::new(Mutex::new(None));

        let task = tokio::spawn(run_session(
            spec,
            sink,
            registry,
            config,
            countdown,
            ctrl_rx,
            handle_slot.clone(),
        ));

        Self {
            job_id,
            ctrl_tx,
            handle_slot,
            task,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Current state. `Starting` covers the countdown phase, before any
    /// process exists.
    pub fn state(&self) -> JobState {
        if let Some(handle) = self.handle() {
            return handle.state();
        }
        if self.task.is_finished() {
            JobState::Cancelled
        } else {
            JobState::Starting
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.handle().and_then(|handle| handle.pid())
    }

    pub fn pause(&self) {
        let _ = self.ctrl_tx.send(SessionCtrl::Pause);
    }

    pub fn resume(&self) {
        let _ = self.ctrl_tx.send(SessionCtrl::Resume);
    }

    /// Finish the recording and keep the file.
    pub fn stop(&self) {
        let _ = self.ctrl_tx.send(SessionCtrl::Stop);
    }

    /// Abort the recording and discard any partial file.
    pub fn cancel(&self) {
        let _ = self.ctrl_tx.send(SessionCtrl::Cancel);
    }

    /// Wait for the session to end. Returns the recorded artifact when the
    /// session was stopped normally.
    pub async fn wait(self) -> Option<Artifact> {
        self.task.await.ok().flatten()
    }

    fn handle(&self) -> Option<JobHandle> {
        self.handle_slot.lock().ok().and_then(|guard| guard.clone())
    }
}

async fn run_session(
    spec: JobSpec,
    sink: EventSink,
    registry: Arc<ArtifactRegistry>,
    config: EngineConfig,
    countdown: u32,
    mut ctrl_rx: mpsc::UnboundedReceiver<SessionCtrl>,
    handle_slot: Arc<Mutex<Option<JobHandle>>>,
) -> Option<Artifact> {
    let job_id = spec.id.clone();

    // Pre-roll. No process exists yet, so stop and cancel both just end
    // the session.
    for seconds_left in (1..=countdown).rev() {
        sink.countdown(&job_id, seconds_left);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            ctrl = ctrl_rx.recv() => match ctrl {
                Some(SessionCtrl::Stop) | Some(SessionCtrl::Cancel) | None => {
                    sink.state(
                        &job_id,
                        JobState::Cancelled,
                        Some("recording aborted during countdown".to_string()),
                    );
                    return None;
                }
                Some(_) => {}
            }
        }
    }

    // Output path is known up front so a cancelled run can be cleaned up.
    let output = paths::resolve_output(&spec).ok();
    let controller = JobController::start(spec, sink, config);
    if let Ok(mut guard) = handle_slot.lock() {
        *guard = Some(controller.handle());
    }

    let mut state_rx = controller.subscribe();
    let mut ctrl_open = true;
    loop {
        tokio::select! {
            ctrl = ctrl_rx.recv(), if ctrl_open => match ctrl {
                Some(SessionCtrl::Pause) => controller.pause(),
                Some(SessionCtrl::Resume) => controller.resume(),
                Some(SessionCtrl::Stop) => controller.stop(),
                Some(SessionCtrl::Cancel) => controller.cancel(),
                None => ctrl_open = false,
            },
            changed = state_rx.changed() => {
                if changed.is_err() || state_rx.borrow().is_terminal() {
                    break;
                }
            }
        }
    }

    let (state, artifact) = controller.wait().await;
    match state {
        JobState::Done => {
            if let Some(artifact) = &artifact {
                registry.record(artifact.clone());
                info!(
                    job_id = %job_id,
                    path = %artifact.path.display(),
                    "recording saved"
                );
            }
            artifact
        }
        JobState::Cancelled => {
            if let Some(path) = output {
                let _ = tokio::fs::remove_file(&path).await;
            }
            None
        }
        _ => None,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_util::{stub_config, write_stub_tool};
    use mdeck_models::{CaptureMode, JobEvent};
    use tempfile::TempDir;

    /// Stub recorder: creates its output immediately, then waits for the
    /// quit byte like the real tool.
    const RECORDER: &str = r#"
for a in "$@"; do out=$a; done
: > "$out"
printf 'time=00:00:01.00 bitrate=1k\n' >&2
head -c1 >/dev/null
exit 0
"#;

    fn options(dir: &TempDir) -> RecordingOptions {
        RecordingOptions::new(CaptureSettings::new(CaptureMode::ScreenOnly))
            .with_output_dir(dir.path())
    }

    async fn wait_for_running(session: &RecordingSession) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while session.state() != JobState::Running {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_countdown_ticks_before_start() {
        let dir = TempDir::new().unwrap();
        let tool = write_stub_tool(dir.path(), RECORDER);
        let (sink, mut rx) = EventSink::channel();
        let registry = Arc::new(ArtifactRegistry::new(10));

        let mut opts = options(&dir);
        opts.countdown_seconds = Some(2);
        let session = RecordingSession::start(opts, sink, registry, stub_config(&tool));

        wait_for_running(&session).await;
        session.stop();
        session.wait().await.unwrap();

        let mut ticks = Vec::new();
        let mut saw_running_after_ticks = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                JobEvent::Countdown { seconds_left, .. } => ticks.push(seconds_left),
                JobEvent::State {
                    state: JobState::Running,
                    ..
                } => saw_running_after_ticks = ticks.len() == 2,
                _ => {}
            }
        }
        assert_eq!(ticks, vec![2, 1]);
        assert!(saw_running_after_ticks);
    }

    #[tokio::test]
    async fn test_stop_keeps_file_and_registers_artifact() {
        let dir = TempDir::new().unwrap();
        let tool = write_stub_tool(dir.path(), RECORDER);
        let (sink, _rx) = EventSink::channel();
        let registry = Arc::new(ArtifactRegistry::new(10));

        let session = RecordingSession::start(
            options(&dir),
            sink,
            registry.clone(),
            stub_config(&tool),
        );
        wait_for_running(&session).await;
        session.stop();

        let artifact = session.wait().await.unwrap();
        assert!(artifact.path.exists());
        let name = artifact.file_name().unwrap();
        assert!(name.starts_with("recording_"));
        assert!(name.ends_with(".mp4"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot()[0].path, artifact.path);
    }

    #[tokio::test]
    async fn test_output_dir_falls_back_to_engine_config() {
        let dir = TempDir::new().unwrap();
        let tool = write_stub_tool(dir.path(), RECORDER);
        let (sink, _rx) = EventSink::channel();
        let registry = Arc::new(ArtifactRegistry::new(10));

        let recordings = dir.path().join("recordings");
        std::fs::create_dir(&recordings).unwrap();
        let mut config = stub_config(&tool);
        config.output_dir = Some(recordings.clone());

        let opts = RecordingOptions::new(CaptureSettings::new(CaptureMode::ScreenOnly));
        let session = RecordingSession::start(opts, sink, registry, config);
        wait_for_running(&session).await;
        session.stop();

        let artifact = session.wait().await.unwrap();
        assert_eq!(artifact.path.parent(), Some(recordings.as_path()));
    }

    #[tokio::test]
    async fn test_cancel_discards_partial_file() {
        let dir = TempDir::new().unwrap();
        let tool = write_stub_tool(dir.path(), RECORDER);
        let (sink, _rx) = EventSink::channel();
        let registry = Arc::new(ArtifactRegistry::new(10));

        let session = RecordingSession::start(
            options(&dir),
            sink,
            registry.clone(),
            stub_config(&tool),
        );
        wait_for_running(&session).await;
        session.cancel();

        assert!(session.wait().await.is_none());
        assert!(registry.is_empty());
        // The partial recording was removed
        let recordings: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_name()
                    .to_string_lossy()
                    .starts_with("recording_")
            })
            .collect();
        assert!(recordings.is_empty());
    }

    #[tokio::test]
    async fn test_pause_resume_session() {
        let dir = TempDir::new().unwrap();
        let tool = write_stub_tool(dir.path(), RECORDER);
        let (sink, _rx) = EventSink::channel();
        let registry = Arc::new(ArtifactRegistry::new(10));

        let session =
            RecordingSession::start(options(&dir), sink, registry, stub_config(&tool));
        wait_for_running(&session).await;
        let pid = session.pid().unwrap();

        session.pause();
        tokio::time::timeout(Duration::from_secs(5), async {
            while session.state() != JobState::Paused {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();

        session.resume();
        wait_for_running(&session).await;
        assert_eq!(session.pid(), Some(pid));

        session.stop();
        assert!(session.wait().await.is_some());
    }

    #[tokio::test]
    async fn test_abort_during_countdown() {
        let dir = TempDir::new().unwrap();
        let tool = write_stub_tool(dir.path(), RECORDER);
        let (sink, mut rx) = EventSink::channel();
        let registry = Arc::new(ArtifactRegistry::new(10));

        let mut opts = options(&dir);
        opts.countdown_seconds = Some(30);
        let session = RecordingSession::start(opts, sink, registry.clone(), stub_config(&tool));
        session.cancel();

        assert!(session.wait().await.is_none());
        assert!(registry.is_empty());

        let mut cancelled = false;
        while let Ok(event) = rx.try_recv() {
            if let JobEvent::State {
                state: JobState::Cancelled,
                ..
            } = event
            {
                cancelled = true;
            }
        }
        assert!(cancelled);
    }
}
