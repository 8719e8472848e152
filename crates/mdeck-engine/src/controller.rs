//! Per-job lifecycle control.
//!
//! A [`JobController`] owns one tool process and drives the state machine
//! on a dedicated worker task:
//!
//! `Idle -> Starting -> Running -> (Paused <-> Running) -> Completing`
//! into one of `Done`, `Error`, `Cancelled`.
//!
//! Control calls queue a command to the worker and return immediately.
//! Commands sent to a job already in a terminal state are dropped, so
//! cancel and friends are idempotent.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use mdeck_media::process::ProcessHandle;
use mdeck_media::{build_args, paths, MediaError, MediaResult, ProgressParser};
use mdeck_models::{Artifact, JobId, JobSpec, JobState, ProgressEvent};

use crate::config::{EngineConfig, PauseMode};
use crate::error::{EngineError, EngineResult};
use crate::events::EventSink;
use crate::logging::JobLogger;

/// Diagnostic lines retained for error reporting.
const STDERR_TAIL_LINES: usize = 20;

/// How often the worker polls for process exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Poll ticks between wall-clock heartbeats for jobs without a known
/// duration.
const HEARTBEAT_TICKS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Pause,
    Resume,
    Cancel,
    Stop,
}

enum Outcome {
    Cancelled,
    Stopped,
    Exited(ExitStatus),
}

/// Cheap clonable control surface for a running job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    job_id: JobId,
    ctrl_tx: mpsc::UnboundedSender<Control>,
    state_rx: watch::Receiver<JobState>,
    pid: Arc<AtomicU32>,
}

impl JobHandle {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn state(&self) -> JobState {
        *self.state_rx.borrow()
    }

    /// Pid of the underlying process, once spawned.
    pub fn pid(&self) -> Option<u32> {
        match self.pid.load(Ordering::Relaxed) {
            0 => None,
            pid => Some(pid),
        }
    }

    /// Watch receiver for state transitions.
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state_rx.clone()
    }

    pub fn pause(&self) {
        self.send(Control::Pause);
    }

    pub fn resume(&self) {
        self.send(Control::Resume);
    }

    /// Abort the job. The partial output is not treated as a result.
    pub fn cancel(&self) {
        self.send(Control::Cancel);
    }

    /// Finish the job gracefully. Used for captures, which have no natural
    /// end of input.
    pub fn stop(&self) {
        self.send(Control::Stop);
    }

    fn send(&self, control: Control) {
        if self.state().is_terminal() {
            return;
        }
        let _ = self.ctrl_tx.send(control);
    }
}

pub struct JobController {
    handle: JobHandle,
    task: JoinHandle<MediaResult<Artifact>>,
}

impl JobController {
    /// Start a job with no known total duration; progress is reported as
    /// indeterminate.
    pub fn start(spec: JobSpec, sink: EventSink, config: EngineConfig) -> Self {
        Self::start_with_duration(spec, sink, config, None)
    }

    /// Start a job. When the caller knows the media duration, progress
    /// events carry a completion fraction.
    pub fn start_with_duration(
        spec: JobSpec,
        sink: EventSink,
        config: EngineConfig,
        total_duration: Option<Duration>,
    ) -> Self {
        let job_id = spec.id.clone();
        let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(JobState::Idle);
        let pid = Arc::new(AtomicU32::new(0));

        let task = tokio::spawn(run_job(
            spec,
            sink,
            config,
            total_duration,
            ctrl_rx,
            state_tx,
            pid.clone(),
        ));

        Self {
            handle: JobHandle {
                job_id,
                ctrl_tx,
                state_rx,
                pid,
            },
            task,
        }
    }

    pub fn handle(&self) -> JobHandle {
        self.handle.clone()
    }

    pub fn job_id(&self) -> &JobId {
        self.handle.job_id()
    }

    pub fn state(&self) -> JobState {
        self.handle.state()
    }

    pub fn pid(&self) -> Option<u32> {
        self.handle.pid()
    }

    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.handle.subscribe()
    }

    pub fn pause(&self) {
        self.handle.pause();
    }

    pub fn resume(&self) {
        self.handle.resume();
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    /// Wait for the job to reach a terminal state. Returns that state and
    /// the produced artifact for successful runs.
    pub async fn wait(self) -> (JobState, Option<Artifact>) {
        let artifact = self.task.await.ok().and_then(Result::ok);
        (*self.handle.state_rx.borrow(), artifact)
    }

    /// Wait for the job and surface the failure as an error. Unsuccessful
    /// runs keep their cause: a non-zero exit carries the code and the
    /// stderr tail, a cancellation is [`MediaError::Cancelled`].
    pub async fn outcome(self) -> EngineResult<Artifact> {
        match self.task.await {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => Err(EngineError::job_failed("worker task aborted")),
        }
    }
}

struct StateReporter {
    job_id: JobId,
    state_tx: watch::Sender<JobState>,
    sink: EventSink,
    logger: JobLogger,
}

impl StateReporter {
    fn set(&self, state: JobState, message: Option<String>) {
        let _ = self.state_tx.send(state);
        self.logger.log_state(state);
        self.sink.state(&self.job_id, state, message);
    }
}

fn prepare(spec: &JobSpec) -> MediaResult<(Vec<String>, PathBuf)> {
    let args = build_args(spec)?;
    let output = paths::resolve_output(spec)?;
    paths::check_io_contract(spec, &output)?;
    Ok((args, output))
}

async fn run_job(
    spec: JobSpec,
    sink: EventSink,
    config: EngineConfig,
    total_duration: Option<Duration>,
    mut ctrl_rx: mpsc::UnboundedReceiver<Control>,
    state_tx: watch::Sender<JobState>,
    pid_slot: Arc<AtomicU32>,
) -> MediaResult<Artifact> {
    let job_id = spec.id.clone();
    let logger = JobLogger::new(&job_id, spec.operation());
    let report = StateReporter {
        job_id: job_id.clone(),
        state_tx,
        sink: sink.clone(),
        logger: logger.clone(),
    };

    logger.log_start();
    report.set(JobState::Starting, None);

    // Validation, path derivation and collision checks all happen before
    // any process exists, so a bad spec can never leave one behind.
    let (args, output) = match prepare(&spec) {
        Ok(prepared) => prepared,
        Err(e) => {
            logger.log_error(&e.to_string());
            report.set(JobState::Error, Some(e.to_string()));
            return Err(e);
        }
    };

    let mut proc = match ProcessHandle::spawn(&config.ffmpeg_path, &args) {
        Ok(proc) => proc,
        Err(e) => {
            logger.log_error(&e.to_string());
            report.set(JobState::Error, Some(e.to_string()));
            return Err(e);
        }
    };
    pid_slot.store(proc.pid(), Ordering::Relaxed);
    debug!(job_id = %job_id, pid = proc.pid(), "process spawned");

    let mut lines = match proc.take_stderr_lines() {
        Some(lines) => lines,
        None => {
            let e = MediaError::Io(std::io::Error::other("diagnostic stream unavailable"));
            logger.log_error(&e.to_string());
            report.set(JobState::Error, Some(e.to_string()));
            return Err(e);
        }
    };

    report.set(JobState::Running, None);

    let parser = ProgressParser::new(total_duration);
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut paused = false;
    // True only while the process is actually signal-stopped.
    let mut suspended = false;
    let mut stderr_open = true;
    let mut ctrl_open = true;
    let mut paused_total = Duration::ZERO;
    let mut paused_since: Option<Instant> = None;
    let started = proc.started_at();
    let mut poll = tokio::time::interval(EXIT_POLL_INTERVAL);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut ticks: u32 = 0;

    let outcome = loop {
        tokio::select! {
            control = ctrl_rx.recv(), if ctrl_open => match control {
                Some(Control::Pause) if !paused => {
                    // Prefer OS suspension. Where signals are unavailable
                    // or emulated pause is configured, the process keeps
                    // running and the controller only mutes progress,
                    // tracking the time spent paused.
                    suspended = config.pause_mode == PauseMode::Suspend
                        && proc.suspend().is_ok();
                    paused = true;
                    paused_since = Some(Instant::now());
                    report.set(JobState::Paused, None);
                }
                Some(Control::Resume) if paused => {
                    if suspended {
                        let _ = proc.resume();
                        suspended = false;
                    }
                    if let Some(since) = paused_since.take() {
                        paused_total += since.elapsed();
                    }
                    paused = false;
                    report.set(JobState::Running, None);
                }
                Some(Control::Cancel) => break Outcome::Cancelled,
                Some(Control::Stop) => break Outcome::Stopped,
                // Pause while paused, resume while running
                Some(_) => {}
                None => ctrl_open = false,
            },
            line = lines.next_line(), if stderr_open && !(paused && !suspended) => match line {
                Ok(Some(line)) => {
                    push_tail(&mut tail, line.clone());
                    if !paused {
                        if let Some(update) = parser.feed(&line) {
                            sink.progress(ProgressEvent {
                                job_id: job_id.clone(),
                                fraction: update.fraction,
                                elapsed: update.elapsed,
                                message: None,
                            });
                        }
                    }
                }
                Ok(None) | Err(_) => stderr_open = false,
            },
            _ = poll.tick() => {
                match proc.try_wait() {
                    Ok(Some(status)) => break Outcome::Exited(status),
                    Ok(None) => {}
                    Err(e) => debug!(job_id = %job_id, error = %e, "try_wait failed"),
                }
                ticks += 1;
                // Wall-clock heartbeat for captures, which have no
                // fraction to report.
                if total_duration.is_none() && !paused && ticks % HEARTBEAT_TICKS == 0 {
                    sink.progress(ProgressEvent {
                        job_id: job_id.clone(),
                        fraction: None,
                        elapsed: started.elapsed().saturating_sub(paused_total),
                        message: None,
                    });
                }
            }
        }
    };

    match outcome {
        Outcome::Cancelled => {
            if let Err(e) = proc.terminate(config.grace_timeout).await {
                debug!(job_id = %job_id, error = %e, "terminate after cancel failed");
            }
            report.set(JobState::Cancelled, Some("cancelled by user".to_string()));
            Err(MediaError::Cancelled)
        }
        Outcome::Stopped => {
            // Captures have no natural end of input. Whatever exit status
            // the tool reports after a stop request, the run counts as
            // complete as long as the output file exists.
            if let Err(e) = proc.terminate(config.grace_timeout).await {
                debug!(job_id = %job_id, error = %e, "terminate after stop failed");
            }
            finish(&report, &logger, &output)
        }
        Outcome::Exited(status) => {
            if stderr_open {
                drain_tail(&mut lines, &mut tail).await;
            }
            if status.success() {
                finish(&report, &logger, &output)
            } else {
                let message = match status.code() {
                    Some(code) => format!("process exited with code {code}"),
                    None => "process killed by signal".to_string(),
                };
                let tail_text: Vec<String> = tail.into_iter().collect();
                let stderr_tail =
                    (!tail_text.is_empty()).then(|| tail_text.join("\n"));
                let e = MediaError::process_failed(message, stderr_tail.clone(), status.code());
                let full = match &stderr_tail {
                    Some(tail) => format!("{e}\n{tail}"),
                    None => e.to_string(),
                };
                logger.log_error(&e.to_string());
                report.set(JobState::Error, Some(full));
                Err(e)
            }
        }
    }
}

fn finish(report: &StateReporter, logger: &JobLogger, output: &Path) -> MediaResult<Artifact> {
    report.set(JobState::Completing, None);
    match Artifact::from_path(output) {
        Ok(artifact) => {
            logger.log_completion();
            report.set(JobState::Done, artifact.file_name().map(str::to_string));
            Ok(artifact)
        }
        Err(e) => {
            let e = MediaError::process_failed(
                format!("output file missing after run: {e}"),
                None,
                None,
            );
            logger.log_error(&e.to_string());
            report.set(JobState::Error, Some(e.to_string()));
            Err(e)
        }
    }
}

fn push_tail(tail: &mut VecDeque<String>, line: String) {
    if tail.len() == STDERR_TAIL_LINES {
        tail.pop_front();
    }
    tail.push_back(line);
}

/// Collect any diagnostics still buffered after exit, bounded in time in
/// case a grandchild holds the pipe open.
async fn drain_tail(
    lines: &mut tokio::io::Lines<tokio::io::BufReader<tokio::process::ChildStderr>>,
    tail: &mut VecDeque<String>,
) {
    let _ = tokio::time::timeout(Duration::from_secs(1), async {
        while let Ok(Some(line)) = lines.next_line().await {
            push_tail(tail, line);
        }
    })
    .await;
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_util::{collect_states, stub_config, write_stub_tool};
    use mdeck_models::{JobEvent, MediaCategory, OutputFormat};
    use tempfile::TempDir;

    fn convert_spec(dir: &TempDir) -> JobSpec {
        let input = dir.path().join("clip.mov");
        std::fs::write(&input, b"fake media").unwrap();
        JobSpec::convert(MediaCategory::Video, OutputFormat::Mp4H264).with_input(input)
    }

    #[tokio::test]
    async fn test_job_runs_to_done() {
        let dir = TempDir::new().unwrap();
        let tool = write_stub_tool(
            dir.path(),
            r#"
for a in "$@"; do out=$a; done
printf 'frame= 30 time=00:00:01.00 bitrate=1k speed=2x\n' >&2
printf 'frame= 60 time=00:00:02.00 bitrate=1k speed=2x\n' >&2
: > "$out"
exit 0
"#,
        );
        let (sink, mut rx) = EventSink::channel();
        let spec = convert_spec(&dir);
        let controller = JobController::start_with_duration(
            spec,
            sink,
            stub_config(&tool),
            Some(Duration::from_secs(2)),
        );

        let (state, artifact) = controller.wait().await;
        assert_eq!(state, JobState::Done);
        let artifact = artifact.unwrap();
        assert!(artifact.path.exists());
        assert_eq!(artifact.file_name(), Some("clip_converted.mp4"));

        let (states, progress) = collect_states(&mut rx);
        assert_eq!(
            states,
            vec![
                JobState::Starting,
                JobState::Running,
                JobState::Completing,
                JobState::Done
            ]
        );
        assert!(!progress.is_empty());
        assert!(progress.iter().any(|p| p.fraction == Some(1.0)));
    }

    #[tokio::test]
    async fn test_invalid_spec_fails_without_spawn() {
        let dir = TempDir::new().unwrap();
        let tool = write_stub_tool(dir.path(), "for a in \"$@\"; do out=$a; done\n: > \"$out\"\n");
        let (sink, mut rx) = EventSink::channel();
        // No inputs at all
        let spec = JobSpec::convert(MediaCategory::Video, OutputFormat::Mp4H264);
        let controller = JobController::start(spec, sink, stub_config(&tool));

        let (state, artifact) = controller.wait().await;
        assert_eq!(state, JobState::Error);
        assert!(artifact.is_none());
        assert!(controller_never_spawned(&mut rx));
    }

    fn controller_never_spawned(
        rx: &mut tokio::sync::mpsc::UnboundedReceiver<JobEvent>,
    ) -> bool {
        let (states, _) = collect_states(rx);
        states == vec![JobState::Starting, JobState::Error]
    }

    #[tokio::test]
    async fn test_missing_input_errors() {
        let dir = TempDir::new().unwrap();
        let tool = write_stub_tool(dir.path(), "exit 0\n");
        let (sink, _rx) = EventSink::channel();
        let spec = JobSpec::convert(MediaCategory::Video, OutputFormat::Mp4H264)
            .with_input(dir.path().join("nope.mov"));
        let (state, _) = JobController::start(spec, sink, stub_config(&tool))
            .wait()
            .await;
        assert_eq!(state, JobState::Error);
    }

    #[tokio::test]
    async fn test_output_collision_respects_overwrite_flag() {
        let dir = TempDir::new().unwrap();
        let tool = write_stub_tool(
            dir.path(),
            "for a in \"$@\"; do out=$a; done\n: > \"$out\"\nexit 0\n",
        );
        let existing = dir.path().join("clip_converted.mp4");
        std::fs::write(&existing, b"previous run").unwrap();

        let (sink, _rx) = EventSink::channel();
        let spec = convert_spec(&dir);
        let (state, _) = JobController::start(spec, sink, stub_config(&tool))
            .wait()
            .await;
        assert_eq!(state, JobState::Error);

        let (sink, _rx) = EventSink::channel();
        let spec = convert_spec(&dir).with_overwrite(true);
        let (state, _) = JobController::start(spec, sink, stub_config(&tool))
            .wait()
            .await;
        assert_eq!(state, JobState::Done);
    }

    #[tokio::test]
    async fn test_failing_process_reports_tail() {
        let dir = TempDir::new().unwrap();
        let tool = write_stub_tool(
            dir.path(),
            "echo 'Unknown encoder libfoo' >&2\nexit 1\n",
        );
        let (sink, mut rx) = EventSink::channel();
        let spec = convert_spec(&dir);
        let (state, _) = JobController::start(spec, sink, stub_config(&tool))
            .wait()
            .await;
        assert_eq!(state, JobState::Error);

        let mut error_message = None;
        while let Ok(event) = rx.try_recv() {
            if let JobEvent::State {
                state: JobState::Error,
                message,
                ..
            } = event
            {
                error_message = message;
            }
        }
        let error_message = error_message.unwrap();
        assert!(error_message.contains("exited with code 1"));
        assert!(error_message.contains("Unknown encoder libfoo"));
    }

    #[tokio::test]
    async fn test_process_failure_surfaces_exit_code_and_tail() {
        let dir = TempDir::new().unwrap();
        let tool = write_stub_tool(
            dir.path(),
            "echo 'Unknown encoder libfoo' >&2\nexit 1\n",
        );
        let (sink, _rx) = EventSink::channel();
        let spec = convert_spec(&dir);
        let outcome = JobController::start(spec, sink, stub_config(&tool))
            .outcome()
            .await;

        match outcome {
            Err(crate::EngineError::Media(MediaError::ProcessFailed {
                exit_code,
                stderr_tail,
                ..
            })) => {
                assert_eq!(exit_code, Some(1));
                assert!(stderr_tail.unwrap().contains("Unknown encoder libfoo"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_outcome_is_cancelled_error() {
        let dir = TempDir::new().unwrap();
        let tool = write_stub_tool(dir.path(), "sleep 30\n");
        let (sink, _rx) = EventSink::channel();
        let spec = convert_spec(&dir);
        let controller = JobController::start(spec, sink, stub_config(&tool));

        wait_for_state(&controller, JobState::Running).await;
        controller.cancel();
        let outcome = controller.outcome().await;
        assert!(matches!(
            outcome,
            Err(crate::EngineError::Media(MediaError::Cancelled))
        ));
    }

    #[tokio::test]
    async fn test_emulated_pause_mutes_progress_and_keeps_process() {
        let dir = TempDir::new().unwrap();
        // Keeps emitting status lines so a leaky pause would show up as
        // progress events.
        let tool = write_stub_tool(
            dir.path(),
            r#"
i=0
while [ $i -lt 200 ]; do
  printf 'time=00:00:01.00 bitrate=1k\n' >&2
  sleep 0.05
  i=$((i+1))
done
"#,
        );
        let (sink, mut rx) = EventSink::channel();
        let spec = convert_spec(&dir);
        let mut config = stub_config(&tool);
        config.pause_mode = PauseMode::Emulated;
        let controller = JobController::start(spec, sink, config);

        wait_for_state(&controller, JobState::Running).await;
        let pid_before = controller.pid().unwrap();

        controller.pause();
        wait_for_state(&controller, JobState::Paused).await;
        // Everything up to and including the Paused transition is
        // pre-pause backlog.
        let _ = collect_states(&mut rx);

        tokio::time::sleep(Duration::from_millis(400)).await;
        let (states, progress) = collect_states(&mut rx);
        assert!(states.is_empty());
        assert!(progress.is_empty());

        controller.resume();
        wait_for_state(&controller, JobState::Running).await;
        assert_eq!(controller.pid().unwrap(), pid_before);

        // The process never stopped, so progress flows again on resume
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(JobEvent::Progress(_)) = rx.recv().await {
                    break;
                }
            }
        })
        .await
        .unwrap();

        controller.cancel();
        let (state, _) = controller.wait().await;
        assert_eq!(state, JobState::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_kills_stubborn_process_after_grace() {
        let dir = TempDir::new().unwrap();
        // sleep ignores stdin, so the graceful quit is never observed
        let tool = write_stub_tool(dir.path(), "sleep 30\n");
        let (sink, _rx) = EventSink::channel();
        let spec = convert_spec(&dir);
        let controller = JobController::start(spec, sink, stub_config(&tool));

        wait_for_state(&controller, JobState::Running).await;
        let started = Instant::now();
        controller.cancel();
        let (state, artifact) = controller.wait().await;
        assert_eq!(state, JobState::Cancelled);
        assert!(artifact.is_none());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_pause_resume_keeps_same_process() {
        let dir = TempDir::new().unwrap();
        let tool = write_stub_tool(dir.path(), "sleep 30\n");
        let (sink, _rx) = EventSink::channel();
        let spec = convert_spec(&dir);
        let controller = JobController::start(spec, sink, stub_config(&tool));

        wait_for_state(&controller, JobState::Running).await;
        let pid_before = controller.pid().unwrap();

        controller.pause();
        wait_for_state(&controller, JobState::Paused).await;

        controller.resume();
        wait_for_state(&controller, JobState::Running).await;
        assert_eq!(controller.pid().unwrap(), pid_before);

        controller.cancel();
        let (state, _) = controller.wait().await;
        assert_eq!(state, JobState::Cancelled);
    }

    #[tokio::test]
    async fn test_control_after_terminal_is_noop() {
        let dir = TempDir::new().unwrap();
        let tool = write_stub_tool(
            dir.path(),
            "for a in \"$@\"; do out=$a; done\n: > \"$out\"\nexit 0\n",
        );
        let (sink, _rx) = EventSink::channel();
        let spec = convert_spec(&dir);
        let controller = JobController::start(spec, sink, stub_config(&tool));
        let handle = controller.handle();
        let (state, _) = controller.wait().await;
        assert_eq!(state, JobState::Done);

        handle.cancel();
        handle.pause();
        assert_eq!(handle.state(), JobState::Done);
    }

    async fn wait_for_state(controller: &JobController, target: JobState) {
        let mut state_rx = controller.subscribe();
        tokio::time::timeout(Duration::from_secs(5), async {
            while *state_rx.borrow() != target {
                state_rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
    }
}
