//! Child process lifecycle control.
//!
//! A [`ProcessHandle`] owns one spawned tool process with piped stdin and
//! stderr. It exposes the control surface the engine needs: a graceful-quit
//! byte on stdin, OS-level suspend/resume, and a terminate sequence with a
//! bounded grace period followed by a hard kill.

use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Byte written to the tool's stdin to request a graceful stop.
pub const QUIT_BYTE: u8 = b'q';

pub struct ProcessHandle {
    child: Child,
    pid: u32,
    started_at: Instant,
}

impl ProcessHandle {
    /// Spawn `program` with `args`, piping stdin and stderr.
    ///
    /// stdout is discarded; the tool writes its diagnostics and progress
    /// markers to stderr. The child is killed if the handle is dropped
    /// without waiting, so no process can outlive its job.
    pub fn spawn(program: impl AsRef<OsStr>, args: &[String]) -> MediaResult<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(MediaError::Spawn)?;

        let pid = child.id().ok_or_else(|| {
            MediaError::Spawn(std::io::Error::other(
                "process exited before a pid could be read",
            ))
        })?;

        Ok(Self {
            child,
            pid,
            started_at: Instant::now(),
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Take the stderr line stream. Yields `Some` exactly once.
    pub fn take_stderr_lines(&mut self) -> Option<Lines<BufReader<ChildStderr>>> {
        self.child
            .stderr
            .take()
            .map(|stderr| BufReader::new(stderr).lines())
    }

    /// Write a single control byte to the tool's stdin.
    pub async fn send_control_byte(&mut self, byte: u8) -> MediaResult<()> {
        let stdin = self.child.stdin.as_mut().ok_or_else(|| {
            MediaError::Io(std::io::Error::other("process stdin is closed"))
        })?;
        stdin.write_all(&[byte]).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Ask the tool to finish up and exit on its own.
    pub async fn graceful_quit(&mut self) -> MediaResult<()> {
        self.send_control_byte(QUIT_BYTE).await
    }

    /// Suspend the process without ending it (SIGSTOP).
    pub fn suspend(&self) -> MediaResult<()> {
        self.signal_stop_cont(true)
    }

    /// Resume a suspended process (SIGCONT).
    pub fn resume(&self) -> MediaResult<()> {
        self.signal_stop_cont(false)
    }

    #[cfg(unix)]
    fn signal_stop_cont(&self, stop: bool) -> MediaResult<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let signal = if stop { Signal::SIGSTOP } else { Signal::SIGCONT };
        kill(Pid::from_raw(self.pid as i32), signal)
            .map_err(|errno| MediaError::Io(std::io::Error::from_raw_os_error(errno as i32)))
    }

    #[cfg(not(unix))]
    fn signal_stop_cont(&self, _stop: bool) -> MediaResult<()> {
        Err(MediaError::Unsupported("process suspension"))
    }

    /// Check for exit without blocking.
    pub fn try_wait(&mut self) -> MediaResult<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    /// Wait for the process to exit.
    pub async fn wait(&mut self) -> MediaResult<ExitStatus> {
        Ok(self.child.wait().await?)
    }

    /// Stop the process: resume it if suspended, request a graceful quit,
    /// and hard-kill once the grace period elapses.
    ///
    /// The returned status is the real exit status when the process obeyed
    /// the quit request, or the kill status otherwise.
    pub async fn terminate(&mut self, grace: Duration) -> MediaResult<ExitStatus> {
        // A suspended process cannot observe the quit request.
        let _ = self.resume();
        if let Err(e) = self.graceful_quit().await {
            debug!(pid = self.pid, error = %e, "graceful quit not delivered");
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => Ok(status?),
            Err(_) => {
                warn!(pid = self.pid, "process ignored graceful quit, killing");
                self.child.kill().await?;
                Ok(self.child.wait().await?)
            }
        }
    }
}
