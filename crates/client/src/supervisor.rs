//! Child process lifecycle: spawn, exit detection, and a shutdown sequence
//! that escalates from closing stdin to SIGTERM to SIGKILL.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::diagnostics::{self, Diagnostic, SharedSink};
use crate::error::{ClientError, Result};

/// The protocol streams of a freshly spawned server.
pub struct ProcessStreams {
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
}

/// Owns the server process.
pub struct ProcessSupervisor {
    child: Option<Child>,
    pid: Option<u32>,
    grace: Duration,
    stderr_task: Option<JoinHandle<()>>,
}

impl ProcessSupervisor {
    /// Spawn the configured server.
    ///
    /// Fails with [`ClientError::NotFound`] before anything is spawned if the
    /// executable cannot be located. Stderr is discarded unless a sink is
    /// given, in which case each line is forwarded as
    /// [`Diagnostic::Stderr`].
    pub fn spawn(
        config: &ClientConfig,
        sink: Option<SharedSink>,
    ) -> Result<(Self, ProcessStreams)> {
        let program = resolve_executable(&config.command)?;

        let mut cmd = tokio::process::Command::new(&program);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(if sink.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ClientError::NotFound(program.clone()),
            _ => ClientError::Spawn(e),
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            ClientError::Spawn(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "failed to capture child stdin",
            ))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            ClientError::Spawn(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "failed to capture child stdout",
            ))
        })?;

        let stderr_task = match (child.stderr.take(), sink) {
            (Some(stderr), Some(sink)) => Some(tokio::spawn(forward_stderr(stderr, sink))),
            _ => None,
        };

        let pid = child.id();
        tracing::info!(program = %program.display(), ?pid, "spawned tool server");

        Ok((
            Self {
                child: Some(child),
                pid,
                grace: config.shutdown.grace(),
                stderr_task,
            },
            ProcessStreams { stdin, stdout },
        ))
    }

    /// OS process id, if the process was started.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Non-blocking exit check.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(None)) => true,
            Some(Ok(Some(_))) | Some(Err(_)) | None => false,
        }
    }

    /// Stop the server. Never fails and is a no-op once stopped.
    ///
    /// 1. Close stdin (end of input for a well-behaved server)
    /// 2. Request termination (SIGTERM on Unix)
    /// 3. Wait up to the grace period
    /// 4. Kill and reap
    pub async fn stop(&mut self, stdin: Option<ChildStdin>) {
        if let Some(mut stdin) = stdin {
            if let Err(e) = stdin.shutdown().await {
                tracing::debug!(error = %e, "error closing server stdin");
            }
            drop(stdin);
        }

        let Some(mut child) = self.child.take() else {
            self.abort_stderr();
            return;
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(?status, "tool server already exited");
            }
            _ => {
                request_termination(&mut child, self.pid);
                match tokio::time::timeout(self.grace, child.wait()).await {
                    Ok(Ok(status)) => {
                        tracing::info!(?status, pid = ?self.pid, "tool server exited");
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "error waiting for tool server");
                        kill(&mut child).await;
                    }
                    Err(_) => {
                        tracing::warn!(
                            pid = ?self.pid,
                            grace_ms = self.grace.as_millis() as u64,
                            "tool server did not exit within grace period, killing"
                        );
                        kill(&mut child).await;
                    }
                }
            }
        }

        self.abort_stderr();
    }

    fn abort_stderr(&mut self) {
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}

/// Locate the executable without spawning anything. Bare names are looked
/// up on `PATH`.
fn resolve_executable(command: &Path) -> Result<PathBuf> {
    if command.as_os_str().is_empty() {
        return Err(ClientError::NotFound(command.to_path_buf()));
    }
    if command.components().count() > 1 || command.is_absolute() {
        return if command.exists() {
            Ok(command.to_path_buf())
        } else {
            Err(ClientError::NotFound(command.to_path_buf()))
        };
    }
    which::which(command).map_err(|_| ClientError::NotFound(command.to_path_buf()))
}

#[cfg(unix)]
fn request_termination(child: &mut Child, pid: Option<u32>) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = pid {
        tracing::debug!(pid, "sending SIGTERM to tool server");
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            tracing::debug!(pid, error = ?e, "SIGTERM failed");
        }
    } else if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "start_kill failed");
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child, _pid: Option<u32>) {
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "start_kill failed");
    }
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "failed to kill tool server");
    }
}

async fn forward_stderr(stderr: ChildStderr, sink: SharedSink) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                diagnostics::report(Some(&sink), Diagnostic::Stderr(line));
            }
        }
    }
}
