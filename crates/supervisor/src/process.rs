// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process spawning, stdin writes, and termination escalation.
//!
//! One [`ProcessHandle`] per session. The handle's stdout/stderr readers
//! are taken exactly once by the stream pump; exit is observed through a
//! watch channel fed by a background waiter task, so `wait`, `stop`, and
//! the wall-time watchdog never contend for the child.

use crate::spec::SpawnSpec;
use crate::{env, limits};
use herd_core::{redact_secrets, OrchestratorError, ResourceLimits};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// How a process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitInfo {
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub duration: Duration,
}

impl ExitInfo {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    fn from_status(status: std::process::ExitStatus, duration: Duration) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;
        Self { exit_code: status.code(), signal, duration }
    }

    fn unknown() -> Self {
        Self { exit_code: None, signal: None, duration: Duration::ZERO }
    }
}

/// Live handle to one agent subprocess.
pub struct ProcessHandle {
    pid: u32,
    start_time: Instant,
    limits: ResourceLimits,
    /// Limits the host could not hard-enforce (soft-limit-only).
    soft_limits: Vec<&'static str>,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    stdout: Mutex<Option<ChildStdout>>,
    stderr: Mutex<Option<ChildStderr>>,
    exit_rx: watch::Receiver<Option<ExitInfo>>,
}

impl ProcessHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    pub fn soft_limits(&self) -> &[&'static str] {
        &self.soft_limits
    }

    /// Take the stdout reader. The stream pump calls this exactly once.
    pub fn take_stdout(&self) -> Option<ChildStdout> {
        self.stdout.lock().take()
    }

    /// Take the stderr reader. The stream pump calls this exactly once.
    pub fn take_stderr(&self) -> Option<ChildStderr> {
        self.stderr.lock().take()
    }

    /// Exit info if the process has already exited.
    pub fn exit_info(&self) -> Option<ExitInfo> {
        self.exit_rx.borrow().clone()
    }

    pub fn is_alive(&self) -> bool {
        self.exit_info().is_none()
    }

    /// Close stdin, signalling end-of-input to the agent.
    pub async fn close_stdin(&self) {
        *self.stdin.lock().await = None;
    }

    /// Block until the process exits.
    pub async fn wait(&self) -> ExitInfo {
        let mut rx = self.exit_rx.clone();
        loop {
            let current = rx.borrow().clone();
            if let Some(info) = current {
                return info;
            }
            if rx.changed().await.is_err() {
                // Waiter task gone without reporting; treat as exited.
                return rx.borrow().clone().unwrap_or_else(ExitInfo::unknown);
            }
        }
    }
}

/// Supervisor tunables.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub write_timeout: Duration,
    /// Grace between SIGTERM and SIGKILL during stop escalation.
    pub term_grace: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self { write_timeout: Duration::from_secs(5), term_grace: Duration::from_secs(5) }
    }
}

/// Spawns, observes, and terminates agent subprocesses.
#[derive(Clone, Default)]
pub struct Supervisor {
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }

    /// Start an agent process with piped stdio and best-effort limits.
    ///
    /// A non-zero exit or signal is surfaced via [`ProcessHandle::wait`],
    /// never as a spawn-time error.
    pub fn spawn(&self, spec: &SpawnSpec) -> Result<Arc<ProcessHandle>, OrchestratorError> {
        spec.validate()?;

        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for key in &spec.unset_env {
            cmd.env_remove(key);
        }
        for (key, value) in env::child_env(spec) {
            cmd.env(key, value);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| OrchestratorError::SpawnFailed(redact_secrets(&e.to_string())))?;
        let pid = child
            .id()
            .ok_or_else(|| OrchestratorError::SpawnFailed("pid unavailable".to_string()))?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let soft_limits = limits::apply(pid, &spec.limits);
        let start_time = Instant::now();

        let (exit_tx, exit_rx) = watch::channel(None);
        tokio::spawn(async move {
            let info = match child.wait().await {
                Ok(status) => ExitInfo::from_status(status, start_time.elapsed()),
                Err(e) => {
                    tracing::error!(pid, error = %e, "wait on child failed");
                    ExitInfo::unknown()
                }
            };
            tracing::info!(pid, exit_code = ?info.exit_code, signal = ?info.signal, "agent exited");
            let _ = exit_tx.send(Some(info));
        });

        if let Some(wall) = spec.limits.max_wall_time {
            spawn_wall_time_watchdog(pid, wall, exit_rx.clone());
        }

        tracing::info!(pid, command = %spec.command, cwd = %spec.cwd.display(), "agent spawned");
        Ok(Arc::new(ProcessHandle {
            pid,
            start_time,
            limits: spec.limits.clone(),
            soft_limits,
            stdin: tokio::sync::Mutex::new(stdin),
            stdout: Mutex::new(stdout),
            stderr: Mutex::new(stderr),
            exit_rx,
        }))
    }

    /// Write to the agent's stdin.
    ///
    /// Fails `NotAlive` once the process has exited or stdin was closed,
    /// `WriteTimeout` when the pipe stays full past `write_timeout`, and
    /// `Cancelled` when the session token fires mid-write — shutdown must
    /// not wait out a stuck pipe.
    pub async fn send(
        &self,
        handle: &ProcessHandle,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<(), OrchestratorError> {
        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }
        if handle.exit_info().is_some() {
            return Err(OrchestratorError::NotAlive);
        }
        let mut guard = tokio::select! {
            guard = handle.stdin.lock() => guard,
            _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
        };
        let stdin = guard.as_mut().ok_or(OrchestratorError::NotAlive)?;

        let write = async {
            stdin.write_all(bytes).await?;
            stdin.flush().await?;
            Ok::<(), std::io::Error>(())
        };
        tokio::select! {
            done = tokio::time::timeout(self.config.write_timeout, write) => match done {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    tracing::debug!(pid = handle.pid, error = %e, "stdin write failed");
                    Err(OrchestratorError::NotAlive)
                }
                Err(_) => Err(OrchestratorError::WriteTimeout(self.config.write_timeout)),
            },
            _ = cancel.cancelled() => Err(OrchestratorError::Cancelled),
        }
    }

    /// Stop the process: close stdin, wait `grace`, then SIGTERM, then
    /// after `term_grace` SIGKILL. Returns only after exit. Idempotent.
    pub async fn stop(&self, handle: &ProcessHandle, grace: Duration) -> ExitInfo {
        if let Some(info) = handle.exit_info() {
            return info;
        }

        handle.close_stdin().await;
        if let Ok(info) = tokio::time::timeout(grace, handle.wait()).await {
            return info;
        }

        tracing::info!(pid = handle.pid, "graceful exit timed out, sending SIGTERM");
        let _ = signal_pid(handle.pid, Signal::SIGTERM);
        if let Ok(info) = tokio::time::timeout(self.config.term_grace, handle.wait()).await {
            return info;
        }

        tracing::warn!(pid = handle.pid, "SIGTERM ignored, sending SIGKILL");
        let _ = signal_pid(handle.pid, Signal::SIGKILL);
        handle.wait().await
    }

    /// Block until the process exits.
    pub async fn wait(&self, handle: &ProcessHandle) -> ExitInfo {
        handle.wait().await
    }
}

fn spawn_wall_time_watchdog(
    pid: u32,
    wall: Duration,
    mut exit_rx: watch::Receiver<Option<ExitInfo>>,
) {
    tokio::spawn(async move {
        let expired = tokio::select! {
            _ = tokio::time::sleep(wall) => true,
            _ = exit_rx.wait_for(|v| v.is_some()) => false,
        };
        if expired {
            tracing::warn!(pid, wall_ms = wall.as_millis() as u64, "max_wall_time exceeded, killing agent");
            let _ = signal_pid(pid, Signal::SIGKILL);
        }
    });
}

pub(crate) fn signal_pid(pid: u32, sig: Signal) -> nix::Result<()> {
    kill(Pid::from_raw(pid as i32), sig)
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
