// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session manager operations: create, execute, cancel, close, query.
//!
//! Every state transition goes through the session record's mutex, so
//! per-session transitions are serialized; cross-session operations
//! carry no ordering guarantee.

use crate::api::{ExecOptions, Orchestrator};
use crate::echo::{EchoListener, EchoProbe, EchoTable};
use crate::live::{CurrentExecution, LiveSession};
use crate::tracker::ExecutionTracker;
use herd_core::{
    Clock, CloseReason, ErrorKind, ErrorSummary, Event, Execution, ExecutionId, ExecutionStatus,
    HealthStatus, OrchestratorError, ReuseKey, Session, SessionConfig, SessionId, SessionState,
    SessionSummary, UserId, WorkspaceId,
};
use herd_reliability::{HealthChecker, Probe};
use herd_stream::handlers::{
    CompletionFinalizer, CompletionSignal, ErrorCounter, ProgressForwarder, SystemMetadataMerger,
    TextLogger, ToolUseRecorder,
};
use herd_stream::{
    BackpressureBuffer, BridgeConsumer, BufferConfig, BufferEvent, HandlerCtx, Pump, Router,
    RouterMode, StreamBridge, StreamParser,
};
use herd_supervisor::{LivenessProbe, ProcessHandle, ResourceProbe, SpawnSpec};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

enum MonitorOutcome {
    Signal(CompletionSignal),
    Cancelled,
    TimedOut,
}

impl<C: Clock + 'static> Orchestrator<C> {
    // ------------------------------------------------------------------
    // CreateSession
    // ------------------------------------------------------------------

    pub async fn create_session(
        &self,
        workspace_id: WorkspaceId,
        user_id: UserId,
        config: SessionConfig,
    ) -> Result<SessionSummary, OrchestratorError> {
        config.validate()?;

        let breaker_key = self.breakers.key_for(&workspace_id, None);
        let breaker = self.breakers.get(&breaker_key);
        breaker.admit(self.clock.now())?;

        // Pool reuse: a compatible idle session is claimed instead of
        // spawning a fresh process.
        let reuse_key = config.reuse_key(&workspace_id);
        if let Some(live) = self.claim_reusable(&reuse_key) {
            let summary = {
                let record = live.record.lock();
                record.summary()
            };
            tracing::info!(session_id = %summary.id, workspace_id = %workspace_id, "session reused");
            self.bus.publish(Event::SessionReused {
                session_id: summary.id,
                workspace_id: workspace_id.clone(),
            });
            self.persist_live(&live);
            return Ok(summary);
        }

        // Per-workspace capacity cap over non-closed sessions.
        let open = self
            .table
            .snapshot()
            .iter()
            .filter(|s| {
                let record = s.record.lock();
                record.workspace_id == workspace_id && record.state != SessionState::Closed
            })
            .count();
        if open >= self.config.max_sessions_per_workspace {
            return Err(OrchestratorError::CapacityExhausted {
                workspace: workspace_id.to_string(),
            });
        }

        let mut session = Session::new(workspace_id.clone(), user_id, config, &self.clock);
        let session_id = session.id;
        session.transition(SessionState::Initializing, self.clock.epoch_ms())?;

        let spawned = self.spawn_process(&session).await;
        let handle = match spawned {
            Ok(handle) => {
                if let Some((from, to)) = breaker.record_success() {
                    self.bus.publish(Event::BreakerStateChanged {
                        key: breaker_key.clone(),
                        from,
                        to,
                    });
                }
                handle
            }
            Err(e) => {
                if let Some((from, to)) = breaker.record_failure(self.clock.now()) {
                    self.bus.publish(Event::BreakerStateChanged {
                        key: breaker_key.clone(),
                        from,
                        to,
                    });
                }
                let now = self.clock.epoch_ms();
                session.transition(SessionState::Error, now)?;
                session.transition(SessionState::Closing, now)?;
                session.transition(SessionState::Closed, now)?;
                let _ = self.repo.save(&session.summary());
                tracing::error!(session_id = %session_id, error = %e, "session create failed");
                return Err(e);
            }
        };

        let live = self.build_pipeline(session, handle, reuse_key);
        self.table.insert(session_id, live.clone());

        {
            let mut record = live.record.lock();
            record.transition(SessionState::Ready, self.clock.epoch_ms())?;
        }
        self.bus.publish(Event::SessionCreated { session_id, workspace_id });
        self.publish_state(&live, SessionState::Initializing, SessionState::Ready);
        self.persist_live(&live);

        let summary = live.record.lock().summary();
        Ok(summary)
    }

    /// Claim an idle session whose reuse key matches, transitioning it
    /// to `Active` under its record lock.
    fn claim_reusable(&self, reuse_key: &ReuseKey) -> Option<Arc<LiveSession>> {
        for live in self.table.snapshot() {
            if &live.reuse_key != reuse_key {
                continue;
            }
            let mut record = live.record.lock();
            if record.state != SessionState::Idle {
                continue;
            }
            if record.transition(SessionState::Active, self.clock.epoch_ms()).is_ok() {
                drop(record);
                self.publish_state(&live, SessionState::Idle, SessionState::Active);
                return Some(live);
            }
        }
        None
    }

    async fn spawn_process(
        &self,
        session: &Session,
    ) -> Result<Arc<ProcessHandle>, OrchestratorError> {
        let (resolved_cwd, env_overrides) =
            self.workspaces.resolve_working_dir(&session.workspace_id)?;
        // An explicit working_dir in the session config overrides the
        // workspace resolver.
        let cwd = session.config.working_dir.clone().unwrap_or(resolved_cwd);
        let credential = match &session.config.credential {
            Some(c) => Some(c.clone()),
            None => self.credentials.get().await?,
        };
        if let Some(token) = &credential {
            self.credentials.validate(token)?;
        }

        let mut spec = SpawnSpec::new(&self.config.agent_command, cwd)
            .args(self.config.agent_args.iter().cloned())
            .arg("--max-turns")
            .arg(session.config.max_turns.to_string())
            .arg("--tool-timeout-ms")
            .arg(session.config.tool_timeout.as_millis().to_string())
            .limits(session.config.resource_limits.clone());
        if let Some(prompt) = &session.config.system_prompt {
            spec = spec.arg("--system-prompt").arg(prompt);
        }
        if !session.config.allowed_tools.is_empty() {
            spec = spec.arg("--allowed-tools").arg(session.config.allowed_tools.join(","));
        }
        for (key, value) in env_overrides {
            spec = spec.env_var(key, value);
        }
        for (key, value) in &session.config.env {
            spec = spec.env_var(key, value);
        }
        if let Some(token) = credential {
            spec = spec.credential(token);
        }

        let supervisor = self.supervisor.clone();
        let outcome = self
            .retrier
            .run(&self.shutdown, self.rng.as_ref(), move |_attempt| {
                let supervisor = supervisor.clone();
                let spec = spec.clone();
                async move { supervisor.spawn(&spec) }
            })
            .await;
        if outcome.attempts > 1 {
            tracing::info!(session_id = %session.id, attempts = outcome.attempts, "spawn retried");
        }
        outcome.result
    }

    /// Wire the stream pipeline and background tasks for a new process.
    fn build_pipeline(
        &self,
        session: Session,
        handle: Arc<ProcessHandle>,
        reuse_key: ReuseKey,
    ) -> Arc<LiveSession> {
        let session_id = session.id;
        let cancel = self.shutdown.child_token();

        let buffer = Arc::new(BackpressureBuffer::new(BufferConfig::for_session(
            session.config.buffer_capacity,
            session.config.buffer_bytes,
            session.config.drop_policy,
        )));
        let (buffer_events_tx, buffer_events_rx) = mpsc::unbounded_channel();
        buffer.set_event_sink(buffer_events_tx);

        let parser = StreamParser::new(session_id, self.config.parser.clone());
        let pump = Arc::new(Pump::new(parser, buffer.clone(), cancel.clone()));

        let router = Router::new(RouterMode::Sequential);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (burst_tx, burst_rx) = mpsc::unbounded_channel();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();

        let error_counter =
            ErrorCounter::new(self.config.error_window, self.config.error_threshold, burst_tx);
        let error_total = error_counter.total();
        let merger = SystemMetadataMerger::new();
        let metadata = merger.merged();
        let recorder = ToolUseRecorder::new();
        let tools = recorder.invocations();

        router.register(Arc::new(TextLogger));
        router.register(Arc::new(recorder));
        router.register(Arc::new(error_counter));
        router.register(Arc::new(merger));
        router.register(Arc::new(ProgressForwarder::new(
            self.config.progress_min_interval,
            progress_tx,
        )));
        router.register(Arc::new(CompletionFinalizer::new(completion_tx)));

        // Health checking: liveness and resource budget always; the
        // echo probe only for agents that implement the ping contract.
        let mut probes: Vec<Arc<dyn Probe>> = vec![
            Arc::new(LivenessProbe::new(handle.pid())),
            Arc::new(ResourceProbe::new(handle.pid(), session.config.resource_limits.clone())),
        ];
        if self.config.enable_echo_probe {
            let echo_table = EchoTable::new();
            router.register(Arc::new(EchoListener::new(echo_table.clone())));
            probes.push(Arc::new(EchoProbe::new(
                echo_table,
                self.supervisor.clone(),
                handle.clone(),
                cancel.clone(),
            )));
        }
        let health = Arc::new(HealthChecker::new(self.config.health.clone(), probes));

        let live = Arc::new(LiveSession {
            record: Mutex::new(session),
            reuse_key,
            handle: Mutex::new(Some(handle.clone())),
            buffer: buffer.clone(),
            router: router.clone(),
            pump: pump.clone(),
            cancel: cancel.clone(),
            current_exec: Mutex::new(None),
            current_bridge: Mutex::new(None),
            completion_rx: tokio::sync::Mutex::new(completion_rx),
            health: health.clone(),
            error_total,
            metadata,
            tools,
        });

        // Stdout pump: parse until EOF, then derive the terminal message
        // from the exit status.
        if let Some(stdout) = handle.take_stdout() {
            let pump = pump.clone();
            let clock = self.clock.clone();
            let exit_handle = handle.clone();
            tokio::spawn(async move {
                let exit = async move {
                    let info = exit_handle.wait().await;
                    (info.exit_code, info.signal)
                };
                pump.run_stdout(stdout, &clock, exit).await;
            });
        }
        if let Some(stderr) = handle.take_stderr() {
            let pump = pump.clone();
            let clock = self.clock.clone();
            tokio::spawn(async move { pump.run_stderr(stderr, &clock).await });
        }

        // Router drain loop.
        {
            let router = router.clone();
            let ctx = HandlerCtx { session_id, cancel: cancel.clone() };
            tokio::spawn(async move { router.run(&buffer, &ctx).await });
        }

        // Health loop.
        let (unhealthy_tx, unhealthy_rx) = mpsc::channel(4);
        {
            let health = health.clone();
            let clock = self.clock.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { health.run(clock, cancel, unhealthy_tx).await });
        }

        // Session lifecycle loop: buffer events, error bursts, health.
        {
            let this = self.clone();
            let live = live.clone();
            tokio::spawn(async move {
                this.run_lifecycle(live, buffer_events_rx, burst_rx, progress_rx, unhealthy_rx)
                    .await
            });
        }

        // Exit watcher: a dead process must not leave a live session.
        {
            let this = self.clone();
            let live = live.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = handle.wait() => {}
                    _ = cancel.cancelled() => return,
                }
                // Let the stream tail and execution monitor settle first.
                tokio::time::sleep(this.config.shutdown_grace).await;
                let state = live.state();
                if !matches!(state, SessionState::Closing | SessionState::Closed) {
                    let _ = this.close_internal(&live, CloseReason::AgentExited).await;
                }
            });
        }

        live
    }

    async fn run_lifecycle(
        self,
        live: Arc<LiveSession>,
        mut buffer_events_rx: mpsc::UnboundedReceiver<BufferEvent>,
        mut burst_rx: mpsc::UnboundedReceiver<u32>,
        mut progress_rx: mpsc::UnboundedReceiver<herd_stream::ProgressUpdate>,
        mut unhealthy_rx: mpsc::Receiver<u32>,
    ) {
        let session_id = live.record.lock().id;
        loop {
            tokio::select! {
                Some(event) = buffer_events_rx.recv() => match event {
                    BufferEvent::Resized { from, to } => {
                        self.bus.publish(Event::BufferResized { session_id, from, to });
                    }
                    BufferEvent::SlowConsumer { residency } => {
                        self.bus.publish(Event::SlowConsumer {
                            session_id,
                            residency_ms: residency.as_millis() as u64,
                        });
                        if let Some(bridge) = live.current_bridge.lock().clone() {
                            bridge.degrade();
                        }
                    }
                },
                Some(count) = burst_rx.recv() => {
                    tracing::warn!(session_id = %session_id, count, "error threshold exceeded");
                    self.fail_session(&live, CloseReason::Error).await;
                }
                Some(update) = progress_rx.recv() => {
                    if let Some(execution_id) = live.current_execution_id() {
                        self.bus.publish(Event::ExecutionProgress {
                            execution_id,
                            progress: update.progress,
                            message_count: update.sequence_no,
                        });
                    }
                }
                Some(failures) = unhealthy_rx.recv() => {
                    self.bus.publish(Event::HealthUnhealthy {
                        session_id,
                        consecutive_failures: failures,
                    });
                    self.fail_session(&live, CloseReason::Error).await;
                }
                _ = live.cancel.cancelled() => return,
                else => return,
            }
        }
    }

    /// Drive a live session to `Error` and close it.
    async fn fail_session(&self, live: &Arc<LiveSession>, reason: CloseReason) {
        let transitioned = {
            let mut record = live.record.lock();
            let from = record.state;
            if record.state.can_transition(SessionState::Error) {
                record.transition(SessionState::Error, self.clock.epoch_ms()).is_ok().then_some(from)
            } else {
                None
            }
        };
        if let Some(from) = transitioned {
            self.publish_state(live, from, SessionState::Error);
        }
        let _ = self.close_internal(live, reason).await;
    }

    // ------------------------------------------------------------------
    // Execute
    // ------------------------------------------------------------------

    pub async fn execute(
        &self,
        session_id: SessionId,
        prompt: &str,
        opts: ExecOptions,
    ) -> Result<(ExecutionId, BridgeConsumer), OrchestratorError> {
        let live = self
            .table
            .get(&session_id)
            .ok_or_else(|| OrchestratorError::NotFound(session_id.to_string()))?;
        let now = self.clock.epoch_ms();

        // Gate on state under the record lock; the session serves one
        // execution at a time.
        let from = {
            let mut record = live.record.lock();
            let from = record.state;
            match record.state {
                SessionState::Ready | SessionState::Idle | SessionState::Suspended => {
                    record.transition(SessionState::Active, now)?;
                }
                SessionState::Active if live.current_exec.lock().is_none() => {
                    record.touch(now);
                }
                other => {
                    return Err(OrchestratorError::InvalidTransition {
                        from: other,
                        to: SessionState::Active,
                    })
                }
            }
            record.stats.record_command();
            record.stats.record_bytes_in(prompt.len() as u64 + 1);
            from
        };
        if from != SessionState::Active {
            self.publish_state(&live, from, SessionState::Active);
        }

        let execution = Execution::new(session_id, now);
        let execution_id = execution.id;
        let exec = Arc::new(Mutex::new(execution));
        let exec_cancel = live.cancel.child_token();
        *live.current_exec.lock() = Some(CurrentExecution {
            id: execution_id,
            record: exec.clone(),
            cancel: exec_cancel.clone(),
        });
        self.repo.save_execution(&exec.lock().clone())?;
        self.bus.publish(Event::ExecutionStarted { execution_id, session_id });

        // Per-execution delivery: bridge to the consumer plus tracker.
        let (bridge, consumer) = StreamBridge::new(self.config.bridge.clone());
        let bridge = Arc::new(bridge);
        live.router.register(bridge.clone());
        live.router.register(Arc::new(ExecutionTracker::new(exec.clone())));
        *live.current_bridge.lock() = Some(bridge.clone());
        if opts.expect_pings {
            let bridge = bridge.clone();
            let cancel = exec_cancel.clone();
            tokio::spawn(async move { bridge.run_ping_watchdog(cancel).await });
        }

        // Drop terminal signals left over from a previous execution.
        {
            let mut completion_rx = live.completion_rx.lock().await;
            while completion_rx.try_recv().is_ok() {}
        }

        let handle = live.handle.lock().clone().ok_or(OrchestratorError::NotAlive)?;
        let mut line = prompt.to_string();
        line.push('\n');
        if let Err(e) = self.supervisor.send(&handle, line.as_bytes(), &live.cancel).await {
            self.abort_execution(&live, &exec, e.summary(), now);
            if matches!(e, OrchestratorError::NotAlive) {
                let _ = self.close_internal(&live, CloseReason::AgentExited).await;
            }
            return Err(e);
        }

        let timeout = opts.execution_timeout.unwrap_or(self.config.execution_timeout);
        {
            let this = self.clone();
            let live = live.clone();
            let exec = exec.clone();
            tokio::spawn(async move {
                this.run_execution_monitor(live, execution_id, exec, exec_cancel, bridge, timeout)
                    .await
            });
        }

        Ok((execution_id, consumer))
    }

    /// Roll back a failed execute() before the monitor existed.
    fn abort_execution(
        &self,
        live: &Arc<LiveSession>,
        exec: &Arc<Mutex<Execution>>,
        summary: ErrorSummary,
        now_ms: u64,
    ) {
        {
            let mut exec = exec.lock();
            exec.fail(summary, now_ms);
        }
        live.router.deregister("stream-bridge");
        live.router.deregister("execution-tracker");
        *live.current_bridge.lock() = None;
        *live.current_exec.lock() = None;
        let _ = self.repo.save_execution(&exec.lock().clone());
    }

    async fn run_execution_monitor(
        self,
        live: Arc<LiveSession>,
        execution_id: ExecutionId,
        exec: Arc<Mutex<Execution>>,
        exec_cancel: tokio_util::sync::CancellationToken,
        bridge: Arc<StreamBridge>,
        timeout: std::time::Duration,
    ) {
        let outcome = {
            let mut completion_rx = live.completion_rx.lock().await;
            tokio::select! {
                signal = completion_rx.recv() => match signal {
                    Some(signal) => MonitorOutcome::Signal(signal),
                    None => MonitorOutcome::Cancelled,
                },
                _ = exec_cancel.cancelled() => MonitorOutcome::Cancelled,
                _ = tokio::time::sleep(timeout) => MonitorOutcome::TimedOut,
            }
        };

        let now = self.clock.epoch_ms();

        // Tear down per-execution wiring BEFORE any state transition:
        // once the session re-enters Idle the next execute() may install
        // its own bridge and tracker.
        if bridge.disconnect_reason().is_some() {
            exec.lock().resumable = true;
        }
        live.router.deregister("stream-bridge");
        live.router.deregister("execution-tracker");
        *live.current_bridge.lock() = None;
        *live.current_exec.lock() = None;

        let mut close_reason = None;
        match outcome {
            MonitorOutcome::Signal(CompletionSignal::Completed { .. }) => {
                exec.lock().finish(ExecutionStatus::Completed, now);
                self.transition_if(&live, SessionState::Active, SessionState::Idle);
            }
            MonitorOutcome::Signal(CompletionSignal::Failed { reason, exit_code, .. }) => {
                exec.lock().fail(
                    ErrorSummary {
                        kind: match exit_code {
                            Some(_) => ErrorKind::AgentExited,
                            None => ErrorKind::AgentProtocol,
                        },
                        message: reason,
                    },
                    now,
                );
                self.transition_if(&live, SessionState::Active, SessionState::Error);
                close_reason = Some(CloseReason::AgentExited);
            }
            MonitorOutcome::Cancelled => {
                exec.lock().cancel(now);
                self.transition_if(&live, SessionState::Active, SessionState::Idle);
            }
            MonitorOutcome::TimedOut => {
                exec.lock().fail(
                    ErrorSummary {
                        kind: ErrorKind::TimedOut,
                        message: format!("execution exceeded {}ms", timeout.as_millis()),
                    },
                    now,
                );
                self.transition_if(&live, SessionState::Active, SessionState::Idle);
            }
        }

        let (status, final_exec) = {
            let exec = exec.lock();
            (exec.status, exec.clone())
        };
        let _ = self.repo.save_execution(&final_exec);
        live.sync_stats();
        self.persist_live(&live);
        self.bus.publish(Event::ExecutionFinished { execution_id, status });

        if let Some(reason) = close_reason {
            let _ = self.close_internal(&live, reason).await;
        }
    }

    /// Transition `from → to` only when the session is still in `from`.
    fn transition_if(&self, live: &Arc<LiveSession>, from: SessionState, to: SessionState) {
        let applied = {
            let mut record = live.record.lock();
            record.state == from && record.transition(to, self.clock.epoch_ms()).is_ok()
        };
        if applied {
            self.publish_state(live, from, to);
        }
    }

    // ------------------------------------------------------------------
    // Cancel / suspend / close
    // ------------------------------------------------------------------

    pub async fn cancel_execution(
        &self,
        execution_id: ExecutionId,
    ) -> Result<(), OrchestratorError> {
        for live in self.table.snapshot() {
            let cancel = {
                let current = live.current_exec.lock();
                current.as_ref().filter(|cur| cur.id == execution_id).map(|cur| cur.cancel.clone())
            };
            if let Some(cancel) = cancel {
                tracing::info!(execution_id = %execution_id, "cancelling execution");
                cancel.cancel();
                return Ok(());
            }
        }

        // Not in flight: cancelling a finished execution is a no-op.
        match self.repo.find_execution(&execution_id)? {
            Some(exec) if exec.status.is_terminal() => Ok(()),
            Some(mut exec) => {
                exec.cancel(self.clock.epoch_ms());
                self.repo.save_execution(&exec)?;
                Ok(())
            }
            None => Err(OrchestratorError::NotFound(execution_id.to_string())),
        }
    }

    /// Explicit pause: `Idle → Suspended`. The process stays alive.
    pub fn suspend_session(&self, session_id: SessionId) -> Result<(), OrchestratorError> {
        let live = self
            .table
            .get(&session_id)
            .ok_or_else(|| OrchestratorError::NotFound(session_id.to_string()))?;
        {
            let mut record = live.record.lock();
            record.transition(SessionState::Suspended, self.clock.epoch_ms())?;
        }
        self.publish_state(&live, SessionState::Idle, SessionState::Suspended);
        self.persist_live(&live);
        Ok(())
    }

    pub async fn close_session(&self, session_id: SessionId) -> Result<(), OrchestratorError> {
        match self.table.get(&session_id) {
            Some(live) => self.close_internal(&live, CloseReason::UserRequested).await,
            None => match self.repo.find(&session_id)? {
                // Idempotent: closing an already-closed session is ok.
                Some(summary) if summary.state == SessionState::Closed => Ok(()),
                Some(_) | None => Err(OrchestratorError::NotFound(session_id.to_string())),
            },
        }
    }

    pub(crate) async fn close_internal(
        &self,
        live: &Arc<LiveSession>,
        reason: CloseReason,
    ) -> Result<(), OrchestratorError> {
        let now = self.clock.epoch_ms();
        let from = {
            let mut record = live.record.lock();
            let from = record.state;
            match record.state {
                SessionState::Closed | SessionState::Closing => return Ok(()),
                SessionState::Created | SessionState::Initializing => {
                    if record.state == SessionState::Created {
                        record.transition(SessionState::Initializing, now)?;
                    }
                    record.transition(SessionState::Error, now)?;
                    record.transition(SessionState::Closing, now)?;
                }
                _ => {
                    record.transition(SessionState::Closing, now)?;
                }
            }
            from
        };
        self.publish_state(live, from, SessionState::Closing);
        tracing::info!(session_id = %live.record.lock().id, %reason, "closing session");

        // Drain the outstanding execution.
        if let Some(current) = live.current_exec.lock().as_ref() {
            current.cancel.cancel();
        }

        // Stop the process with the configured grace, then tear down the
        // pipeline tasks.
        let handle = live.handle.lock().take();
        if let Some(handle) = handle {
            self.supervisor.stop(&handle, self.config.grace_period).await;
        }
        live.cancel.cancel();
        live.buffer.close();

        let session_id = {
            let mut record = live.record.lock();
            let now = self.clock.epoch_ms();
            record.transition(SessionState::Closed, now)?;
            record.id
        };
        self.publish_state(live, SessionState::Closing, SessionState::Closed);

        live.sync_stats();
        self.repo.save(&live.record.lock().summary())?;

        self.bus.publish(Event::SessionClosed { session_id, reason });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get_session(&self, session_id: &SessionId) -> Result<SessionSummary, OrchestratorError> {
        if let Some(live) = self.table.get(session_id) {
            live.sync_stats();
            return Ok(live.record.lock().summary());
        }
        self.repo
            .find(session_id)?
            .ok_or_else(|| OrchestratorError::NotFound(session_id.to_string()))
    }

    pub fn list_sessions(
        &self,
        workspace_id: Option<&WorkspaceId>,
    ) -> Result<Vec<SessionSummary>, OrchestratorError> {
        let mut summaries = match workspace_id {
            Some(ws) => self.repo.find_by_workspace(ws)?,
            None => self.repo.list()?,
        };
        // Live records are fresher than the last persisted snapshot.
        for live in self.table.snapshot() {
            live.sync_stats();
            let record = live.record.lock();
            if workspace_id.map(|ws| &record.workspace_id == ws).unwrap_or(true) {
                let summary = record.summary();
                match summaries.iter_mut().find(|s| s.id == summary.id) {
                    Some(slot) => *slot = summary,
                    None => summaries.push(summary),
                }
            }
        }
        summaries.sort_by_key(|s| s.created_at_ms);
        Ok(summaries)
    }

    pub fn get_execution(&self, execution_id: &ExecutionId) -> Result<Execution, OrchestratorError> {
        for live in self.table.snapshot() {
            let current = live.current_exec.lock();
            if let Some(cur) = current.as_ref().filter(|cur| cur.id == *execution_id) {
                return Ok(cur.record.lock().clone());
            }
        }
        self.repo
            .find_execution(execution_id)?
            .ok_or_else(|| OrchestratorError::NotFound(execution_id.to_string()))
    }

    pub fn list_executions(
        &self,
        session_id: Option<&SessionId>,
    ) -> Result<Vec<Execution>, OrchestratorError> {
        let mut executions = self.repo.list_executions(session_id)?;
        for live in self.table.snapshot() {
            let current = live.current_exec.lock();
            if let Some(cur) = current.as_ref() {
                let exec = cur.record.lock().clone();
                if session_id.map(|id| exec.session_id == *id).unwrap_or(true) {
                    match executions.iter_mut().find(|e| e.id == exec.id) {
                        Some(slot) => *slot = exec,
                        None => executions.push(exec),
                    }
                }
            }
        }
        executions.sort_by_key(|e| e.started_at_ms);
        Ok(executions)
    }

    /// Health snapshot for a live session's process.
    pub fn session_health(&self, session_id: &SessionId) -> Option<HealthStatus> {
        self.table.get(session_id).map(|live| live.health.status())
    }

    // ------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------

    fn publish_state(&self, live: &Arc<LiveSession>, from: SessionState, to: SessionState) {
        let session_id = live.record.lock().id;
        self.bus.publish(Event::SessionStateChanged { session_id, from, to });
    }

    pub(crate) fn persist_live(&self, live: &Arc<LiveSession>) {
        live.sync_stats();
        let summary = live.record.lock().summary();
        if let Err(e) = self.repo.save(&summary) {
            tracing::warn!(session_id = %summary.id, error = %e, "persist failed");
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
