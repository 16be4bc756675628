// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The upstream API facade consumed by transport handlers.

use crate::bus::EventBus;
use crate::credential::CredentialProvider;
use crate::table::SessionTable;
use crate::workspace::WorkspaceResolver;
use herd_core::{Clock, RandomSource, SystemClock, SystemRandom};
use herd_reliability::{Backoff, BreakerConfig, BreakerRegistry, BreakerScope, HealthConfig, Retrier};
use herd_storage::SessionRepository;
use herd_stream::{BridgeConfig, ParserConfig};
use herd_supervisor::{Supervisor, SupervisorConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Orchestrator-wide tunables. Per-session knobs live in
/// [`herd_core::SessionConfig`].
#[derive(Clone)]
pub struct OrchestratorConfig {
    /// The agent binary every session spawns.
    pub agent_command: String,
    pub agent_args: Vec<String>,
    pub max_sessions_per_workspace: usize,
    pub reaper_interval: Duration,
    /// Grace given to a closing process before signal escalation.
    pub grace_period: Duration,
    /// Cancellation budget for blocking points during shutdown.
    pub shutdown_grace: Duration,
    pub execution_timeout: Duration,
    /// Error-burst window and threshold driving a session to `Error`.
    pub error_window: Duration,
    pub error_threshold: u32,
    pub progress_min_interval: Duration,
    /// Per-subscriber event queue bound.
    pub subscriber_limit: usize,
    pub spawn_max_attempts: u32,
    pub spawn_backoff: Backoff,
    pub breaker: BreakerConfig,
    pub breaker_scope: BreakerScope,
    pub health: HealthConfig,
    /// Enable the marker-echo responsiveness probe (requires an agent
    /// that implements the ping contract).
    pub enable_echo_probe: bool,
    pub bridge: BridgeConfig,
    pub parser: ParserConfig,
    pub supervisor: SupervisorConfig,
}

impl OrchestratorConfig {
    pub fn new(agent_command: impl Into<String>) -> Self {
        Self {
            agent_command: agent_command.into(),
            agent_args: Vec::new(),
            max_sessions_per_workspace: 8,
            reaper_interval: Duration::from_secs(1),
            grace_period: Duration::from_secs(3),
            shutdown_grace: Duration::from_secs(2),
            execution_timeout: Duration::from_secs(600),
            error_window: Duration::from_secs(60),
            error_threshold: 10,
            progress_min_interval: Duration::from_millis(250),
            subscriber_limit: 128,
            spawn_max_attempts: 3,
            spawn_backoff: Backoff::default(),
            breaker: BreakerConfig::default(),
            breaker_scope: BreakerScope::Workspace,
            health: HealthConfig::default(),
            enable_echo_probe: false,
            bridge: BridgeConfig::default(),
            parser: ParserConfig::default(),
            supervisor: SupervisorConfig::default(),
        }
    }

    herd_core::setters! {
        into { agent_command: String }
        set {
            agent_args: Vec<String>,
            max_sessions_per_workspace: usize,
            reaper_interval: Duration,
            grace_period: Duration,
            shutdown_grace: Duration,
            execution_timeout: Duration,
            error_window: Duration,
            error_threshold: u32,
            progress_min_interval: Duration,
            subscriber_limit: usize,
            spawn_max_attempts: u32,
            spawn_backoff: Backoff,
            breaker: BreakerConfig,
            breaker_scope: BreakerScope,
            health: HealthConfig,
            enable_echo_probe: bool,
            bridge: BridgeConfig,
            parser: ParserConfig,
            supervisor: SupervisorConfig,
        }
    }
}

/// Per-execution options.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Override the orchestrator-wide execution timeout.
    pub execution_timeout: Option<Duration>,
    /// Spawn the bridge ping watchdog (consumer must ping).
    pub expect_pings: bool,
}

#[doc(hidden)]
pub struct Inner<C: Clock> {
    pub(crate) config: OrchestratorConfig,
    pub(crate) clock: C,
    pub(crate) supervisor: Supervisor,
    pub(crate) table: SessionTable,
    pub(crate) repo: Arc<dyn SessionRepository>,
    pub(crate) bus: EventBus,
    pub(crate) breakers: BreakerRegistry,
    pub(crate) retrier: Retrier,
    pub(crate) rng: Arc<dyn RandomSource>,
    pub(crate) credentials: Arc<dyn CredentialProvider>,
    pub(crate) workspaces: Arc<dyn WorkspaceResolver>,
    pub(crate) shutdown: CancellationToken,
}

/// The orchestrator: session manager plus the §6 operation surface.
///
/// Cheap to clone (shared inner state); every operation is callable
/// concurrently from any task.
pub struct Orchestrator<C: Clock = SystemClock> {
    pub(crate) inner: Arc<Inner<C>>,
}

impl<C: Clock> Clone for Orchestrator<C> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<C: Clock> std::ops::Deref for Orchestrator<C> {
    type Target = Inner<C>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<C: Clock + 'static> Orchestrator<C> {
    pub fn new(
        config: OrchestratorConfig,
        clock: C,
        repo: Arc<dyn SessionRepository>,
        credentials: Arc<dyn CredentialProvider>,
        workspaces: Arc<dyn WorkspaceResolver>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        let supervisor = Supervisor::new(config.supervisor.clone());
        let breakers = BreakerRegistry::new(config.breaker_scope, config.breaker.clone());
        let retrier = Retrier::new(config.spawn_backoff.clone(), config.spawn_max_attempts);
        let bus = EventBus::new(config.subscriber_limit);
        Self {
            inner: Arc::new(Inner {
                config,
                clock,
                supervisor,
                table: SessionTable::new(),
                repo,
                bus,
                breakers,
                retrier,
                rng,
                credentials,
                workspaces,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Start background services (the reaper). The task exits on
    /// shutdown.
    pub fn start(&self) {
        let this = self.clone();
        tokio::spawn(async move { crate::reaper::run(this).await });
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> tokio::sync::mpsc::Receiver<herd_core::Event> {
        self.bus.subscribe()
    }

    /// Cancel everything: all sessions close with `Shutdown` reason,
    /// each process granted `grace_period` before escalation.
    pub async fn shutdown(&self) {
        tracing::info!("orchestrator shutting down");
        for live in self.table.snapshot() {
            let id = live.record.lock().id;
            if let Err(e) = self.close_internal(&live, herd_core::CloseReason::Shutdown).await {
                tracing::warn!(session_id = %id, error = %e, "close during shutdown failed");
            }
        }
        self.shutdown.cancel();
    }
}

impl Orchestrator<SystemClock> {
    /// System-clock constructor with the default collaborator set.
    pub fn with_defaults(
        config: OrchestratorConfig,
        repo: Arc<dyn SessionRepository>,
        workspaces: Arc<dyn WorkspaceResolver>,
    ) -> Self {
        Self::new(
            config,
            SystemClock,
            repo,
            Arc::new(crate::credential::EnvCredentialProvider),
            workspaces,
            Arc::new(SystemRandom),
        )
    }
}
