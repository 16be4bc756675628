// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session record and state machine.
//!
//! A session is the long-lived context owning at most one agent
//! subprocess. All state transitions are validated here; the engine
//! serializes them per session and the table below is the single source
//! of truth for legality.

use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::error::OrchestratorError;
use crate::workspace::{UserId, WorkspaceId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    /// Unique identifier for a session.
    pub struct SessionId("ses-");
}

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Initializing,
    Ready,
    Active,
    Idle,
    Suspended,
    Closing,
    Error,
    Closed,
}

crate::simple_display! {
    SessionState {
        Created => "created",
        Initializing => "initializing",
        Ready => "ready",
        Active => "active",
        Idle => "idle",
        Suspended => "suspended",
        Closing => "closing",
        Error => "error",
        Closed => "closed",
    }
}

impl SessionState {
    /// Whether `self → to` is a legal transition.
    pub fn can_transition(self, to: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, to),
            (Created, Initializing)
                | (Initializing, Ready)
                | (Initializing, Error)
                | (Ready, Active)
                | (Ready, Idle)
                | (Ready, Closing)
                | (Active, Idle)
                | (Active, Error)
                | (Active, Closing)
                | (Idle, Active)
                | (Idle, Suspended)
                | (Idle, Closing)
                | (Suspended, Active)
                | (Suspended, Closing)
                | (Error, Closing)
                | (Closing, Closed)
        )
    }

    /// States in which the session holds exactly one live process handle.
    pub fn is_live(self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Active | SessionState::Idle)
    }

    /// States from which the process handle must survive (live + suspended).
    pub fn holds_process(self) -> bool {
        self.is_live() || self == SessionState::Suspended
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Closed
    }
}

/// Monotonic per-session counters.
///
/// All counters only ever increase while the session is alive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub command_count: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub error_count: u64,
    pub messages_emitted: u64,
    pub messages_dropped: u64,
}

impl SessionStats {
    pub fn record_command(&mut self) {
        self.command_count += 1;
    }

    pub fn record_bytes_in(&mut self, n: u64) {
        self.bytes_in += n;
    }

    pub fn record_bytes_out(&mut self, n: u64) {
        self.bytes_out += n;
    }

    pub fn record_error(&mut self) {
        self.error_count += 1;
    }

    pub fn record_emitted(&mut self, n: u64) {
        self.messages_emitted += n;
    }

    pub fn record_dropped(&mut self, n: u64) {
        self.messages_dropped += n;
    }
}

/// The session record owned by the session manager.
///
/// The live process handle, buffers, and subscribers are runtime state
/// held by the engine; this record is the pure, persistable part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub config: SessionConfig,
    pub state: SessionState,
    pub created_at_ms: u64,
    pub last_active_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at_ms: Option<u64>,
    pub stats: SessionStats,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Session {
    pub fn new(
        workspace_id: WorkspaceId,
        user_id: UserId,
        config: SessionConfig,
        clock: &impl Clock,
    ) -> Self {
        let now = clock.epoch_ms();
        Self {
            id: SessionId::new(),
            workspace_id,
            user_id,
            config,
            state: SessionState::Created,
            created_at_ms: now,
            last_active_at_ms: now,
            closed_at_ms: None,
            stats: SessionStats::default(),
            metadata: HashMap::new(),
        }
    }

    /// Apply a state transition, validating legality.
    ///
    /// Illegal transitions fail without side effect. Transitions into
    /// the live states count as activity; administrative transitions
    /// (Suspended, Closing, Error, Closed) leave `last_active_at_ms`
    /// alone so idle accounting reflects real work.
    pub fn transition(&mut self, to: SessionState, now_ms: u64) -> Result<(), OrchestratorError> {
        if !self.state.can_transition(to) {
            return Err(OrchestratorError::InvalidTransition { from: self.state, to });
        }
        self.state = to;
        if to.is_live() {
            self.touch(now_ms);
        } else if to == SessionState::Closed {
            self.closed_at_ms = Some(now_ms);
        }
        Ok(())
    }

    /// Advance `last_active_at_ms`, keeping it monotonic.
    pub fn touch(&mut self, now_ms: u64) {
        if now_ms > self.last_active_at_ms {
            self.last_active_at_ms = now_ms;
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            workspace_id: self.workspace_id.clone(),
            user_id: self.user_id.clone(),
            state: self.state,
            created_at_ms: self.created_at_ms,
            last_active_at_ms: self.last_active_at_ms,
            stats: self.stats,
            closed_at_ms: self.closed_at_ms,
        }
    }
}

/// Persisted session summary; live handles and buffers are never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub state: SessionState,
    pub created_at_ms: u64,
    pub last_active_at_ms: u64,
    pub stats: SessionStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at_ms: Option<u64>,
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
