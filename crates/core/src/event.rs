// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle events published on the session manager's event bus.
//!
//! Serializes with `{"type": "module:verb", ...fields}` format.

use crate::execution::{ExecutionId, ExecutionStatus};
use crate::session::{SessionId, SessionState};
use crate::workspace::WorkspaceId;
use serde::{Deserialize, Serialize};

/// Circuit breaker state, also carried on breaker events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

crate::simple_display! {
    BreakerState {
        Closed => "closed",
        Open => "open",
        HalfOpen => "half_open",
    }
}

/// Why a session was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    UserRequested,
    IdleTimeout,
    LifetimeExceeded,
    AgentExited,
    Error,
    Shutdown,
}

crate::simple_display! {
    CloseReason {
        UserRequested => "user_requested",
        IdleTimeout => "idle_timeout",
        LifetimeExceeded => "lifetime_exceeded",
        AgentExited => "agent_exited",
        Error => "error",
        Shutdown => "shutdown",
    }
}

/// Events emitted by the orchestrator.
///
/// Subscribers hold bounded queues and are disconnected when full, so
/// publishing never blocks the session manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "session:created")]
    SessionCreated { session_id: SessionId, workspace_id: WorkspaceId },

    #[serde(rename = "session:state")]
    SessionStateChanged { session_id: SessionId, from: SessionState, to: SessionState },

    #[serde(rename = "session:reused")]
    SessionReused { session_id: SessionId, workspace_id: WorkspaceId },

    #[serde(rename = "session:closed")]
    SessionClosed { session_id: SessionId, reason: CloseReason },

    #[serde(rename = "execution:started")]
    ExecutionStarted { execution_id: ExecutionId, session_id: SessionId },

    #[serde(rename = "execution:progress")]
    ExecutionProgress { execution_id: ExecutionId, progress: f64, message_count: u64 },

    #[serde(rename = "execution:finished")]
    ExecutionFinished { execution_id: ExecutionId, status: ExecutionStatus },

    #[serde(rename = "buffer:resized")]
    BufferResized { session_id: SessionId, from: usize, to: usize },

    #[serde(rename = "buffer:slow-consumer")]
    SlowConsumer { session_id: SessionId, residency_ms: u64 },

    #[serde(rename = "breaker:state")]
    BreakerStateChanged { key: String, from: BreakerState, to: BreakerState },

    #[serde(rename = "health:unhealthy")]
    HealthUnhealthy { session_id: SessionId, consecutive_failures: u32 },
}

impl Event {
    /// Session this event is about, when it is session-scoped.
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            Event::SessionCreated { session_id, .. }
            | Event::SessionStateChanged { session_id, .. }
            | Event::SessionReused { session_id, .. }
            | Event::SessionClosed { session_id, .. }
            | Event::ExecutionStarted { session_id, .. }
            | Event::BufferResized { session_id, .. }
            | Event::SlowConsumer { session_id, .. }
            | Event::HealthUnhealthy { session_id, .. } => Some(*session_id),
            Event::ExecutionProgress { .. }
            | Event::ExecutionFinished { .. }
            | Event::BreakerStateChanged { .. } => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
