// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The shared error taxonomy.
//!
//! Every crate maps its failures into [`OrchestratorError`]; the retrier
//! consults [`OrchestratorError::is_retryable`], user-facing surfaces use
//! [`OrchestratorError::summary`]. Credential material never appears in
//! rendered errors — see [`redact_secrets`].

use crate::session::SessionState;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error kinds for classification and user-visible summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigInvalid,
    CapacityExhausted,
    NotFound,
    SpawnFailed,
    WriteTimeout,
    ReadError,
    BackpressureTimeout,
    AgentProtocol,
    AgentExited,
    CircuitOpen,
    Cancelled,
    TimedOut,
    InvalidTransition,
    Internal,
}

crate::simple_display! {
    ErrorKind {
        ConfigInvalid => "config_invalid",
        CapacityExhausted => "capacity_exhausted",
        NotFound => "not_found",
        SpawnFailed => "spawn_failed",
        WriteTimeout => "write_timeout",
        ReadError => "read_error",
        BackpressureTimeout => "backpressure_timeout",
        AgentProtocol => "agent_protocol",
        AgentExited => "agent_exited",
        CircuitOpen => "circuit_open",
        Cancelled => "cancelled",
        TimedOut => "timed_out",
        InvalidTransition => "invalid_transition",
        Internal => "internal",
    }
}

/// Orchestrator-wide error type.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum OrchestratorError {
    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    #[error("capacity exhausted for workspace {workspace}")]
    CapacityExhausted { workspace: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("spawn failed: {0}")]
    SpawnFailed(String),

    #[error("stdin write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("read error: {0}")]
    ReadError(String),

    #[error("process not alive")]
    NotAlive,

    #[error("backpressure timeout after {0:?}")]
    BackpressureTimeout(Duration),

    #[error("agent protocol error: {0}")]
    AgentProtocol(String),

    #[error("agent exited with {}", exit_code.map(|c| format!("code {c}")).unwrap_or_else(|| "signal".to_string()))]
    AgentExited { exit_code: Option<i32> },

    #[error("circuit open for {key}")]
    CircuitOpen { key: String },

    #[error("cancelled")]
    Cancelled,

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("invalid transition {from} -> {to}")]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::ConfigInvalid(_) => ErrorKind::ConfigInvalid,
            OrchestratorError::CapacityExhausted { .. } => ErrorKind::CapacityExhausted,
            OrchestratorError::NotFound(_) => ErrorKind::NotFound,
            OrchestratorError::SpawnFailed(_) => ErrorKind::SpawnFailed,
            OrchestratorError::WriteTimeout(_) => ErrorKind::WriteTimeout,
            OrchestratorError::ReadError(_) => ErrorKind::ReadError,
            OrchestratorError::NotAlive => ErrorKind::AgentExited,
            OrchestratorError::BackpressureTimeout(_) => ErrorKind::BackpressureTimeout,
            OrchestratorError::AgentProtocol(_) => ErrorKind::AgentProtocol,
            OrchestratorError::AgentExited { .. } => ErrorKind::AgentExited,
            OrchestratorError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            OrchestratorError::Cancelled => ErrorKind::Cancelled,
            OrchestratorError::TimedOut(_) => ErrorKind::TimedOut,
            OrchestratorError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            OrchestratorError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Transport errors are retryable under policy; everything else
    /// short-circuits the retrier. `CircuitOpen` is never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::SpawnFailed
                | ErrorKind::WriteTimeout
                | ErrorKind::ReadError
                | ErrorKind::BackpressureTimeout
        )
    }

    /// User-safe summary: kind plus redacted message.
    pub fn summary(&self) -> ErrorSummary {
        ErrorSummary { kind: self.kind(), message: redact_secrets(&self.to_string()) }
    }
}

/// First-error summary carried on a failed execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub kind: ErrorKind,
    pub message: String,
}

/// Mask values of secret-looking `KEY=value` pairs in a message.
///
/// Any token containing `=` whose key mentions TOKEN, SECRET, KEY,
/// CREDENTIAL, or PASSWORD (case-insensitive) has its value replaced
/// with `***`.
pub fn redact_secrets(text: &str) -> String {
    const MARKERS: [&str; 5] = ["TOKEN", "SECRET", "KEY", "CREDENTIAL", "PASSWORD"];
    text.split(' ')
        .map(|word| {
            let Some((key, _value)) = word.split_once('=') else {
                return word.to_string();
            };
            let upper = key.to_ascii_uppercase();
            if MARKERS.iter().any(|m| upper.contains(m)) {
                format!("{key}=***")
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
