// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution records: one user prompt and its resulting message stream.

use crate::error::ErrorSummary;
use crate::message::{Message, MessageKind};
use crate::session::SessionId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for an execution.
    pub struct ExecutionId("exe-");
}

/// Execution lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

crate::simple_display! {
    ExecutionStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

/// Tracked state of a single prompt execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub session_id: SessionId,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    pub status: ExecutionStatus,
    /// Progress in `[0, 1]`, monotonic while running.
    pub progress: f64,
    pub message_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_error: Option<ErrorSummary>,
    /// Set when a consumer was disconnected mid-stream and may reattach.
    #[serde(default)]
    pub resumable: bool,
}

impl Execution {
    pub fn new(session_id: SessionId, started_at_ms: u64) -> Self {
        Self {
            id: ExecutionId::new(),
            session_id,
            started_at_ms,
            ended_at_ms: None,
            status: ExecutionStatus::Pending,
            progress: 0.0,
            message_count: 0,
            first_error: None,
            resumable: false,
        }
    }

    /// Fold one observed message into the execution state.
    ///
    /// Terminal statuses are sticky: late messages after completion only
    /// bump `message_count`.
    pub fn observe(&mut self, msg: &Message, now_ms: u64) {
        self.message_count += 1;
        if self.status == ExecutionStatus::Pending {
            self.status = ExecutionStatus::Running;
        }
        if self.status.is_terminal() {
            return;
        }
        if let Some(p) = msg.progress() {
            if p > self.progress {
                self.progress = p;
            }
        }
        match msg.kind {
            MessageKind::Complete => {
                self.progress = 1.0;
                self.finish(ExecutionStatus::Completed, now_ms);
            }
            MessageKind::Error if msg.is_fatal_error() => {
                if self.first_error.is_none() {
                    let reason = msg
                        .payload
                        .get("reason")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or("agent error");
                    // Only an actual process exit is AgentExited; a
                    // fatal error the agent reports for any other reason
                    // is a protocol-level failure.
                    let kind = if reason == "agent_exited" {
                        crate::error::ErrorKind::AgentExited
                    } else {
                        crate::error::ErrorKind::AgentProtocol
                    };
                    self.first_error = Some(ErrorSummary { kind, message: reason.to_string() });
                }
                self.finish(ExecutionStatus::Failed, now_ms);
            }
            _ => {}
        }
    }

    /// Move to a terminal status, recording the end time. Idempotent.
    pub fn finish(&mut self, status: ExecutionStatus, now_ms: u64) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.ended_at_ms = Some(now_ms);
    }

    pub fn fail(&mut self, summary: ErrorSummary, now_ms: u64) {
        if self.first_error.is_none() {
            self.first_error = Some(summary);
        }
        self.finish(ExecutionStatus::Failed, now_ms);
    }

    pub fn cancel(&mut self, now_ms: u64) {
        self.finish(ExecutionStatus::Cancelled, now_ms);
    }
}

#[cfg(test)]
#[path = "execution_tests.rs"]
mod tests;
