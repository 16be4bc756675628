// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The typed message model for agent output.
//!
//! Every line the agent writes becomes exactly one [`Message`]. Messages
//! are immutable after construction and carry a per-session sequence
//! number assigned by the stream parser, starting at 1 with no reuse.

use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

crate::define_id! {
    /// Unique identifier for a single parsed message.
    pub struct MessageId("msg-");
}

/// Closed set of message kinds the orchestrator understands.
///
/// Unknown wire `type` strings are routed as [`MessageKind::Metadata`];
/// the original type string stays in the payload so nothing is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    ToolUse,
    ToolResult,
    System,
    Metadata,
    Status,
    Progress,
    Error,
    Complete,
}

impl MessageKind {
    /// Map a wire `type` string to a kind. Unknown strings become `Metadata`.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "text" => MessageKind::Text,
            "tool_use" => MessageKind::ToolUse,
            "tool_result" => MessageKind::ToolResult,
            "system" => MessageKind::System,
            "metadata" => MessageKind::Metadata,
            "status" => MessageKind::Status,
            "progress" => MessageKind::Progress,
            "error" => MessageKind::Error,
            "complete" => MessageKind::Complete,
            _ => MessageKind::Metadata,
        }
    }

    /// The canonical wire `type` string for this kind.
    pub fn as_wire(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::ToolUse => "tool_use",
            MessageKind::ToolResult => "tool_result",
            MessageKind::System => "system",
            MessageKind::Metadata => "metadata",
            MessageKind::Status => "status",
            MessageKind::Progress => "progress",
            MessageKind::Error => "error",
            MessageKind::Complete => "complete",
        }
    }

    /// Kinds a degraded stream bridge may shed before closing a consumer.
    pub fn is_droppable(&self) -> bool {
        matches!(self, MessageKind::Progress | MessageKind::Status)
    }
}

crate::simple_display! {
    MessageKind {
        Text => "text",
        ToolUse => "tool_use",
        ToolResult => "tool_result",
        System => "system",
        Metadata => "metadata",
        Status => "status",
        Progress => "progress",
        Error => "error",
        Complete => "complete",
    }
}

/// A single parsed message from an agent's output stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub kind: MessageKind,
    pub session_id: SessionId,
    /// Per-session sequence number, 1-based, assigned at parse time.
    pub sequence_no: u64,
    pub received_at_ms: u64,
    /// The full wire object, `type` field included.
    pub payload: Value,
    /// Byte length of the wire line that produced this message.
    /// Synthetic messages carry the serialized payload length.
    pub raw_len: usize,
}

impl Message {
    /// Construct from a parsed wire object.
    ///
    /// `payload` must be the complete JSON object from the agent; the kind
    /// is derived from its `type` field (missing or unknown → `metadata`).
    pub fn from_wire(
        session_id: SessionId,
        sequence_no: u64,
        received_at_ms: u64,
        payload: Value,
        raw_len: usize,
    ) -> Self {
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .map(MessageKind::from_wire)
            .unwrap_or(MessageKind::Metadata);
        Self { id: MessageId::new(), kind, session_id, sequence_no, received_at_ms, payload, raw_len }
    }

    /// Synthetic `error` message, used for unparseable lines, read errors,
    /// and abnormal process exit.
    pub fn synthetic_error(
        session_id: SessionId,
        sequence_no: u64,
        received_at_ms: u64,
        reason: &str,
        detail: Value,
    ) -> Self {
        let mut payload = json!({ "type": "error", "reason": reason });
        if let (Value::Object(map), Value::Object(extra)) = (&mut payload, detail) {
            for (k, v) in extra {
                map.insert(k, v);
            }
        }
        let raw_len = payload.to_string().len();
        Self {
            id: MessageId::new(),
            kind: MessageKind::Error,
            session_id,
            sequence_no,
            received_at_ms,
            payload,
            raw_len,
        }
    }

    /// Synthetic `complete` message emitted at clean end of stream.
    pub fn synthetic_complete(session_id: SessionId, sequence_no: u64, received_at_ms: u64) -> Self {
        let payload = json!({ "type": "complete" });
        let raw_len = payload.to_string().len();
        Self {
            id: MessageId::new(),
            kind: MessageKind::Complete,
            session_id,
            sequence_no,
            received_at_ms,
            payload,
            raw_len,
        }
    }

    /// Frame a stderr line as a `system` message.
    pub fn system_line(
        session_id: SessionId,
        sequence_no: u64,
        received_at_ms: u64,
        line: &str,
    ) -> Self {
        let payload = json!({ "type": "system", "stream": "stderr", "text": line });
        Self {
            id: MessageId::new(),
            kind: MessageKind::System,
            session_id,
            sequence_no,
            received_at_ms,
            payload,
            raw_len: line.len(),
        }
    }

    /// Canonical wire form: the payload with `type` normalized to this
    /// message's kind. Re-parsing the canonical form yields an equal
    /// message (modulo id/sequence metadata).
    pub fn canonical(&self) -> Value {
        let mut out = self.payload.clone();
        if let Value::Object(map) = &mut out {
            // Unknown types routed as metadata keep their original tag.
            if self.kind != MessageKind::Metadata {
                map.insert("type".to_string(), Value::String(self.kind.as_wire().to_string()));
            } else if !map.contains_key("type") {
                map.insert("type".to_string(), Value::String("metadata".to_string()));
            }
        }
        out
    }

    /// True for `error` messages the agent marked fatal, and for the
    /// synthetic `agent_exited` error.
    pub fn is_fatal_error(&self) -> bool {
        self.kind == MessageKind::Error
            && (self.payload.get("fatal").and_then(Value::as_bool) == Some(true)
                || self.payload.get("reason").and_then(Value::as_str) == Some("agent_exited"))
    }

    /// Progress value in `[0, 1]` for `progress` messages.
    pub fn progress(&self) -> Option<f64> {
        if self.kind != MessageKind::Progress {
            return None;
        }
        self.payload.get("progress").and_then(Value::as_f64).map(|p| p.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
