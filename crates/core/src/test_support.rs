// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders and proptest strategies shared with dependent crates.

use crate::config::{DropPolicy, SessionConfig};
use crate::message::{Message, MessageKind};
use crate::session::SessionId;
use serde_json::json;

/// Proptest strategies for core enums.
pub mod strategies {
    use super::*;
    use crate::execution::ExecutionStatus;
    use crate::session::SessionState;
    use proptest::prelude::*;

    pub fn arb_message_kind() -> impl Strategy<Value = MessageKind> {
        prop_oneof![
            Just(MessageKind::Text),
            Just(MessageKind::ToolUse),
            Just(MessageKind::ToolResult),
            Just(MessageKind::System),
            Just(MessageKind::Metadata),
            Just(MessageKind::Status),
            Just(MessageKind::Progress),
            Just(MessageKind::Error),
            Just(MessageKind::Complete),
        ]
    }

    pub fn arb_session_state() -> impl Strategy<Value = SessionState> {
        prop_oneof![
            Just(SessionState::Created),
            Just(SessionState::Initializing),
            Just(SessionState::Ready),
            Just(SessionState::Active),
            Just(SessionState::Idle),
            Just(SessionState::Suspended),
            Just(SessionState::Closing),
            Just(SessionState::Error),
            Just(SessionState::Closed),
        ]
    }

    pub fn arb_execution_status() -> impl Strategy<Value = ExecutionStatus> {
        prop_oneof![
            Just(ExecutionStatus::Pending),
            Just(ExecutionStatus::Running),
            Just(ExecutionStatus::Completed),
            Just(ExecutionStatus::Failed),
            Just(ExecutionStatus::Cancelled),
        ]
    }

    pub fn arb_drop_policy() -> impl Strategy<Value = DropPolicy> {
        prop_oneof![
            Just(DropPolicy::DropOldest),
            Just(DropPolicy::DropNewest),
            Just(DropPolicy::Block),
        ]
    }
}

/// A wire-shaped text message for buffer/router tests.
pub fn text_message(session_id: SessionId, sequence_no: u64, content: &str) -> Message {
    let payload = json!({ "type": "text", "content": content });
    let raw_len = payload.to_string().len();
    Message::from_wire(session_id, sequence_no, 1_000_000 + sequence_no, payload, raw_len)
}

/// A minimal session config with fast timeouts for tests.
pub fn fast_config() -> SessionConfig {
    SessionConfig::default()
        .max_idle(std::time::Duration::from_millis(200))
        .max_lifetime(std::time::Duration::from_secs(5))
        .buffer_capacity(16)
}
