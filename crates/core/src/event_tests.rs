// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sid() -> SessionId {
    SessionId::parse("ses-evt")
}

#[test]
fn events_serialize_with_type_tag() {
    let event = Event::SessionCreated { session_id: sid(), workspace_id: WorkspaceId::new("W1") };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "session:created");
    assert_eq!(json["session_id"], "ses-evt");
}

#[test]
fn state_change_event_roundtrip() {
    let event = Event::SessionStateChanged {
        session_id: sid(),
        from: SessionState::Ready,
        to: SessionState::Active,
    };
    let json = serde_json::to_string(&event).unwrap();
    let parsed: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, event);
}

#[test]
fn closed_event_carries_reason() {
    let event = Event::SessionClosed { session_id: sid(), reason: CloseReason::IdleTimeout };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "session:closed");
    assert_eq!(json["reason"], "idle_timeout");
}

#[test]
fn breaker_event_roundtrip() {
    let event = Event::BreakerStateChanged {
        key: "W1".into(),
        from: BreakerState::Closed,
        to: BreakerState::Open,
    };
    let json = serde_json::to_string(&event).unwrap();
    let parsed: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, event);
}

#[test]
fn session_id_accessor() {
    let event = Event::SlowConsumer { session_id: sid(), residency_ms: 1200 };
    assert_eq!(event.session_id(), Some(sid()));

    let event = Event::ExecutionFinished {
        execution_id: ExecutionId::parse("exe-1"),
        status: ExecutionStatus::Completed,
    };
    assert_eq!(event.session_id(), None);
}
