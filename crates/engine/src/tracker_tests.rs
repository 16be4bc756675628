// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use herd_core::test_support::text_message;
use herd_core::{ExecutionStatus, SessionId};
use herd_stream::HandlerCtx;
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn sid() -> SessionId {
    SessionId::parse("ses-t")
}

fn ctx() -> HandlerCtx {
    HandlerCtx { session_id: sid(), cancel: CancellationToken::new() }
}

#[tokio::test]
async fn tracker_folds_messages_into_execution() {
    let exec = Arc::new(Mutex::new(Execution::new(sid(), 1000)));
    let tracker = ExecutionTracker::new(exec.clone());

    tracker.handle(&ctx(), &text_message(sid(), 1, "a")).await.unwrap();
    tracker.handle(&ctx(), &text_message(sid(), 2, "b")).await.unwrap();

    let snapshot = exec.lock().clone();
    assert_eq!(snapshot.status, ExecutionStatus::Running);
    assert_eq!(snapshot.message_count, 2);
}

#[tokio::test]
async fn tracker_completes_on_complete_message() {
    let exec = Arc::new(Mutex::new(Execution::new(sid(), 1000)));
    let tracker = ExecutionTracker::new(exec.clone());

    tracker.handle(&ctx(), &Message::synthetic_complete(sid(), 1, 2000)).await.unwrap();

    let snapshot = exec.lock().clone();
    assert_eq!(snapshot.status, ExecutionStatus::Completed);
    assert_eq!(snapshot.ended_at_ms, Some(2000));
}

#[tokio::test]
async fn tracker_fails_on_fatal_error() {
    let exec = Arc::new(Mutex::new(Execution::new(sid(), 1000)));
    let tracker = ExecutionTracker::new(exec.clone());

    let fatal = Message::synthetic_error(sid(), 1, 2000, "agent_exited", json!({"code": 9}));
    tracker.handle(&ctx(), &fatal).await.unwrap();

    assert_eq!(exec.lock().status, ExecutionStatus::Failed);
}
