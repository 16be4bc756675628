// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::router::HandlerCtx;
use herd_core::test_support::text_message;
use herd_core::SessionId;
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn sid() -> SessionId {
    SessionId::parse("ses-h")
}

fn ctx() -> HandlerCtx {
    HandlerCtx { session_id: sid(), cancel: CancellationToken::new() }
}

fn wire(seq: u64, payload: Value) -> Message {
    let raw_len = payload.to_string().len();
    Message::from_wire(sid(), seq, 1000 + seq, payload, raw_len)
}

#[tokio::test]
async fn tool_use_recorder_collects_names() {
    let recorder = ToolUseRecorder::new();
    let invocations = recorder.invocations();

    recorder.handle(&ctx(), &wire(1, json!({"type":"tool_use","name":"bash"}))).await.unwrap();
    recorder.handle(&ctx(), &wire(2, json!({"type":"tool_use","name":"edit"}))).await.unwrap();
    recorder.handle(&ctx(), &wire(3, json!({"type":"tool_use"}))).await.unwrap();

    assert_eq!(*invocations.lock(), vec!["bash", "edit", "unknown"]);
    assert!(recorder.wants(MessageKind::ToolUse));
    assert!(!recorder.wants(MessageKind::Text));
}

#[tokio::test]
async fn error_counter_tracks_total_and_bursts() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let counter = ErrorCounter::new(Duration::from_secs(60), 3, tx);
    let total = counter.total();

    for seq in 1..=3 {
        counter
            .handle(&ctx(), &Message::synthetic_error(sid(), seq, 1000, "oops", json!({})))
            .await
            .unwrap();
    }

    assert_eq!(total.load(Ordering::Relaxed), 3);
    assert_eq!(rx.try_recv().ok(), Some(3));
    // Burst fires exactly on the crossing, not on every error after it.
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn error_counter_ignores_other_kinds() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let counter = ErrorCounter::new(Duration::from_secs(60), 3, tx);
    assert!(!counter.wants(MessageKind::Text));
    assert!(counter.wants(MessageKind::Error));
}

#[tokio::test]
async fn metadata_merger_flattens_scalars() {
    let merger = SystemMetadataMerger::new();
    merger
        .handle(
            &ctx(),
            &wire(1, json!({"type":"metadata","model":"m-1","turns":3,"nested":{"x":1}})),
        )
        .await
        .unwrap();
    merger.handle(&ctx(), &wire(2, json!({"type":"system","stream":"stderr"}))).await.unwrap();

    let merged = merger.merged();
    let merged = merged.lock();
    assert_eq!(merged.get("model").map(String::as_str), Some("m-1"));
    assert_eq!(merged.get("turns").map(String::as_str), Some("3"));
    assert_eq!(merged.get("stream").map(String::as_str), Some("stderr"));
    // type and non-scalar values are not merged.
    assert!(!merged.contains_key("type"));
    assert!(!merged.contains_key("nested"));
}

#[tokio::test]
async fn progress_forwarder_throttles() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let forwarder = ProgressForwarder::new(Duration::from_secs(60), tx);

    forwarder.handle(&ctx(), &wire(1, json!({"type":"progress","progress":0.2}))).await.unwrap();
    forwarder.handle(&ctx(), &wire(2, json!({"type":"progress","progress":0.4}))).await.unwrap();

    // Only the first passes inside one interval.
    assert_eq!(rx.try_recv().ok(), Some(ProgressUpdate { progress: 0.2, sequence_no: 1 }));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn progress_forwarder_passes_after_interval() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let forwarder = ProgressForwarder::new(Duration::from_millis(20), tx);

    forwarder.handle(&ctx(), &wire(1, json!({"type":"progress","progress":0.2}))).await.unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    forwarder.handle(&ctx(), &wire(2, json!({"type":"progress","progress":0.6}))).await.unwrap();

    assert_eq!(rx.try_recv().ok(), Some(ProgressUpdate { progress: 0.2, sequence_no: 1 }));
    assert_eq!(rx.try_recv().ok(), Some(ProgressUpdate { progress: 0.6, sequence_no: 2 }));
}

#[tokio::test]
async fn completion_finalizer_signals_complete() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let finalizer = CompletionFinalizer::new(tx);

    finalizer.handle(&ctx(), &Message::synthetic_complete(sid(), 7, 1000)).await.unwrap();
    assert_eq!(rx.try_recv().ok(), Some(CompletionSignal::Completed { sequence_no: 7 }));
}

#[tokio::test]
async fn completion_finalizer_signals_fatal_error() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let finalizer = CompletionFinalizer::new(tx);

    let err = Message::synthetic_error(sid(), 4, 1000, "agent_exited", json!({"code": 9}));
    finalizer.handle(&ctx(), &err).await.unwrap();
    assert_eq!(
        rx.try_recv().ok(),
        Some(CompletionSignal::Failed {
            reason: "agent_exited".into(),
            exit_code: Some(9),
            sequence_no: 4
        })
    );
}

#[tokio::test]
async fn completion_finalizer_ignores_non_fatal_errors() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let finalizer = CompletionFinalizer::new(tx);

    let err = wire(1, json!({"type":"error","message":"recoverable"}));
    finalizer.handle(&ctx(), &err).await.unwrap();
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn text_logger_accepts_text() {
    let logger = TextLogger;
    logger.handle(&ctx(), &text_message(sid(), 1, "hello")).await.unwrap();
    assert!(logger.wants(MessageKind::Text));
    assert!(!logger.wants(MessageKind::Progress));
}
