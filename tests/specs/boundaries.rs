//! Boundary behaviors and round-trip checks.

use super::prelude::*;

/// A line exactly at `max_line_bytes` parses; one byte over becomes a
/// synthetic error and the parser resynchronizes.
#[tokio::test]
async fn max_line_bytes_edge() {
    use herd_core::SessionId;
    use herd_stream::{ParserConfig, StreamParser};

    let limit = 256;
    let build_line = |len: usize| {
        let prefix = "{\"type\":\"text\",\"content\":\"";
        let mut line = String::from(prefix);
        line.push_str(&"x".repeat(len - prefix.len() - 2));
        line.push_str("\"}");
        assert_eq!(line.len(), len);
        line
    };

    let mut parser =
        StreamParser::new(SessionId::parse("ses-b"), ParserConfig { max_line_bytes: limit });
    let at_limit = parser.feed(format!("{}\n", build_line(limit)).as_bytes(), 1000);
    assert_eq!(at_limit.len(), 1);
    assert_eq!(at_limit[0].kind, MessageKind::Text);

    let mut parser =
        StreamParser::new(SessionId::parse("ses-b"), ParserConfig { max_line_bytes: limit });
    let mut over = parser.feed(format!("{}\n", build_line(limit + 1)).as_bytes(), 1000);
    over.extend(parser.feed(b"{\"type\":\"text\",\"content\":\"next\"}\n", 1000));
    assert_eq!(over.len(), 2);
    assert_eq!(over[0].kind, MessageKind::Error);
    assert_eq!(over[0].payload["reason"], "line_too_long");
    assert_eq!(over[1].kind, MessageKind::Text, "parser resynchronized at the next newline");
}

/// `max_turns = 0` is rejected at CreateSession, before any spawn.
#[tokio::test]
async fn max_turns_zero_rejected() {
    let h = harness(ECHO_AGENT);
    let err = h
        .orchestrator
        .create_session(
            WorkspaceId::new("W1"),
            UserId::new("u1"),
            SessionConfig::default().max_turns(0),
        )
        .await;
    assert!(matches!(err, Err(OrchestratorError::ConfigInvalid(_))));
    assert!(h.orchestrator.list_sessions(None).expect("list").is_empty());
}

/// `buffer_capacity = 1` with Block still delivers every message, in
/// order, one step at a time.
#[tokio::test]
async fn capacity_one_block_single_steps() {
    let h = harness(&burst_agent(25));
    let summary = h
        .orchestrator
        .create_session(
            WorkspaceId::new("W1"),
            UserId::new("u1"),
            SessionConfig::default().buffer_capacity(1).drop_policy(DropPolicy::Block),
        )
        .await
        .expect("create session");

    let (_exec_id, mut consumer) = h
        .orchestrator
        .execute(summary.id, "go", ExecOptions::default())
        .await
        .expect("execute");

    let msgs = consumer.collect_to_end().await;
    let texts = msgs.iter().filter(|m| m.kind == MessageKind::Text).count();
    assert_eq!(texts, 25, "nothing may be lost under Block");
    let seqs: Vec<u64> = msgs.iter().map(|m| m.sequence_no).collect();
    assert_eq!(seqs, (1..=msgs.len() as u64).collect::<Vec<_>>());
    h.orchestrator.close_session(summary.id).await.expect("close");
}

/// R2 — parsing a valid message and re-serializing its canonical form
/// preserves `type` and payload fields.
#[test]
fn canonical_roundtrip() {
    use herd_core::{Message, SessionId};
    use serde_json::json;

    let cases = [
        json!({"type":"text","content":"hi"}),
        json!({"type":"tool_use","name":"bash","input":{"command":"ls"}}),
        json!({"type":"progress","progress":0.5,"detail":"halfway"}),
        json!({"type":"usage_report","tokens":12}),
    ];
    for wire in cases {
        let msg = Message::from_wire(SessionId::parse("ses-r2"), 1, 1000, wire.clone(), 64);
        assert_eq!(msg.canonical(), wire);

        let reparsed =
            Message::from_wire(SessionId::parse("ses-r2"), 1, 1000, msg.canonical(), 64);
        assert_eq!(reparsed.kind, msg.kind);
        assert_eq!(reparsed.payload, msg.payload);
    }
}

/// R1 — CloseSession is idempotent even across a repository round-trip.
#[tokio::test]
async fn close_session_idempotent_via_repo() {
    let h = harness(ECHO_AGENT);
    let summary = h
        .orchestrator
        .create_session(WorkspaceId::new("W1"), UserId::new("u1"), SessionConfig::default())
        .await
        .expect("create session");

    h.orchestrator.close_session(summary.id).await.expect("first close");
    let before = h.orchestrator.get_session(&summary.id).expect("get");

    h.orchestrator.close_session(summary.id).await.expect("second close");
    let after = h.orchestrator.get_session(&summary.id).expect("get");
    assert_eq!(before, after, "second close has no side effect");
}
