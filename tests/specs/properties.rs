//! Cross-crate invariants P1–P5.

use super::prelude::*;

/// P1 — under Block, a synchronous consumer observes sequence numbers
/// strictly increasing from 1 with no gaps.
#[tokio::test]
async fn p1_no_gaps_under_block_policy() {
    let h = harness(&burst_agent(50));
    let summary = h
        .orchestrator
        .create_session(
            WorkspaceId::new("W1"),
            UserId::new("u1"),
            SessionConfig::default().drop_policy(DropPolicy::Block),
        )
        .await
        .expect("create session");

    let (_exec_id, mut consumer) = h
        .orchestrator
        .execute(summary.id, "go", ExecOptions::default())
        .await
        .expect("execute");

    let msgs = consumer.collect_to_end().await;
    let seqs: Vec<u64> = msgs.iter().map(|m| m.sequence_no).collect();
    let expected: Vec<u64> = (1..=msgs.len() as u64).collect();
    assert_eq!(seqs, expected, "no gaps, starting at 1");
    assert_eq!(msgs.last().expect("stream").kind, MessageKind::Complete);

    h.orchestrator.close_session(summary.id).await.expect("close");
}

/// P1 (drop accounting) — under DropOldest, observed gaps equal the
/// recorded dropped-message count.
#[tokio::test]
async fn p1_gaps_match_drop_count() {
    let h = harness(&burst_agent(300));
    let summary = h
        .orchestrator
        .create_session(
            WorkspaceId::new("W1"),
            UserId::new("u1"),
            SessionConfig::default()
                .buffer_capacity(5)
                .drop_policy(DropPolicy::DropOldest),
        )
        .await
        .expect("create session");

    let (_exec_id, mut consumer) = h
        .orchestrator
        .execute(summary.id, "go", ExecOptions::default())
        .await
        .expect("execute");

    let mut observed = 0u64;
    let mut gap_total = 0u64;
    let mut last_seq = 0u64;
    while let Some(msg) = consumer.next().await {
        gap_total += msg.sequence_no - last_seq - 1;
        last_seq = msg.sequence_no;
        observed += 1;
        if msg.kind == MessageKind::Complete {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(observed >= 1);

    assert!(wait_for_state(&h.orchestrator, summary.id, SessionState::Idle).await);
    let stats = h.orchestrator.get_session(&summary.id).expect("get").stats;
    assert_eq!(stats.messages_dropped, gap_total, "gaps align with recorded drops");
    h.orchestrator.close_session(summary.id).await.expect("close");
}

/// P2 — a session never holds two process handles: reuse keeps the same
/// pid, and a crashed process closes the session instead of respawning
/// under it.
#[tokio::test]
async fn p2_single_process_per_session() {
    let pid_agent = r#"while read line; do
  printf '{"type":"metadata","agent_pid":%d}\n{"type":"complete"}\n' $$
done"#;
    let h = harness(pid_agent);
    let config = SessionConfig::default().system_prompt("pid");
    let summary = h
        .orchestrator
        .create_session(WorkspaceId::new("W1"), UserId::new("u1"), config.clone())
        .await
        .expect("create session");

    let (_exec, mut consumer) =
        h.orchestrator.execute(summary.id, "one", ExecOptions::default()).await.expect("execute");
    let first_pid = consumer
        .collect_to_end()
        .await
        .iter()
        .find_map(|m| m.payload.get("agent_pid").and_then(serde_json::Value::as_u64))
        .expect("pid reported");
    assert!(wait_for_state(&h.orchestrator, summary.id, SessionState::Idle).await);

    // Reuse: same session, same process.
    let reused = h
        .orchestrator
        .create_session(WorkspaceId::new("W1"), UserId::new("u1"), config)
        .await
        .expect("reuse");
    assert_eq!(reused.id, summary.id);
    let (_exec, mut consumer) =
        h.orchestrator.execute(summary.id, "two", ExecOptions::default()).await.expect("execute");
    let second_pid = consumer
        .collect_to_end()
        .await
        .iter()
        .find_map(|m| m.payload.get("agent_pid").and_then(serde_json::Value::as_u64))
        .expect("pid reported");

    assert_eq!(first_pid, second_pid, "reused session keeps its one process");
    h.orchestrator.close_session(summary.id).await.expect("close");
}

/// P3 — Closed is terminal: every subsequent operation observes Closed,
/// and close stays idempotent.
#[tokio::test]
async fn p3_closed_is_terminal() {
    let h = harness(ECHO_AGENT);
    let summary = h
        .orchestrator
        .create_session(WorkspaceId::new("W1"), UserId::new("u1"), SessionConfig::default())
        .await
        .expect("create session");

    h.orchestrator.close_session(summary.id).await.expect("close");
    assert_eq!(h.orchestrator.get_session(&summary.id).expect("get").state, SessionState::Closed);

    // R1: closing again is ok and changes nothing.
    h.orchestrator.close_session(summary.id).await.expect("idempotent close");

    // Execute after close is rejected, state unchanged.
    let err = h.orchestrator.execute(summary.id, "late", ExecOptions::default()).await;
    assert!(err.is_err());
    assert_eq!(h.orchestrator.get_session(&summary.id).expect("get").state, SessionState::Closed);
}

/// P4 — sustained overrun under DropOldest keeps the buffer bounded.
#[tokio::test]
async fn p4_bounded_memory_under_drop_oldest() {
    use herd_core::test_support::text_message;
    use herd_stream::{BackpressureBuffer, BufferConfig};
    use tokio_util::sync::CancellationToken;

    let buffer = BackpressureBuffer::new(BufferConfig {
        capacity: 8,
        max_capacity: 8,
        max_bytes: 4096,
        policy: DropPolicy::DropOldest,
        ..Default::default()
    });
    let cancel = CancellationToken::new();
    let sid = SessionId::parse("ses-p4");

    // Producer far outruns the absent consumer.
    for seq in 1..=10_000 {
        buffer.offer(text_message(sid, seq, "payload"), &cancel).await.expect("offer");
        assert!(buffer.len() <= 8, "queue length must stay within capacity");
    }
    assert!(buffer.dropped() >= 10_000 - 8);
}

/// P5 — an open breaker admits zero calls until `open_duration` ends.
#[tokio::test]
async fn p5_open_breaker_admits_nothing() {
    use herd_core::BreakerState;
    use herd_reliability::{BreakerConfig, CircuitBreaker};
    use std::time::Instant;

    let breaker = CircuitBreaker::new(
        "W1",
        BreakerConfig {
            failure_threshold: 1,
            window: Duration::from_secs(60),
            open_duration: Duration::from_millis(200),
        },
    );
    let t0 = Instant::now();
    breaker.record_failure(t0);
    assert_eq!(breaker.state(), BreakerState::Open);

    // Dense probing inside the window: all rejected.
    for i in 0..20 {
        let t = t0 + Duration::from_millis(i * 10);
        assert!(breaker.admit(t).is_err(), "admitted at +{}ms", i * 10);
    }
    assert!(breaker.admit(t0 + Duration::from_millis(200)).is_ok());
}
