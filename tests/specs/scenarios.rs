//! End-to-end scenarios: one orchestrator, scripted agents, observed
//! message streams.

use super::prelude::*;

/// S1 — normal execution: create, prompt, observe `[text, complete]`.
#[tokio::test]
async fn normal_execution() {
    let h = harness(ECHO_AGENT);
    let summary = h
        .orchestrator
        .create_session(
            WorkspaceId::new("W1"),
            UserId::new("u1"),
            SessionConfig::default().system_prompt("you help").max_turns(5),
        )
        .await
        .expect("create session");

    let (_exec_id, mut consumer) = h
        .orchestrator
        .execute(summary.id, "say hi", ExecOptions::default())
        .await
        .expect("execute");

    let msgs = consumer.collect_to_end().await;
    let kinds: Vec<MessageKind> = msgs.iter().map(|m| m.kind).collect();
    assert_eq!(kinds, vec![MessageKind::Text, MessageKind::Complete]);
    assert_eq!(msgs[0].payload["content"], "hi");

    assert!(wait_for_state(&h.orchestrator, summary.id, SessionState::Idle).await);
    assert_eq!(h.orchestrator.get_session(&summary.id).expect("get").stats.command_count, 1);
    h.orchestrator.close_session(summary.id).await.expect("close");
}

/// S2 — slow consumer under DropOldest: sequence numbers stay
/// monotonic, the final message is the last one the agent wrote, and
/// drops are recorded.
#[tokio::test]
async fn slow_consumer_drop_oldest() {
    let h = harness(&burst_agent(1000));
    let summary = h
        .orchestrator
        .create_session(
            WorkspaceId::new("W1"),
            UserId::new("u1"),
            SessionConfig::default()
                .buffer_capacity(10)
                .drop_policy(DropPolicy::DropOldest),
        )
        .await
        .expect("create session");

    let (_exec_id, mut consumer) = h
        .orchestrator
        .execute(summary.id, "go", ExecOptions::default())
        .await
        .expect("execute");

    let mut last_text_n = 0u64;
    let mut last_seq = 0u64;
    let mut received = 0u64;
    while let Some(msg) = consumer.next().await {
        assert!(msg.sequence_no > last_seq, "sequence must be monotonic");
        last_seq = msg.sequence_no;
        if msg.kind == MessageKind::Text {
            last_text_n = msg.payload["n"].as_u64().unwrap_or(0);
            received += 1;
            // Drain deliberately slower than the producer.
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        if msg.kind == MessageKind::Complete {
            break;
        }
    }

    // The newest message always survives DropOldest.
    assert_eq!(last_text_n, 1000);
    assert!(received <= 1000);

    assert!(wait_for_state(&h.orchestrator, summary.id, SessionState::Idle).await);
    let stats = h.orchestrator.get_session(&summary.id).expect("get").stats;
    let expected_drops = 1000 - received;
    assert!(
        stats.messages_dropped >= expected_drops,
        "recorded drops {} must cover the observed gap {}",
        stats.messages_dropped,
        expected_drops
    );
    h.orchestrator.close_session(summary.id).await.expect("close");
}

/// S3 — agent crash mid-stream: error tail, failed execution, session
/// ends Closed.
#[tokio::test]
async fn agent_crash_mid_stream() {
    let crash = r#"read line
printf '{"type":"text","content":"1"}\n{"type":"text","content":"2"}\n{"type":"text","content":"3"}\n'
exit 9"#;
    let h = harness(crash);
    let summary = h
        .orchestrator
        .create_session(WorkspaceId::new("W1"), UserId::new("u1"), SessionConfig::default())
        .await
        .expect("create session");

    let (exec_id, mut consumer) = h
        .orchestrator
        .execute(summary.id, "go", ExecOptions::default())
        .await
        .expect("execute");

    let msgs = consumer.collect_to_end().await;
    assert_eq!(msgs.iter().filter(|m| m.kind == MessageKind::Text).count(), 3);
    let tail = msgs.last().expect("non-empty stream");
    assert_eq!(tail.kind, MessageKind::Error);
    assert_eq!(tail.payload["reason"], "agent_exited");
    assert_eq!(tail.payload["code"], 9);

    assert!(wait_for_state(&h.orchestrator, summary.id, SessionState::Closed).await);
    let exec = h.orchestrator.get_execution(&exec_id).expect("get execution");
    assert_eq!(exec.status, ExecutionStatus::Failed);
}

/// S4 — idle reaping: a session past `max_idle` ends Closed.
#[tokio::test]
async fn idle_reaping() {
    let h = harness(ECHO_AGENT);
    h.orchestrator.start();
    let summary = h
        .orchestrator
        .create_session(
            WorkspaceId::new("W1"),
            UserId::new("u1"),
            SessionConfig::default().max_idle(Duration::from_millis(100)),
        )
        .await
        .expect("create session");

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(wait_for_state(&h.orchestrator, summary.id, SessionState::Closed).await);

    let closed = h.orchestrator.get_session(&summary.id).expect("get");
    let closed_at = closed.closed_at_ms.expect("closed_at set");
    assert!(closed_at.saturating_sub(closed.last_active_at_ms) >= 100);
}

/// S5 — circuit breaker: three spawn failures open it; within
/// `open_duration` creates are rejected without attempting a spawn;
/// afterwards spawning resumes.
#[tokio::test]
async fn circuit_breaker_on_spawn_failures() {
    let h = harness_with(ECHO_AGENT, |config| {
        config.agent_command("/no/such/agent/binary").breaker(herd_reliability::BreakerConfig {
            failure_threshold: 3,
            window: Duration::from_secs(60),
            open_duration: Duration::from_millis(500),
        })
    });
    let ws = WorkspaceId::new("W1");

    for _ in 0..3 {
        let err = h
            .orchestrator
            .create_session(ws.clone(), UserId::new("u1"), SessionConfig::default())
            .await;
        assert!(matches!(err, Err(OrchestratorError::SpawnFailed(_))));
    }

    let err = h
        .orchestrator
        .create_session(ws.clone(), UserId::new("u1"), SessionConfig::default())
        .await;
    assert!(matches!(err, Err(OrchestratorError::CircuitOpen { .. })));

    tokio::time::sleep(Duration::from_millis(600)).await;
    let err =
        h.orchestrator.create_session(ws, UserId::new("u1"), SessionConfig::default()).await;
    assert!(matches!(err, Err(OrchestratorError::SpawnFailed(_))), "half-open attempts a spawn");
}

/// S6 — cancellation: the stream ends promptly, the session returns to
/// Idle (not Error), and the next Execute succeeds.
#[tokio::test]
async fn cancellation_mid_execution() {
    let hang = r#"read line
printf '{"type":"text","content":"working"}\n'
sleep 30"#;
    let h = harness(hang);
    let summary = h
        .orchestrator
        .create_session(WorkspaceId::new("W1"), UserId::new("u1"), SessionConfig::default())
        .await
        .expect("create session");

    let (exec_id, mut consumer) = h
        .orchestrator
        .execute(summary.id, "go", ExecOptions::default())
        .await
        .expect("execute");
    assert_eq!(consumer.next().await.expect("first message").kind, MessageKind::Text);

    h.orchestrator.cancel_execution(exec_id).await.expect("cancel");

    // Within shutdown_grace the stream terminates.
    tokio::time::timeout(Duration::from_secs(2), consumer.collect_to_end())
        .await
        .expect("stream must end after cancel");

    assert!(wait_for_state(&h.orchestrator, summary.id, SessionState::Idle).await);
    assert_eq!(
        h.orchestrator.get_execution(&exec_id).expect("get execution").status,
        ExecutionStatus::Cancelled
    );

    let again = h.orchestrator.execute(summary.id, "again", ExecOptions::default()).await;
    assert!(again.is_ok(), "session must accept the next prompt");
    h.orchestrator.close_session(summary.id).await.expect("close");
}

/// Restart recovery: sessions left open by a dead orchestrator re-enter
/// Closed, their executions fail with `orchestrator_restart`.
#[tokio::test]
async fn restart_marks_open_sessions_closed() {
    let workspaces = tempfile::TempDir::new().expect("workspaces");
    let state_dir = tempfile::TempDir::new().expect("state");
    let config = OrchestratorConfig::new("/bin/sh")
        .agent_args(vec!["-c".to_string(), ECHO_AGENT.to_string()])
        .grace_period(Duration::from_millis(300));

    let session_id = {
        let orchestrator =
            super::prelude::open_orchestrator(config.clone(), state_dir.path(), workspaces.path());
        let summary = orchestrator
            .create_session(WorkspaceId::new("W1"), UserId::new("u1"), SessionConfig::default())
            .await
            .expect("create session");
        // Orchestrator "dies" here without closing the session.
        summary.id
    };

    let reopened =
        super::prelude::open_orchestrator(config, state_dir.path(), workspaces.path());
    let summary = reopened.get_session(&session_id).expect("summary survives restart");
    assert_eq!(summary.state, SessionState::Closed);
}
