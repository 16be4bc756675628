// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use herd_core::{SessionStats, UserId};
use tempfile::TempDir;

fn summary(id: &str, workspace: &str, state: SessionState) -> SessionSummary {
    SessionSummary {
        id: SessionId::parse(id),
        workspace_id: WorkspaceId::new(workspace),
        user_id: UserId::new("u1"),
        state,
        created_at_ms: 1000,
        last_active_at_ms: 2000,
        stats: SessionStats::default(),
        closed_at_ms: None,
    }
}

#[test]
fn save_find_roundtrip() {
    let dir = TempDir::new().unwrap();
    let store = JsonStateStore::open(dir.path(), 0).unwrap();

    let s = summary("ses-1", "W1", SessionState::Idle);
    store.save(&s).unwrap();

    let found = store.find(&SessionId::parse("ses-1")).unwrap().unwrap();
    assert_eq!(found, s);
    assert!(store.find(&SessionId::parse("ses-missing")).unwrap().is_none());
}

#[test]
fn state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = JsonStateStore::open(dir.path(), 0).unwrap();
        store.save(&summary("ses-1", "W1", SessionState::Closed)).unwrap();
    }
    let store = JsonStateStore::open(dir.path(), 0).unwrap();
    assert!(store.find(&SessionId::parse("ses-1")).unwrap().is_some());
}

#[test]
fn reopen_closes_sessions_left_open() {
    let dir = TempDir::new().unwrap();
    {
        let store = JsonStateStore::open(dir.path(), 0).unwrap();
        store.save(&summary("ses-open", "W1", SessionState::Active)).unwrap();
        store.save(&summary("ses-done", "W1", SessionState::Closed)).unwrap();
    }

    let store = JsonStateStore::open(dir.path(), 9_999).unwrap();
    let recovered = store.find(&SessionId::parse("ses-open")).unwrap().unwrap();
    assert_eq!(recovered.state, SessionState::Closed);
    assert_eq!(recovered.closed_at_ms, Some(9_999));

    let untouched = store.find(&SessionId::parse("ses-done")).unwrap().unwrap();
    assert_eq!(untouched.closed_at_ms, None);
}

#[test]
fn reopen_fails_inflight_executions_with_restart_reason() {
    let dir = TempDir::new().unwrap();
    let session_id = SessionId::parse("ses-1");
    {
        let store = JsonStateStore::open(dir.path(), 0).unwrap();
        let mut running = Execution::new(session_id, 1000);
        running.status = ExecutionStatus::Running;
        store.save_execution(&running).unwrap();

        let mut done = Execution::new(session_id, 1000);
        done.finish(ExecutionStatus::Completed, 1500);
        store.save_execution(&done).unwrap();
    }

    let store = JsonStateStore::open(dir.path(), 9_999).unwrap();
    let executions = store.list_executions(Some(&session_id)).unwrap();
    let failed: Vec<_> =
        executions.iter().filter(|e| e.status == ExecutionStatus::Failed).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].first_error.as_ref().unwrap().message, "orchestrator_restart");
    assert!(executions.iter().any(|e| e.status == ExecutionStatus::Completed));
}

#[test]
fn update_requires_existing_record() {
    let dir = TempDir::new().unwrap();
    let store = JsonStateStore::open(dir.path(), 0).unwrap();
    let err = store.update(&summary("ses-ghost", "W1", SessionState::Idle));
    assert!(matches!(err, Err(OrchestratorError::NotFound(_))));
}

#[test]
fn find_by_workspace_filters() {
    let dir = TempDir::new().unwrap();
    let store = JsonStateStore::open(dir.path(), 0).unwrap();
    store.save(&summary("ses-1", "W1", SessionState::Idle)).unwrap();
    store.save(&summary("ses-2", "W2", SessionState::Idle)).unwrap();
    store.save(&summary("ses-3", "W1", SessionState::Idle)).unwrap();

    let found = store.find_by_workspace(&WorkspaceId::new("W1")).unwrap();
    assert_eq!(found.len(), 2);
}

#[test]
fn delete_removes_session_and_its_executions() {
    let dir = TempDir::new().unwrap();
    let store = JsonStateStore::open(dir.path(), 0).unwrap();
    let session_id = SessionId::parse("ses-1");
    store.save(&summary("ses-1", "W1", SessionState::Closed)).unwrap();
    store.save_execution(&Execution::new(session_id, 1000)).unwrap();

    store.delete(&session_id).unwrap();
    assert!(store.find(&session_id).unwrap().is_none());
    assert!(store.list_executions(Some(&session_id)).unwrap().is_empty());
}

#[test]
fn list_sorted_by_creation() {
    let dir = TempDir::new().unwrap();
    let store = JsonStateStore::open(dir.path(), 0).unwrap();
    let mut a = summary("ses-a", "W1", SessionState::Closed);
    a.created_at_ms = 3000;
    let mut b = summary("ses-b", "W1", SessionState::Closed);
    b.created_at_ms = 1000;
    store.save(&a).unwrap();
    store.save(&b).unwrap();

    let ids: Vec<String> = store.list().unwrap().iter().map(|s| s.id.to_string()).collect();
    assert_eq!(ids, vec!["ses-b", "ses-a"]);
}

#[test]
fn corrupt_state_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("sessions.json"), "{not json").unwrap();
    let err = JsonStateStore::open(dir.path(), 0);
    assert!(matches!(err, Err(OrchestratorError::Internal(_))));
}
