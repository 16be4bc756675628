// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON state-dir backend.
//!
//! One `sessions.json` snapshot per state dir, rewritten atomically
//! (temp file + rename) on every mutation. On load, sessions that were
//! open when the orchestrator died re-enter `Closed` and their
//! non-terminal executions become `failed` with reason
//! `orchestrator_restart`.

use crate::repo::SessionRepository;
use chrono::{DateTime, Utc};
use herd_core::{
    ErrorKind, ErrorSummary, Execution, ExecutionId, ExecutionStatus, OrchestratorError,
    SessionId, SessionState, SessionSummary, WorkspaceId,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const STATE_FILE: &str = "sessions.json";
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateSnapshot {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    sessions: HashMap<String, SessionSummary>,
    #[serde(default)]
    executions: HashMap<String, Execution>,
}

/// File-backed repository rooted at a state directory.
pub struct JsonStateStore {
    path: PathBuf,
    state: Mutex<StateSnapshot>,
}

impl JsonStateStore {
    /// Open (or create) the store, applying restart recovery.
    pub fn open(state_dir: &Path, now_ms: u64) -> Result<Self, OrchestratorError> {
        std::fs::create_dir_all(state_dir)
            .map_err(|e| OrchestratorError::Internal(format!("create state dir: {e}")))?;
        let path = state_dir.join(STATE_FILE);
        let mut state = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| OrchestratorError::Internal(format!("corrupt state file: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StateSnapshot::default(),
            Err(e) => return Err(OrchestratorError::Internal(format!("read state file: {e}"))),
        };
        let recovered = recover(&mut state, now_ms);
        let store = Self { path, state: Mutex::new(state) };
        if recovered > 0 {
            tracing::warn!(recovered, "closed sessions left open by previous run");
            store.persist(&store.state.lock())?;
        }
        Ok(store)
    }

    fn persist(&self, state: &StateSnapshot) -> Result<(), OrchestratorError> {
        let raw = serde_json::to_string_pretty(state)
            .map_err(|e| OrchestratorError::Internal(format!("serialize state: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)
            .map_err(|e| OrchestratorError::Internal(format!("write state file: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| OrchestratorError::Internal(format!("rename state file: {e}")))?;
        Ok(())
    }

    fn mutate<F: FnOnce(&mut StateSnapshot)>(&self, f: F) -> Result<(), OrchestratorError> {
        let mut state = self.state.lock();
        f(&mut state);
        state.version = SNAPSHOT_VERSION;
        state.saved_at = Some(Utc::now());
        self.persist(&state)
    }
}

/// Mark sessions left open by a dead orchestrator as closed and fail
/// their in-flight executions. Returns how many records were touched.
fn recover(state: &mut StateSnapshot, now_ms: u64) -> usize {
    let mut touched = 0;
    for summary in state.sessions.values_mut() {
        if summary.state != SessionState::Closed {
            summary.state = SessionState::Closed;
            summary.closed_at_ms = Some(now_ms);
            touched += 1;
        }
    }
    for execution in state.executions.values_mut() {
        if !execution.status.is_terminal() {
            execution.status = ExecutionStatus::Failed;
            execution.ended_at_ms = Some(now_ms);
            if execution.first_error.is_none() {
                execution.first_error = Some(ErrorSummary {
                    kind: ErrorKind::Internal,
                    message: "orchestrator_restart".to_string(),
                });
            }
            touched += 1;
        }
    }
    touched
}

impl SessionRepository for JsonStateStore {
    fn save(&self, summary: &SessionSummary) -> Result<(), OrchestratorError> {
        self.mutate(|state| {
            state.sessions.insert(summary.id.to_string(), summary.clone());
        })
    }

    fn find(&self, id: &SessionId) -> Result<Option<SessionSummary>, OrchestratorError> {
        Ok(self.state.lock().sessions.get(id.as_str()).cloned())
    }

    fn find_by_workspace(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<Vec<SessionSummary>, OrchestratorError> {
        Ok(self
            .state
            .lock()
            .sessions
            .values()
            .filter(|s| &s.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    fn update(&self, summary: &SessionSummary) -> Result<(), OrchestratorError> {
        let mut state = self.state.lock();
        if !state.sessions.contains_key(summary.id.as_str()) {
            return Err(OrchestratorError::NotFound(summary.id.to_string()));
        }
        state.sessions.insert(summary.id.to_string(), summary.clone());
        state.version = SNAPSHOT_VERSION;
        state.saved_at = Some(Utc::now());
        self.persist(&state)
    }

    fn delete(&self, id: &SessionId) -> Result<(), OrchestratorError> {
        self.mutate(|state| {
            state.sessions.remove(id.as_str());
            state.executions.retain(|_, e| e.session_id != *id);
        })
    }

    fn list(&self) -> Result<Vec<SessionSummary>, OrchestratorError> {
        let mut sessions: Vec<_> = self.state.lock().sessions.values().cloned().collect();
        sessions.sort_by_key(|s| s.created_at_ms);
        Ok(sessions)
    }

    fn save_execution(&self, execution: &Execution) -> Result<(), OrchestratorError> {
        self.mutate(|state| {
            state.executions.insert(execution.id.to_string(), execution.clone());
        })
    }

    fn find_execution(&self, id: &ExecutionId) -> Result<Option<Execution>, OrchestratorError> {
        Ok(self.state.lock().executions.get(id.as_str()).cloned())
    }

    fn list_executions(
        &self,
        session_id: Option<&SessionId>,
    ) -> Result<Vec<Execution>, OrchestratorError> {
        let mut executions: Vec<_> = self
            .state
            .lock()
            .executions
            .values()
            .filter(|e| session_id.map(|id| e.session_id == *id).unwrap_or(true))
            .cloned()
            .collect();
        executions.sort_by_key(|e| e.started_at_ms);
        Ok(executions)
    }
}

#[cfg(test)]
#[path = "json_tests.rs"]
mod tests;
