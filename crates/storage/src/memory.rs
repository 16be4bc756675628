// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory repository for tests and ephemeral deployments.

use crate::repo::SessionRepository;
use herd_core::{
    Execution, ExecutionId, OrchestratorError, SessionId, SessionSummary, WorkspaceId,
};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Map-backed repository; contents die with the process.
#[derive(Default)]
pub struct InMemoryStore {
    sessions: Mutex<HashMap<String, SessionSummary>>,
    executions: Mutex<HashMap<String, Execution>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionRepository for InMemoryStore {
    fn save(&self, summary: &SessionSummary) -> Result<(), OrchestratorError> {
        self.sessions.lock().insert(summary.id.to_string(), summary.clone());
        Ok(())
    }

    fn find(&self, id: &SessionId) -> Result<Option<SessionSummary>, OrchestratorError> {
        Ok(self.sessions.lock().get(id.as_str()).cloned())
    }

    fn find_by_workspace(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<Vec<SessionSummary>, OrchestratorError> {
        Ok(self
            .sessions
            .lock()
            .values()
            .filter(|s| &s.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    fn update(&self, summary: &SessionSummary) -> Result<(), OrchestratorError> {
        let mut sessions = self.sessions.lock();
        if !sessions.contains_key(summary.id.as_str()) {
            return Err(OrchestratorError::NotFound(summary.id.to_string()));
        }
        sessions.insert(summary.id.to_string(), summary.clone());
        Ok(())
    }

    fn delete(&self, id: &SessionId) -> Result<(), OrchestratorError> {
        self.sessions.lock().remove(id.as_str());
        self.executions.lock().retain(|_, e| e.session_id != *id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<SessionSummary>, OrchestratorError> {
        let mut sessions: Vec<_> = self.sessions.lock().values().cloned().collect();
        sessions.sort_by_key(|s| s.created_at_ms);
        Ok(sessions)
    }

    fn save_execution(&self, execution: &Execution) -> Result<(), OrchestratorError> {
        self.executions.lock().insert(execution.id.to_string(), execution.clone());
        Ok(())
    }

    fn find_execution(&self, id: &ExecutionId) -> Result<Option<Execution>, OrchestratorError> {
        Ok(self.executions.lock().get(id.as_str()).cloned())
    }

    fn list_executions(
        &self,
        session_id: Option<&SessionId>,
    ) -> Result<Vec<Execution>, OrchestratorError> {
        let mut executions: Vec<_> = self
            .executions
            .lock()
            .values()
            .filter(|e| session_id.map(|id| e.session_id == *id).unwrap_or(true))
            .cloned()
            .collect();
        executions.sort_by_key(|e| e.started_at_ms);
        Ok(executions)
    }
}
