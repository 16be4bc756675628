// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session repository contract consumed by the engine.

use herd_core::{Execution, ExecutionId, OrchestratorError, SessionId, SessionSummary, WorkspaceId};

/// Persistence of session and execution summaries.
///
/// Implementations must be safe for concurrent use; the engine calls in
/// from the session manager and the reaper.
pub trait SessionRepository: Send + Sync {
    fn save(&self, summary: &SessionSummary) -> Result<(), OrchestratorError>;

    fn find(&self, id: &SessionId) -> Result<Option<SessionSummary>, OrchestratorError>;

    fn find_by_workspace(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<Vec<SessionSummary>, OrchestratorError>;

    /// Update an existing summary; `NotFound` when it was never saved.
    fn update(&self, summary: &SessionSummary) -> Result<(), OrchestratorError>;

    fn delete(&self, id: &SessionId) -> Result<(), OrchestratorError>;

    fn list(&self) -> Result<Vec<SessionSummary>, OrchestratorError>;

    fn save_execution(&self, execution: &Execution) -> Result<(), OrchestratorError>;

    fn find_execution(&self, id: &ExecutionId) -> Result<Option<Execution>, OrchestratorError>;

    fn list_executions(
        &self,
        session_id: Option<&SessionId>,
    ) -> Result<Vec<Execution>, OrchestratorError>;
}
