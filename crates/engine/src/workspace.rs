// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace resolution: workspace id → agent working directory.

use herd_core::{OrchestratorError, WorkspaceId};
use std::path::PathBuf;

/// Maps a workspace id to a working directory plus env overrides.
/// Implemented by the container-provisioning collaborator in production;
/// the bundled resolver uses plain directories under a base path.
pub trait WorkspaceResolver: Send + Sync {
    fn resolve_working_dir(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<(PathBuf, Vec<(String, String)>), OrchestratorError>;
}

/// Directory-per-workspace resolver.
pub struct LocalWorkspaceResolver {
    base: PathBuf,
    create_missing: bool,
}

impl LocalWorkspaceResolver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into(), create_missing: true }
    }

    /// Fail instead of creating missing workspace directories.
    pub fn require_existing(mut self) -> Self {
        self.create_missing = false;
        self
    }
}

impl WorkspaceResolver for LocalWorkspaceResolver {
    fn resolve_working_dir(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<(PathBuf, Vec<(String, String)>), OrchestratorError> {
        if workspace_id.as_str().is_empty() || workspace_id.as_str().contains(['/', '\\']) {
            return Err(OrchestratorError::ConfigInvalid(format!(
                "invalid workspace id: {workspace_id}"
            )));
        }
        let dir = self.base.join(workspace_id.as_str());
        if !dir.is_dir() {
            if self.create_missing {
                std::fs::create_dir_all(&dir).map_err(|e| {
                    OrchestratorError::Internal(format!("create workspace dir: {e}"))
                })?;
            } else {
                return Err(OrchestratorError::NotFound(format!("workspace {workspace_id}")));
            }
        }
        let env = vec![("HERD_WORKSPACE".to_string(), workspace_id.as_str().to_string())];
        Ok((dir, env))
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
