// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawn specification for one agent process.

use herd_core::{OrchestratorError, ResourceLimits};
use std::path::PathBuf;

/// Everything the supervisor needs to start an agent.
///
/// Built by the engine from the session config plus the resolved
/// workspace and credential. The credential is held opaquely and only
/// ever leaves through the child environment.
#[derive(Clone)]
pub struct SpawnSpec {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Environment overrides applied on top of the parent environment.
    pub env: Vec<(String, String)>,
    /// Variables to explicitly unset in the child (prevents inheritance
    /// of stale values from the parent environment).
    pub unset_env: Vec<String>,
    pub credential: Option<String>,
    pub limits: ResourceLimits,
}

impl SpawnSpec {
    pub fn new(command: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: Vec::new(),
            unset_env: Vec::new(),
            credential: None,
            limits: ResourceLimits::default(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn unset(mut self, key: impl Into<String>) -> Self {
        self.unset_env.push(key.into());
        self
    }

    herd_core::setters! {
        set { limits: ResourceLimits }
        option { credential: String }
    }

    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.command.is_empty() {
            return Err(OrchestratorError::ConfigInvalid("agent command is empty".to_string()));
        }
        if self.cwd.as_os_str().is_empty() {
            return Err(OrchestratorError::ConfigInvalid("working dir is empty".to_string()));
        }
        if !self.cwd.is_dir() {
            return Err(OrchestratorError::ConfigInvalid(format!(
                "working dir does not exist: {}",
                self.cwd.display()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for SpawnSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnSpec")
            .field("command", &self.command)
            .field("args", &self.args)
            .field("cwd", &self.cwd)
            .field("env", &crate::env::masked_for_log(&self.env))
            .field("unset_env", &self.unset_env)
            .field("credential", &self.credential.as_ref().map(|_| "***"))
            .field("limits", &self.limits)
            .finish()
    }
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;
