// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session configuration: the recognized option keys and the reuse key.

use crate::error::OrchestratorError;
use crate::limits::{duration_ms, ResourceLimits};
use crate::workspace::WorkspaceId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Backpressure drop policy for the parser→router buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    DropOldest,
    DropNewest,
    Block,
}

impl Default for DropPolicy {
    fn default() -> Self {
        DropPolicy::Block
    }
}

crate::simple_display! {
    DropPolicy {
        DropOldest => "drop_oldest",
        DropNewest => "drop_newest",
        Block => "block",
    }
}

/// Config fields that participate in idle-session reuse matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReuseKeyField {
    WorkspaceId,
    SystemPrompt,
    AllowedTools,
    ResourceLimits,
}

fn default_reuse_key_fields() -> Vec<ReuseKeyField> {
    vec![ReuseKeyField::WorkspaceId, ReuseKeyField::SystemPrompt, ReuseKeyField::AllowedTools]
}

fn default_max_turns() -> u32 {
    10
}

fn default_tool_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_max_idle() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_max_lifetime() -> Duration {
    Duration::from_secs(8 * 60 * 60)
}

fn default_buffer_capacity() -> usize {
    256
}

fn default_buffer_bytes() -> usize {
    4 * 1024 * 1024
}

/// The recognized session options.
///
/// The credential is opaque and never serialized or printed; it reaches
/// the child process only through the supervisor's environment injection.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default = "default_tool_timeout", with = "duration_ms")]
    pub tool_timeout: Duration,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default, skip_serializing)]
    pub credential: Option<String>,
    #[serde(default)]
    pub resource_limits: ResourceLimits,
    #[serde(default = "default_max_idle", with = "duration_ms")]
    pub max_idle: Duration,
    #[serde(default = "default_max_lifetime", with = "duration_ms")]
    pub max_lifetime: Duration,
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    #[serde(default = "default_buffer_bytes")]
    pub buffer_bytes: usize,
    #[serde(default)]
    pub drop_policy: DropPolicy,
    #[serde(default = "default_reuse_key_fields")]
    pub reuse_key_fields: Vec<ReuseKeyField>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            system_prompt: None,
            max_turns: default_max_turns(),
            allowed_tools: Vec::new(),
            tool_timeout: default_tool_timeout(),
            env: HashMap::new(),
            credential: None,
            resource_limits: ResourceLimits::default(),
            max_idle: default_max_idle(),
            max_lifetime: default_max_lifetime(),
            buffer_capacity: default_buffer_capacity(),
            buffer_bytes: default_buffer_bytes(),
            drop_policy: DropPolicy::default(),
            reuse_key_fields: default_reuse_key_fields(),
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("working_dir", &self.working_dir)
            .field("system_prompt", &self.system_prompt)
            .field("max_turns", &self.max_turns)
            .field("allowed_tools", &self.allowed_tools)
            .field("tool_timeout", &self.tool_timeout)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .field("credential", &self.credential.as_ref().map(|_| "***"))
            .field("resource_limits", &self.resource_limits)
            .field("max_idle", &self.max_idle)
            .field("max_lifetime", &self.max_lifetime)
            .field("buffer_capacity", &self.buffer_capacity)
            .field("buffer_bytes", &self.buffer_bytes)
            .field("drop_policy", &self.drop_policy)
            .field("reuse_key_fields", &self.reuse_key_fields)
            .finish()
    }
}

impl SessionConfig {
    crate::setters! {
        set {
            max_turns: u32,
            tool_timeout: Duration,
            max_idle: Duration,
            max_lifetime: Duration,
            buffer_capacity: usize,
            buffer_bytes: usize,
            drop_policy: DropPolicy,
            allowed_tools: Vec<String>,
            resource_limits: ResourceLimits,
            reuse_key_fields: Vec<ReuseKeyField>,
        }
        option {
            working_dir: PathBuf,
            system_prompt: String,
            credential: String,
        }
    }

    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Validate the recognized options; rejected configs never reach the
    /// supervisor.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.max_turns < 1 {
            return Err(OrchestratorError::ConfigInvalid("max_turns must be >= 1".to_string()));
        }
        if self.buffer_capacity < 1 {
            return Err(OrchestratorError::ConfigInvalid(
                "buffer_capacity must be >= 1".to_string(),
            ));
        }
        if self.buffer_bytes < 1024 {
            return Err(OrchestratorError::ConfigInvalid(
                "buffer_bytes must be >= 1024".to_string(),
            ));
        }
        if self.max_idle.is_zero() {
            return Err(OrchestratorError::ConfigInvalid("max_idle must be > 0".to_string()));
        }
        if self.max_lifetime.is_zero() {
            return Err(OrchestratorError::ConfigInvalid("max_lifetime must be > 0".to_string()));
        }
        if self.allowed_tools.iter().any(|t| t.is_empty()) {
            return Err(OrchestratorError::ConfigInvalid(
                "allowed_tools entries must be non-empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Structural reuse key over the configured `reuse_key_fields`.
    ///
    /// An idle session is reusable for a new request iff both produce an
    /// equal key.
    pub fn reuse_key(&self, workspace_id: &WorkspaceId) -> ReuseKey {
        let mut parts = Vec::with_capacity(self.reuse_key_fields.len());
        for field in &self.reuse_key_fields {
            let value = match field {
                ReuseKeyField::WorkspaceId => workspace_id.as_str().to_string(),
                ReuseKeyField::SystemPrompt => self.system_prompt.clone().unwrap_or_default(),
                ReuseKeyField::AllowedTools => {
                    let mut tools = self.allowed_tools.clone();
                    tools.sort();
                    tools.join(",")
                }
                ReuseKeyField::ResourceLimits => self.resource_limits.reuse_key_part(),
            };
            parts.push((*field, value));
        }
        parts.sort_by_key(|(f, _)| *f as u8);
        ReuseKey(parts)
    }
}

/// Canonicalized reuse key; equal keys mean compatible sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReuseKey(Vec<(ReuseKeyField, String)>);

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
