// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential resolution for agent subprocesses.
//!
//! Agents run in isolated environments without access to the operator's
//! shell, so the engine resolves a credential at spawn time and injects
//! it through the supervisor's environment. Resolution chain:
//!
//! ```text
//! 1. HERD_AGENT_TOKEN env var
//! 2. ~/.config/herd/credentials.json → token
//! ```

use async_trait::async_trait;
use herd_core::OrchestratorError;
use std::path::PathBuf;

/// Where spawn credentials come from. Injectable; the default chain
/// reads the host environment.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current credential, `None` when the agent runs unauthenticated.
    async fn get(&self) -> Result<Option<String>, OrchestratorError>;

    /// Re-resolve after an auth failure.
    async fn refresh(&self) -> Result<(), OrchestratorError>;

    /// Cheap shape check before injecting.
    fn validate(&self, token: &str) -> Result<(), OrchestratorError> {
        if token.is_empty() || token.chars().any(|c| c.is_control()) {
            return Err(OrchestratorError::ConfigInvalid("malformed credential".to_string()));
        }
        Ok(())
    }
}

/// Host-environment resolution chain.
#[derive(Default)]
pub struct EnvCredentialProvider;

impl EnvCredentialProvider {
    fn credentials_file() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("herd").join("credentials.json"))
    }

    fn read_credentials_file() -> Option<String> {
        let path = Self::credentials_file()?;
        let content = std::fs::read_to_string(&path).ok()?;
        let value: serde_json::Value = serde_json::from_str(&content).ok()?;
        value
            .get("token")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn get(&self) -> Result<Option<String>, OrchestratorError> {
        if let Ok(token) = std::env::var(herd_supervisor::CREDENTIAL_ENV_PRIMARY) {
            if !token.is_empty() {
                return Ok(Some(token));
            }
        }
        Ok(Self::read_credentials_file())
    }

    async fn refresh(&self) -> Result<(), OrchestratorError> {
        // Env-based credentials have nothing to refresh.
        Ok(())
    }
}

/// Fixed credential, mainly for tests and single-tenant deployments.
pub struct StaticCredentialProvider {
    token: Option<String>,
}

impl StaticCredentialProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: Some(token.into()) }
    }

    pub fn none() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn get(&self) -> Result<Option<String>, OrchestratorError> {
        Ok(self.token.clone())
    }

    async fn refresh(&self) -> Result<(), OrchestratorError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
