// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child environment derivation and credential masking.
//!
//! The credential reaches the agent through two variables: the primary
//! one the agent documents, and a generic fallback older agent builds
//! read. Neither value may appear in logs or error messages.

use crate::spec::SpawnSpec;

/// Primary credential variable the agent reads.
pub const CREDENTIAL_ENV_PRIMARY: &str = "HERD_AGENT_TOKEN";

/// Fallback credential variable for older agent builds.
pub const CREDENTIAL_ENV_FALLBACK: &str = "AGENT_TOKEN";

const SECRET_MARKERS: [&str; 5] = ["TOKEN", "SECRET", "KEY", "CREDENTIAL", "PASSWORD"];

/// Derive the full environment override list for a spawn.
///
/// Spec-provided overrides come first; the credential is appended last so
/// it wins over any same-named key smuggled in through `env`.
pub fn child_env(spec: &SpawnSpec) -> Vec<(String, String)> {
    let mut env = spec.env.clone();
    if let Some(credential) = &spec.credential {
        env.retain(|(k, _)| k != CREDENTIAL_ENV_PRIMARY && k != CREDENTIAL_ENV_FALLBACK);
        env.push((CREDENTIAL_ENV_PRIMARY.to_string(), credential.clone()));
        env.push((CREDENTIAL_ENV_FALLBACK.to_string(), credential.clone()));
    }
    env
}

/// Is this variable name secret-shaped?
pub fn is_secret_key(key: &str) -> bool {
    let upper = key.to_ascii_uppercase();
    SECRET_MARKERS.iter().any(|m| upper.contains(m))
}

/// Copy of an env list with secret-shaped values replaced by `***`.
pub fn masked_for_log(env: &[(String, String)]) -> Vec<(String, String)> {
    env.iter()
        .map(|(k, v)| {
            if is_secret_key(k) {
                (k.clone(), "***".to_string())
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
