// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit breaker, keyed per session or per workspace.
//!
//! State lives behind a mutex; all time is passed in by the caller so the
//! breaker itself stays clock-free and testable.

use herd_core::{BreakerState, OrchestratorError, SessionId, WorkspaceId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Breaker thresholds.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures within `window` that open the breaker.
    pub failure_threshold: u32,
    /// Failures older than this no longer count toward the threshold.
    pub window: Duration,
    /// How long an open breaker rejects before probing again.
    pub open_duration: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            window: Duration::from_secs(60),
            open_duration: Duration::from_secs(30),
        }
    }
}

/// What the breaker is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerScope {
    Session,
    Workspace,
}

struct BreakerInner {
    state: BreakerState,
    failures: u32,
    last_failure_at: Option<Instant>,
    opened_at: Option<Instant>,
}

/// A single circuit breaker instance.
pub struct CircuitBreaker {
    key: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(key: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            key: key.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failures: 0,
                last_failure_at: None,
                opened_at: None,
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Gate a call. In `Open`, rejects with `CircuitOpen` until
    /// `open_duration` has elapsed, at which point the breaker moves to
    /// `HalfOpen` and admits one probe.
    pub fn admit(&self, now: Instant) -> Result<(), OrchestratorError> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open => {
                let opened_at = inner.opened_at.unwrap_or(now);
                if now.duration_since(opened_at) >= self.config.open_duration {
                    inner.state = BreakerState::HalfOpen;
                    tracing::info!(key = %self.key, "breaker half-open");
                    Ok(())
                } else {
                    Err(OrchestratorError::CircuitOpen { key: self.key.clone() })
                }
            }
        }
    }

    /// Record a successful call. Returns the transition when one occurred.
    pub fn record_success(&self) -> Option<(BreakerState, BreakerState)> {
        let mut inner = self.inner.lock();
        inner.failures = 0;
        inner.last_failure_at = None;
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Closed;
                inner.opened_at = None;
                tracing::info!(key = %self.key, "breaker closed");
                Some((BreakerState::HalfOpen, BreakerState::Closed))
            }
            _ => None,
        }
    }

    /// Record a failed call. Returns the transition when one occurred.
    pub fn record_failure(&self, now: Instant) -> Option<(BreakerState, BreakerState)> {
        let mut inner = self.inner.lock();

        // Failures outside the window restart the count.
        if let Some(last) = inner.last_failure_at {
            if now.duration_since(last) > self.config.window {
                inner.failures = 0;
            }
        }
        inner.failures += 1;
        inner.last_failure_at = Some(now);

        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(now);
                tracing::warn!(key = %self.key, "breaker re-opened from half-open");
                Some((BreakerState::HalfOpen, BreakerState::Open))
            }
            BreakerState::Closed if inner.failures >= self.config.failure_threshold => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(now);
                tracing::warn!(key = %self.key, failures = inner.failures, "breaker opened");
                Some((BreakerState::Closed, BreakerState::Open))
            }
            _ => None,
        }
    }
}

/// Registry handing out one breaker per key under the configured scope.
pub struct BreakerRegistry {
    scope: BreakerScope,
    config: BreakerConfig,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(scope: BreakerScope, config: BreakerConfig) -> Self {
        Self { scope, config, breakers: Mutex::new(HashMap::new()) }
    }

    /// Breaker key for a session in a workspace under the current scope.
    pub fn key_for(&self, workspace_id: &WorkspaceId, session_id: Option<&SessionId>) -> String {
        match (self.scope, session_id) {
            (BreakerScope::Session, Some(id)) => id.as_str().to_string(),
            _ => workspace_id.as_str().to_string(),
        }
    }

    pub fn get(&self, key: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock();
        breakers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(key, self.config.clone())))
            .clone()
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
