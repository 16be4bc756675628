// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health checker: periodic probes over one live process.
//!
//! The checker owns no process knowledge of its own; the supervisor hands
//! it probes (liveness, responsiveness, resource budget) and the engine
//! listens for the unhealthy signal.

use async_trait::async_trait;
use herd_core::{Clock, HealthStatus, ResourceUsage};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Why a probe failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ProbeFailure {
    /// Whether the process itself is still alive despite the failure.
    pub process_alive: bool,
    pub message: String,
}

/// What a successful probe observed.
#[derive(Debug, Clone, Default)]
pub struct ProbeOutcome {
    pub usage: Option<ResourceUsage>,
}

/// One health probe. Implementations must be cheap and cancellable.
#[async_trait]
pub trait Probe: Send + Sync {
    fn name(&self) -> &'static str;
    async fn check(&self) -> Result<ProbeOutcome, ProbeFailure>;
}

/// Health checking cadence and thresholds.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub interval: Duration,
    pub probe_timeout: Duration,
    /// Consecutive failing rounds that mark the process unhealthy.
    pub unhealthy_threshold: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(5),
            unhealthy_threshold: 3,
        }
    }
}

/// Periodic health checker for one process.
pub struct HealthChecker {
    config: HealthConfig,
    probes: Vec<Arc<dyn Probe>>,
    status: Arc<Mutex<HealthStatus>>,
}

impl HealthChecker {
    pub fn new(config: HealthConfig, probes: Vec<Arc<dyn Probe>>) -> Self {
        Self { config, probes, status: Arc::new(Mutex::new(HealthStatus::default())) }
    }

    /// Current status snapshot.
    pub fn status(&self) -> HealthStatus {
        self.status.lock().clone()
    }

    /// Run until cancelled. Sends the consecutive-failure count on
    /// `unhealthy_tx` each time it crosses the threshold.
    pub async fn run<C: Clock>(
        &self,
        clock: C,
        cancel: CancellationToken,
        unhealthy_tx: mpsc::Sender<u32>,
    ) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = cancel.cancelled() => return,
            }

            // Probes are suspension points too: a cancelled session must
            // not wait out probe_timeout on a wedged probe.
            let round = tokio::select! {
                round = self.run_round() => round,
                _ = cancel.cancelled() => return,
            };
            let now_ms = clock.epoch_ms();
            let crossed = {
                let mut status = self.status.lock();
                match round {
                    Ok(usage) => {
                        status.record_ok(now_ms, usage);
                        false
                    }
                    Err(failure) => {
                        status.record_failure(failure.process_alive);
                        status.consecutive_failures == self.config.unhealthy_threshold
                    }
                }
            };
            if crossed {
                let failures = self.status.lock().consecutive_failures;
                tracing::warn!(failures, "process unhealthy");
                if unhealthy_tx.send(failures).await.is_err() {
                    return;
                }
            }
        }
    }

    /// Run all probes once; the first failure fails the round.
    async fn run_round(&self) -> Result<ResourceUsage, ProbeFailure> {
        let mut usage = ResourceUsage::default();
        for probe in &self.probes {
            let checked = tokio::time::timeout(self.config.probe_timeout, probe.check()).await;
            match checked {
                Ok(Ok(outcome)) => {
                    if let Some(sampled) = outcome.usage {
                        usage = sampled;
                    }
                }
                Ok(Err(failure)) => {
                    tracing::debug!(probe = probe.name(), error = %failure, "probe failed");
                    return Err(failure);
                }
                Err(_) => {
                    return Err(ProbeFailure {
                        process_alive: true,
                        message: format!("probe {} timed out", probe.name()),
                    });
                }
            }
        }
        Ok(usage)
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
