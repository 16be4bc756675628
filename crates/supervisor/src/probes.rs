// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor-side health probes: liveness and resource budget.
//!
//! The responsiveness probe lives in the engine, where the stdin writer
//! and the router needed for marker echo are wired together.

use async_trait::async_trait;
use herd_core::{ResourceLimits, ResourceUsage};
use herd_reliability::{Probe, ProbeFailure, ProbeOutcome};
use nix::sys::signal::kill;
use nix::unistd::Pid;

/// Signal-0 liveness check.
pub struct LivenessProbe {
    pid: u32,
}

impl LivenessProbe {
    pub fn new(pid: u32) -> Self {
        Self { pid }
    }
}

#[async_trait]
impl Probe for LivenessProbe {
    fn name(&self) -> &'static str {
        "liveness"
    }

    async fn check(&self) -> Result<ProbeOutcome, ProbeFailure> {
        match kill(Pid::from_raw(self.pid as i32), None) {
            Ok(()) => Ok(ProbeOutcome::default()),
            Err(e) => Err(ProbeFailure {
                process_alive: false,
                message: format!("pid {} gone: {e}", self.pid),
            }),
        }
    }
}

/// Samples memory usage from /proc and compares it to the budget.
///
/// Best-effort: hosts without /proc sample nothing and always pass.
pub struct ResourceProbe {
    pid: u32,
    limits: ResourceLimits,
}

impl ResourceProbe {
    pub fn new(pid: u32, limits: ResourceLimits) -> Self {
        Self { pid, limits }
    }

    fn sample_memory(&self) -> Option<u64> {
        let statm = std::fs::read_to_string(format!("/proc/{}/statm", self.pid)).ok()?;
        let rss_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
        Some(rss_pages * 4096)
    }
}

#[async_trait]
impl Probe for ResourceProbe {
    fn name(&self) -> &'static str {
        "resource"
    }

    async fn check(&self) -> Result<ProbeOutcome, ProbeFailure> {
        let memory_bytes = self.sample_memory();
        let usage = ResourceUsage { cpu_percent: None, memory_bytes };

        if let (Some(used), Some(budget)) = (memory_bytes, self.limits.max_memory_bytes) {
            if used > budget {
                return Err(ProbeFailure {
                    process_alive: true,
                    message: format!("memory {used} exceeds budget {budget}"),
                });
            }
        }
        Ok(ProbeOutcome { usage: Some(usage) })
    }
}

#[cfg(test)]
#[path = "probes_tests.rs"]
mod tests;
