// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health status for a live agent process.

use serde::{Deserialize, Serialize};

/// Sampled resource usage, best-effort per host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_bytes: Option<u64>,
}

/// Rolling health state for one process, updated by the health checker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub process_alive: bool,
    pub last_ok_at_ms: u64,
    pub consecutive_failures: u32,
    #[serde(default)]
    pub resource_usage: ResourceUsage,
}

impl HealthStatus {
    pub fn record_ok(&mut self, now_ms: u64, usage: ResourceUsage) {
        self.process_alive = true;
        self.last_ok_at_ms = now_ms;
        self.consecutive_failures = 0;
        self.resource_usage = usage;
    }

    pub fn record_failure(&mut self, alive: bool) {
        self.process_alive = alive;
        self.consecutive_failures += 1;
    }
}
