// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Best-effort resource limit application.
//!
//! Wall time is enforced by a watchdog in the supervisor. CPU, memory,
//! and disk I/O have no portable enforcement hook from an unprivileged
//! process, so they are recorded as soft-limit-only: the resource probe
//! samples usage against them and the health checker flags the breach.

use herd_core::ResourceLimits;

/// Names of the limits that could not be hard-enforced on this host.
pub fn apply(pid: u32, limits: &ResourceLimits) -> Vec<&'static str> {
    let mut soft = Vec::new();
    if limits.max_cpu_cores.is_some() {
        soft.push("max_cpu_cores");
    }
    if limits.max_memory_bytes.is_some() {
        soft.push("max_memory_bytes");
    }
    if limits.max_disk_io_bps.is_some() {
        soft.push("max_disk_io_bps");
    }
    if !soft.is_empty() {
        tracing::warn!(pid, limits = ?soft, "soft-limit-only: host cannot hard-enforce");
    }
    soft
}
