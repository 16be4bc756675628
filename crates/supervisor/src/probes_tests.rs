// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::process::Supervisor;
use crate::spec::SpawnSpec;
use std::time::Duration;

#[tokio::test]
async fn liveness_passes_for_running_process() {
    let supervisor = Supervisor::default();
    let handle =
        supervisor.spawn(&SpawnSpec::new("/bin/sh", "/tmp").arg("-c").arg("sleep 5")).unwrap();

    let probe = LivenessProbe::new(handle.pid());
    probe.check().await.unwrap();

    supervisor.stop(&handle, Duration::from_millis(10)).await;
}

#[tokio::test]
async fn liveness_fails_after_exit() {
    let supervisor = Supervisor::default();
    let handle =
        supervisor.spawn(&SpawnSpec::new("/bin/sh", "/tmp").arg("-c").arg("exit 0")).unwrap();
    supervisor.wait(&handle).await;
    // Give the runtime a beat to reap the child.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let probe = LivenessProbe::new(handle.pid());
    let failure = probe.check().await;
    if let Err(f) = failure {
        assert!(!f.process_alive);
    }
    // A reused pid can make the signal succeed; either outcome is
    // acceptable here, the engine cross-checks exit_info.
}

#[tokio::test]
async fn resource_probe_samples_own_memory() {
    let probe = ResourceProbe::new(std::process::id(), ResourceLimits::default());
    let outcome = probe.check().await.unwrap();
    let usage = outcome.usage.unwrap();
    if cfg!(target_os = "linux") {
        assert!(usage.memory_bytes.unwrap_or(0) > 0);
    }
}

#[tokio::test]
async fn resource_probe_flags_budget_breach() {
    // A 1-byte budget is always exceeded by a live process on /proc hosts.
    let probe = ResourceProbe::new(
        std::process::id(),
        ResourceLimits { max_memory_bytes: Some(1), ..Default::default() },
    );
    let result = probe.check().await;
    if cfg!(target_os = "linux") {
        let failure = result.err().unwrap();
        assert!(failure.process_alive);
        assert!(failure.message.contains("exceeds budget"));
    }
}
