// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use herd_core::SystemClock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

struct FlakyProbe {
    healthy: Arc<AtomicBool>,
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl Probe for FlakyProbe {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn check(&self) -> Result<ProbeOutcome, ProbeFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.healthy.load(Ordering::SeqCst) {
            Ok(ProbeOutcome {
                usage: Some(ResourceUsage { cpu_percent: Some(1.0), memory_bytes: Some(1024) }),
            })
        } else {
            Err(ProbeFailure { process_alive: true, message: "no echo".into() })
        }
    }
}

struct HangingProbe;

#[async_trait]
impl Probe for HangingProbe {
    fn name(&self) -> &'static str {
        "hanging"
    }

    async fn check(&self) -> Result<ProbeOutcome, ProbeFailure> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(ProbeOutcome::default())
    }
}

fn fast_config() -> HealthConfig {
    HealthConfig {
        interval: Duration::from_millis(10),
        probe_timeout: Duration::from_millis(50),
        unhealthy_threshold: 3,
    }
}

#[tokio::test]
async fn healthy_rounds_update_status() {
    let healthy = Arc::new(AtomicBool::new(true));
    let calls = Arc::new(AtomicU32::new(0));
    let checker = HealthChecker::new(
        fast_config(),
        vec![Arc::new(FlakyProbe { healthy: healthy.clone(), calls: calls.clone() })],
    );
    let checker = Arc::new(checker);
    let cancel = CancellationToken::new();
    let (tx, _rx) = mpsc::channel(4);

    let run = {
        let checker = checker.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { checker.run(SystemClock, cancel, tx).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    run.await.unwrap();

    let status = checker.status();
    assert!(status.process_alive);
    assert_eq!(status.consecutive_failures, 0);
    assert_eq!(status.resource_usage.memory_bytes, Some(1024));
    assert!(calls.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn crossing_threshold_signals_unhealthy_once() {
    let healthy = Arc::new(AtomicBool::new(false));
    let calls = Arc::new(AtomicU32::new(0));
    let checker = Arc::new(HealthChecker::new(
        fast_config(),
        vec![Arc::new(FlakyProbe { healthy, calls })],
    ));
    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(4);

    let run = {
        let checker = checker.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { checker.run(SystemClock, cancel, tx).await })
    };

    let failures = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert_eq!(failures, Some(3));

    cancel.cancel();
    run.await.unwrap();
    assert!(checker.status().consecutive_failures >= 3);
}

#[tokio::test]
async fn probe_timeout_counts_as_failure() {
    let checker = Arc::new(HealthChecker::new(fast_config(), vec![Arc::new(HangingProbe)]));
    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(4);

    let run = {
        let checker = checker.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { checker.run(SystemClock, cancel, tx).await })
    };

    let failures = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert_eq!(failures, Some(3));
    // Timeouts leave process_alive true; only liveness probes may flip it.
    assert!(checker.status().process_alive);

    cancel.cancel();
    run.await.unwrap();
}

#[tokio::test]
async fn cancellation_stops_the_loop() {
    let checker = Arc::new(HealthChecker::new(fast_config(), vec![]));
    let cancel = CancellationToken::new();
    let (tx, _rx) = mpsc::channel(4);
    cancel.cancel();
    // Must return promptly with no probes and a pre-cancelled token.
    tokio::time::timeout(Duration::from_secs(1), checker.run(SystemClock, cancel, tx))
        .await
        .unwrap();
}

#[tokio::test]
async fn cancellation_interrupts_a_wedged_probe() {
    // Probe hangs far past probe_timeout; cancellation must not wait
    // for the round to finish.
    let config = HealthConfig {
        interval: Duration::from_millis(10),
        probe_timeout: Duration::from_secs(3600),
        unhealthy_threshold: 3,
    };
    let checker = Arc::new(HealthChecker::new(config, vec![Arc::new(HangingProbe)]));
    let cancel = CancellationToken::new();
    let (tx, _rx) = mpsc::channel(4);

    let run = {
        let checker = checker.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { checker.run(SystemClock, cancel, tx).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), run).await.unwrap().unwrap();
}
