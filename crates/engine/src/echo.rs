// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Responsiveness probe: no-op marker echo over the agent's own pipes.
//!
//! The probe writes `{"type":"ping","marker":N}` to stdin; a
//! cooperating agent echoes the marker back as a `status` message. The
//! listener half runs as a router handler and completes the pending
//! oneshot. Enable only for agents that implement the ping contract.

use async_trait::async_trait;
use herd_core::{Message, MessageKind};
use herd_reliability::{Probe, ProbeFailure, ProbeOutcome};
use herd_stream::{Handler, HandlerCtx, HandlerError};
use herd_supervisor::{ProcessHandle, Supervisor};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Pending markers awaiting their echo.
#[derive(Default)]
pub struct EchoTable {
    pending: Mutex<HashMap<u64, oneshot::Sender<()>>>,
    next_marker: AtomicU64,
}

impl EchoTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn register(&self) -> (u64, oneshot::Receiver<()>) {
        let marker = self.next_marker.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock();
        // Sweep entries whose probe timed out and dropped its receiver.
        pending.retain(|_, sender| !sender.is_closed());
        pending.insert(marker, tx);
        (marker, rx)
    }

    fn resolve(&self, marker: u64) {
        if let Some(tx) = self.pending.lock().remove(&marker) {
            let _ = tx.send(());
        }
    }
}

/// Router handler matching `status` messages that carry an echo marker.
pub struct EchoListener {
    table: Arc<EchoTable>,
}

impl EchoListener {
    pub fn new(table: Arc<EchoTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl Handler for EchoListener {
    fn name(&self) -> &'static str {
        "echo-listener"
    }

    fn priority(&self) -> i32 {
        95
    }

    fn wants(&self, kind: MessageKind) -> bool {
        kind == MessageKind::Status
    }

    async fn handle(&self, _ctx: &HandlerCtx, msg: &Message) -> Result<(), HandlerError> {
        if let Some(marker) = msg.payload.get("echo").and_then(serde_json::Value::as_u64) {
            self.table.resolve(marker);
        }
        Ok(())
    }
}

/// The probe half: write marker, await echo.
pub struct EchoProbe {
    table: Arc<EchoTable>,
    supervisor: Supervisor,
    handle: Arc<ProcessHandle>,
    cancel: CancellationToken,
}

impl EchoProbe {
    pub fn new(
        table: Arc<EchoTable>,
        supervisor: Supervisor,
        handle: Arc<ProcessHandle>,
        cancel: CancellationToken,
    ) -> Self {
        Self { table, supervisor, handle, cancel }
    }
}

#[async_trait]
impl Probe for EchoProbe {
    fn name(&self) -> &'static str {
        "responsiveness"
    }

    async fn check(&self) -> Result<ProbeOutcome, ProbeFailure> {
        let (marker, rx) = self.table.register();
        let line = format!("{{\"type\":\"ping\",\"marker\":{marker}}}\n");
        self.supervisor.send(&self.handle, line.as_bytes(), &self.cancel).await.map_err(|e| {
            ProbeFailure { process_alive: false, message: format!("ping write failed: {e}") }
        })?;
        // The health checker bounds this await with probe_timeout.
        rx.await.map_err(|_| ProbeFailure {
            process_alive: true,
            message: "echo listener gone".to_string(),
        })?;
        Ok(ProbeOutcome::default())
    }
}

#[cfg(test)]
#[path = "echo_tests.rs"]
mod tests;
