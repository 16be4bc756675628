// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream bridge: per-consumer delivery of routed messages.
//!
//! One consumer per execution, holding its own bounded queue separate
//! from the backpressure buffer. A consumer that stops reading (send
//! timeout), stops pinging, or goes away is disconnected; the execution
//! is then marked resumable for a reconnecting client.

use crate::router::{Handler, HandlerCtx, HandlerError};
use async_trait::async_trait;
use herd_core::{Message, MessageKind};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Bridge tunables.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub queue_capacity: usize,
    pub send_timeout: Duration,
    pub ping_interval: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            send_timeout: Duration::from_secs(5),
            ping_interval: Duration::from_secs(30),
        }
    }
}

/// Why a consumer was disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The consumer queue stayed full past `send_timeout`.
    SendTimeout,
    /// Two consecutive pings were missed.
    PingTimeout,
    /// The consumer dropped its receiver.
    ConsumerGone,
}

struct BridgeShared {
    degraded: AtomicBool,
    last_ping_at: Mutex<Instant>,
    disconnect: watch::Sender<Option<DisconnectReason>>,
}

impl BridgeShared {
    fn close(&self, reason: DisconnectReason) {
        self.disconnect.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }

    fn is_closed(&self) -> bool {
        self.disconnect.borrow().is_some()
    }
}

/// Producer half: a router handler forwarding messages to one consumer.
pub struct StreamBridge {
    config: BridgeConfig,
    tx: mpsc::Sender<Message>,
    shared: Arc<BridgeShared>,
}

/// Consumer half: the lazy message sequence handed to the caller.
pub struct BridgeConsumer {
    rx: mpsc::Receiver<Message>,
    shared: Arc<BridgeShared>,
}

impl StreamBridge {
    pub fn new(config: BridgeConfig) -> (Self, BridgeConsumer) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (disconnect, _) = watch::channel(None);
        let shared = Arc::new(BridgeShared {
            degraded: AtomicBool::new(false),
            last_ping_at: Mutex::new(Instant::now()),
            disconnect,
        });
        (
            Self { config, tx, shared: shared.clone() },
            BridgeConsumer { rx, shared },
        )
    }

    /// Degrade delivery: shed droppable kinds instead of blocking.
    /// Wired to the buffer's slow-consumer signal.
    pub fn degrade(&self) {
        if !self.shared.degraded.swap(true, Ordering::Relaxed) {
            tracing::warn!("bridge degraded, shedding low-priority messages");
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.shared.degraded.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Reason the consumer was disconnected, observable by the tracker
    /// to mark the execution resumable.
    pub fn disconnect_rx(&self) -> watch::Receiver<Option<DisconnectReason>> {
        self.shared.disconnect.subscribe()
    }

    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        *self.shared.disconnect.borrow()
    }

    /// Watch consumer pings; two missed intervals close the consumer.
    /// Spawn only when the consumer contract includes pings.
    pub async fn run_ping_watchdog(&self, cancel: CancellationToken) {
        let interval = self.config.ping_interval;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancel.cancelled() => return,
            }
            if self.shared.is_closed() {
                return;
            }
            let last = *self.shared.last_ping_at.lock();
            if last.elapsed() > interval * 2 {
                tracing::warn!("consumer missed two pings, disconnecting");
                self.shared.close(DisconnectReason::PingTimeout);
                return;
            }
        }
    }
}

#[async_trait]
impl Handler for StreamBridge {
    fn name(&self) -> &'static str {
        "stream-bridge"
    }

    fn priority(&self) -> i32 {
        50
    }

    async fn handle(&self, ctx: &HandlerCtx, msg: &Message) -> Result<(), HandlerError> {
        if self.shared.is_closed() || ctx.cancel.is_cancelled() {
            return Ok(());
        }
        if self.is_degraded() && msg.kind.is_droppable() {
            return Ok(());
        }

        // The session token must be able to interrupt a send stuck on a
        // full consumer queue; shutdown does not wait out send_timeout.
        let sent = tokio::select! {
            sent = self.tx.send_timeout(msg.clone(), self.config.send_timeout) => sent,
            _ = ctx.cancel.cancelled() => return Ok(()),
        };
        match sent {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendTimeoutError::Timeout(_)) => {
                tracing::warn!(seq = msg.sequence_no, "consumer send timed out, disconnecting");
                self.shared.close(DisconnectReason::SendTimeout);
                Ok(())
            }
            Err(mpsc::error::SendTimeoutError::Closed(_)) => {
                self.shared.close(DisconnectReason::ConsumerGone);
                Ok(())
            }
        }
    }
}

impl BridgeConsumer {
    /// Next message; `None` once the stream ended or was disconnected.
    pub async fn next(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Record a consumer liveness ping.
    pub fn ping(&self) {
        *self.shared.last_ping_at.lock() = Instant::now();
    }

    /// Whether (and why) this consumer was disconnected by the bridge.
    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        *self.shared.disconnect.borrow()
    }

    /// Drain until a terminal message (`complete` or fatal `error`),
    /// returning everything received in order.
    pub async fn collect_to_end(&mut self) -> Vec<Message> {
        let mut out = Vec::new();
        while let Some(msg) = self.next().await {
            let terminal = msg.kind == MessageKind::Complete || msg.is_fatal_error();
            out.push(msg);
            if terminal {
                break;
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
