// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime state of one live session.
//!
//! The pure [`Session`] record lives behind a mutex that doubles as the
//! per-session serialization point for state transitions. Everything
//! else here is pipeline plumbing: process handle, buffer, router, the
//! current execution slot, and the shared counters the default handlers
//! feed.

use herd_core::{Execution, ExecutionId, ReuseKey, Session, SessionState};
use herd_reliability::HealthChecker;
use herd_stream::handlers::CompletionSignal;
use herd_stream::{BackpressureBuffer, Pump, Router, StreamBridge};
use herd_supervisor::ProcessHandle;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The in-flight execution slot; a session serves at most one at a time.
pub(crate) struct CurrentExecution {
    pub id: ExecutionId,
    pub record: Arc<Mutex<Execution>>,
    pub cancel: CancellationToken,
}

pub(crate) struct LiveSession {
    pub record: Mutex<Session>,
    pub reuse_key: ReuseKey,
    pub handle: Mutex<Option<Arc<ProcessHandle>>>,
    pub buffer: Arc<BackpressureBuffer>,
    pub router: Router,
    pub pump: Arc<Pump>,
    /// Cancels the whole pipeline (pumps, router, health, monitors).
    pub cancel: CancellationToken,
    pub current_exec: Mutex<Option<CurrentExecution>>,
    pub current_bridge: Mutex<Option<Arc<StreamBridge>>>,
    /// Stream-terminal signals from the completion finalizer; consumed
    /// by the execution monitor.
    pub completion_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<CompletionSignal>>,
    pub health: Arc<HealthChecker>,
    /// Total error messages, fed by the error counter handler.
    pub error_total: Arc<AtomicU64>,
    /// Scalar metadata merged from system/metadata messages.
    pub metadata: Arc<Mutex<HashMap<String, String>>>,
    /// Tool names the agent invoked.
    pub tools: Arc<Mutex<Vec<String>>>,
}

impl LiveSession {
    pub fn state(&self) -> SessionState {
        self.record.lock().state
    }

    /// Fold handler- and buffer-side counters into the session record.
    pub fn sync_stats(&self) {
        let errors = self.error_total.load(Ordering::Relaxed);
        let bytes = self.pump.bytes_read();
        let metrics = self.buffer.metrics();
        let emitted = metrics.accepted.load(Ordering::Relaxed);
        let dropped = metrics.dropped.load(Ordering::Relaxed);
        let merged = self.metadata.lock().clone();
        let tools = self.tools.lock().clone();
        let mut record = self.record.lock();
        if errors > record.stats.error_count {
            record.stats.error_count = errors;
        }
        if bytes > record.stats.bytes_out {
            record.stats.bytes_out = bytes;
        }
        if emitted > record.stats.messages_emitted {
            record.stats.messages_emitted = emitted;
        }
        if dropped > record.stats.messages_dropped {
            record.stats.messages_dropped = dropped;
        }
        record.metadata.extend(merged);
        if !tools.is_empty() {
            record.metadata.insert("tools_used".to_string(), tools.join(","));
        }
    }

    /// Current execution id, if one is in flight.
    pub fn current_execution_id(&self) -> Option<ExecutionId> {
        self.current_exec.lock().as_ref().map(|cur| cur.id)
    }
}
