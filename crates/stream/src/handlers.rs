// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Default router handlers installed on session startup.
//!
//! Each handler owns the state it needs at construction; the engine wires
//! the channels into the session lifecycle loop.

use crate::router::{Handler, HandlerCtx, HandlerError};
use async_trait::async_trait;
use herd_core::{Message, MessageKind};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Logs text output at debug level.
#[derive(Default)]
pub struct TextLogger;

#[async_trait]
impl Handler for TextLogger {
    fn name(&self) -> &'static str {
        "text-logger"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn wants(&self, kind: MessageKind) -> bool {
        kind == MessageKind::Text
    }

    async fn handle(&self, ctx: &HandlerCtx, msg: &Message) -> Result<(), HandlerError> {
        let content = msg.payload.get("content").and_then(Value::as_str).unwrap_or("");
        tracing::debug!(
            session_id = %ctx.session_id,
            seq = msg.sequence_no,
            len = content.len(),
            "agent text"
        );
        Ok(())
    }
}

/// Records the tools the agent invoked.
pub struct ToolUseRecorder {
    invocations: Arc<Mutex<Vec<String>>>,
}

impl ToolUseRecorder {
    pub fn new() -> Self {
        Self { invocations: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn invocations(&self) -> Arc<Mutex<Vec<String>>> {
        self.invocations.clone()
    }
}

impl Default for ToolUseRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for ToolUseRecorder {
    fn name(&self) -> &'static str {
        "tool-use-recorder"
    }

    fn priority(&self) -> i32 {
        60
    }

    fn wants(&self, kind: MessageKind) -> bool {
        kind == MessageKind::ToolUse
    }

    async fn handle(&self, ctx: &HandlerCtx, msg: &Message) -> Result<(), HandlerError> {
        let tool = msg.payload.get("name").and_then(Value::as_str).unwrap_or("unknown");
        tracing::debug!(session_id = %ctx.session_id, tool, "tool use");
        self.invocations.lock().push(tool.to_string());
        Ok(())
    }
}

/// Counts `error` messages and raises a burst signal when the rate within
/// the rolling window crosses the threshold.
pub struct ErrorCounter {
    total: Arc<AtomicU64>,
    window: Duration,
    threshold: u32,
    recent: Mutex<VecDeque<Instant>>,
    burst_tx: mpsc::UnboundedSender<u32>,
}

impl ErrorCounter {
    pub fn new(window: Duration, threshold: u32, burst_tx: mpsc::UnboundedSender<u32>) -> Self {
        Self {
            total: Arc::new(AtomicU64::new(0)),
            window,
            threshold: threshold.max(1),
            recent: Mutex::new(VecDeque::new()),
            burst_tx,
        }
    }

    /// Total `error` messages observed; mirrored into session stats.
    pub fn total(&self) -> Arc<AtomicU64> {
        self.total.clone()
    }
}

#[async_trait]
impl Handler for ErrorCounter {
    fn name(&self) -> &'static str {
        "error-counter"
    }

    fn priority(&self) -> i32 {
        90
    }

    fn wants(&self, kind: MessageKind) -> bool {
        kind == MessageKind::Error
    }

    async fn handle(&self, ctx: &HandlerCtx, _msg: &Message) -> Result<(), HandlerError> {
        self.total.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let count = {
            let mut recent = self.recent.lock();
            recent.push_back(now);
            while let Some(front) = recent.front() {
                if now.duration_since(*front) > self.window {
                    recent.pop_front();
                } else {
                    break;
                }
            }
            recent.len() as u32
        };
        if count == self.threshold {
            tracing::warn!(session_id = %ctx.session_id, count, "error burst");
            let _ = self.burst_tx.send(count);
        }
        Ok(())
    }
}

/// Merges scalar fields from `system` and `metadata` messages into the
/// session metadata map.
pub struct SystemMetadataMerger {
    merged: Arc<Mutex<std::collections::HashMap<String, String>>>,
}

impl SystemMetadataMerger {
    pub fn new() -> Self {
        Self { merged: Arc::new(Mutex::new(std::collections::HashMap::new())) }
    }

    pub fn merged(&self) -> Arc<Mutex<std::collections::HashMap<String, String>>> {
        self.merged.clone()
    }
}

impl Default for SystemMetadataMerger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for SystemMetadataMerger {
    fn name(&self) -> &'static str {
        "system-metadata-merger"
    }

    fn priority(&self) -> i32 {
        55
    }

    fn wants(&self, kind: MessageKind) -> bool {
        matches!(kind, MessageKind::System | MessageKind::Metadata)
    }

    async fn handle(&self, _ctx: &HandlerCtx, msg: &Message) -> Result<(), HandlerError> {
        let Some(object) = msg.payload.as_object() else {
            return Ok(());
        };
        let mut merged = self.merged.lock();
        for (key, value) in object {
            if key == "type" {
                continue;
            }
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            merged.insert(key.clone(), rendered);
        }
        Ok(())
    }
}

/// Throttled progress snapshot forwarded to interested subscribers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    pub progress: f64,
    pub sequence_no: u64,
}

/// Forwards `progress` messages at most once per `min_interval`.
pub struct ProgressForwarder {
    min_interval: Duration,
    last_sent: Mutex<Option<Instant>>,
    tx: mpsc::UnboundedSender<ProgressUpdate>,
}

impl ProgressForwarder {
    pub fn new(min_interval: Duration, tx: mpsc::UnboundedSender<ProgressUpdate>) -> Self {
        Self { min_interval, last_sent: Mutex::new(None), tx }
    }
}

#[async_trait]
impl Handler for ProgressForwarder {
    fn name(&self) -> &'static str {
        "progress-forwarder"
    }

    fn priority(&self) -> i32 {
        40
    }

    fn wants(&self, kind: MessageKind) -> bool {
        kind == MessageKind::Progress
    }

    async fn handle(&self, _ctx: &HandlerCtx, msg: &Message) -> Result<(), HandlerError> {
        let Some(progress) = msg.progress() else {
            return Ok(());
        };
        let now = Instant::now();
        {
            let mut last = self.last_sent.lock();
            if let Some(prev) = *last {
                if now.duration_since(prev) < self.min_interval {
                    return Ok(());
                }
            }
            *last = Some(now);
        }
        let _ = self.tx.send(ProgressUpdate { progress, sequence_no: msg.sequence_no });
        Ok(())
    }
}

/// Terminal outcome of a message stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionSignal {
    Completed { sequence_no: u64 },
    Failed { reason: String, exit_code: Option<i32>, sequence_no: u64 },
}

/// Watches for the stream's terminal message and signals the session
/// lifecycle loop. Runs at the lowest priority so every other handler
/// (including the bridge) sees the terminal message first.
pub struct CompletionFinalizer {
    tx: mpsc::UnboundedSender<CompletionSignal>,
}

impl CompletionFinalizer {
    pub fn new(tx: mpsc::UnboundedSender<CompletionSignal>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Handler for CompletionFinalizer {
    fn name(&self) -> &'static str {
        "completion-finalizer"
    }

    fn priority(&self) -> i32 {
        -10
    }

    fn wants(&self, kind: MessageKind) -> bool {
        matches!(kind, MessageKind::Complete | MessageKind::Error)
    }

    async fn handle(&self, ctx: &HandlerCtx, msg: &Message) -> Result<(), HandlerError> {
        let signal = match msg.kind {
            MessageKind::Complete => CompletionSignal::Completed { sequence_no: msg.sequence_no },
            MessageKind::Error if msg.is_fatal_error() => CompletionSignal::Failed {
                reason: msg
                    .payload
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or("agent error")
                    .to_string(),
                exit_code: msg.payload.get("code").and_then(Value::as_i64).map(|c| c as i32),
                sequence_no: msg.sequence_no,
            },
            _ => return Ok(()),
        };
        tracing::debug!(session_id = %ctx.session_id, ?signal, "stream finished");
        let _ = self.tx.send(signal);
        Ok(())
    }
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
