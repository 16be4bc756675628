// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded FIFO between the stream parser and the message router.
//!
//! Sized by message count and by total payload bytes. The producer never
//! blocks the parser thread except under the `Block` policy, and then
//! only up to `max_block_time`. Capacity adapts to sustained pressure:
//! a rolling fill-ratio streak doubles or halves the count capacity
//! between a floor and a ceiling.

use herd_core::{DropPolicy, Message, OrchestratorError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

/// Buffer tunables.
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Initial count capacity.
    pub capacity: usize,
    /// Total payload byte bound.
    pub max_bytes: usize,
    pub policy: DropPolicy,
    /// Longest a `Block` offer may wait before `BackpressureTimeout`.
    pub max_block_time: Duration,
    /// Count-capacity floor for adaptive shrinking.
    pub min_capacity: usize,
    /// Count-capacity ceiling for adaptive growth.
    pub max_capacity: usize,
    /// Consecutive samples beyond a fill threshold that trigger a resize.
    pub resize_window: u32,
    /// Head residence time that flags a slow consumer.
    pub slow_consumer_threshold: Duration,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            max_bytes: 4 * 1024 * 1024,
            policy: DropPolicy::Block,
            max_block_time: Duration::from_secs(5),
            min_capacity: 16,
            max_capacity: 4096,
            resize_window: 8,
            slow_consumer_threshold: Duration::from_secs(2),
        }
    }
}

impl BufferConfig {
    /// Derive a config from session options, keeping adaptive bounds
    /// proportional to the configured capacity.
    pub fn for_session(capacity: usize, max_bytes: usize, policy: DropPolicy) -> Self {
        Self {
            capacity,
            max_bytes,
            policy,
            min_capacity: (capacity / 4).max(1),
            max_capacity: capacity.saturating_mul(16).max(capacity),
            ..Default::default()
        }
    }
}

/// What happened to an offered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    Accepted,
    /// Accepted after evicting this many queued messages (DropOldest).
    AcceptedDroppingOldest(usize),
    /// Rejected; the offered message itself was dropped (DropNewest).
    DroppedNewest,
}

/// Internal buffer happenings surfaced to the event bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferEvent {
    Resized { from: usize, to: usize },
    SlowConsumer { residency: Duration },
}

/// Monotonic buffer counters.
#[derive(Debug, Default)]
pub struct BufferMetrics {
    pub offered: AtomicU64,
    pub accepted: AtomicU64,
    pub dropped: AtomicU64,
    pub resizes: AtomicU64,
    pub block_timeouts: AtomicU64,
}

struct Entry {
    msg: Message,
    enqueued_at: Instant,
}

struct Inner {
    queue: VecDeque<Entry>,
    bytes: usize,
    capacity: usize,
    high_streak: u32,
    low_streak: u32,
    closed: bool,
    slow_raised: bool,
}

/// The bounded parser→router queue.
pub struct BackpressureBuffer {
    config: BufferConfig,
    inner: Mutex<Inner>,
    not_empty: Notify,
    not_full: Notify,
    metrics: Arc<BufferMetrics>,
    events: Mutex<Option<mpsc::UnboundedSender<BufferEvent>>>,
}

impl BackpressureBuffer {
    pub fn new(config: BufferConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(capacity),
                bytes: 0,
                capacity,
                high_streak: 0,
                low_streak: 0,
                closed: false,
                slow_raised: false,
            }),
            config,
            not_empty: Notify::new(),
            not_full: Notify::new(),
            metrics: Arc::new(BufferMetrics::default()),
            events: Mutex::new(None),
        }
    }

    pub fn metrics(&self) -> Arc<BufferMetrics> {
        self.metrics.clone()
    }

    /// Total messages dropped under either drop policy.
    pub fn dropped(&self) -> u64 {
        self.metrics.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    /// Current adaptive count capacity.
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Attach the internal-event sink (resizes, slow-consumer flags).
    /// The session lifecycle loop consumes it and degrades the bridge.
    pub fn set_event_sink(&self, tx: mpsc::UnboundedSender<BufferEvent>) {
        *self.events.lock() = Some(tx);
    }

    /// Close the buffer: pollers drain what is queued, then see `None`;
    /// further offers fail `Cancelled`.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();
    }

    /// Offer one message under the configured drop policy.
    pub async fn offer(
        &self,
        msg: Message,
        cancel: &CancellationToken,
    ) -> Result<OfferOutcome, OrchestratorError> {
        self.metrics.offered.fetch_add(1, Ordering::Relaxed);
        let size = msg.raw_len;

        match self.config.policy {
            DropPolicy::Block => self.offer_blocking(msg, size, cancel).await,
            DropPolicy::DropOldest => {
                let outcome = self.offer_drop_oldest(msg, size);
                Ok(outcome)
            }
            DropPolicy::DropNewest => {
                let outcome = self.offer_drop_newest(msg, size);
                Ok(outcome)
            }
        }
    }

    /// Poll the next message; `None` once closed and drained.
    pub async fn poll(&self, cancel: &CancellationToken) -> Result<Option<Message>, OrchestratorError> {
        loop {
            let notified = self.not_empty.notified();
            {
                let mut inner = self.inner.lock();
                if let Some(entry) = inner.queue.pop_front() {
                    inner.bytes = inner.bytes.saturating_sub(entry.msg.raw_len);
                    drop(inner);
                    self.not_full.notify_waiters();
                    return Ok(Some(entry.msg));
                }
                if inner.closed {
                    return Ok(None);
                }
            }
            tokio::select! {
                _ = notified => {}
                _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
            }
        }
    }

    fn fits(inner: &Inner, max_bytes: usize, size: usize) -> bool {
        if inner.queue.is_empty() {
            // An oversize single message must still pass through.
            return true;
        }
        inner.queue.len() < inner.capacity && inner.bytes + size <= max_bytes
    }

    fn push(&self, inner: &mut Inner, msg: Message, size: usize) {
        inner.queue.push_back(Entry { msg, enqueued_at: Instant::now() });
        inner.bytes += size;
        self.metrics.accepted.fetch_add(1, Ordering::Relaxed);
        self.sample_fill(inner);
        self.check_slow_consumer(inner);
    }

    async fn offer_blocking(
        &self,
        msg: Message,
        size: usize,
        cancel: &CancellationToken,
    ) -> Result<OfferOutcome, OrchestratorError> {
        let deadline = Instant::now() + self.config.max_block_time;
        loop {
            let notified = self.not_full.notified();
            {
                let mut inner = self.inner.lock();
                if inner.closed {
                    return Err(OrchestratorError::Cancelled);
                }
                if Self::fits(&inner, self.config.max_bytes, size) {
                    self.push(&mut inner, msg, size);
                    drop(inner);
                    self.not_empty.notify_one();
                    return Ok(OfferOutcome::Accepted);
                }
                self.check_slow_consumer(&mut inner);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.metrics.block_timeouts.fetch_add(1, Ordering::Relaxed);
                return Err(OrchestratorError::BackpressureTimeout(self.config.max_block_time));
            }
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep(remaining) => {
                    self.metrics.block_timeouts.fetch_add(1, Ordering::Relaxed);
                    return Err(OrchestratorError::BackpressureTimeout(self.config.max_block_time));
                }
                _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
            }
        }
    }

    fn offer_drop_oldest(&self, msg: Message, size: usize) -> OfferOutcome {
        let mut inner = self.inner.lock();
        if inner.closed {
            self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
            return OfferOutcome::DroppedNewest;
        }
        let mut evicted = 0usize;
        while !Self::fits(&inner, self.config.max_bytes, size) {
            match inner.queue.pop_front() {
                Some(entry) => {
                    inner.bytes = inner.bytes.saturating_sub(entry.msg.raw_len);
                    evicted += 1;
                }
                None => break,
            }
        }
        if evicted > 0 {
            self.metrics.dropped.fetch_add(evicted as u64, Ordering::Relaxed);
        }
        self.push(&mut inner, msg, size);
        drop(inner);
        self.not_empty.notify_one();
        if evicted > 0 {
            OfferOutcome::AcceptedDroppingOldest(evicted)
        } else {
            OfferOutcome::Accepted
        }
    }

    fn offer_drop_newest(&self, msg: Message, size: usize) -> OfferOutcome {
        let mut inner = self.inner.lock();
        if inner.closed || !Self::fits(&inner, self.config.max_bytes, size) {
            self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
            self.check_slow_consumer(&mut inner);
            return OfferOutcome::DroppedNewest;
        }
        self.push(&mut inner, msg, size);
        drop(inner);
        self.not_empty.notify_one();
        OfferOutcome::Accepted
    }

    /// Track fill-ratio streaks and adapt capacity.
    fn sample_fill(&self, inner: &mut Inner) {
        let fill = inner.queue.len() as f64 / inner.capacity as f64;
        if fill >= 0.8 {
            inner.high_streak += 1;
            inner.low_streak = 0;
        } else if fill <= 0.2 {
            inner.low_streak += 1;
            inner.high_streak = 0;
        } else {
            inner.high_streak = 0;
            inner.low_streak = 0;
        }

        if inner.high_streak >= self.config.resize_window {
            let to = (inner.capacity * 2).min(self.config.max_capacity);
            if to > inner.capacity {
                self.resize(inner, to);
            }
            inner.high_streak = 0;
        } else if inner.low_streak >= self.config.resize_window {
            let to = (inner.capacity / 2).max(self.config.min_capacity);
            if to < inner.capacity {
                self.resize(inner, to);
            }
            inner.low_streak = 0;
        }
    }

    fn resize(&self, inner: &mut Inner, to: usize) {
        let from = inner.capacity;
        inner.capacity = to;
        self.metrics.resizes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(from, to, "buffer capacity adjusted");
        if let Some(tx) = self.events.lock().as_ref() {
            let _ = tx.send(BufferEvent::Resized { from, to });
        }
    }

    /// Flag a slow consumer (latched: at most once per buffer) when the
    /// head message has been waiting past the threshold.
    fn check_slow_consumer(&self, inner: &mut Inner) {
        if inner.slow_raised {
            return;
        }
        let Some(head) = inner.queue.front() else { return };
        let residency = head.enqueued_at.elapsed();
        if residency < self.config.slow_consumer_threshold {
            return;
        }
        inner.slow_raised = true;
        tracing::warn!(residency_ms = residency.as_millis() as u64, "slow consumer detected");
        if let Some(tx) = self.events.lock().as_ref() {
            let _ = tx.send(BufferEvent::SlowConsumer { residency });
        }
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
