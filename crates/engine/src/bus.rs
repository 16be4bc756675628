// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session event bus.
//!
//! Single-writer (the session manager), multi-reader. Every subscriber
//! holds a bounded queue; a subscriber whose queue is full is
//! disconnected rather than allowed to stall publishing.

use herd_core::Event;
use parking_lot::Mutex;
use tokio::sync::mpsc;

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<Event>,
}

/// Publish point for lifecycle events.
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: Mutex<u64>,
    queue_limit: usize,
}

impl EventBus {
    pub fn new(queue_limit: usize) -> Self {
        Self { subscribers: Mutex::new(Vec::new()), next_id: Mutex::new(0), queue_limit: queue_limit.max(1) }
    }

    /// Subscribe with a bounded queue of `queue_limit` events.
    pub fn subscribe(&self) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(self.queue_limit);
        let mut next_id = self.next_id.lock();
        let id = *next_id;
        *next_id += 1;
        self.subscribers.lock().push(Subscriber { id, tx });
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Publish to every subscriber in order. Slow subscribers (full
    /// queue) and gone subscribers are disconnected.
    pub fn publish(&self, event: Event) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sub| match sub.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(subscriber = sub.id, "event subscriber too slow, disconnecting");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
