// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message router: priority dispatch to registered handlers.
//!
//! The handler table is copy-on-write: registration rebuilds a sorted
//! `Arc<Vec<..>>` snapshot, dispatch clones the `Arc` and iterates with
//! no lock held. Two modes: `Sequential` finishes every handler for a
//! message before the next message; `FanOut` runs handlers on a bounded
//! worker pool and messages may overlap.

use async_trait::async_trait;
use herd_core::{Message, MessageKind, SessionId};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Context handed to every handler invocation.
#[derive(Clone)]
pub struct HandlerCtx {
    pub session_id: SessionId,
    pub cancel: CancellationToken,
}

/// Handler failure modes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HandlerError {
    /// Logged and counted; sibling handlers are unaffected.
    #[error("{0}")]
    Failed(String),
    /// The handler is de-registered and never invoked again.
    #[error("fatal: {0}")]
    Fatal(String),
}

/// A message consumer registered with the router.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Stable name; de-registration is by name.
    fn name(&self) -> &'static str;

    /// Higher priority runs first. Default 0.
    fn priority(&self) -> i32 {
        0
    }

    /// Which kinds this handler wants. Default: everything.
    fn wants(&self, _kind: MessageKind) -> bool {
        true
    }

    async fn handle(&self, ctx: &HandlerCtx, msg: &Message) -> Result<(), HandlerError>;
}

/// Dispatch mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterMode {
    /// Strict per-session ordering: all handlers finish before the next
    /// message is dispatched.
    Sequential,
    /// Bounded worker pool; messages may overlap.
    FanOut { workers: usize },
}

struct RouterCore {
    table: RwLock<Arc<Vec<Arc<dyn Handler>>>>,
    errors: AtomicU64,
}

impl RouterCore {
    fn snapshot(&self) -> Arc<Vec<Arc<dyn Handler>>> {
        self.table.read().clone()
    }

    fn deregister(&self, name: &str) {
        let mut table = self.table.write();
        let next: Vec<Arc<dyn Handler>> =
            table.iter().filter(|h| h.name() != name).cloned().collect();
        *table = Arc::new(next);
    }

    async fn run_one(&self, handler: &Arc<dyn Handler>, ctx: &HandlerCtx, msg: &Message) {
        if let Err(err) = handler.handle(ctx, msg).await {
            self.errors.fetch_add(1, Ordering::Relaxed);
            match err {
                HandlerError::Fatal(reason) => {
                    tracing::error!(
                        handler = handler.name(),
                        session_id = %ctx.session_id,
                        reason,
                        "fatal handler error, de-registering"
                    );
                    self.deregister(handler.name());
                }
                HandlerError::Failed(reason) => {
                    tracing::warn!(
                        handler = handler.name(),
                        session_id = %ctx.session_id,
                        reason,
                        "handler error"
                    );
                }
            }
        }
    }
}

/// The router itself; cheap to clone.
#[derive(Clone)]
pub struct Router {
    core: Arc<RouterCore>,
    mode: RouterMode,
    pool: Arc<Semaphore>,
}

impl Router {
    pub fn new(mode: RouterMode) -> Self {
        let workers = match mode {
            RouterMode::Sequential => 1,
            RouterMode::FanOut { workers } => workers.max(1),
        };
        Self {
            core: Arc::new(RouterCore {
                table: RwLock::new(Arc::new(Vec::new())),
                errors: AtomicU64::new(0),
            }),
            mode,
            pool: Arc::new(Semaphore::new(workers)),
        }
    }

    /// Register a handler, keeping the table sorted by priority (higher
    /// first; name breaks ties for deterministic order).
    pub fn register(&self, handler: Arc<dyn Handler>) {
        let mut table = self.core.table.write();
        let mut next: Vec<Arc<dyn Handler>> = table.iter().cloned().collect();
        next.retain(|h| h.name() != handler.name());
        next.push(handler);
        next.sort_by(|a, b| b.priority().cmp(&a.priority()).then(a.name().cmp(b.name())));
        *table = Arc::new(next);
    }

    pub fn deregister(&self, name: &str) {
        self.core.deregister(name);
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.core.snapshot().iter().map(|h| h.name()).collect()
    }

    pub fn error_count(&self) -> u64 {
        self.core.errors.load(Ordering::Relaxed)
    }

    /// Dispatch one message to every interested handler.
    ///
    /// In `Sequential` mode this returns only after all handlers ran; in
    /// `FanOut` mode handlers are spawned onto the worker pool and the
    /// call returns once all of them have been admitted.
    pub async fn dispatch(&self, ctx: &HandlerCtx, msg: &Arc<Message>) {
        let snapshot = self.core.snapshot();
        match self.mode {
            RouterMode::Sequential => {
                for handler in snapshot.iter() {
                    if !handler.wants(msg.kind) {
                        continue;
                    }
                    self.core.run_one(handler, ctx, msg).await;
                }
            }
            RouterMode::FanOut { .. } => {
                for handler in snapshot.iter() {
                    if !handler.wants(msg.kind) {
                        continue;
                    }
                    let permit = match self.pool.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return,
                    };
                    let core = self.core.clone();
                    let handler = handler.clone();
                    let ctx = ctx.clone();
                    let msg = msg.clone();
                    tokio::spawn(async move {
                        core.run_one(&handler, &ctx, &msg).await;
                        drop(permit);
                    });
                }
            }
        }
    }

    /// Drain a buffer into this router until it closes or cancellation.
    pub async fn run(
        &self,
        buffer: &crate::buffer::BackpressureBuffer,
        ctx: &HandlerCtx,
    ) {
        loop {
            match buffer.poll(&ctx.cancel).await {
                Ok(Some(msg)) => {
                    let msg = Arc::new(msg);
                    self.dispatch(ctx, &msg).await;
                }
                Ok(None) => return,
                Err(_) => return,
            }
        }
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
