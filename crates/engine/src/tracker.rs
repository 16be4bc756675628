// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution tracker: a router handler folding the message stream into
//! the execution record.

use async_trait::async_trait;
use herd_core::{Execution, Message};
use herd_stream::{Handler, HandlerCtx, HandlerError};
use parking_lot::Mutex;
use std::sync::Arc;

/// Attached to the session router for the lifetime of one execution.
pub struct ExecutionTracker {
    exec: Arc<Mutex<Execution>>,
}

impl ExecutionTracker {
    pub fn new(exec: Arc<Mutex<Execution>>) -> Self {
        Self { exec }
    }
}

#[async_trait]
impl Handler for ExecutionTracker {
    fn name(&self) -> &'static str {
        "execution-tracker"
    }

    fn priority(&self) -> i32 {
        70
    }

    async fn handle(&self, _ctx: &HandlerCtx, msg: &Message) -> Result<(), HandlerError> {
        self.exec.lock().observe(msg, msg.received_at_ms);
        Ok(())
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
