// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream pump: reads the agent's pipes and feeds the pipeline.
//!
//! One pump per live process. Stdout bytes go through the parser; stderr
//! lines are framed as `system` messages sharing the same sequence space.
//! The two pipe tasks run concurrently, so sequence assignment and
//! buffer admission happen under a single async lock held across both
//! steps — a message can never enter the buffer behind a higher-numbered
//! one. When the stdout stream ends the pump emits the terminal message
//! (derived from the process exit) and closes the buffer so the router
//! drains and stops.

use crate::buffer::BackpressureBuffer;
use crate::parser::{StreamEnd, StreamParser};
use herd_core::{Clock, Message};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Pump state shared by the stdout and stderr tasks.
pub struct Pump {
    /// Guards parsing AND the subsequent buffer offers, so the combined
    /// stdout+stderr stream stays totally ordered by sequence number.
    parser: Mutex<StreamParser>,
    buffer: Arc<BackpressureBuffer>,
    cancel: CancellationToken,
    bytes_read: AtomicU64,
}

impl Pump {
    pub fn new(
        parser: StreamParser,
        buffer: Arc<BackpressureBuffer>,
        cancel: CancellationToken,
    ) -> Self {
        Self { parser: Mutex::new(parser), buffer, cancel, bytes_read: AtomicU64::new(0) }
    }

    /// Agent output bytes consumed so far (stdout + stderr).
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Pump stdout until EOF, read error, or cancellation.
    ///
    /// `exit` resolves to `(exit_code, signal)` and is awaited only at
    /// EOF to decide the terminal message.
    pub async fn run_stdout<R, C, F>(&self, mut stdout: R, clock: &C, exit: F)
    where
        R: AsyncRead + Unpin,
        C: Clock,
        F: Future<Output = (Option<i32>, Option<i32>)>,
    {
        let mut chunk = vec![0u8; 8192];
        let end = loop {
            let read = tokio::select! {
                read = stdout.read(&mut chunk) => read,
                _ = self.cancel.cancelled() => return,
            };
            match read {
                Ok(0) => {
                    let (exit_code, signal) = exit.await;
                    break StreamEnd::Eof { exit_code, signal };
                }
                Ok(n) => {
                    self.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
                    let mut parser = self.parser.lock().await;
                    let msgs = parser.feed(&chunk[..n], clock.epoch_ms());
                    // Offer while still holding the parser lock: the
                    // other pipe must not slip its messages in between.
                    let delivered = self.offer_all(msgs).await;
                    drop(parser);
                    if !delivered {
                        return;
                    }
                }
                Err(e) => break StreamEnd::ReadError(e.to_string()),
            }
        };

        {
            let mut parser = self.parser.lock().await;
            let tail = parser.finish(end, clock.epoch_ms());
            self.offer_all(tail).await;
        }
        self.buffer.close();
    }

    /// Pump stderr lines as `system` messages until EOF or cancellation.
    pub async fn run_stderr<R, C>(&self, stderr: R, clock: &C)
    where
        R: AsyncRead + Unpin,
        C: Clock,
    {
        let mut lines = BufReader::new(stderr).lines();
        loop {
            let line = tokio::select! {
                line = lines.next_line() => line,
                _ = self.cancel.cancelled() => return,
            };
            match line {
                Ok(Some(line)) => {
                    self.bytes_read.fetch_add(line.len() as u64 + 1, Ordering::Relaxed);
                    let mut parser = self.parser.lock().await;
                    let msg = parser.frame_stderr_line(&line, clock.epoch_ms());
                    let delivered = self.offer_all(vec![msg]).await;
                    drop(parser);
                    if !delivered {
                        return;
                    }
                }
                Ok(None) => return,
                Err(e) => {
                    tracing::debug!(error = %e, "stderr read failed");
                    return;
                }
            }
        }
    }

    /// Offer messages in order; false means the pump must stop (buffer
    /// closed, cancelled, or a blocking offer timed out).
    async fn offer_all(&self, msgs: Vec<Message>) -> bool {
        for msg in msgs {
            if let Err(e) = self.buffer.offer(msg, &self.cancel).await {
                tracing::warn!(error = %e, "buffer offer failed, stopping pump");
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
#[path = "pump_tests.rs"]
mod tests;
