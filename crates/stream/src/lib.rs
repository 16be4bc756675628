// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! herd-stream: from agent bytes to delivered messages.
//!
//! The pipeline per session: stream parser (bytes → typed messages) →
//! backpressure buffer (bounded, drop policy) → message router (priority
//! dispatch to handlers) → stream bridge (per-consumer delivery).

pub mod bridge;
pub mod buffer;
pub mod handlers;
pub mod parser;
pub mod pump;
pub mod router;

pub use bridge::{BridgeConfig, BridgeConsumer, StreamBridge};
pub use buffer::{BackpressureBuffer, BufferConfig, BufferEvent, BufferMetrics, OfferOutcome};
pub use handlers::{
    CompletionFinalizer, CompletionSignal, ErrorCounter, ProgressForwarder, ProgressUpdate,
    SystemMetadataMerger, TextLogger, ToolUseRecorder,
};
pub use parser::{ParserConfig, StreamEnd, StreamParser};
pub use pump::Pump;
pub use router::{Handler, HandlerCtx, HandlerError, Router, RouterMode};
