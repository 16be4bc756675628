// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! herd-supervisor: agent subprocess lifecycle.
//!
//! Spawns one agent process per session with piped stdio, writes prompts
//! to stdin, and is the sole agent of process termination. It never reads
//! stdout/stderr — that is the stream pump's job.

pub mod env;
pub mod limits;
pub mod probes;
pub mod process;
pub mod spec;

pub use env::{CREDENTIAL_ENV_FALLBACK, CREDENTIAL_ENV_PRIMARY};
pub use probes::{LivenessProbe, ResourceProbe};
pub use process::{ExitInfo, ProcessHandle, Supervisor, SupervisorConfig};
pub use spec::SpawnSpec;
