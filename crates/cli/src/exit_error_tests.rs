// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[yare::parameterized(
    config    = { OrchestratorError::ConfigInvalid("bad".into()), EXIT_USAGE },
    capacity  = { OrchestratorError::CapacityExhausted { workspace: "W1".into() }, EXIT_CAPACITY },
    cancelled = { OrchestratorError::Cancelled, EXIT_CANCELLED },
    timed_out = { OrchestratorError::TimedOut(Duration::from_secs(1)), EXIT_TIMEOUT },
    backpressure = { OrchestratorError::BackpressureTimeout(Duration::from_secs(1)), EXIT_TIMEOUT },
    spawn     = { OrchestratorError::SpawnFailed("enoent".into()), EXIT_AGENT },
    exited    = { OrchestratorError::AgentExited { exit_code: Some(9) }, EXIT_AGENT },
    circuit   = { OrchestratorError::CircuitOpen { key: "W1".into() }, EXIT_AGENT },
    not_found = { OrchestratorError::NotFound("x".into()), EXIT_SESSION },
    internal  = { OrchestratorError::Internal("bug".into()), EXIT_SESSION },
)]
fn exit_codes(err: OrchestratorError, expected: i32) {
    let exit: ExitError = err.into();
    assert_eq!(exit.code, expected);
}

#[test]
fn message_is_redacted() {
    let err = OrchestratorError::SpawnFailed("AGENT_TOKEN=sk-123 bad".into());
    let exit: ExitError = err.into();
    assert!(!exit.message.contains("sk-123"));
}
