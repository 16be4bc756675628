// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reaper: closes sessions past their idle or lifetime budget.
//!
//! Lifetime is enforced only at idle boundaries; an `Active` session is
//! never torn down mid-execution and is re-checked on the next tick.

use crate::api::Orchestrator;
use herd_core::{Clock, CloseReason, SessionState};

pub(crate) async fn run<C: Clock + 'static>(orchestrator: Orchestrator<C>) {
    let interval = orchestrator.config.reaper_interval;
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = orchestrator.shutdown.cancelled() => return,
        }

        let now = orchestrator.clock.epoch_ms();
        for live in orchestrator.table.snapshot() {
            let (id, state, idle_ms, age_ms, max_idle_ms, max_lifetime_ms) = {
                let record = live.record.lock();
                (
                    record.id,
                    record.state,
                    now.saturating_sub(record.last_active_at_ms),
                    now.saturating_sub(record.created_at_ms),
                    record.config.max_idle.as_millis() as u64,
                    record.config.max_lifetime.as_millis() as u64,
                )
            };
            // Closed sessions linger briefly for cheap queries, then the
            // table reference is freed; the repository keeps the summary.
            if state == SessionState::Closed {
                if idle_ms > max_idle_ms {
                    orchestrator.table.remove(&id);
                }
                continue;
            }
            // Only idle boundaries are reaped.
            if !matches!(state, SessionState::Idle | SessionState::Ready) {
                continue;
            }

            if idle_ms > max_idle_ms {
                tracing::info!(session_id = %id, idle_ms, "reaping idle session");
                let _ = orchestrator.close_internal(&live, CloseReason::IdleTimeout).await;
            } else if age_ms > max_lifetime_ms {
                tracing::info!(session_id = %id, age_ms, "reaping expired session");
                let _ = orchestrator.close_internal(&live, CloseReason::LifetimeExceeded).await;
            }
        }
    }
}
