// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adaptive retrier around fallible async operations.

use crate::backoff::Backoff;
use herd_core::{OrchestratorError, RandomSource};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Final outcome of a retried operation.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, OrchestratorError>,
    /// How many invocations were made (1 = no retries needed).
    pub attempts: u32,
}

/// Retries an operation on classifier-retryable errors, sleeping the
/// backoff schedule between attempts.
///
/// Non-retryable errors short-circuit; cancellation aborts the sleep and
/// returns `Cancelled`.
#[derive(Clone)]
pub struct Retrier {
    backoff: Backoff,
    max_attempts: u32,
    classify: fn(&OrchestratorError) -> bool,
}

impl Retrier {
    pub fn new(backoff: Backoff, max_attempts: u32) -> Self {
        Self { backoff, max_attempts: max_attempts.max(1), classify: OrchestratorError::is_retryable }
    }

    /// Override the retryable-error classifier.
    pub fn with_classifier(mut self, classify: fn(&OrchestratorError) -> bool) -> Self {
        self.classify = classify;
        self
    }

    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        rng: &dyn RandomSource,
        mut op: F,
    ) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, OrchestratorError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return RetryOutcome { result: Err(OrchestratorError::Cancelled), attempts: attempt };
            }

            match op(attempt).await {
                Ok(value) => return RetryOutcome { result: Ok(value), attempts: attempt },
                Err(err) if attempt < self.max_attempts && (self.classify)(&err) => {
                    let delay = self.backoff.next(attempt, rng);
                    tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => {
                            return RetryOutcome {
                                result: Err(OrchestratorError::Cancelled),
                                attempts: attempt,
                            };
                        }
                    }
                }
                Err(err) => return RetryOutcome { result: Err(err), attempts: attempt },
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
