// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backoff policies.
//!
//! `next(attempt)` is pure given the injected random source; the retrier
//! owns the sleeping.

use herd_core::RandomSource;
use std::time::Duration;

/// How successive delays grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    Fixed,
    Linear,
    Exponential,
    ExponentialWithJitter,
}

/// Backoff schedule: policy plus its parameters.
#[derive(Debug, Clone)]
pub struct Backoff {
    pub policy: BackoffPolicy,
    pub base: Duration,
    pub cap: Duration,
    pub multiplier: f64,
    /// Jitter half-width as a fraction of the computed delay, in `[0, 1]`.
    pub jitter_ratio: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            policy: BackoffPolicy::ExponentialWithJitter,
            base: Duration::from_millis(100),
            cap: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_ratio: 0.2,
        }
    }
}

impl Backoff {
    pub fn fixed(base: Duration) -> Self {
        Self { policy: BackoffPolicy::Fixed, base, ..Default::default() }
    }

    pub fn linear(base: Duration, cap: Duration) -> Self {
        Self { policy: BackoffPolicy::Linear, base, cap, ..Default::default() }
    }

    pub fn exponential(base: Duration, cap: Duration) -> Self {
        Self { policy: BackoffPolicy::Exponential, base, cap, ..Default::default() }
    }

    /// Delay before retry number `attempt` (1-based: the delay after the
    /// first failure is `next(1)`).
    pub fn next(&self, attempt: u32, rng: &dyn RandomSource) -> Duration {
        let attempt = attempt.max(1);
        let base_ms = self.base.as_millis() as f64;
        let cap_ms = self.cap.as_millis() as f64;
        let raw_ms = match self.policy {
            BackoffPolicy::Fixed => base_ms,
            BackoffPolicy::Linear => base_ms * attempt as f64,
            BackoffPolicy::Exponential | BackoffPolicy::ExponentialWithJitter => {
                base_ms * self.multiplier.powi(attempt as i32 - 1)
            }
        };
        let capped_ms = raw_ms.min(cap_ms);
        let final_ms = if self.policy == BackoffPolicy::ExponentialWithJitter {
            // Uniform in [d*(1-j), d*(1+j)], re-capped so jitter cannot
            // push past the ceiling.
            let jitter = capped_ms * self.jitter_ratio.clamp(0.0, 1.0);
            let sampled = capped_ms - jitter + 2.0 * jitter * rng.next_f64();
            sampled.min(cap_ms)
        } else {
            capped_ms
        };
        Duration::from_millis(final_ms.round().max(0.0) as u64)
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
