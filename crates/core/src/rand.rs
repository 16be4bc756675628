// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Random source abstraction for testable jitter.
//!
//! The only consumer is backoff jitter, so the interface is a single
//! uniform draw. [`FakeRandom`] replays scripted values for tests.

use parking_lot::Mutex;
use std::sync::Arc;

/// A source of uniform random values in `[0, 1)`.
pub trait RandomSource: Send + Sync {
    fn next_f64(&self) -> f64;
}

/// Real random source backed by the OS entropy pool.
#[derive(Clone, Default)]
pub struct SystemRandom;

impl RandomSource for SystemRandom {
    fn next_f64(&self) -> f64 {
        // Take 52 bits of a v4 uuid; enough uniformity for jitter.
        let bytes = uuid::Uuid::new_v4().into_bytes();
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[..8]);
        let bits = u64::from_le_bytes(raw) >> 12;
        bits as f64 / (1u64 << 52) as f64
    }
}

/// Fake random source replaying scripted values, cycling when exhausted.
#[derive(Clone)]
pub struct FakeRandom {
    values: Arc<Mutex<(Vec<f64>, usize)>>,
}

impl FakeRandom {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values: Arc::new(Mutex::new((values, 0))) }
    }

    /// A fake that always returns `v`.
    pub fn constant(v: f64) -> Self {
        Self::new(vec![v])
    }
}

impl RandomSource for FakeRandom {
    fn next_f64(&self) -> f64 {
        let mut guard = self.values.lock();
        let (values, cursor) = &mut *guard;
        if values.is_empty() {
            return 0.0;
        }
        let v = values[*cursor % values.len()];
        *cursor += 1;
        v
    }
}

#[cfg(test)]
#[path = "rand_tests.rs"]
mod tests;
