// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource limit configuration for agent subprocesses.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits applied to an agent subprocess, best-effort per host.
///
/// `None` means unlimited. A limit the host cannot enforce is recorded as
/// soft-limit-only on the process handle instead of failing the spawn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cpu_cores: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_memory_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_disk_io_bps: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_duration_ms")]
    pub max_wall_time: Option<Duration>,
}

impl ResourceLimits {
    pub fn is_unlimited(&self) -> bool {
        self.max_cpu_cores.is_none()
            && self.max_memory_bytes.is_none()
            && self.max_disk_io_bps.is_none()
            && self.max_wall_time.is_none()
    }

    /// Stable textual form used in the session reuse key.
    pub fn reuse_key_part(&self) -> String {
        format!(
            "cpu={:?};mem={:?};io={:?};wall={:?}",
            self.max_cpu_cores,
            self.max_memory_bytes,
            self.max_disk_io_bps,
            self.max_wall_time.map(|d| d.as_millis()),
        )
    }
}

/// Serde adapter: `Option<Duration>` as integer milliseconds.
pub(crate) mod opt_duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let ms = Option::<u64>::deserialize(d)?;
        Ok(ms.map(Duration::from_millis))
    }
}

/// Serde adapter: `Duration` as integer milliseconds.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(v: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(v.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
