// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sharded session table.
//!
//! Shard count = CPU count. Only the session manager mutates the table;
//! everything else reads through shard read locks, so a busy workspace
//! never serializes unrelated lookups.

use crate::live::LiveSession;
use herd_core::SessionId;
use parking_lot::RwLock;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub(crate) struct SessionTable {
    shards: Vec<RwLock<HashMap<SessionId, Arc<LiveSession>>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        let shard_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        Self { shards: (0..shard_count).map(|_| RwLock::new(HashMap::new())).collect() }
    }

    fn shard(&self, id: &SessionId) -> &RwLock<HashMap<SessionId, Arc<LiveSession>>> {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }

    pub fn insert(&self, id: SessionId, session: Arc<LiveSession>) {
        self.shard(&id).write().insert(id, session);
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<LiveSession>> {
        self.shard(id).read().get(id).cloned()
    }

    pub fn remove(&self, id: &SessionId) -> Option<Arc<LiveSession>> {
        self.shard(id).write().remove(id)
    }

    /// Snapshot of every live session; used by the reaper and queries.
    pub fn snapshot(&self) -> Vec<Arc<LiveSession>> {
        self.shards
            .iter()
            .flat_map(|shard| shard.read().values().cloned().collect::<Vec<_>>())
            .collect()
    }
}
