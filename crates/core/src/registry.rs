// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of partition logs
//!
//! Each partition gets an independent [`CheckpointManager`]; the registry lock
//! only guards the map, never a partition's log.

use crate::checkpoint::{CheckpointManager, CheckpointStats, ConfigHandle, PartitionRole};
use crate::clock::{Clock, SystemClock};
use crate::id::PartitionId;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

pub struct PartitionLogs<C: Clock = SystemClock> {
    config: ConfigHandle,
    clock: C,
    partitions: RwLock<BTreeMap<PartitionId, Arc<CheckpointManager<C>>>>,
}

impl PartitionLogs<SystemClock> {
    pub fn new(config: ConfigHandle) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> PartitionLogs<C> {
    pub fn with_clock(config: ConfigHandle, clock: C) -> Self {
        Self {
            config,
            clock,
            partitions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Shared configuration every partition observes
    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Get the log for `partition`, creating it with `role` if absent
    pub fn get_or_create(&self, partition: PartitionId, role: PartitionRole) -> Arc<CheckpointManager<C>> {
        if let Some(existing) = self.get(partition) {
            return existing;
        }
        let mut partitions = self.partitions.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(partitions.entry(partition).or_insert_with(|| {
            tracing::info!(partition = %partition, role = %role, "partition log created");
            Arc::new(CheckpointManager::with_clock(
                partition,
                role,
                self.config.clone(),
                self.clock.clone(),
            ))
        }))
    }

    pub fn get(&self, partition: PartitionId) -> Option<Arc<CheckpointManager<C>>> {
        let partitions = self.partitions.read().unwrap_or_else(|e| e.into_inner());
        partitions.get(&partition).cloned()
    }

    pub fn remove(&self, partition: PartitionId) -> Option<Arc<CheckpointManager<C>>> {
        let mut partitions = self.partitions.write().unwrap_or_else(|e| e.into_inner());
        let removed = partitions.remove(&partition);
        if removed.is_some() {
            tracing::info!(partition = %partition, "partition log removed");
        }
        removed
    }

    pub fn partition_ids(&self) -> Vec<PartitionId> {
        let partitions = self.partitions.read().unwrap_or_else(|e| e.into_inner());
        partitions.keys().copied().collect()
    }

    /// Snapshot of the registered logs, so callers never hold the map lock
    /// while working on a partition
    pub fn logs(&self) -> Vec<Arc<CheckpointManager<C>>> {
        let partitions = self.partitions.read().unwrap_or_else(|e| e.into_inner());
        partitions.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.partitions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> Vec<CheckpointStats> {
        self.logs().iter().map(|log| log.stats()).collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
