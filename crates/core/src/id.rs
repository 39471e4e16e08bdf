// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifiers for partitions and checkpoints

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one partition (vbucket) of the key space
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionId(pub u16);

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vb_{}", self.0)
    }
}

impl From<u16> for PartitionId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

/// Monotonic per-partition checkpoint identifier.
///
/// Zero labels the provisional checkpoint a replica fills while it is still
/// backfilling. Code never branches on that value directly; the manager keeps
/// an explicit [`PartitionLogPhase`](crate::PartitionLogPhase) instead.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CheckpointId(pub u64);

impl CheckpointId {
    /// Label of the provisional checkpoint held during backfill
    pub const BACKFILL: CheckpointId = CheckpointId(0);
    /// First id an active partition opens
    pub const FIRST: CheckpointId = CheckpointId(1);

    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    pub fn prev(self) -> Self {
        Self(self.0.saturating_sub(1))
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CheckpointId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
