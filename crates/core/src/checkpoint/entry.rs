// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log entries queued into checkpoints
//!
//! An entry is either a key mutation (set/delete) or a control marker that
//! frames a checkpoint. Entries are shared (`Arc`) so drains can hand them to
//! the persistence and replication collaborators without copying values.

use crate::id::{CheckpointId, PartitionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Shared handle to a queued log entry
pub type QueuedItem = Arc<LogEntry>;

/// Kind of operation a log entry records
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOp {
    Set,
    Delete,
    CheckpointStart,
    CheckpointEnd,
    /// Re-positionable placeholder heading every checkpoint
    Empty,
}

impl QueueOp {
    /// True for operations that change a key (set/delete)
    pub fn is_mutation(self) -> bool {
        matches!(self, QueueOp::Set | QueueOp::Delete)
    }

    pub fn name(self) -> &'static str {
        match self {
            QueueOp::Set => "set",
            QueueOp::Delete => "delete",
            QueueOp::CheckpointStart => "checkpoint_start",
            QueueOp::CheckpointEnd => "checkpoint_end",
            QueueOp::Empty => "empty",
        }
    }
}

impl fmt::Display for QueueOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One mutation or control marker in a partition's log
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    /// Document key; empty for control markers
    pub key: String,
    pub partition: PartitionId,
    pub op: QueueOp,
    /// Revision sequence number of the document. For start/end markers this
    /// carries the checkpoint id.
    pub rev_seqno: u64,
    /// Log sequence number, unique and monotonic within the partition
    pub by_seqno: u64,
    pub queued_at: Instant,
}

impl LogEntry {
    /// Create a set/delete entry
    pub fn mutation(
        key: impl Into<String>,
        partition: PartitionId,
        op: QueueOp,
        rev_seqno: u64,
        by_seqno: u64,
        queued_at: Instant,
    ) -> Self {
        Self {
            key: key.into(),
            partition,
            op,
            rev_seqno,
            by_seqno,
            queued_at,
        }
    }

    pub(crate) fn placeholder(partition: PartitionId, by_seqno: u64, queued_at: Instant) -> Self {
        Self::marker(partition, QueueOp::Empty, 0, by_seqno, queued_at)
    }

    pub(crate) fn checkpoint_start(
        partition: PartitionId,
        id: CheckpointId,
        by_seqno: u64,
        queued_at: Instant,
    ) -> Self {
        Self::marker(partition, QueueOp::CheckpointStart, id.0, by_seqno, queued_at)
    }

    pub(crate) fn checkpoint_end(
        partition: PartitionId,
        id: CheckpointId,
        by_seqno: u64,
        queued_at: Instant,
    ) -> Self {
        Self::marker(partition, QueueOp::CheckpointEnd, id.0, by_seqno, queued_at)
    }

    fn marker(
        partition: PartitionId,
        op: QueueOp,
        rev_seqno: u64,
        by_seqno: u64,
        queued_at: Instant,
    ) -> Self {
        Self {
            key: String::new(),
            partition,
            op,
            rev_seqno,
            by_seqno,
            queued_at,
        }
    }

    /// The same slot identity carrying a newer write's content
    pub(crate) fn superseded_by(&self, newer: &LogEntry) -> Self {
        Self {
            key: self.key.clone(),
            partition: self.partition,
            op: newer.op,
            rev_seqno: newer.rev_seqno,
            by_seqno: newer.by_seqno,
            queued_at: newer.queued_at,
        }
    }

    pub(crate) fn with_by_seqno(&self, by_seqno: u64) -> Self {
        Self {
            by_seqno,
            ..self.clone()
        }
    }

    /// Checkpoint id carried by a start/end marker
    pub fn checkpoint_id(&self) -> Option<CheckpointId> {
        match self.op {
            QueueOp::CheckpointStart | QueueOp::CheckpointEnd => Some(CheckpointId(self.rev_seqno)),
            _ => None,
        }
    }

    pub fn is_mutation(&self) -> bool {
        self.op.is_mutation()
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.checkpoint_id() {
            Some(id) => write!(f, "#{} {} {}", self.by_seqno, self.op, id),
            None if self.key.is_empty() => write!(f, "#{} {}", self.by_seqno, self.op),
            None => write!(
                f,
                "#{} {} {} rev={}",
                self.by_seqno, self.op, self.key, self.rev_seqno
            ),
        }
    }
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
