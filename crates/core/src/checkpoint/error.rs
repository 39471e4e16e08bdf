// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint manager errors
//!
//! These signal a broken orchestrator invariant. The partition log should be
//! considered poisoned once one is returned.

use super::entry::QueueOp;
use crate::id::{CheckpointId, PartitionId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("cursor {name} on {partition} references a checkpoint that is no longer in memory")]
    DanglingCursor { partition: PartitionId, name: String },

    #[error("cannot close checkpoint {requested} on {partition}: open checkpoint is {open}")]
    CloseMismatch {
        partition: PartitionId,
        requested: CheckpointId,
        open: CheckpointId,
    },

    #[error("checkpoint {id} on {partition} is closed")]
    CheckpointClosed { partition: PartitionId, id: CheckpointId },

    #[error("cursor name {0:?} is reserved")]
    ReservedCursorName(String),

    #[error("mutation on {partition} has an empty key")]
    EmptyKey { partition: PartitionId },

    #[error("{0} is not a mutation")]
    NotAMutation(QueueOp),
}
