// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpointed mutation log for one partition
//!
//! A [`CheckpointManager`] owns an ordered list of [`Checkpoint`]s (oldest
//! first, exactly one open at the tail), the persistence cursor, and any
//! number of named consumer cursors.

mod config;
mod cursor;
mod entry;
mod error;
mod gc;
mod manager;
mod reconcile;
mod segment;
mod stats;

pub use config::{CheckpointConfig, ConfigError, ConfigHandle};
pub use cursor::{CursorRead, PERSISTENCE_CURSOR};
pub use entry::{LogEntry, QueueOp, QueuedItem};
pub use error::CheckpointError;
pub use gc::{MaintenanceReport, MemoryPressure, MIN_ITEMS_FOR_PRESSURE_ROLLOVER};
pub use manager::{CheckpointManager, Enqueued, PartitionLogPhase, PartitionRole, QueueDirty};
pub use segment::{Checkpoint, CheckpointState, MemoryOverhead, SlotId, INDEX_ENTRY_OVERHEAD};
pub use stats::{CheckpointStats, CursorStats};
