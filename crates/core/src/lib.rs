// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! chklog-core: checkpointed per-partition mutation log
//!
//! This crate provides:
//! - Checkpoints: ordered, deduplicating segments of a partition's log
//! - A checkpoint manager with a persistence cursor and named consumer cursors
//! - Rollover, garbage collection, merging and replica reconciliation
//! - A multi-partition registry and a periodic maintenance task

pub mod checkpoint;
pub mod clock;
pub mod id;
pub mod maintenance;
pub mod registry;

// Re-exports
pub use checkpoint::{
    CheckpointConfig, CheckpointError, CheckpointManager, CheckpointStats, ConfigError,
    ConfigHandle, CursorRead, CursorStats, Enqueued, LogEntry, MaintenanceReport, MemoryPressure,
    PartitionLogPhase, PartitionRole, QueueDirty, QueueOp, QueuedItem, PERSISTENCE_CURSOR,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use id::{CheckpointId, PartitionId};
pub use maintenance::{MaintenanceConfig, MaintenanceSummary, MaintenanceTask};
pub use registry::PartitionLogs;
