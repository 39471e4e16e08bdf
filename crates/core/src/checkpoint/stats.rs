// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only statistics snapshot of a partition log

use super::manager::{CheckpointManager, PartitionLogPhase, PartitionRole};
use crate::clock::Clock;
use crate::id::{CheckpointId, PartitionId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CursorStats {
    pub checkpoint_id: CheckpointId,
    pub offset: usize,
    /// Entries still to be read
    pub lag: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckpointStats {
    pub partition: PartitionId,
    pub role: PartitionRole,
    pub phase: PartitionLogPhase,
    pub open_checkpoint_id: CheckpointId,
    pub last_closed_checkpoint_id: CheckpointId,
    pub persisted_boundary: CheckpointId,
    pub num_checkpoints: usize,
    pub num_checkpoint_items: usize,
    pub num_open_checkpoint_items: usize,
    pub num_items_for_persistence: usize,
    pub num_consumer_cursors: usize,
    pub mem_overhead: usize,
    pub persistence: CursorStats,
    pub cursors: BTreeMap<String, CursorStats>,
}

impl<C: Clock> CheckpointManager<C> {
    /// Consistent snapshot taken under one lock acquisition
    pub fn stats(&self) -> CheckpointStats {
        let state = self.lock();
        let cursor_stats = |cursor: &super::cursor::Cursor| CursorStats {
            checkpoint_id: state
                .chain
                .find(cursor.checkpoint)
                .map(|cp| cp.id())
                .unwrap_or_default(),
            offset: cursor.offset,
            lag: state.lag(cursor),
        };
        let open = &state.chain.open;
        CheckpointStats {
            partition: state.partition,
            role: state.role,
            phase: state.phase(),
            open_checkpoint_id: open.id(),
            last_closed_checkpoint_id: state.last_closed(),
            persisted_boundary: state.persisted_boundary,
            num_checkpoints: state.chain.len(),
            num_checkpoint_items: state.num_items,
            num_open_checkpoint_items: open.num_items(),
            num_items_for_persistence: state.num_items_for_persistence(),
            num_consumer_cursors: state.cursors.consumers.len(),
            mem_overhead: self.memory_overhead(),
            persistence: cursor_stats(&state.cursors.persistence),
            cursors: state
                .cursors
                .consumers
                .iter()
                .map(|(name, cursor)| (name.clone(), cursor_stats(cursor)))
                .collect(),
        }
    }
}

impl fmt::Display for CheckpointStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vb = self.partition;
        writeln!(f, "{vb}:role {}", self.role)?;
        match self.phase {
            PartitionLogPhase::Backfilling => writeln!(f, "{vb}:phase backfilling")?,
            PartitionLogPhase::Streaming(_) => writeln!(f, "{vb}:phase streaming")?,
        }
        writeln!(f, "{vb}:open_checkpoint_id {}", self.open_checkpoint_id)?;
        writeln!(f, "{vb}:last_closed_checkpoint_id {}", self.last_closed_checkpoint_id)?;
        writeln!(f, "{vb}:persisted_checkpoint_id {}", self.persisted_boundary)?;
        writeln!(f, "{vb}:num_checkpoints {}", self.num_checkpoints)?;
        writeln!(f, "{vb}:num_checkpoint_items {}", self.num_checkpoint_items)?;
        writeln!(f, "{vb}:num_open_checkpoint_items {}", self.num_open_checkpoint_items)?;
        writeln!(f, "{vb}:num_items_for_persistence {}", self.num_items_for_persistence)?;
        writeln!(f, "{vb}:num_consumer_cursors {}", self.num_consumer_cursors)?;
        writeln!(f, "{vb}:mem_usage {}", self.mem_overhead)?;
        writeln!(
            f,
            "{vb}:persistence:cursor_checkpoint_id {}",
            self.persistence.checkpoint_id
        )?;
        for (name, cursor) in &self.cursors {
            writeln!(f, "{vb}:{name}:cursor_checkpoint_id {}", cursor.checkpoint_id)?;
            writeln!(f, "{vb}:{name}:num_items_for_cursor {}", cursor.lag)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
