// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rollover, garbage collection and merging of closed checkpoints
//!
//! Removed and merged checkpoints are detached from the chain under the lock
//! and dropped by [`CheckpointManager::run_maintenance`] after it is released.

use super::config::CheckpointConfig;
use super::error::CheckpointError;
use super::manager::{dangling, CheckpointManager, LogState, PartitionRole};
use super::segment::{Checkpoint, CheckpointHandle};
use crate::clock::Clock;
use crate::id::CheckpointId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;

/// Open-checkpoint size below which memory pressure does not force a rollover
pub const MIN_ITEMS_FOR_PRESSURE_ROLLOVER: usize = 10;

/// Memory condition reported by the caller of a maintenance pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPressure {
    #[default]
    Normal,
    High,
}

/// What one maintenance pass did
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    /// Entries (items plus markers) dropped with removed checkpoints
    pub items_reclaimed: usize,
    pub checkpoints_removed: usize,
    pub checkpoints_merged: usize,
    /// Entries eliminated by merging (superseded versions plus markers)
    pub items_merged_away: usize,
    /// Id of the checkpoint closed by this pass, if it rolled over
    pub rolled_over_from: Option<CheckpointId>,
}

impl LogState {
    /// A new checkpoint may be added while the chain is below the limit, or
    /// at it with nothing left reading the oldest checkpoint
    pub(super) fn can_create_checkpoint(&self, config: &CheckpointConfig) -> bool {
        let len = self.chain.len();
        let max = config.max_checkpoints();
        len < max || (len == max && self.chain.front().num_cursors() == 0)
    }

    /// Roll over when forced, when the open checkpoint is full, or when it is
    /// non-empty and older than the period. Returns the closed id.
    pub(super) fn check_open_checkpoint(
        &mut self,
        config: &CheckpointConfig,
        now: Instant,
        force: bool,
    ) -> Option<CheckpointId> {
        let open = &self.chain.open;
        let full =
            config.item_num_based_new_checkpoint() && open.num_items() >= config.max_items();
        let aged = !open.is_empty()
            && now.saturating_duration_since(open.created_at()) >= config.period();
        if !(force || full || aged) {
            return None;
        }
        let id = open.id();
        tracing::debug!(partition = %self.partition, checkpoint = %id, force, full, aged, "rolling over open checkpoint");
        self.roll_over(id.next(), now);
        Some(id)
    }

    /// Under memory pressure, roll over once every cursor has reached the
    /// open checkpoint and it holds enough items to be worth closing
    fn pressure_forces_rollover(&self, pressure: MemoryPressure) -> bool {
        let open = &self.chain.open;
        pressure == MemoryPressure::High
            && open.num_cursors() == self.cursors.len()
            && open.num_items() >= MIN_ITEMS_FOR_PRESSURE_ROLLOVER
    }

    /// Drop cursor names a checkpoint holds for cursors that have moved on or
    /// no longer exist
    fn purge_stale_cursor_names(&mut self) {
        let cursors = &self.cursors;
        for cp in self.chain.iter_mut() {
            let handle = cp.handle();
            cp.retain_cursors(|name| cursors.get(name).is_some_and(|c| c.checkpoint == handle));
        }
    }

    pub(super) fn remove_closed_unref_checkpoints(
        &mut self,
        config: &CheckpointConfig,
        now: Instant,
        pressure: MemoryPressure,
    ) -> Result<(MaintenanceReport, Vec<Checkpoint>), CheckpointError> {
        let mut report = MaintenanceReport::default();
        if self.role == PartitionRole::Active && self.can_create_checkpoint(config) {
            let force = self.pressure_forces_rollover(pressure);
            report.rolled_over_from = self.check_open_checkpoint(config, now, force);
        }

        self.purge_stale_cursor_names();

        let keep_closed = config.keep_closed_checkpoints() && pressure == MemoryPressure::Normal;
        if keep_closed && self.chain.len() <= config.max_checkpoints() {
            return Ok((report, Vec::new()));
        }

        let mut removable = 0;
        let mut reclaimed = 0;
        for cp in &self.chain.closed {
            if cp.num_cursors() > 0 || cp.id() > self.persisted_boundary {
                break;
            }
            reclaimed += cp.logical_len();
            removable += 1;
            if keep_closed && self.chain.len() - removable <= config.max_checkpoints() {
                break;
            }
        }

        if reclaimed > 0 {
            self.num_items = self.num_items.saturating_sub(reclaimed);
            let partition = self.partition;
            for cursor in self.cursors.iter_mut() {
                cursor.decr_offset(reclaimed, partition);
            }
        }
        let mut garbage: Vec<Checkpoint> = self.chain.closed.drain(..removable).collect();
        report.checkpoints_removed = removable;
        report.items_reclaimed = reclaimed;
        if removable > 0 {
            tracing::info!(partition = %self.partition, removed = removable, items = reclaimed, "removed unreferenced checkpoints");
        }

        if !config.keep_closed_checkpoints() {
            let (merged, eliminated) = self.collapse_closed_checkpoints(config, &mut garbage)?;
            report.checkpoints_merged = merged;
            report.items_merged_away = eliminated;
        }
        Ok((report, garbage))
    }

    /// Merge every closed checkpoint into the newest closed one once the chain
    /// is longer than allowed. Returns (checkpoints merged, entries eliminated).
    fn collapse_closed_checkpoints(
        &mut self,
        config: &CheckpointConfig,
        garbage: &mut Vec<Checkpoint>,
    ) -> Result<(usize, usize), CheckpointError> {
        let closed = self.chain.closed.len();
        if closed < 2 || self.chain.len() <= config.max_checkpoints().max(2) {
            return Ok((0, 0));
        }

        let partition = self.partition;
        let span: HashSet<CheckpointHandle> =
            self.chain.closed.iter().map(Checkpoint::handle).collect();

        // Remember where every cursor in the merged span stood, by sequence number
        let mut positions = Vec::new();
        for cursor in self.cursors.iter() {
            if !span.contains(&cursor.checkpoint) {
                continue;
            }
            let seqno = self
                .chain
                .entry_at(cursor)
                .map(|e| e.by_seqno)
                .ok_or_else(|| dangling(partition, &cursor.name))?;
            positions.push((cursor.name.clone(), seqno));
        }

        let merged: Vec<Checkpoint> = self.chain.closed.drain(..closed - 1).collect();
        let Some(survivor) = self.chain.closed.back_mut() else {
            return Ok((0, 0));
        };
        let survivor_handle = survivor.handle();
        let mut eliminated = 0;
        for prev in merged.iter().rev() {
            let added = survivor.merge_prev(prev);
            eliminated += prev.num_items() - added + 2;
        }

        for cursor in self.cursors.iter_mut() {
            if !span.contains(&cursor.checkpoint) {
                cursor.decr_offset(eliminated, partition);
            }
        }
        // The survivor is now the head of the chain, so its ordinals are offsets
        for (name, seqno) in positions {
            let slot = survivor.slot_for_seqno(seqno);
            let offset = survivor.ordinal(slot);
            if let Some(cursor) = self.cursors.get_mut(&name) {
                cursor.checkpoint = survivor_handle;
                cursor.pos = slot;
                cursor.offset = offset;
            }
            survivor.register_cursor(&name);
        }

        self.num_items = self.num_items.saturating_sub(eliminated);
        tracing::info!(
            partition = %partition,
            survivor = %survivor.id(),
            merged = merged.len(),
            eliminated,
            "collapsed closed checkpoints"
        );
        let count = merged.len();
        garbage.extend(merged);
        Ok((count, eliminated))
    }
}

impl<C: Clock> CheckpointManager<C> {
    /// Periodic rollover, garbage collection and merge pass.
    ///
    /// Detached checkpoints are freed after the manager lock is released.
    pub fn run_maintenance(
        &self,
        pressure: MemoryPressure,
    ) -> Result<MaintenanceReport, CheckpointError> {
        let config = self.config();
        let now = self.now();
        let mut state = self.lock();
        let (report, garbage) = state
            .remove_closed_unref_checkpoints(&config, now, pressure)
            .map_err(|e| self.fail(e))?;
        drop(state);
        drop(garbage);
        Ok(report)
    }
}

#[cfg(test)]
#[path = "gc_tests.rs"]
mod tests;
