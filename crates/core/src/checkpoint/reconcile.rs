// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replica reconciliation with upstream checkpoint boundaries
//!
//! A replica never rolls over on its own. It follows the checkpoint ids its
//! source announces, relabelling, rolling over, or collapsing its local tail
//! so the open checkpoint carries the announced id.

use super::error::CheckpointError;
use super::manager::{dangling, CheckpointManager, LogState};
use super::segment::{Checkpoint, CheckpointHandle, SlotId};
use crate::clock::Clock;
use crate::id::CheckpointId;
use std::collections::HashSet;
use std::time::Instant;

impl LogState {
    fn apply_upstream_boundary(
        &mut self,
        id: CheckpointId,
        now: Instant,
    ) -> Result<Vec<Checkpoint>, CheckpointError> {
        if self.backfilling {
            self.relabel_open(id);
            self.backfilling = false;
            self.reset_cursors(false);
            tracing::info!(partition = %self.partition, checkpoint = %id, "backfill complete, streaming");
            return Ok(Vec::new());
        }

        let reached = self.chain.iter().position(|cp| cp.id() >= id);
        if let Some(idx) = reached {
            return self.collapse_into_open(idx, id);
        }

        let tail = self.chain.open.id();
        if tail.next() < id {
            self.collapsed_upstream = true;
            self.last_closed_id = tail.prev();
            tracing::info!(partition = %self.partition, tail = %tail, upstream = %id, "upstream collapsed a checkpoint range");
        } else if tail.next() == id {
            self.collapsed_upstream = false;
        }

        if self.chain.open.is_empty() {
            self.relabel_empty_open(id);
        } else {
            self.roll_over(id, now);
        }
        Ok(Vec::new())
    }

    /// Relabel an empty open checkpoint and rewind its consumers so they see
    /// the start marker again with the new id
    fn relabel_empty_open(&mut self, id: CheckpointId) {
        self.relabel_open(id);
        let handle = self.chain.open.handle();
        let head = self.chain.prior_offset(self.chain.len() - 1);
        for cursor in self.cursors.consumers.values_mut() {
            if cursor.checkpoint == handle {
                cursor.pos = SlotId::PLACEHOLDER;
                cursor.offset = head;
            }
        }
        tracing::info!(partition = %self.partition, checkpoint = %id, "empty open checkpoint relabeled");
    }

    /// Merge checkpoints `from_idx..` into the open checkpoint, label it `id`,
    /// and relocate every cursor in that span by sequence number
    fn collapse_into_open(
        &mut self,
        from_idx: usize,
        id: CheckpointId,
    ) -> Result<Vec<Checkpoint>, CheckpointError> {
        let partition = self.partition;
        let span: HashSet<CheckpointHandle> = self
            .chain
            .iter()
            .skip(from_idx)
            .map(Checkpoint::handle)
            .collect();

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

        let merged: Vec<Checkpoint> = self.chain.closed.drain(from_idx..).collect();
        let head = self.chain.prior_offset(from_idx);
        let open = &mut self.chain.open;
        let mut eliminated = 0;
        for prev in merged.iter().rev() {
            let added = open.merge_prev(prev);
            eliminated += prev.num_items() - added + 2;
        }
        self.num_items = self.num_items.saturating_sub(eliminated);
        open.set_id(id);

        let handle = open.handle();
        for (name, seqno) in positions {
            let slot = open.slot_for_seqno(seqno);
            let offset = head + open.ordinal(slot);
            if let Some(cursor) = self.cursors.get_mut(&name) {
                cursor.checkpoint = handle;
                cursor.pos = slot;
                cursor.offset = offset;
            }
            open.register_cursor(&name);
        }

        tracing::info!(
            partition = %partition,
            checkpoint = %id,
            merged = merged.len(),
            eliminated,
            "collapsed local checkpoints onto upstream boundary"
        );
        Ok(merged)
    }
}

impl<C: Clock> CheckpointManager<C> {
    /// Follow an upstream "checkpoint `id` has begun" signal
    pub fn on_upstream_checkpoint_boundary(&self, id: CheckpointId) -> Result<(), CheckpointError> {
        if id == CheckpointId::BACKFILL {
            tracing::debug!(partition = %self.partition(), "ignoring upstream backfill boundary");
            return Ok(());
        }
        let now = self.now();
        let mut state = self.lock();
        let garbage = state
            .apply_upstream_boundary(id, now)
            .map_err(|e| self.fail(e))?;
        drop(state);
        drop(garbage);
        Ok(())
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
