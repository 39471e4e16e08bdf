// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single checkpoint: an ordered run of log entries with a dedup index
//!
//! Entries live in an append-only slot vector. Deduplicating a key vacates its
//! old slot (leaving a tombstone) and appends the updated entry at the tail, so
//! a [`SlotId`] stays valid for the lifetime of the checkpoint except across a
//! merge, which renumbers slots.
//!
//! Slot 0 always holds the `Empty` placeholder and slot 1 the start marker.
//! Neither is ever vacated.

use super::entry::{LogEntry, QueueOp, QueuedItem};
use super::error::CheckpointError;
use crate::id::{CheckpointId, PartitionId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Stable position of an entry inside one checkpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(usize);

impl SlotId {
    pub const PLACEHOLDER: SlotId = SlotId(0);
    pub const START: SlotId = SlotId(1);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Identity of a checkpoint object, independent of its (relabelable) id
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct CheckpointHandle(pub(crate) u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointState {
    Open,
    Closed,
}

impl fmt::Display for CheckpointState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointState::Open => f.write_str("open"),
            CheckpointState::Closed => f.write_str("closed"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct IndexEntry {
    slot: SlotId,
    seqno: u64,
}

/// Fixed bookkeeping charged per indexed key, on top of the key bytes
pub const INDEX_ENTRY_OVERHEAD: usize =
    std::mem::size_of::<IndexEntry>() + std::mem::size_of::<QueuedItem>();

/// Memory overhead shared by all checkpoints of a partition
#[derive(Clone, Debug, Default)]
pub struct MemoryOverhead(Arc<AtomicUsize>);

impl MemoryOverhead {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    fn add(&self, bytes: usize) {
        self.0.fetch_add(bytes, Ordering::Relaxed);
    }

    fn sub(&self, bytes: usize) {
        // fetch_update never fails with a closure that always returns Some
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(bytes))
            });
    }
}

/// Result of queueing an entry into a checkpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Queued {
    New,
    /// The key already had a live slot; it was vacated and the entry moved to the tail
    Relocated { from: SlotId },
}

/// One bounded segment of a partition's mutation log
pub struct Checkpoint {
    handle: CheckpointHandle,
    id: CheckpointId,
    partition: PartitionId,
    state: CheckpointState,
    slots: Vec<Option<QueuedItem>>,
    key_index: HashMap<String, IndexEntry>,
    num_items: usize,
    mem_overhead: usize,
    cursors: BTreeSet<String>,
    created_at: Instant,
    overhead: MemoryOverhead,
}

impl Checkpoint {
    pub(crate) fn open(
        handle: CheckpointHandle,
        id: CheckpointId,
        partition: PartitionId,
        placeholder_seqno: u64,
        start_seqno: u64,
        created_at: Instant,
        overhead: MemoryOverhead,
    ) -> Self {
        let slots = vec![
            Some(Arc::new(LogEntry::placeholder(partition, placeholder_seqno, created_at))),
            Some(Arc::new(LogEntry::checkpoint_start(partition, id, start_seqno, created_at))),
        ];
        tracing::info!(partition = %partition, checkpoint = %id, "checkpoint created");
        Self {
            handle,
            id,
            partition,
            state: CheckpointState::Open,
            slots,
            key_index: HashMap::new(),
            num_items: 0,
            mem_overhead: 0,
            cursors: BTreeSet::new(),
            created_at,
            overhead,
        }
    }

    pub fn id(&self) -> CheckpointId {
        self.id
    }

    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    pub fn state(&self) -> CheckpointState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == CheckpointState::Open
    }

    /// Live set/delete entries (markers excluded)
    pub fn num_items(&self) -> usize {
        self.num_items
    }

    pub fn is_empty(&self) -> bool {
        self.num_items == 0
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn mem_overhead(&self) -> usize {
        self.mem_overhead
    }

    pub(crate) fn handle(&self) -> CheckpointHandle {
        self.handle
    }

    /// Entries a cursor consumes when crossing this checkpoint: items plus
    /// the start marker, plus the end marker once closed.
    pub(crate) fn logical_len(&self) -> usize {
        match self.state {
            CheckpointState::Open => self.num_items + 1,
            CheckpointState::Closed => self.num_items + 2,
        }
    }

    /// Sequence number of the live entry for `key`, if indexed here
    pub fn key_seqno(&self, key: &str) -> Option<u64> {
        self.key_index.get(key).map(|e| e.seqno)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.key_index.contains_key(key)
    }

    pub fn entry(&self, slot: SlotId) -> Option<&QueuedItem> {
        self.slots.get(slot.0).and_then(Option::as_ref)
    }

    /// Live entries in log order, placeholder included
    pub fn entries(&self) -> impl Iterator<Item = &QueuedItem> + '_ {
        self.slots.iter().flatten()
    }

    fn live_slots(&self) -> impl Iterator<Item = (SlotId, &QueuedItem)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|e| (SlotId(i), e)))
    }

    pub(crate) fn queue_dirty(&mut self, entry: LogEntry) -> Result<Queued, CheckpointError> {
        if self.state != CheckpointState::Open {
            return Err(CheckpointError::CheckpointClosed {
                partition: self.partition,
                id: self.id,
            });
        }

        let seqno = entry.by_seqno;
        let existing = self.key_index.get(&entry.key).copied();
        match existing {
            Some(IndexEntry { slot: from, .. }) => {
                let updated = match self.slots.get_mut(from.0).and_then(Option::take) {
                    Some(old) => old.superseded_by(&entry),
                    None => entry,
                };
                let key = updated.key.clone();
                let to = self.push(updated);
                self.key_index.insert(key, IndexEntry { slot: to, seqno });
                Ok(Queued::Relocated { from })
            }
            None => {
                let key = entry.key.clone();
                let keyed = entry.is_mutation() && !key.is_empty();
                if entry.is_mutation() {
                    self.num_items += 1;
                }
                let to = self.push(entry);
                if keyed {
                    self.charge(key.len() + INDEX_ENTRY_OVERHEAD);
                    self.key_index.insert(key, IndexEntry { slot: to, seqno });
                }
                Ok(Queued::New)
            }
        }
    }

    fn push(&mut self, entry: LogEntry) -> SlotId {
        self.slots.push(Some(Arc::new(entry)));
        SlotId(self.slots.len() - 1)
    }

    fn charge(&mut self, bytes: usize) {
        self.mem_overhead += bytes;
        self.overhead.add(bytes);
    }

    /// Append the end marker and mark the checkpoint closed
    pub(crate) fn close(&mut self, end_seqno: u64, at: Instant) {
        if self.state == CheckpointState::Closed {
            return;
        }
        self.push(LogEntry::checkpoint_end(self.partition, self.id, end_seqno, at));
        self.state = CheckpointState::Closed;
        tracing::info!(partition = %self.partition, checkpoint = %self.id, items = self.num_items, "checkpoint closed");
    }

    /// Relabel the checkpoint, rewriting the start marker in place. The
    /// marker keeps its sequence number.
    pub(crate) fn set_id(&mut self, id: CheckpointId) {
        let seqno = self.entry(SlotId::START).map(|e| e.by_seqno);
        if let Some(seqno) = seqno {
            self.relabel(id, seqno);
        }
    }

    /// Relabel the checkpoint and give its start marker `start_seqno`.
    /// Only valid while the start marker is the newest live entry.
    pub(crate) fn relabel(&mut self, id: CheckpointId, start_seqno: u64) {
        if let Some(start) = self.slots.get_mut(SlotId::START.0).and_then(Option::as_mut) {
            *start = Arc::new(LogEntry::checkpoint_start(
                self.partition,
                id,
                start_seqno,
                start.queued_at,
            ));
        }
        self.id = id;
    }

    /// Absorb the live mutations of an older checkpoint that this one does not
    /// already hold, placing them directly after the start marker.
    ///
    /// The placeholder and start marker take over `prev`'s marker sequence
    /// numbers so the slot order stays sorted by sequence number. Slots are
    /// renumbered; callers relocate cursors by sequence number afterwards.
    /// Returns the number of entries absorbed.
    pub(crate) fn merge_prev(&mut self, prev: &Checkpoint) -> usize {
        let absorbed: Vec<QueuedItem> = prev
            .live_slots()
            .filter(|(_, e)| e.is_mutation() && !self.key_index.contains_key(&e.key))
            .map(|(_, e)| Arc::clone(e))
            .collect();

        let mut slots: Vec<Option<QueuedItem>> =
            Vec::with_capacity(self.slots.len() + absorbed.len());
        for marker in [SlotId::PLACEHOLDER, SlotId::START] {
            let own = self.entry(marker).cloned();
            let seqno = prev.entry(marker).map(|e| e.by_seqno);
            slots.push(match (own, seqno) {
                (Some(own), Some(seqno)) => Some(Arc::new(own.with_by_seqno(seqno))),
                (own, _) => own,
            });
        }

        let added = absorbed.len();
        for entry in absorbed {
            let at = SlotId(slots.len());
            self.key_index.insert(
                entry.key.clone(),
                IndexEntry {
                    slot: at,
                    seqno: entry.by_seqno,
                },
            );
            self.charge(entry.key.len() + INDEX_ENTRY_OVERHEAD);
            slots.push(Some(entry));
        }
        self.num_items += added;

        for entry in self.slots.iter_mut().skip(2).filter_map(Option::take) {
            if entry.is_mutation() {
                if let Some(indexed) = self.key_index.get_mut(&entry.key) {
                    indexed.slot = SlotId(slots.len());
                }
            }
            slots.push(Some(entry));
        }
        self.slots = slots;

        tracing::debug!(
            partition = %self.partition,
            checkpoint = %self.id,
            merged = %prev.id,
            added,
            superseded = prev.num_items - added,
            "merged previous checkpoint"
        );
        added
    }

    /// Next live slot after `slot`
    pub(crate) fn next_live(&self, slot: SlotId) -> Option<SlotId> {
        (slot.0 + 1..self.slots.len())
            .find(|&i| self.slots[i].is_some())
            .map(SlotId)
    }

    /// Nearest live slot before `slot`, bottoming out at the placeholder
    pub(crate) fn prev_live(&self, slot: SlotId) -> SlotId {
        (0..slot.0)
            .rev()
            .find(|&i| self.slots[i].is_some())
            .map_or(SlotId::PLACEHOLDER, SlotId)
    }

    /// True when the entry at `slot` is the last one before the end marker
    /// (or the last entry of an open checkpoint).
    pub fn is_last_mutation(&self, slot: SlotId) -> bool {
        match self.next_live(slot).and_then(|next| self.entry(next)) {
            None => true,
            Some(next) => next.op == QueueOp::CheckpointEnd,
        }
    }

    /// Entries a cursor at `slot` has consumed in this checkpoint
    pub(crate) fn ordinal(&self, slot: SlotId) -> usize {
        self.slots
            .iter()
            .take(slot.0 + 1)
            .skip(1)
            .filter(|s| s.is_some())
            .count()
    }

    /// Last live slot whose sequence number does not exceed `seqno`
    pub(crate) fn slot_for_seqno(&self, seqno: u64) -> SlotId {
        let mut found = SlotId::PLACEHOLDER;
        for (slot, entry) in self.live_slots() {
            if entry.by_seqno > seqno {
                break;
            }
            found = slot;
        }
        found
    }

    pub(crate) fn register_cursor(&mut self, name: &str) {
        self.cursors.insert(name.to_string());
    }

    pub(crate) fn remove_cursor(&mut self, name: &str) -> bool {
        self.cursors.remove(name)
    }

    pub(crate) fn retain_cursors(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.cursors.retain(|name| keep(name));
    }

    pub fn cursor_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.cursors.iter().map(String::as_str)
    }

    pub fn num_cursors(&self) -> usize {
        self.cursors.len()
    }
}

impl fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checkpoint")
            .field("id", &self.id)
            .field("partition", &self.partition)
            .field("state", &self.state)
            .field("num_items", &self.num_items)
            .field("cursors", &self.cursors)
            .finish_non_exhaustive()
    }
}

impl Drop for Checkpoint {
    fn drop(&mut self) {
        self.overhead.sub(self.mem_overhead);
        tracing::info!(partition = %self.partition, checkpoint = %self.id, "checkpoint purged from memory");
    }
}

#[cfg(test)]
#[path = "segment_tests.rs"]
mod tests;
