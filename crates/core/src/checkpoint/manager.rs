// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-partition checkpoint manager
//!
//! Owns the ordered checkpoint list of one partition, the persistence cursor,
//! and every named consumer cursor. All state sits behind one mutex; each
//! public operation takes it once. Rollover, garbage collection and merging
//! live in `gc.rs`; replica reconciliation in `reconcile.rs`.

use super::config::{CheckpointConfig, ConfigHandle};
use super::cursor::{Cursor, CursorRead, Cursors, PERSISTENCE_CURSOR};
use super::entry::{LogEntry, QueueOp, QueuedItem};
use super::error::CheckpointError;
use super::segment::{Checkpoint, CheckpointHandle, MemoryOverhead, Queued, SlotId};
use crate::clock::{Clock, SystemClock};
use crate::id::{CheckpointId, PartitionId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Whether this copy of the partition rolls over on its own
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionRole {
    Active,
    Replica,
}

impl PartitionRole {
    fn initial_checkpoint(self) -> CheckpointId {
        match self {
            PartitionRole::Active => CheckpointId::FIRST,
            PartitionRole::Replica => CheckpointId::BACKFILL,
        }
    }
}

impl fmt::Display for PartitionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionRole::Active => f.write_str("active"),
            PartitionRole::Replica => f.write_str("replica"),
        }
    }
}

/// Whether consumers may read yet
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "checkpoint", rename_all = "lowercase")]
pub enum PartitionLogPhase {
    /// Still being seeded from upstream; only the persistence cursor reads
    Backfilling,
    Streaming(CheckpointId),
}

/// How the open checkpoint absorbed an appended entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueDirty {
    NewItem,
    /// The key was already queued; its slot moved to the tail
    ExistingItem,
    /// As `ExistingItem`, and the persistence cursor had already read the old slot
    PersistAgain,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Enqueued {
    pub seqno: u64,
    pub outcome: QueueDirty,
}

impl Enqueued {
    /// True when the disk queue grew by one entry
    pub fn adds_to_persistence_queue(&self) -> bool {
        matches!(self.outcome, QueueDirty::NewItem | QueueDirty::PersistAgain)
    }
}

/// Closed checkpoints oldest first, then the single open checkpoint
pub(super) struct Chain {
    pub(super) closed: VecDeque<Checkpoint>,
    pub(super) open: Checkpoint,
}

impl Chain {
    pub(super) fn len(&self) -> usize {
        self.closed.len() + 1
    }

    pub(super) fn iter(&self) -> impl DoubleEndedIterator<Item = &Checkpoint> + '_ {
        self.closed.iter().chain(std::iter::once(&self.open))
    }

    pub(super) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Checkpoint> + '_ {
        self.closed.iter_mut().chain(std::iter::once(&mut self.open))
    }

    pub(super) fn get(&self, idx: usize) -> Option<&Checkpoint> {
        if idx == self.closed.len() {
            Some(&self.open)
        } else {
            self.closed.get(idx)
        }
    }

    pub(super) fn get_mut(&mut self, idx: usize) -> Option<&mut Checkpoint> {
        if idx == self.closed.len() {
            Some(&mut self.open)
        } else {
            self.closed.get_mut(idx)
        }
    }

    pub(super) fn front(&self) -> &Checkpoint {
        self.closed.front().unwrap_or(&self.open)
    }

    pub(super) fn position(&self, handle: CheckpointHandle) -> Option<usize> {
        self.iter().position(|cp| cp.handle() == handle)
    }

    pub(super) fn find(&self, handle: CheckpointHandle) -> Option<&Checkpoint> {
        self.iter().find(|cp| cp.handle() == handle)
    }

    pub(super) fn find_mut(&mut self, handle: CheckpointHandle) -> Option<&mut Checkpoint> {
        self.iter_mut().find(|cp| cp.handle() == handle)
    }

    /// Entries a cursor has consumed on reaching the head of checkpoint `idx`
    pub(super) fn prior_offset(&self, idx: usize) -> usize {
        self.iter().take(idx).map(Checkpoint::logical_len).sum()
    }

    /// Entry at a cursor's position
    pub(super) fn entry_at(&self, cursor: &Cursor) -> Option<&QueuedItem> {
        self.find(cursor.checkpoint).and_then(|cp| cp.entry(cursor.pos))
    }
}

/// Everything guarded by the manager lock
pub(super) struct LogState {
    pub(super) partition: PartitionId,
    pub(super) role: PartitionRole,
    pub(super) backfilling: bool,
    pub(super) chain: Chain,
    pub(super) cursors: Cursors,
    pub(super) last_seqno: u64,
    /// Live entries across the chain: items, start markers, end markers
    pub(super) num_items: usize,
    pub(super) last_closed_id: CheckpointId,
    pub(super) collapsed_upstream: bool,
    /// Checkpoints at or below this id have been fully persisted
    pub(super) persisted_boundary: CheckpointId,
    next_handle: u64,
    overhead: MemoryOverhead,
}

impl LogState {
    fn new(
        partition: PartitionId,
        role: PartitionRole,
        now: Instant,
        overhead: MemoryOverhead,
    ) -> Self {
        let first = Checkpoint::open(
            CheckpointHandle(0),
            role.initial_checkpoint(),
            partition,
            1,
            2,
            now,
            overhead.clone(),
        );
        let cursors = Cursors::new(Cursor::new(PERSISTENCE_CURSOR, first.handle(), 0));
        let mut state = Self {
            partition,
            role,
            backfilling: role == PartitionRole::Replica,
            chain: Chain {
                closed: VecDeque::new(),
                open: first,
            },
            cursors,
            last_seqno: 2,
            num_items: 1,
            last_closed_id: CheckpointId::BACKFILL,
            collapsed_upstream: false,
            persisted_boundary: CheckpointId::BACKFILL,
            next_handle: 1,
            overhead,
        };
        state.chain.open.register_cursor(PERSISTENCE_CURSOR);
        state
    }

    pub(super) fn next_seqno(&mut self) -> u64 {
        self.last_seqno += 1;
        self.last_seqno
    }

    /// Build a fresh open checkpoint; the caller places it in the chain
    pub(super) fn new_checkpoint(&mut self, id: CheckpointId, now: Instant) -> Checkpoint {
        let handle = CheckpointHandle(self.next_handle);
        self.next_handle += 1;
        let placeholder = self.next_seqno();
        let start = self.next_seqno();
        self.num_items += 1;
        Checkpoint::open(
            handle,
            id,
            self.partition,
            placeholder,
            start,
            now,
            self.overhead.clone(),
        )
    }

    /// Relabel the open checkpoint. While it holds no items its start marker
    /// also takes the next sequence number.
    pub(super) fn relabel_open(&mut self, id: CheckpointId) {
        if self.chain.open.is_empty() {
            let seqno = self.next_seqno();
            self.chain.open.relabel(id, seqno);
        } else {
            self.chain.open.set_id(id);
        }
    }

    /// Close the open checkpoint and open `next_id` behind it
    pub(super) fn roll_over(&mut self, next_id: CheckpointId, now: Instant) {
        let end = self.next_seqno();
        self.chain.open.close(end, now);
        self.num_items += 1;
        self.last_closed_id = self.chain.open.id();
        let fresh = self.new_checkpoint(next_id, now);
        let closed = std::mem::replace(&mut self.chain.open, fresh);
        self.chain.closed.push_back(closed);
    }

    fn queue_into_open(&mut self, entry: LogEntry) -> Result<QueueDirty, CheckpointError> {
        let partition = self.partition;
        let open = &mut self.chain.open;
        match open.queue_dirty(entry)? {
            Queued::New => {
                self.num_items += 1;
                Ok(QueueDirty::NewItem)
            }
            Queued::Relocated { from } => {
                let handle = open.handle();
                let mut persist_again = false;
                for cursor in self.cursors.iter_mut() {
                    if cursor.checkpoint != handle {
                        continue;
                    }
                    if from <= cursor.pos {
                        cursor.decr_offset(1, partition);
                        persist_again |= cursor.is_persistence();
                    }
                    if cursor.pos == from {
                        cursor.pos = open.prev_live(from);
                    }
                }
                Ok(if persist_again {
                    QueueDirty::PersistAgain
                } else {
                    QueueDirty::ExistingItem
                })
            }
        }
    }

    /// Place a cursor at the head of checkpoint `idx`
    pub(super) fn place_cursor(&mut self, name: &str, idx: usize) -> Option<Cursor> {
        let offset = self.chain.prior_offset(idx);
        let cp = self.chain.get_mut(idx)?;
        cp.register_cursor(name);
        Some(Cursor::new(name, cp.handle(), offset))
    }

    /// Detach a cursor's name from whatever checkpoint it currently sits in
    pub(super) fn detach(&mut self, name: &str) {
        if let Some(handle) = self.cursors.get(name).map(|c| c.checkpoint) {
            if let Some(cp) = self.chain.find_mut(handle) {
                cp.remove_cursor(name);
            }
        }
    }

    /// Put every consumer cursor (and optionally the persistence cursor) back
    /// at the head of the log
    pub(super) fn reset_cursors(&mut self, include_persistence: bool) {
        let names: Vec<String> = self.cursors.consumers.keys().cloned().collect();
        for name in names.iter().map(String::as_str).chain(
            include_persistence
                .then_some(PERSISTENCE_CURSOR)
                .into_iter(),
        ) {
            self.detach(name);
            let front = self.chain.front();
            let handle = front.handle();
            if let Some(cursor) = self.cursors.get_mut(name) {
                cursor.checkpoint = handle;
                cursor.pos = SlotId::PLACEHOLDER;
                cursor.offset = 0;
            }
            if let Some(cp) = self.chain.find_mut(handle) {
                cp.register_cursor(name);
            }
        }
    }

    fn register_consumer(
        &mut self,
        name: &str,
        start: CheckpointId,
        from_beginning: bool,
    ) -> Result<bool, CheckpointError> {
        let found = self.chain.iter().position(|cp| cp.id() == start);
        let idx = match found {
            Some(idx) => idx,
            None => self.fallback_index(),
        };

        if let Some(existing) = self.cursors.consumers.get(name) {
            if found.is_some()
                && !from_beginning
                && self.chain.position(existing.checkpoint) == Some(idx)
            {
                tracing::info!(partition = %self.partition, cursor = name, checkpoint = %start, "consumer cursor kept at its position");
                return Ok(true);
            }
        }
        self.detach(name);

        let cursor = self
            .place_cursor(name, idx)
            .ok_or_else(|| dangling(self.partition, name))?;
        let checkpoint = self.chain.get(idx).map(Checkpoint::id).unwrap_or_default();
        tracing::info!(
            partition = %self.partition,
            cursor = name,
            requested = %start,
            checkpoint = %checkpoint,
            offset = cursor.offset,
            found = found.is_some(),
            "consumer cursor registered"
        );
        self.cursors.consumers.insert(name.to_string(), cursor);
        Ok(found.is_some())
    }

    /// Where a consumer starts when its requested checkpoint is gone: the
    /// oldest checkpoint the persistence cursor has not fully passed
    fn fallback_index(&self) -> usize {
        let boundary = self.persisted_boundary;
        self.chain
            .iter()
            .position(|cp| boundary == CheckpointId::BACKFILL || cp.id() > boundary)
            .unwrap_or(self.chain.len() - 1)
    }

    pub(super) fn num_items_for_persistence(&self) -> usize {
        let cursor = &self.cursors.persistence;
        let Some(start) = self.chain.position(cursor.checkpoint) else {
            return 0;
        };
        let mut meta = 0;
        for (idx, cp) in self.chain.iter().enumerate().skip(start) {
            let closed = !cp.is_open();
            if idx == start {
                let Some(next) = cp.next_live(cursor.pos).and_then(|slot| cp.entry(slot)) else {
                    continue;
                };
                if next.op == QueueOp::CheckpointStart {
                    meta += if closed { 2 } else { 1 };
                } else if closed {
                    meta += 1;
                }
            } else {
                meta += if closed { 2 } else { 1 };
            }
        }
        self.num_items.saturating_sub(cursor.offset + meta)
    }

    pub(super) fn phase(&self) -> PartitionLogPhase {
        if self.backfilling {
            PartitionLogPhase::Backfilling
        } else {
            PartitionLogPhase::Streaming(self.chain.open.id())
        }
    }

    pub(super) fn last_closed(&self) -> CheckpointId {
        if self.collapsed_upstream {
            self.last_closed_id
        } else {
            self.chain.open.id().prev()
        }
    }

    pub(super) fn lag(&self, cursor: &Cursor) -> usize {
        self.num_items.saturating_sub(cursor.offset)
    }
}

/// Move a cursor forward one entry, crossing closed checkpoint boundaries
fn step_cursor(
    chain: &mut Chain,
    cursor: &mut Cursor,
    partition: PartitionId,
) -> Result<bool, CheckpointError> {
    loop {
        let Some(idx) = chain.position(cursor.checkpoint) else {
            return Err(dangling(partition, &cursor.name));
        };
        let Some(cp) = chain.get(idx) else {
            return Err(dangling(partition, &cursor.name));
        };
        if let Some(next) = cp.next_live(cursor.pos) {
            cursor.pos = next;
            cursor.offset += 1;
            return Ok(true);
        }
        if cp.is_open() {
            return Ok(false);
        }

        let Some(next_cp) = chain.get_mut(idx + 1) else {
            return Ok(false);
        };
        next_cp.register_cursor(&cursor.name);
        let next_handle = next_cp.handle();
        if let Some(cp) = chain.get_mut(idx) {
            cp.remove_cursor(&cursor.name);
        }
        cursor.checkpoint = next_handle;
        cursor.pos = SlotId::PLACEHOLDER;
    }
}

pub(super) fn dangling(partition: PartitionId, name: &str) -> CheckpointError {
    CheckpointError::DanglingCursor {
        partition,
        name: name.to_string(),
    }
}

/// The ordered mutation log of one partition
pub struct CheckpointManager<C: Clock = SystemClock> {
    partition: PartitionId,
    clock: C,
    config: ConfigHandle,
    overhead: MemoryOverhead,
    state: Mutex<LogState>,
}

impl CheckpointManager<SystemClock> {
    pub fn new(partition: PartitionId, role: PartitionRole, config: ConfigHandle) -> Self {
        Self::with_clock(partition, role, config, SystemClock)
    }
}

impl<C: Clock> CheckpointManager<C> {
    pub fn with_clock(
        partition: PartitionId,
        role: PartitionRole,
        config: ConfigHandle,
        clock: C,
    ) -> Self {
        let overhead = MemoryOverhead::new();
        let state = LogState::new(partition, role, clock.now(), overhead.clone());
        Self {
            partition,
            clock,
            config,
            overhead,
            state: Mutex::new(state),
        }
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(super) fn now(&self) -> Instant {
        self.clock.now()
    }

    pub(super) fn config(&self) -> CheckpointConfig {
        self.config.snapshot()
    }

    pub(super) fn fail(&self, err: CheckpointError) -> CheckpointError {
        tracing::error!(partition = %self.partition, error = %err, "checkpoint invariant violated");
        err
    }

    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Queue a set/delete, rolling the open checkpoint over first if the
    /// policy says so. Returns the assigned sequence number.
    pub fn append(
        &self,
        key: &str,
        op: QueueOp,
        rev_seqno: u64,
    ) -> Result<Enqueued, CheckpointError> {
        if !op.is_mutation() {
            return Err(CheckpointError::NotAMutation(op));
        }
        if key.is_empty() {
            return Err(CheckpointError::EmptyKey {
                partition: self.partition,
            });
        }

        let config = self.config();
        let now = self.now();
        let mut state = self.lock();
        if state.role == PartitionRole::Active && state.can_create_checkpoint(&config) {
            state.check_open_checkpoint(&config, now, false);
        }
        let seqno = state.next_seqno();
        let entry = LogEntry::mutation(key, self.partition, op, rev_seqno, seqno, now);
        let outcome = state.queue_into_open(entry).map_err(|e| self.fail(e))?;
        Ok(Enqueued { seqno, outcome })
    }

    /// Re-register the persistence cursor at the head of the log
    pub fn register_persistence_cursor(&self) {
        let mut state = self.lock();
        state.detach(PERSISTENCE_CURSOR);
        let front = state.chain.front().handle();
        state.cursors.persistence = Cursor::new(PERSISTENCE_CURSOR, front, 0);
        if let Some(cp) = state.chain.find_mut(front) {
            cp.register_cursor(PERSISTENCE_CURSOR);
        }
        tracing::info!(partition = %self.partition, "persistence cursor registered");
    }

    /// Register (or move) a consumer cursor at checkpoint `start`.
    ///
    /// Returns `Ok(true)` when `start` is still in memory. Otherwise the cursor
    /// is placed at the oldest checkpoint not yet fully persisted and the
    /// caller must backfill the gap.
    pub fn register_consumer_cursor(
        &self,
        name: &str,
        start: CheckpointId,
        from_beginning: bool,
    ) -> Result<bool, CheckpointError> {
        if name == PERSISTENCE_CURSOR {
            return Err(CheckpointError::ReservedCursorName(name.to_string()));
        }
        let mut state = self.lock();
        state
            .register_consumer(name, start, from_beginning)
            .map_err(|e| self.fail(e))
    }

    pub fn remove_consumer_cursor(&self, name: &str) -> bool {
        if name == PERSISTENCE_CURSOR {
            return false;
        }
        let mut state = self.lock();
        state.detach(name);
        let removed = state.cursors.consumers.remove(name).is_some();
        if removed {
            tracing::info!(partition = %self.partition, cursor = name, "consumer cursor removed");
        }
        removed
    }

    /// Deliver the next entry for a cursor
    pub fn advance(&self, name: &str) -> Result<CursorRead, CheckpointError> {
        let mut state = self.lock();
        if state.cursors.get(name).is_none() {
            tracing::warn!(partition = %self.partition, cursor = name, "cursor not found");
            return Ok(CursorRead::NotFound);
        }
        if state.backfilling && name != PERSISTENCE_CURSOR {
            tracing::debug!(partition = %self.partition, cursor = name, "partition still backfilling");
            return Ok(CursorRead::Backfilling);
        }

        let LogState { chain, cursors, .. } = &mut *state;
        let Some(cursor) = cursors.get_mut(name) else {
            return Ok(CursorRead::NotFound);
        };
        if !step_cursor(chain, cursor, self.partition).map_err(|e| self.fail(e))? {
            return Ok(CursorRead::EndOfLog);
        }
        let cp = chain
            .find(cursor.checkpoint)
            .ok_or_else(|| self.fail(dangling(self.partition, name)))?;
        match cp.entry(cursor.pos) {
            Some(entry) => Ok(CursorRead::Item {
                entry: Arc::clone(entry),
                last_in_checkpoint: cp.is_last_mutation(cursor.pos),
            }),
            None => Err(self.fail(dangling(self.partition, name))),
        }
    }

    /// Whether the entry a cursor last returned is the final one before its
    /// checkpoint's end marker
    pub fn is_last_mutation_item(&self, name: &str) -> bool {
        let state = self.lock();
        state.cursors.get(name).is_some_and(|cursor| {
            state
                .chain
                .find(cursor.checkpoint)
                .is_some_and(|cp| cp.is_last_mutation(cursor.pos))
        })
    }

    /// Drain the persistence cursor to the current end of the log
    pub fn get_all_items_for_persistence(&self) -> Result<Vec<QueuedItem>, CheckpointError> {
        let mut state = self.lock();
        let LogState {
            chain,
            cursors,
            num_items,
            ..
        } = &mut *state;
        let cursor = &mut cursors.persistence;
        let mut items = Vec::new();
        while step_cursor(chain, cursor, self.partition).map_err(|e| self.fail(e))? {
            if let Some(entry) = chain.entry_at(cursor) {
                items.push(Arc::clone(entry));
            }
        }
        cursor.offset = *num_items;
        tracing::debug!(partition = %self.partition, count = items.len(), "drained items for persistence");
        Ok(items)
    }

    pub fn has_more(&self, name: &str) -> bool {
        let state = self.lock();
        let Some(cursor) = state.cursors.get(name) else {
            return false;
        };
        if state.backfilling && !cursor.is_persistence() {
            return false;
        }
        state
            .chain
            .find(cursor.checkpoint)
            .is_some_and(|cp| !cp.is_open() || cp.next_live(cursor.pos).is_some())
    }

    pub fn has_more_for_persistence(&self) -> bool {
        self.has_more(PERSISTENCE_CURSOR)
    }

    /// Record that everything before the persistence cursor's checkpoint is on disk
    pub fn items_persisted(&self) {
        let mut state = self.lock();
        let boundary = state
            .chain
            .find(state.cursors.persistence.checkpoint)
            .map(|cp| cp.id().prev())
            .unwrap_or_default();
        state.persisted_boundary = boundary;
        tracing::debug!(partition = %self.partition, boundary = %boundary, "persistence boundary advanced");
    }

    /// Set the persisted boundary explicitly, never past the persistence cursor
    pub fn on_persisted_up_to(&self, id: CheckpointId) {
        let mut state = self.lock();
        let cap = state
            .chain
            .find(state.cursors.persistence.checkpoint)
            .map(|cp| cp.id().prev())
            .unwrap_or_default();
        let boundary = id.min(cap);
        if boundary < id {
            tracing::warn!(partition = %self.partition, requested = %id, boundary = %boundary, "persisted boundary clamped to persistence cursor");
        }
        state.persisted_boundary = boundary;
    }

    /// Whether the in-memory value for `key` may be dropped: no cursor is
    /// still behind a queued version of it
    pub fn is_evictable(&self, key: &str) -> bool {
        let state = self.lock();
        let mut low_water = u64::MAX;
        for cursor in state.cursors.iter() {
            let seqno = match state.chain.entry_at(cursor) {
                Some(entry) => entry.by_seqno,
                None => {
                    tracing::error!(partition = %self.partition, cursor = %cursor.name, "cursor position unresolved");
                    0
                }
            };
            low_water = low_water.min(seqno);
        }
        for cp in state.chain.iter().rev() {
            if let Some(seqno) = cp.key_seqno(key) {
                if low_water < seqno {
                    return false;
                }
            }
        }
        true
    }

    pub fn open_checkpoint_id(&self) -> CheckpointId {
        self.lock().chain.open.id()
    }

    pub fn last_closed_checkpoint_id(&self) -> CheckpointId {
        self.lock().last_closed()
    }

    /// Relabel the open checkpoint, e.g. after warmup
    pub fn set_open_checkpoint_id(&self, id: CheckpointId) {
        let mut state = self.lock();
        state.relabel_open(id);
        state.backfilling = id == CheckpointId::BACKFILL;
        tracing::info!(partition = %self.partition, checkpoint = %id, "open checkpoint relabeled");
    }

    /// Close checkpoint `id`, which must be the open one, and open `id + 1`
    pub fn close_open_checkpoint(&self, id: CheckpointId) -> Result<CheckpointId, CheckpointError> {
        let now = self.now();
        let mut state = self.lock();
        let open = state.chain.open.id();
        if open != id {
            return Err(self.fail(CheckpointError::CloseMismatch {
                partition: self.partition,
                requested: id,
                open,
            }));
        }
        state.roll_over(id.next(), now);
        Ok(id.next())
    }

    /// Administrative rollover; a no-op when the open checkpoint is empty.
    /// Returns the open checkpoint id afterwards.
    pub fn force_rollover(&self) -> CheckpointId {
        let now = self.now();
        let mut state = self.lock();
        let open = &state.chain.open;
        if !open.is_empty() {
            let next = open.id().next();
            state.roll_over(next, now);
        }
        state.chain.open.id()
    }

    /// Re-register the named consumer cursors at the open checkpoint, from its beginning
    pub fn reset_consumer_cursors(&self, names: &[&str]) -> Result<(), CheckpointError> {
        let mut state = self.lock();
        let open = state.chain.open.id();
        for name in names {
            if *name == PERSISTENCE_CURSOR {
                continue;
            }
            state
                .register_consumer(name, open, true)
                .map_err(|e| self.fail(e))?;
        }
        Ok(())
    }

    /// Step a consumer sitting on an end marker back one entry so the marker
    /// is delivered again. Returns whether the cursor moved.
    pub fn step_back_from_checkpoint_end(&self, name: &str) -> bool {
        let mut state = self.lock();
        let LogState {
            chain,
            cursors,
            partition,
            ..
        } = &mut *state;
        let Some(cursor) = cursors.consumers.get_mut(name) else {
            return false;
        };
        let Some(cp) = chain.find(cursor.checkpoint) else {
            return false;
        };
        if cp.entry(cursor.pos).map(|e| e.op) != Some(QueueOp::CheckpointEnd) {
            return false;
        }
        cursor.decr_offset(1, *partition);
        cursor.pos = cp.prev_live(cursor.pos);
        true
    }

    /// Drop every checkpoint and start over for `role`
    pub fn clear(&self, role: PartitionRole) {
        let now = self.now();
        let mut state = self.lock();
        state.num_items = 0;
        let fresh = state.new_checkpoint(role.initial_checkpoint(), now);
        let old_open = std::mem::replace(&mut state.chain.open, fresh);
        let garbage: Vec<Checkpoint> = state
            .chain
            .closed
            .drain(..)
            .chain(std::iter::once(old_open))
            .collect();
        state.role = role;
        state.backfilling = role == PartitionRole::Replica;
        state.last_closed_id = CheckpointId::BACKFILL;
        state.collapsed_upstream = false;
        state.persisted_boundary = CheckpointId::BACKFILL;
        state.reset_cursors(true);
        drop(state);
        tracing::info!(partition = %self.partition, role = %role, dropped = garbage.len(), "partition log cleared");
        drop(garbage);
    }

    pub fn role(&self) -> PartitionRole {
        self.lock().role
    }

    /// Change role without touching the log (e.g. replica promoted to active)
    pub fn set_role(&self, role: PartitionRole) {
        self.lock().role = role;
        tracing::info!(partition = %self.partition, role = %role, "partition role changed");
    }

    pub fn phase(&self) -> PartitionLogPhase {
        self.lock().phase()
    }

    /// Live entries across all checkpoints, markers included
    pub fn num_items(&self) -> usize {
        self.lock().num_items
    }

    pub fn num_open_items(&self) -> usize {
        self.lock().chain.open.num_items()
    }

    pub fn num_checkpoints(&self) -> usize {
        self.lock().chain.len()
    }

    /// Entries the persistence cursor has yet to write, markers excluded
    pub fn num_items_for_persistence(&self) -> usize {
        self.lock().num_items_for_persistence()
    }

    /// Entries a cursor has yet to read
    pub fn num_items_for_cursor(&self, name: &str) -> Option<usize> {
        let state = self.lock();
        state.cursors.get(name).map(|c| state.lag(c))
    }

    /// Id of the checkpoint a cursor currently sits in
    pub fn cursor_checkpoint_id(&self, name: &str) -> Option<CheckpointId> {
        let state = self.lock();
        let cursor = state.cursors.get(name)?;
        state.chain.find(cursor.checkpoint).map(Checkpoint::id)
    }

    /// Entries consumed from the head of the log by a cursor
    pub fn cursor_offset(&self, name: &str) -> Option<usize> {
        self.lock().cursors.get(name).map(|c| c.offset)
    }

    pub fn consumer_cursor_names(&self) -> Vec<String> {
        self.lock().cursors.consumers.keys().cloned().collect()
    }

    /// Sequence number of `key` inside checkpoint `id`, if both are present
    pub fn key_seqno_in(&self, id: CheckpointId, key: &str) -> Option<u64> {
        let state = self.lock();
        let seqno = state
            .chain
            .iter()
            .find(|cp| cp.id() == id)
            .and_then(|cp| cp.key_seqno(key));
        seqno
    }

    /// Checkpoint ids oldest first
    pub fn checkpoint_ids(&self) -> Vec<CheckpointId> {
        self.lock().chain.iter().map(Checkpoint::id).collect()
    }

    /// Live entries of checkpoint `id` in log order, placeholder excluded
    pub fn checkpoint_entries(&self, id: CheckpointId) -> Option<Vec<QueuedItem>> {
        let state = self.lock();
        let cp = state.chain.iter().find(|cp| cp.id() == id)?;
        Some(
            cp.entries()
                .filter(|e| e.op != QueueOp::Empty)
                .cloned()
                .collect(),
        )
    }

    pub fn persisted_boundary(&self) -> CheckpointId {
        self.lock().persisted_boundary
    }

    /// Bookkeeping bytes held by this partition's checkpoints
    pub fn memory_overhead(&self) -> usize {
        self.overhead.get()
    }
}

impl<C: Clock> fmt::Debug for CheckpointManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckpointManager")
            .field("partition", &self.partition)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
