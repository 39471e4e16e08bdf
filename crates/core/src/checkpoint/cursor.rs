// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named read positions into a partition log

use super::entry::QueuedItem;
use super::segment::{CheckpointHandle, SlotId};
use crate::id::PartitionId;
use std::collections::BTreeMap;

/// Reserved name of the disk write-back cursor
pub const PERSISTENCE_CURSOR: &str = "persistence";

/// Outcome of advancing a cursor by one entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CursorRead {
    Item {
        entry: QueuedItem,
        /// The entry is the last one before its checkpoint's end marker
        last_in_checkpoint: bool,
    },
    /// Caught up with the open checkpoint; more may arrive later
    EndOfLog,
    /// The partition is still backfilling; consumers must wait
    Backfilling,
    /// No cursor is registered under that name
    NotFound,
}

impl CursorRead {
    pub fn entry(&self) -> Option<&QueuedItem> {
        match self {
            CursorRead::Item { entry, .. } => Some(entry),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Cursor {
    pub(crate) name: String,
    pub(crate) checkpoint: CheckpointHandle,
    pub(crate) pos: SlotId,
    /// Entries consumed from the logical head of the log
    pub(crate) offset: usize,
}

impl Cursor {
    pub(crate) fn new(name: &str, checkpoint: CheckpointHandle, offset: usize) -> Self {
        Self {
            name: name.to_string(),
            checkpoint,
            pos: SlotId::PLACEHOLDER,
            offset,
        }
    }

    pub(crate) fn is_persistence(&self) -> bool {
        self.name == PERSISTENCE_CURSOR
    }

    /// Reduce the offset, clamping at zero
    pub(crate) fn decr_offset(&mut self, by: usize, partition: PartitionId) {
        if by > self.offset {
            tracing::warn!(
                partition = %partition,
                cursor = %self.name,
                offset = self.offset,
                by,
                "cursor offset would go negative, clamping to zero"
            );
        }
        self.offset = self.offset.saturating_sub(by);
    }
}

/// The persistence cursor plus every named consumer cursor
#[derive(Debug)]
pub(crate) struct Cursors {
    pub(crate) persistence: Cursor,
    pub(crate) consumers: BTreeMap<String, Cursor>,
}

impl Cursors {
    pub(crate) fn new(persistence: Cursor) -> Self {
        Self {
            persistence,
            consumers: BTreeMap::new(),
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Cursor> {
        if name == PERSISTENCE_CURSOR {
            Some(&self.persistence)
        } else {
            self.consumers.get(name)
        }
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Cursor> {
        if name == PERSISTENCE_CURSOR {
            Some(&mut self.persistence)
        } else {
            self.consumers.get_mut(name)
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Cursor> + '_ {
        std::iter::once(&self.persistence).chain(self.consumers.values())
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Cursor> + '_ {
        std::iter::once(&mut self.persistence).chain(self.consumers.values_mut())
    }

    pub(crate) fn len(&self) -> usize {
        self.consumers.len() + 1
    }
}
