// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::checkpoint::{
    ConfigHandle, CursorRead, PartitionLogPhase, PartitionRole, QueueOp, PERSISTENCE_CURSOR,
};
use crate::id::PartitionId;

fn replica() -> CheckpointManager {
    CheckpointManager::new(PartitionId(7), PartitionRole::Replica, ConfigHandle::default())
}

fn streaming_at(id: u64) -> CheckpointManager {
    let manager = replica();
    manager.on_upstream_checkpoint_boundary(CheckpointId(id)).unwrap();
    manager
}

fn set(manager: &CheckpointManager, key: &str) {
    manager.append(key, QueueOp::Set, 1).unwrap();
}

fn read_labels(manager: &CheckpointManager, name: &str, limit: usize) -> Vec<String> {
    let mut labels = Vec::new();
    while labels.len() < limit {
        let CursorRead::Item { entry, .. } = manager.advance(name).unwrap() else {
            break;
        };
        labels.push(match entry.op {
            QueueOp::CheckpointStart => format!("start:{}", entry.checkpoint_id().unwrap_or_default()),
            QueueOp::CheckpointEnd => format!("end:{}", entry.checkpoint_id().unwrap_or_default()),
            _ => entry.key.clone(),
        });
    }
    labels
}

#[test]
fn first_boundary_ends_backfill_and_relabels_the_open_checkpoint() {
    let manager = replica();
    manager.register_consumer_cursor("r", CheckpointId::BACKFILL, false).unwrap();
    set(&manager, "a");
    set(&manager, "b");

    manager.on_upstream_checkpoint_boundary(CheckpointId(10)).unwrap();

    assert_eq!(manager.phase(), PartitionLogPhase::Streaming(CheckpointId(10)));
    assert_eq!(manager.checkpoint_ids(), vec![CheckpointId(10)]);
    assert_eq!(read_labels(&manager, "r", usize::MAX), vec!["start:10", "a", "b"]);
}

#[test]
fn backfill_boundary_is_ignored() {
    let manager = replica();
    manager.on_upstream_checkpoint_boundary(CheckpointId::BACKFILL).unwrap();
    assert_eq!(manager.phase(), PartitionLogPhase::Backfilling);
}

#[test]
fn consecutive_boundary_rolls_over() {
    let manager = streaming_at(10);
    set(&manager, "a");
    manager.on_upstream_checkpoint_boundary(CheckpointId(11)).unwrap();

    assert_eq!(manager.checkpoint_ids(), vec![CheckpointId(10), CheckpointId(11)]);
    assert_eq!(manager.last_closed_checkpoint_id(), CheckpointId(10));
}

#[test]
fn gap_in_boundaries_rolls_over_to_the_upstream_id() {
    let manager = streaming_at(10);
    set(&manager, "a");
    manager.on_upstream_checkpoint_boundary(CheckpointId(15)).unwrap();

    assert_eq!(manager.checkpoint_ids(), vec![CheckpointId(10), CheckpointId(15)]);
    assert_eq!(manager.open_checkpoint_id(), CheckpointId(15));
    assert_eq!(manager.last_closed_checkpoint_id(), CheckpointId(10));
}

#[test]
fn empty_open_checkpoint_is_relabeled_instead_of_closed() {
    let manager = streaming_at(10);
    manager.register_consumer_cursor("r", CheckpointId(10), false).unwrap();
    assert_eq!(read_labels(&manager, "r", usize::MAX), vec!["start:10"]);

    manager.on_upstream_checkpoint_boundary(CheckpointId(15)).unwrap();

    assert_eq!(manager.checkpoint_ids(), vec![CheckpointId(15)]);
    assert_eq!(manager.last_closed_checkpoint_id(), CheckpointId(9));
    assert_eq!(manager.cursor_offset("r"), Some(0));
    assert_eq!(read_labels(&manager, "r", usize::MAX), vec!["start:15"]);
}

#[test]
fn relabeled_start_marker_is_redelivered_with_a_new_seqno() {
    let manager = streaming_at(10);
    manager.register_consumer_cursor("r", CheckpointId(10), false).unwrap();
    let next_seqno = |manager: &CheckpointManager| match manager.advance("r").unwrap() {
        CursorRead::Item { entry, .. } => entry.by_seqno,
        other => panic!("expected an entry, got {other:?}"),
    };
    let first = next_seqno(&manager);

    manager.on_upstream_checkpoint_boundary(CheckpointId(11)).unwrap();
    let second = next_seqno(&manager);
    assert!(second > first, "{second} <= {first}");

    set(&manager, "a");
    assert!(next_seqno(&manager) > second);
}

#[test]
fn earlier_boundary_collapses_local_checkpoints_into_the_open_one() {
    let manager = streaming_at(10);
    manager.register_consumer_cursor("r", CheckpointId(10), false).unwrap();
    set(&manager, "a");
    set(&manager, "b");
    manager.on_upstream_checkpoint_boundary(CheckpointId(11)).unwrap();
    assert_eq!(read_labels(&manager, "r", 4), vec!["start:10", "a", "b", "end:10"]);
    set(&manager, "a");
    set(&manager, "c");
    assert_eq!(manager.num_items(), 7);

    manager.on_upstream_checkpoint_boundary(CheckpointId(10)).unwrap();

    assert_eq!(manager.checkpoint_ids(), vec![CheckpointId(10)]);
    assert_eq!(manager.num_items(), 4);
    assert_eq!(manager.num_open_items(), 3);
    assert_eq!(manager.cursor_offset("r"), Some(2));
    assert_eq!(read_labels(&manager, "r", usize::MAX), vec!["a", "c"]);
    assert_eq!(manager.num_items_for_cursor("r"), Some(0));

    let drained = manager.get_all_items_for_persistence().unwrap();
    let keys: Vec<&str> = drained
        .iter()
        .filter(|e| e.is_mutation())
        .map(|e| e.key.as_str())
        .collect();
    assert_eq!(keys, vec!["b", "a", "c"]);
    assert_eq!(manager.cursor_checkpoint_id(PERSISTENCE_CURSOR), Some(CheckpointId(10)));
}

#[test]
fn repeated_boundary_for_the_open_checkpoint_changes_nothing() {
    let manager = streaming_at(10);
    set(&manager, "a");
    manager.on_upstream_checkpoint_boundary(CheckpointId(10)).unwrap();

    assert_eq!(manager.checkpoint_ids(), vec![CheckpointId(10)]);
    assert_eq!(manager.num_open_items(), 1);
    assert_eq!(manager.num_items(), 2);
}
