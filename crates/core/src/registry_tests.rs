// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::checkpoint::QueueOp;
use crate::id::CheckpointId;

#[test]
fn get_or_create_returns_the_same_log() {
    let logs = PartitionLogs::new(ConfigHandle::default());
    let first = logs.get_or_create(PartitionId(1), PartitionRole::Active);
    let second = logs.get_or_create(PartitionId(1), PartitionRole::Replica);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.role(), PartitionRole::Active);
    assert_eq!(logs.len(), 1);
}

#[test]
fn partitions_are_independent() {
    let logs = PartitionLogs::new(ConfigHandle::default());
    let one = logs.get_or_create(PartitionId(1), PartitionRole::Active);
    let two = logs.get_or_create(PartitionId(2), PartitionRole::Active);
    one.append("k", QueueOp::Set, 1).unwrap();

    assert_eq!(one.num_open_items(), 1);
    assert_eq!(two.num_open_items(), 0);
    assert_eq!(two.append("k", QueueOp::Set, 1).unwrap().seqno, 3);
}

#[test]
fn ids_are_listed_in_order() {
    let logs = PartitionLogs::new(ConfigHandle::default());
    for id in [9, 3, 5] {
        logs.get_or_create(PartitionId(id), PartitionRole::Active);
    }
    assert_eq!(
        logs.partition_ids(),
        vec![PartitionId(3), PartitionId(5), PartitionId(9)]
    );
}

#[test]
fn remove_drops_the_partition() {
    let logs = PartitionLogs::new(ConfigHandle::default());
    logs.get_or_create(PartitionId(1), PartitionRole::Active);
    assert!(logs.remove(PartitionId(1)).is_some());
    assert!(logs.remove(PartitionId(1)).is_none());
    assert!(logs.get(PartitionId(1)).is_none());
    assert!(logs.is_empty());
}

#[test]
fn config_changes_reach_every_partition() {
    let logs = PartitionLogs::new(ConfigHandle::default());
    let log = logs.get_or_create(PartitionId(1), PartitionRole::Active);
    logs.config().apply_setting("chk_max_items", "1").unwrap();

    log.append("a", QueueOp::Set, 1).unwrap();
    log.append("b", QueueOp::Set, 1).unwrap();
    assert_eq!(log.checkpoint_ids(), vec![CheckpointId(1), CheckpointId(2)]);
}

#[test]
fn stats_cover_every_partition() {
    let logs = PartitionLogs::new(ConfigHandle::default());
    logs.get_or_create(PartitionId(4), PartitionRole::Active);
    logs.get_or_create(PartitionId(8), PartitionRole::Replica);
    let stats = logs.stats();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[1].role, PartitionRole::Replica);
}
