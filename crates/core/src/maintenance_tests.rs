// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::checkpoint::{ConfigHandle, PartitionRole, QueueOp};
use crate::clock::FakeClock;

#[test]
fn config_default() {
    let config = MaintenanceConfig::default();
    assert_eq!(config.interval, Duration::from_secs(5));
}

#[test]
fn config_builder() {
    let config = MaintenanceConfig::new().with_interval(Duration::from_secs(30));
    assert_eq!(config.interval, Duration::from_secs(30));
}

#[test]
fn task_is_due_after_interval() {
    let clock = FakeClock::new();
    let task = MaintenanceTask::new(MaintenanceConfig::default(), clock.clone());
    assert!(task.is_due(None));

    let last = clock.now();
    assert!(!task.is_due(Some(last)));
    clock.advance(Duration::from_secs(5));
    assert!(task.is_due(Some(last)));
    assert_eq!(task.interval(), Duration::from_secs(5));
}

#[test]
fn tick_runs_every_partition() {
    let clock = FakeClock::new();
    let logs = PartitionLogs::with_clock(ConfigHandle::default(), clock.clone());
    for id in [1, 2] {
        let log = logs.get_or_create(PartitionId(id), PartitionRole::Active);
        log.append("k", QueueOp::Set, 1).unwrap();
    }
    logs.get_or_create(PartitionId(3), PartitionRole::Active);
    clock.advance(Duration::from_secs(10));

    let task = MaintenanceTask::new(MaintenanceConfig::default(), clock.clone());
    let summary = task.tick(&logs, MemoryPressure::Normal);

    assert_eq!(summary.partitions, 3);
    assert_eq!(summary.rollovers, 2);
    assert!(summary.failures.is_empty());
}

#[test]
fn tick_reports_reclaimed_items() {
    let clock = FakeClock::new();
    let logs = PartitionLogs::with_clock(ConfigHandle::default(), clock.clone());
    let log = logs.get_or_create(PartitionId(1), PartitionRole::Active);
    log.append("k", QueueOp::Set, 1).unwrap();
    log.force_rollover();
    log.get_all_items_for_persistence().unwrap();
    log.items_persisted();

    let task = MaintenanceTask::new(MaintenanceConfig::default(), clock);
    let summary = task.tick(&logs, MemoryPressure::Normal);

    assert_eq!(summary.checkpoints_removed, 1);
    assert_eq!(summary.items_reclaimed, 3);
    assert_eq!(log.num_checkpoints(), 1);
}

#[test]
fn tick_over_no_partitions_is_empty() {
    let logs = PartitionLogs::new(ConfigHandle::default());
    let task = MaintenanceTask::new(MaintenanceConfig::default(), FakeClock::new());
    assert_eq!(task.tick(&logs, MemoryPressure::High), MaintenanceSummary::default());
}
