// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic maintenance across partition logs
//!
//! Runs rollover, garbage collection and merging on every registered
//! partition. Scheduling the ticks is left to the caller.

use crate::checkpoint::MemoryPressure;
use crate::clock::Clock;
use crate::id::PartitionId;
use crate::registry::PartitionLogs;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Configuration for maintenance task
#[derive(Clone, Debug)]
pub struct MaintenanceConfig {
    /// How often to run maintenance
    pub interval: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

impl MaintenanceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Totals from one maintenance cycle
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceSummary {
    pub partitions: usize,
    pub items_reclaimed: usize,
    pub checkpoints_removed: usize,
    pub checkpoints_merged: usize,
    pub rollovers: usize,
    /// Partitions whose pass failed, with the error
    pub failures: Vec<(PartitionId, String)>,
}

pub struct MaintenanceTask<C: Clock> {
    config: MaintenanceConfig,
    clock: C,
}

impl<C: Clock> MaintenanceTask<C> {
    pub fn new(config: MaintenanceConfig, clock: C) -> Self {
        Self { config, clock }
    }

    /// Run a single maintenance cycle over every partition.
    ///
    /// A failing partition is logged and recorded; the others still run.
    pub fn tick<L: Clock>(&self, logs: &PartitionLogs<L>, pressure: MemoryPressure) -> MaintenanceSummary {
        let mut summary = MaintenanceSummary::default();
        for log in logs.logs() {
            summary.partitions += 1;
            match log.run_maintenance(pressure) {
                Ok(report) => {
                    summary.items_reclaimed += report.items_reclaimed;
                    summary.checkpoints_removed += report.checkpoints_removed;
                    summary.checkpoints_merged += report.checkpoints_merged;
                    summary.rollovers += usize::from(report.rolled_over_from.is_some());
                }
                Err(e) => {
                    tracing::error!(partition = %log.partition(), error = %e, "maintenance failed");
                    summary.failures.push((log.partition(), e.to_string()));
                }
            }
        }
        tracing::debug!(
            partitions = summary.partitions,
            reclaimed = summary.items_reclaimed,
            merged = summary.checkpoints_merged,
            "maintenance cycle complete"
        );
        summary
    }

    /// Whether a cycle is due given when the last one ran
    pub fn is_due(&self, last_run: Option<Instant>) -> bool {
        last_run.map_or(true, |at| self.clock.elapsed_since(at) >= self.config.interval)
    }

    /// Get the maintenance interval
    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// Get the clock reference
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

#[cfg(test)]
#[path = "maintenance_tests.rs"]
mod tests;
