// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replay command
//!
//! Runs a scripted workload against one partition log on a fake clock, so the
//! same script always produces the same log. Scripts are JSON lines, one
//! operation per line; blank lines and `#` comments are skipped.
//!
//! ```text
//! {"op": "register", "cursor": "replicator", "checkpoint": 1}
//! {"op": "set", "key": "user::1", "rev": 4}
//! {"op": "advance", "secs": 6}
//! {"op": "maintain", "pressure": "high"}
//! {"op": "read", "cursor": "replicator"}
//! ```

use super::config::build_handle;
use crate::output::{self, OutputFormat};
use anyhow::{bail, Context};
use chklog_core::{
    CheckpointId, CheckpointManager, CheckpointStats, ConfigHandle, CursorRead, FakeClock,
    MemoryPressure, PartitionId, PartitionRole, QueueOp,
};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Args)]
pub struct ReplayArgs {
    /// Workload script (JSON lines)
    pub script: PathBuf,
    /// Checkpoint config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Override a setting, e.g. --set chk_max_items=100
    #[arg(long = "set", value_parser = super::parse_key_value)]
    pub settings: Vec<(String, String)>,
    /// Partition number
    #[arg(long, default_value_t = 0)]
    pub partition: u16,
    /// Role of this copy of the partition
    #[arg(long, value_enum, default_value_t = RoleArg::Active)]
    pub role: RoleArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Active,
    Replica,
}

impl From<RoleArg> for PartitionRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Active => PartitionRole::Active,
            RoleArg::Replica => PartitionRole::Replica,
        }
    }
}

fn default_rev() -> u64 {
    1
}

/// One line of a workload script
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptOp {
    Set {
        key: String,
        #[serde(default = "default_rev")]
        rev: u64,
    },
    Delete {
        key: String,
        #[serde(default = "default_rev")]
        rev: u64,
    },
    Register {
        cursor: String,
        #[serde(default)]
        checkpoint: CheckpointId,
        #[serde(default)]
        from_beginning: bool,
    },
    Remove {
        cursor: String,
    },
    /// Read up to `count` entries, or until the cursor is caught up
    Read {
        cursor: String,
        count: Option<usize>,
    },
    /// Drain the persistence cursor and record the persisted boundary
    Persist,
    Rollover,
    Close {
        checkpoint: CheckpointId,
    },
    Maintain {
        #[serde(default)]
        pressure: MemoryPressure,
    },
    /// Upstream announced the start of a checkpoint
    Upstream {
        checkpoint: CheckpointId,
    },
    Advance {
        secs: u64,
    },
    Setting {
        key: String,
        value: String,
    },
}

pub fn parse_script(content: &str) -> anyhow::Result<Vec<ScriptOp>> {
    let mut ops = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let op = serde_json::from_str(line).with_context(|| format!("line {}", idx + 1))?;
        ops.push(op);
    }
    Ok(ops)
}

/// An entry delivered to a cursor during replay
#[derive(Debug, Clone, Serialize)]
pub struct ReadRecord {
    pub cursor: String,
    pub seqno: u64,
    pub op: QueueOp,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<CheckpointId>,
}

impl fmt::Display for ReadRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.checkpoint {
            Some(id) => write!(f, "{}: #{} {} {}", self.cursor, self.seqno, self.op, id),
            None => write!(f, "{}: #{} {} {}", self.cursor, self.seqno, self.op, self.key),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub ops: usize,
    pub reads: Vec<ReadRecord>,
    /// Entries handed to the persistence cursor, markers included
    pub persisted: usize,
    pub items_reclaimed: usize,
    pub checkpoints_merged: usize,
    pub stats: CheckpointStats,
}

impl fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "replayed {} ops", self.ops)?;
        for read in &self.reads {
            writeln!(f, "{read}")?;
        }
        writeln!(f, "persisted {} entries", self.persisted)?;
        writeln!(
            f,
            "reclaimed {} entries, merged {} checkpoints",
            self.items_reclaimed, self.checkpoints_merged
        )?;
        write!(f, "{}", self.stats)
    }
}

pub fn handle(args: ReplayArgs, format: OutputFormat) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&args.script)
        .with_context(|| format!("cannot read script {}", args.script.display()))?;
    let ops = parse_script(&content)
        .with_context(|| format!("invalid script {}", args.script.display()))?;
    let config = build_handle(args.config.as_deref(), &args.settings)?;
    let report = replay(
        &ops,
        PartitionId(args.partition),
        args.role.into(),
        config,
    )?;
    output::print(&report, format)
}

pub fn replay(
    ops: &[ScriptOp],
    partition: PartitionId,
    role: PartitionRole,
    config: ConfigHandle,
) -> anyhow::Result<ReplayReport> {
    let clock = FakeClock::new();
    let log = CheckpointManager::with_clock(partition, role, config.clone(), clock.clone());
    let mut reads = Vec::new();
    let mut persisted = 0;
    let mut items_reclaimed = 0;
    let mut checkpoints_merged = 0;

    for (idx, op) in ops.iter().enumerate() {
        let step = idx + 1;
        tracing::debug!(step, ?op, "replaying");
        match op {
            ScriptOp::Set { key, rev } => {
                log.append(key, QueueOp::Set, *rev)
                    .with_context(|| format!("op {step}"))?;
            }
            ScriptOp::Delete { key, rev } => {
                log.append(key, QueueOp::Delete, *rev)
                    .with_context(|| format!("op {step}"))?;
            }
            ScriptOp::Register {
                cursor,
                checkpoint,
                from_beginning,
            } => {
                let found = log
                    .register_consumer_cursor(cursor, *checkpoint, *from_beginning)
                    .with_context(|| format!("op {step}"))?;
                if !found {
                    tracing::warn!(cursor = %cursor, checkpoint = %checkpoint, "checkpoint not in memory, cursor placed at fallback");
                }
            }
            ScriptOp::Remove { cursor } => {
                if !log.remove_consumer_cursor(cursor) {
                    bail!("op {step}: cursor {cursor} is not registered");
                }
            }
            ScriptOp::Read { cursor, count } => {
                let limit = count.unwrap_or(usize::MAX);
                let mut taken = 0;
                while taken < limit {
                    match log.advance(cursor).with_context(|| format!("op {step}"))? {
                        CursorRead::Item { entry, .. } => {
                            reads.push(ReadRecord {
                                cursor: cursor.clone(),
                                seqno: entry.by_seqno,
                                op: entry.op,
                                key: entry.key.clone(),
                                checkpoint: entry.checkpoint_id(),
                            });
                            taken += 1;
                        }
                        CursorRead::EndOfLog | CursorRead::Backfilling => break,
                        CursorRead::NotFound => bail!("op {step}: cursor {cursor} is not registered"),
                    }
                }
            }
            ScriptOp::Persist => {
                persisted += log
                    .get_all_items_for_persistence()
                    .with_context(|| format!("op {step}"))?
                    .len();
                log.items_persisted();
            }
            ScriptOp::Rollover => {
                log.force_rollover();
            }
            ScriptOp::Close { checkpoint } => {
                log.close_open_checkpoint(*checkpoint)
                    .with_context(|| format!("op {step}"))?;
            }
            ScriptOp::Maintain { pressure } => {
                let report = log
                    .run_maintenance(*pressure)
                    .with_context(|| format!("op {step}"))?;
                items_reclaimed += report.items_reclaimed;
                checkpoints_merged += report.checkpoints_merged;
            }
            ScriptOp::Upstream { checkpoint } => {
                log.on_upstream_checkpoint_boundary(*checkpoint)
                    .with_context(|| format!("op {step}"))?;
            }
            ScriptOp::Advance { secs } => clock.advance(Duration::from_secs(*secs)),
            ScriptOp::Setting { key, value } => {
                config
                    .apply_setting(key, value)
                    .with_context(|| format!("op {step}: rejected setting {key}={value}"))?;
            }
        }
    }

    Ok(ReplayReport {
        ops: ops.len(),
        reads,
        persisted,
        items_reclaimed,
        checkpoints_merged,
        stats: log.stats(),
    })
}

#[cfg(test)]
#[path = "replay_tests.rs"]
mod tests;
