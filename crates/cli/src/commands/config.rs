// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config commands

use crate::output::{self, OutputFormat};
use anyhow::Context;
use chklog_core::{CheckpointConfig, ConfigHandle};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Validate a TOML config file and print the effective settings
    Check {
        /// Config file
        file: PathBuf,
    },
    /// Print the effective settings, starting from the defaults
    Show {
        /// Override a setting, e.g. --set chk_max_items=100
        #[arg(long = "set", value_parser = super::parse_key_value)]
        settings: Vec<(String, String)>,
    },
}

/// Effective settings, keyed by their runtime setting names
#[derive(Serialize)]
struct ConfigInfo {
    chk_period: u64,
    chk_max_items: usize,
    max_checkpoints: usize,
    item_num_based_new_chk: bool,
    keep_closed_chks: bool,
}

impl From<&CheckpointConfig> for ConfigInfo {
    fn from(config: &CheckpointConfig) -> Self {
        Self {
            chk_period: config.period().as_secs(),
            chk_max_items: config.max_items(),
            max_checkpoints: config.max_checkpoints(),
            item_num_based_new_chk: config.item_num_based_new_checkpoint(),
            keep_closed_chks: config.keep_closed_checkpoints(),
        }
    }
}

impl fmt::Display for ConfigInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "chk_period {}", self.chk_period)?;
        writeln!(f, "chk_max_items {}", self.chk_max_items)?;
        writeln!(f, "max_checkpoints {}", self.max_checkpoints)?;
        writeln!(f, "item_num_based_new_chk {}", self.item_num_based_new_chk)?;
        writeln!(f, "keep_closed_chks {}", self.keep_closed_chks)
    }
}

pub fn handle(command: ConfigCommand, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Check { file } => {
            let config = load(&file)?;
            output::print(&ConfigInfo::from(&config), format)
        }
        ConfigCommand::Show { settings } => {
            let handle = build_handle(None, &settings)?;
            output::print(&ConfigInfo::from(&handle.snapshot()), format)
        }
    }
}

pub fn load(path: &Path) -> anyhow::Result<CheckpointConfig> {
    CheckpointConfig::load(path).with_context(|| format!("invalid config file {}", path.display()))
}

/// Config from an optional file, then `key=value` overrides applied in order
pub fn build_handle(
    file: Option<&Path>,
    settings: &[(String, String)],
) -> anyhow::Result<ConfigHandle> {
    let base = match file {
        Some(path) => load(path)?,
        None => CheckpointConfig::default(),
    };
    let handle = ConfigHandle::new(base);
    for (key, value) in settings {
        handle
            .apply_setting(key, value)
            .with_context(|| format!("rejected setting {key}={value}"))?;
    }
    Ok(handle)
}
