// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint rollover and retention policy
//!
//! Every tunable is range-checked. A rejected value leaves the previous one in
//! place, both for individual setters and for [`ConfigHandle::apply_setting`].

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

const PERIOD_SECS: RangeInclusive<u64> = 1..=3600;
const MAX_ITEMS: RangeInclusive<usize> = 1..=50_000;
const MAX_CHECKPOINTS: RangeInclusive<usize> = 2..=5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{setting} value {value} is outside {min}..={max}")]
    OutOfRange {
        setting: &'static str,
        value: String,
        min: String,
        max: String,
    },
    #[error("unknown setting: {0}")]
    UnknownSetting(String),
    #[error("invalid value {value:?} for {setting}: {reason}")]
    InvalidValue {
        setting: String,
        value: String,
        reason: String,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// On-disk shape, validated into [`CheckpointConfig`]
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    #[serde(with = "humantime_serde")]
    period: Duration,
    max_items: usize,
    max_checkpoints: usize,
    item_num_based_new_checkpoint: bool,
    keep_closed_checkpoints: bool,
}

impl Default for RawConfig {
    fn default() -> Self {
        let defaults = CheckpointConfig::default();
        Self {
            period: defaults.period,
            max_items: defaults.max_items,
            max_checkpoints: defaults.max_checkpoints,
            item_num_based_new_checkpoint: defaults.item_num_based_new_checkpoint,
            keep_closed_checkpoints: defaults.keep_closed_checkpoints,
        }
    }
}

/// Runtime policy for one or more partition logs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawConfig")]
pub struct CheckpointConfig {
    /// Age after which a non-empty open checkpoint is rolled over
    #[serde(with = "humantime_serde")]
    period: Duration,
    /// Item count at which the open checkpoint is rolled over
    max_items: usize,
    /// Checkpoints retained before closed ones are merged
    max_checkpoints: usize,
    item_num_based_new_checkpoint: bool,
    keep_closed_checkpoints: bool,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(5),
            max_items: 5000,
            max_checkpoints: 2,
            item_num_based_new_checkpoint: true,
            keep_closed_checkpoints: false,
        }
    }
}

impl TryFrom<RawConfig> for CheckpointConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let mut config = CheckpointConfig::default();
        config.set_period(raw.period)?;
        config.set_max_items(raw.max_items)?;
        config.set_max_checkpoints(raw.max_checkpoints)?;
        config.set_item_num_based_new_checkpoint(raw.item_num_based_new_checkpoint);
        config.set_keep_closed_checkpoints(raw.keep_closed_checkpoints);
        Ok(config)
    }
}

impl CheckpointConfig {
    /// Parse and validate a TOML document; any bad field rejects the whole document
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    pub fn max_checkpoints(&self) -> usize {
        self.max_checkpoints
    }

    pub fn item_num_based_new_checkpoint(&self) -> bool {
        self.item_num_based_new_checkpoint
    }

    pub fn keep_closed_checkpoints(&self) -> bool {
        self.keep_closed_checkpoints
    }

    pub fn set_period(&mut self, period: Duration) -> Result<(), ConfigError> {
        let secs = period.as_secs();
        if period.subsec_nanos() != 0 || !PERIOD_SECS.contains(&secs) {
            return Err(out_of_range(
                "chk_period",
                humantime::format_duration(period),
                &PERIOD_SECS,
            ));
        }
        self.period = period;
        Ok(())
    }

    pub fn set_max_items(&mut self, max_items: usize) -> Result<(), ConfigError> {
        if !MAX_ITEMS.contains(&max_items) {
            return Err(out_of_range("chk_max_items", max_items, &MAX_ITEMS));
        }
        self.max_items = max_items;
        Ok(())
    }

    pub fn set_max_checkpoints(&mut self, max_checkpoints: usize) -> Result<(), ConfigError> {
        if !MAX_CHECKPOINTS.contains(&max_checkpoints) {
            return Err(out_of_range(
                "max_checkpoints",
                max_checkpoints,
                &MAX_CHECKPOINTS,
            ));
        }
        self.max_checkpoints = max_checkpoints;
        Ok(())
    }

    pub fn set_item_num_based_new_checkpoint(&mut self, enabled: bool) {
        self.item_num_based_new_checkpoint = enabled;
    }

    pub fn set_keep_closed_checkpoints(&mut self, keep: bool) {
        self.keep_closed_checkpoints = keep;
    }

    /// Apply one runtime setting by its listener key
    pub fn apply_setting(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "chk_period" => self.set_period(parse_period(value)?),
            "chk_max_items" => self.set_max_items(parse_value(key, value)?),
            "max_checkpoints" => self.set_max_checkpoints(parse_value(key, value)?),
            "item_num_based_new_chk" => {
                self.set_item_num_based_new_checkpoint(parse_value(key, value)?);
                Ok(())
            }
            "keep_closed_chks" => {
                self.set_keep_closed_checkpoints(parse_value(key, value)?);
                Ok(())
            }
            other => Err(ConfigError::UnknownSetting(other.to_string())),
        }
    }
}

fn out_of_range<T: std::fmt::Display>(
    setting: &'static str,
    value: impl std::fmt::Display,
    range: &RangeInclusive<T>,
) -> ConfigError {
    ConfigError::OutOfRange {
        setting,
        value: value.to_string(),
        min: range.start().to_string(),
        max: range.end().to_string(),
    }
}

fn parse_value<T>(setting: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            setting: setting.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Bare numbers are seconds; anything else goes through humantime ("90s", "2m")
fn parse_period(value: &str) -> Result<Duration, ConfigError> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(value).map_err(|e| ConfigError::InvalidValue {
        setting: "chk_period".to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Shared, lock-guarded configuration observed by every partition log
#[derive(Clone, Debug, Default)]
pub struct ConfigHandle {
    inner: Arc<Mutex<CheckpointConfig>>,
}

impl ConfigHandle {
    pub fn new(config: CheckpointConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(config)),
        }
    }

    /// Copy of the current configuration
    pub fn snapshot(&self) -> CheckpointConfig {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Apply a change atomically. On error the previous configuration is kept.
    pub fn update(
        &self,
        change: impl FnOnce(&mut CheckpointConfig) -> Result<(), ConfigError>,
    ) -> Result<(), ConfigError> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut candidate = guard.clone();
        match change(&mut candidate) {
            Ok(()) => {
                *guard = candidate;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "rejected checkpoint config change");
                Err(e)
            }
        }
    }

    pub fn apply_setting(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.update(|config| config.apply_setting(key, value))?;
        tracing::info!(setting = key, value, "checkpoint config updated");
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
