//! TOML-based engine configuration.
//!
//! Policy constants live here rather than in code: the weekly-streak
//! threshold, the fitness decay/weight/window and the sync retry policy
//! are all tunable. Stored at `~/.config/focusforge/config.toml`.

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::fitness::FitnessConfig;

/// Streak policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreakConfig {
    /// Focus sessions a week needs before it counts toward the weekly
    /// streak.
    #[serde(default = "default_weekly_threshold")]
    pub weekly_threshold: u32,
}

fn default_weekly_threshold() -> u32 {
    5
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self {
            weekly_threshold: default_weekly_threshold(),
        }
    }
}

/// Sync retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Attempts per session before giving up and leaving it pending.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Initial backoff in milliseconds; doubles per attempt.
    #[serde(default = "default_backoff_ms")]
    pub base_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    200
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_backoff_ms(),
        }
    }
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/focusforge/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub streak: StreakConfig,
    #[serde(default)]
    pub fitness: FitnessConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    fn path() -> Result<std::path::PathBuf, Box<dyn std::error::Error>> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content)?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(Self::path()?, content)?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Check the value invariants. Runs before any persisted write and
    /// on load, so an out-of-range value is rejected rather than coerced.
    ///
    /// # Errors
    /// Returns an error naming the first invalid key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.streak.weekly_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                key: "streak.weekly_threshold".to_string(),
                message: "must be >= 1".to_string(),
            });
        }
        if !(self.fitness.decay > 0.0 && self.fitness.decay <= 1.0) {
            return Err(ConfigError::InvalidValue {
                key: "fitness.decay".to_string(),
                message: "must be within (0, 1]".to_string(),
            });
        }
        if self.fitness.window_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "fitness.window_days".to_string(),
                message: "must be >= 1".to_string(),
            });
        }
        if self.sync.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "sync.max_attempts".to_string(),
                message: "must be >= 1".to_string(),
            });
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = key.split('.').try_fold(&json, |node, part| node.get(part))?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key and persist.
    ///
    /// # Errors
    /// Returns an error if the key is unknown, the value does not parse
    /// into the field's type or fails validation, or the config cannot
    /// be saved. Nothing is written on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
        let mut json = serde_json::to_value(&*self)?;
        let mut node = &mut json;
        let mut parts = key.split('.').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let slot = node
                    .get_mut(part)
                    .ok_or_else(|| format!("unknown config key '{key}'"))?;
                *slot = parse_scalar(value);
            } else {
                node = node
                    .get_mut(part)
                    .ok_or_else(|| format!("unknown config key '{key}'"))?;
            }
        }
        let candidate: Config = serde_json::from_value(json)?;
        candidate.validate()?;
        *self = candidate;
        self.save()?;
        Ok(())
    }
}

fn parse_scalar(value: &str) -> serde_json::Value {
    if let Ok(b) = value.parse::<bool>() {
        return serde_json::Value::Bool(b);
    }
    if let Ok(n) = value.parse::<u64>() {
        return serde_json::Value::Number(n.into());
    }
    if let Ok(f) = value.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return serde_json::Value::Number(n);
        }
    }
    serde_json::Value::String(value.to_string())
}
