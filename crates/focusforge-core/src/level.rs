//! Hybrid leveling curve.
//!
//! Maps a lifetime focus-session count to a level, title and
//! progress-to-next. The built-in table doubles through level 5
//! (0, 2, 4, 8, 16) and then grows arithmetically: the gap to the next
//! level is `10 + 5 * (level - 5)` for level >= 6, so level 6 sits at 31,
//! level 7 at 51, level 8 at 76 and so on, capped at level 100.
//!
//! An admin-supplied table overrides titles and thresholds but keeps the
//! same search rule: the current level is the highest tier whose threshold
//! is <= the lifetime count.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Hard cap bounding the threshold search.
pub const MAX_LEVEL: u32 = 100;

const DEFAULT_TITLES: [&str; 12] = [
    "Seedling",
    "Sprout",
    "Apprentice",
    "Adept",
    "Journeyman",
    "Craftsman",
    "Specialist",
    "Expert",
    "Veteran",
    "Master",
    "Grandmaster",
    "Sage",
];

/// One row of the level table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelTier {
    pub level: u32,
    pub title: String,
    /// Lifetime focus-session count at which this level starts.
    pub threshold: u64,
}

/// Resolved level information for a lifetime count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelInfo {
    pub level: u32,
    pub title: String,
    pub threshold_low: u64,
    /// Start of the next level; `None` at the table's top tier.
    pub threshold_high: Option<u64>,
    /// Sessions left until the next level (0 at the top tier).
    pub remaining: u64,
    /// Progress through the current level, clamped to [0, 100].
    pub progress_percent: f64,
}

/// Ordered level table with strictly increasing thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelCurve {
    tiers: Vec<LevelTier>,
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self::builtin()
    }
}

impl LevelCurve {
    /// The built-in piecewise table described in the module docs.
    pub fn builtin() -> Self {
        let mut tiers = Vec::with_capacity(MAX_LEVEL as usize);
        let mut threshold: u64 = 0;
        for level in 1..=MAX_LEVEL {
            tiers.push(LevelTier {
                level,
                title: builtin_title(level),
                threshold,
            });
            threshold += if level < 5 {
                // Doubling phase: 0, 2, 4, 8, 16.
                if level == 1 { 2 } else { threshold }
            } else {
                10 + 5 * (level as u64 + 1 - 5)
            };
        }
        Self { tiers }
    }

    /// Build a curve from an admin-supplied table.
    ///
    /// # Errors
    /// Rejects empty tables, a first tier that is not level 1 at
    /// threshold 0, and any non-increasing level number or threshold.
    pub fn from_tiers(tiers: Vec<LevelTier>) -> Result<Self, ConfigError> {
        let first = tiers.first().ok_or_else(|| {
            ConfigError::InvalidLevelTable("table must not be empty".to_string())
        })?;
        if first.level != 1 || first.threshold != 0 {
            return Err(ConfigError::InvalidLevelTable(
                "table must start at level 1 with threshold 0".to_string(),
            ));
        }
        for pair in tiers.windows(2) {
            if pair[1].level <= pair[0].level {
                return Err(ConfigError::InvalidLevelTable(format!(
                    "level numbers must increase (saw {} after {})",
                    pair[1].level, pair[0].level
                )));
            }
            if pair[1].threshold <= pair[0].threshold {
                return Err(ConfigError::InvalidLevelTable(format!(
                    "thresholds must strictly increase (saw {} after {})",
                    pair[1].threshold, pair[0].threshold
                )));
            }
        }
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[LevelTier] {
        &self.tiers
    }

    /// Resolve the level for a lifetime focus-session count: the highest
    /// tier whose threshold is <= `lifetime_count`.
    pub fn level_for(&self, lifetime_count: u64) -> LevelInfo {
        let idx = self
            .tiers
            .iter()
            .rposition(|t| t.threshold <= lifetime_count)
            .unwrap_or(0);
        let tier = &self.tiers[idx];
        let next = self.tiers.get(idx + 1);

        match next {
            Some(next) => {
                let span = next.threshold - tier.threshold;
                let into = lifetime_count - tier.threshold;
                let percent = (into as f64 / span as f64 * 100.0).clamp(0.0, 100.0);
                LevelInfo {
                    level: tier.level,
                    title: tier.title.clone(),
                    threshold_low: tier.threshold,
                    threshold_high: Some(next.threshold),
                    remaining: next.threshold - lifetime_count,
                    progress_percent: percent,
                }
            }
            // Top tier: progress is pinned.
            None => LevelInfo {
                level: tier.level,
                title: tier.title.clone(),
                threshold_low: tier.threshold,
                threshold_high: None,
                remaining: 0,
                progress_percent: 100.0,
            },
        }
    }
}

fn builtin_title(level: u32) -> String {
    let idx = ((level - 1) as usize).min(DEFAULT_TITLES.len() - 1);
    DEFAULT_TITLES[idx].to_string()
}
