//! Focus fitness score: an exponential moving average of daily activity.
//!
//! Each day carries forward `score_prev * decay + sessions_that_day *
//! weight`. The decay applies on every day, including days with zero
//! sessions, and the unrounded running value is carried between days so
//! rounding never compounds. Only the per-day display value is rounded.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::day_of;
use crate::session::Session;

/// Tunables for the fitness series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessConfig {
    /// Per-day decay factor applied to the previous day's score.
    #[serde(default = "default_decay")]
    pub decay: f64,
    /// Score contribution of one focus session.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Number of trailing days in the emitted series.
    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

fn default_decay() -> f64 {
    0.95
}
fn default_weight() -> f64 {
    10.0
}
fn default_window_days() -> u32 {
    90
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            decay: default_decay(),
            weight: default_weight(),
            window_days: default_window_days(),
        }
    }
}

/// One day of the fitness time series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitnessPoint {
    /// Canonical day key (`YYYY-MM-DD`).
    pub day: String,
    /// Rounded display score for the day.
    pub score: i64,
}

/// Compute the fitness series for the trailing window ending at `now`.
///
/// Sessions older than the window still prime the running value: the scan
/// starts at the earliest focus session (or the window start, whichever is
/// earlier is irrelevant -- whichever is *older*) and only the trailing
/// `window_days` days are emitted.
pub fn fitness_series(
    sessions: &[Session],
    now: DateTime<Utc>,
    config: &FitnessConfig,
) -> Vec<FitnessPoint> {
    let today = day_of(now);
    let window_start = today - Duration::days(i64::from(config.window_days.saturating_sub(1)));

    let mut per_day: HashMap<NaiveDate, u32> = HashMap::new();
    let mut earliest: Option<NaiveDate> = None;
    for s in sessions.iter().filter(|s| s.is_focus()) {
        let day = day_of(s.completed_at);
        if day > today {
            continue;
        }
        *per_day.entry(day).or_insert(0) += 1;
        earliest = Some(match earliest {
            Some(e) if e <= day => e,
            _ => day,
        });
    }

    let scan_start = match earliest {
        Some(e) if e < window_start => e,
        _ => window_start,
    };

    let mut series = Vec::with_capacity(config.window_days as usize);
    let mut running = 0.0f64;
    let mut cursor = scan_start;
    while cursor <= today {
        let count = per_day.get(&cursor).copied().unwrap_or(0);
        running = running * config.decay + f64::from(count) * config.weight;
        if cursor >= window_start {
            series.push(FitnessPoint {
                day: cursor.format(crate::calendar::DAY_KEY_FORMAT).to_string(),
                score: running.round() as i64,
            });
        }
        cursor += Duration::days(1);
    }
    series
}

/// Convenience: the score for `now`'s day, 0 with no history.
pub fn current_score(sessions: &[Session], now: DateTime<Utc>, config: &FitnessConfig) -> i64 {
    fitness_series(sessions, now, config)
        .last()
        .map(|p| p.score)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::day_key;
    use crate::session::SessionMode;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
    }

    fn focus(ts: DateTime<Utc>) -> Session {
        Session::new("alice", SessionMode::Focus, 1500, None, ts).unwrap()
    }

    #[test]
    fn empty_history_is_flat_zero() {
        let cfg = FitnessConfig::default();
        let series = fitness_series(&[], at(2025, 3, 10), &cfg);
        assert_eq!(series.len(), 90);
        assert!(series.iter().all(|p| p.score == 0));
        assert_eq!(series.last().unwrap().day, day_key(at(2025, 3, 10)));
    }

    #[test]
    fn single_day_contributes_weight() {
        let cfg = FitnessConfig::default();
        let now = at(2025, 3, 10);
        let series = fitness_series(&[focus(now), focus(now)], now, &cfg);
        assert_eq!(series.last().unwrap().score, 20);
    }

    #[test]
    fn decay_applies_on_zero_days() {
        let cfg = FitnessConfig { decay: 0.5, weight: 10.0, window_days: 10 };
        let now = at(2025, 3, 10);
        // One session two days ago: 10 -> 5 -> 2.5; f64::round is
        // half-away-from-zero, so 2.5 displays as 3.
        let series = fitness_series(&[focus(at(2025, 3, 8))], now, &cfg);
        let n = series.len();
        assert_eq!(series[n - 3].score, 10);
        assert_eq!(series[n - 2].score, 5);
        assert_eq!(series[n - 1].score, 3);
    }

    #[test]
    fn unrounded_value_is_carried() {
        // With decay 0.3 the rounded chain would drift from the true one.
        let cfg = FitnessConfig { decay: 0.3, weight: 1.0, window_days: 5 };
        let now = at(2025, 3, 10);
        let series = fitness_series(&[focus(at(2025, 3, 6))], now, &cfg);
        // True chain: 1, 0.3, 0.09, 0.027, 0.0081 -> rounds 1, 0, 0, 0, 0.
        let scores: Vec<i64> = series.iter().map(|p| p.score).collect();
        assert_eq!(scores, vec![1, 0, 0, 0, 0]);
    }

    #[test]
    fn history_older_than_window_primes_the_score() {
        let cfg = FitnessConfig { decay: 1.0, weight: 10.0, window_days: 3 };
        let now = at(2025, 3, 10);
        // With no decay, a session far in the past still shows up.
        let series = fitness_series(&[focus(at(2025, 1, 1))], now, &cfg);
        assert_eq!(series.len(), 3);
        assert!(series.iter().all(|p| p.score == 10));
    }

    #[test]
    fn window_length_is_configurable() {
        let cfg = FitnessConfig { window_days: 7, ..FitnessConfig::default() };
        let series = fitness_series(&[], at(2025, 3, 10), &cfg);
        assert_eq!(series.len(), 7);
        assert_eq!(series.first().unwrap().day, "2025-03-04");
    }
}
