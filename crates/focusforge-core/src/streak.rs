//! Streak calculation over a user's focus-session history.
//!
//! The input session list is treated as an unordered set: sync batches may
//! deliver sessions in any order, so the calculator groups and sorts by
//! calendar date internally before any sequential scan. "Now" is an
//! explicit parameter so tests can pin it.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::{day_of, week_start};
use crate::session::Session;

/// Current and best streak values for one owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakSummary {
    /// Consecutive days (ending today or yesterday) with at least one
    /// focus session.
    pub current_daily: u32,
    /// Consecutive ISO weeks (ending this week or last week) meeting the
    /// weekly session threshold.
    pub current_weekly: u32,
    /// Longest daily streak ever observed. Monotonic: merged with any
    /// cached value using max, so pruned history can never lower it.
    pub best_daily: u32,
}

/// Streak calculator with a configurable weekly threshold.
#[derive(Debug, Clone, Copy)]
pub struct StreakCalculator {
    weekly_threshold: u32,
}

impl StreakCalculator {
    /// `weekly_threshold` comes from validated configuration and is
    /// always >= 1.
    pub fn new(weekly_threshold: u32) -> Self {
        Self { weekly_threshold }
    }

    /// Compute all streak values for one owner's sessions.
    ///
    /// `cached_best` is the previously stored best daily streak; the result
    /// never regresses below it even if history was pruned since it was
    /// recorded.
    pub fn summarize(
        &self,
        sessions: &[Session],
        now: DateTime<Utc>,
        cached_best: u32,
    ) -> StreakSummary {
        let days: HashSet<NaiveDate> = sessions
            .iter()
            .filter(|s| s.is_focus())
            .map(|s| day_of(s.completed_at))
            .collect();

        let current_daily = self.current_daily(&days, day_of(now));
        let current_weekly = self.current_weekly(sessions, day_of(now));
        let scanned = longest_run(&days);
        let best_daily = scanned.max(current_daily).max(cached_best);

        StreakSummary {
            current_daily,
            current_weekly,
            best_daily,
        }
    }

    /// Walk backward one day at a time from today (or yesterday, if today
    /// has no session yet -- an empty today has not broken the streak, it
    /// just has not extended it).
    fn current_daily(&self, days: &HashSet<NaiveDate>, today: NaiveDate) -> u32 {
        let mut cursor = if days.contains(&today) {
            today
        } else {
            today - Duration::days(1)
        };
        let mut streak = 0;
        while days.contains(&cursor) {
            streak += 1;
            cursor -= Duration::days(1);
        }
        streak
    }

    /// Walk backward week by week from the current ISO week. A week counts
    /// only if it has at least `weekly_threshold` focus sessions; the week
    /// in progress gets the same grace as today does for daily streaks.
    fn current_weekly(&self, sessions: &[Session], today: NaiveDate) -> u32 {
        let mut per_week: HashMap<NaiveDate, u32> = HashMap::new();
        for s in sessions.iter().filter(|s| s.is_focus()) {
            *per_week
                .entry(week_start(day_of(s.completed_at)))
                .or_insert(0) += 1;
        }

        let Some(earliest) = per_week.keys().min().copied() else {
            return 0;
        };
        let this_week = week_start(today);
        let meets = |week: NaiveDate| per_week.get(&week).copied().unwrap_or(0) >= self.weekly_threshold;

        let mut cursor = if meets(this_week) {
            this_week
        } else {
            this_week - Duration::weeks(1)
        };
        let mut streak = 0;
        while cursor >= earliest && meets(cursor) {
            streak += 1;
            cursor -= Duration::weeks(1);
        }
        streak
    }
}

/// Longest run of consecutive calendar days in the given set. Independent
/// of "now": a pure scan over history.
fn longest_run(days: &HashSet<NaiveDate>) -> u32 {
    let mut sorted: Vec<NaiveDate> = days.iter().copied().collect();
    sorted.sort_unstable();

    let mut best = 0u32;
    let mut run = 0u32;
    let mut prev: Option<NaiveDate> = None;
    for day in sorted {
        run = match prev {
            Some(p) if (day - p).num_days() == 1 => run + 1,
            _ => 1,
        };
        best = best.max(run);
        prev = Some(day);
    }
    best
}
