//! Challenge catalog and progress engine.
//!
//! Challenge kinds form a closed enum with one evaluation strategy each,
//! matched exhaustively, so adding a kind is a compile-time-checked change.
//! Definitions are validated when created; evaluation assumes a valid
//! catalog and an unordered session list, which it sorts chronologically
//! before any replay.
//!
//! Completion is a one-way latch. The completion timestamp is the
//! timestamp of the session that crossed the threshold, found by replaying
//! history in order -- never "now" -- so completions are stable and can be
//! backfilled.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::{day_of, month_key, week_start};
use crate::error::ValidationError;
use crate::session::Session;
use crate::streak::StreakSummary;

/// Closed set of challenge kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    /// Lifetime focus-session count.
    Total,
    /// Best-ever daily streak.
    Streak,
    /// Highest single-day session count.
    Daily,
    /// Highest session count within one ISO week.
    Weekly,
    /// Highest session count within one calendar month.
    Monthly,
    /// Like `Monthly`, but only the configured month counts, and progress
    /// tracks the current year's occurrence.
    RecurringMonthly,
}

impl ChallengeKind {
    /// Stable string form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeKind::Total => "total",
            ChallengeKind::Streak => "streak",
            ChallengeKind::Daily => "daily",
            ChallengeKind::Weekly => "weekly",
            ChallengeKind::Monthly => "monthly",
            ChallengeKind::RecurringMonthly => "recurring_monthly",
        }
    }

    /// Parse the storage string form.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "total" => Ok(ChallengeKind::Total),
            "streak" => Ok(ChallengeKind::Streak),
            "daily" => Ok(ChallengeKind::Daily),
            "weekly" => Ok(ChallengeKind::Weekly),
            "monthly" => Ok(ChallengeKind::Monthly),
            "recurring_monthly" => Ok(ChallengeKind::RecurringMonthly),
            other => Err(ValidationError::InvalidValue {
                field: "kind".to_string(),
                message: format!("unknown challenge kind '{other}'"),
            }),
        }
    }
}

/// Owner-independent catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeDef {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: ChallengeKind,
    pub target: u32,
    pub active: bool,
    /// Calendar month 1..=12; required exactly for `RecurringMonthly`.
    #[serde(default)]
    pub recurrence_month: Option<u32>,
}

impl ChallengeDef {
    /// Create a validated definition.
    ///
    /// # Errors
    /// Rejects a zero target, a recurrence month outside 1..=12, a
    /// `RecurringMonthly` kind without a recurrence month, and a
    /// recurrence month on any other kind.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: ChallengeKind,
        target: u32,
        recurrence_month: Option<u32>,
    ) -> Result<Self, ValidationError> {
        let def = Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            kind,
            target,
            active: true,
            recurrence_month,
        };
        def.validate()?;
        Ok(def)
    }

    /// Re-check the definition invariants; storage runs this before any
    /// catalog write so a malformed row never reaches evaluation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.target == 0 {
            return Err(ValidationError::InvalidChallengeTarget(self.target));
        }
        match (self.kind, self.recurrence_month) {
            (ChallengeKind::RecurringMonthly, Some(m)) if (1..=12).contains(&m) => Ok(()),
            (ChallengeKind::RecurringMonthly, Some(m)) => {
                Err(ValidationError::InvalidRecurrenceMonth(m))
            }
            (ChallengeKind::RecurringMonthly, None) => Err(ValidationError::InvalidValue {
                field: "recurrence_month".to_string(),
                message: "required for recurring_monthly challenges".to_string(),
            }),
            (_, Some(m)) => Err(ValidationError::InvalidValue {
                field: "recurrence_month".to_string(),
                message: format!("not allowed for kind '{}' (got {m})", self.kind.as_str()),
            }),
            (_, None) => Ok(()),
        }
    }
}

/// Per-(owner, challenge) progress row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeProgress {
    pub challenge_id: Uuid,
    pub progress: u64,
    pub completed: bool,
    /// Set once when the latch flips; immutable thereafter.
    pub completed_at: Option<DateTime<Utc>>,
}

impl ChallengeProgress {
    fn empty(challenge_id: Uuid) -> Self {
        Self {
            challenge_id,
            progress: 0,
            completed: false,
            completed_at: None,
        }
    }
}

/// Evaluate every active definition for one owner.
///
/// `prior` holds previously stored progress rows. Cumulative kinds never
/// regress below them (progress takes the max) and the completion latch
/// never reopens; the recurring-monthly gauge instead follows the current
/// occurrence, so a year rollover resets it. An empty catalog yields an
/// empty result, not an error.
pub fn evaluate_catalog(
    defs: &[ChallengeDef],
    sessions: &[Session],
    streaks: &StreakSummary,
    now: DateTime<Utc>,
    prior: &HashMap<Uuid, ChallengeProgress>,
) -> Vec<ChallengeProgress> {
    let mut ordered: Vec<&Session> = sessions.iter().filter(|s| s.is_focus()).collect();
    ordered.sort_by_key(|s| s.completed_at);

    defs.iter()
        .filter(|d| d.active)
        .map(|def| evaluate_one(def, &ordered, streaks, now, prior.get(&def.id)))
        .collect()
}

/// Evaluate one definition against chronologically ordered focus sessions.
fn evaluate_one(
    def: &ChallengeDef,
    ordered: &[&Session],
    streaks: &StreakSummary,
    now: DateTime<Utc>,
    prior: Option<&ChallengeProgress>,
) -> ChallengeProgress {
    let fresh = match def.kind {
        ChallengeKind::Total => ordered.len() as u64,
        ChallengeKind::Streak => u64::from(streaks.best_daily),
        ChallengeKind::Daily => max_count(ordered, |d| d.to_string()),
        ChallengeKind::Weekly => max_count(ordered, |d| week_start(d).to_string()),
        ChallengeKind::Monthly => max_count(ordered, month_key),
        ChallengeKind::RecurringMonthly => {
            let month = def.recurrence_month.unwrap_or(0);
            ordered
                .iter()
                .filter(|s| {
                    let day = day_of(s.completed_at);
                    day.year() == now.year() && day.month() == month
                })
                .count() as u64
        }
    };

    let mut merged = prior
        .cloned()
        .unwrap_or_else(|| ChallengeProgress::empty(def.id));
    // The recurring-monthly gauge tracks only the current occurrence, so
    // it may drop back to zero after a year rollover; every other kind
    // ratchets upward.
    merged.progress = match def.kind {
        ChallengeKind::RecurringMonthly => fresh,
        _ => merged.progress.max(fresh),
    };

    // Already latched: evaluation is a no-op beyond the progress merge.
    if merged.completed {
        return merged;
    }

    // Completion comes from the replay, not the fresh gauge: a recurring
    // challenge finished in a past year stays discoverable from history
    // even though its current-occurrence progress sits below target.
    if let Some(ts) = crossing_timestamp(def, ordered) {
        merged.completed = true;
        merged.completed_at = Some(ts);
    }
    merged
}

/// Highest per-bucket session count, bucketing days through `key`.
fn max_count(ordered: &[&Session], key: impl Fn(NaiveDate) -> String) -> u64 {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for s in ordered {
        *counts.entry(key(day_of(s.completed_at))).or_insert(0) += 1;
    }
    counts.values().copied().max().unwrap_or(0)
}

/// Replay history to find the session whose arrival first met the target.
fn crossing_timestamp(def: &ChallengeDef, ordered: &[&Session]) -> Option<DateTime<Utc>> {
    let target = u64::from(def.target);
    match def.kind {
        ChallengeKind::Total => ordered
            .get(def.target.saturating_sub(1) as usize)
            .map(|s| s.completed_at),
        ChallengeKind::Streak => {
            // Incrementally track the longest run of consecutive days,
            // extending runs at their endpoints as new days appear.
            let mut runs: HashMap<NaiveDate, u64> = HashMap::new();
            for s in ordered {
                let day = day_of(s.completed_at);
                if runs.contains_key(&day) {
                    continue;
                }
                let left = runs.get(&(day - Duration::days(1))).copied().unwrap_or(0);
                let right = runs.get(&(day + Duration::days(1))).copied().unwrap_or(0);
                let len = left + right + 1;
                runs.insert(day, len);
                runs.insert(day - Duration::days(left as i64), len);
                runs.insert(day + Duration::days(right as i64), len);
                if len >= target {
                    return Some(s.completed_at);
                }
            }
            None
        }
        ChallengeKind::Daily => first_bucket_crossing(ordered, target, |d| d.to_string()),
        ChallengeKind::Weekly => {
            first_bucket_crossing(ordered, target, |d| week_start(d).to_string())
        }
        ChallengeKind::Monthly => first_bucket_crossing(ordered, target, month_key),
        ChallengeKind::RecurringMonthly => {
            let month = def.recurrence_month.unwrap_or(0);
            let in_month: Vec<&Session> = ordered
                .iter()
                .copied()
                .filter(|s| day_of(s.completed_at).month() == month)
                .collect();
            // Each year's occurrence counts separately.
            first_bucket_crossing(&in_month, target, |d| d.year().to_string())
        }
    }
}

fn first_bucket_crossing(
    ordered: &[&Session],
    target: u64,
    key: impl Fn(NaiveDate) -> String,
) -> Option<DateTime<Utc>> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for s in ordered {
        let count = counts.entry(key(day_of(s.completed_at))).or_insert(0);
        *count += 1;
        if *count >= target {
            return Some(s.completed_at);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionMode;
    use crate::streak::StreakCalculator;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn focus(ts: DateTime<Utc>) -> Session {
        Session::new("alice", SessionMode::Focus, 1500, None, ts).unwrap()
    }

    fn summary(sessions: &[Session], now: DateTime<Utc>) -> StreakSummary {
        StreakCalculator::new(5).summarize(sessions, now, 0)
    }

    #[test]
    fn definition_validation() {
        assert!(ChallengeDef::new("t", "", ChallengeKind::Total, 0, None).is_err());
        assert!(ChallengeDef::new("t", "", ChallengeKind::RecurringMonthly, 5, None).is_err());
        assert!(ChallengeDef::new("t", "", ChallengeKind::RecurringMonthly, 5, Some(13)).is_err());
        assert!(ChallengeDef::new("t", "", ChallengeKind::Total, 5, Some(3)).is_err());
        assert!(ChallengeDef::new("t", "", ChallengeKind::RecurringMonthly, 5, Some(12)).is_ok());
        assert!(ChallengeDef::new("t", "", ChallengeKind::Weekly, 5, None).is_ok());
    }

    #[test]
    fn empty_catalog_is_empty_result() {
        let now = at(2025, 3, 10, 12);
        let sessions = vec![focus(now)];
        let out = evaluate_catalog(&[], &sessions, &summary(&sessions, now), now, &HashMap::new());
        assert!(out.is_empty());
    }

    #[test]
    fn total_completion_uses_crossing_session_timestamp() {
        let def = ChallengeDef::new("ten", "", ChallengeKind::Total, 10, None).unwrap();
        let now = at(2025, 3, 20, 12);
        let sessions: Vec<Session> = (1..=10).map(|d| focus(at(2025, 3, d, 9))).collect();
        let out = evaluate_catalog(
            &[def],
            &sessions,
            &summary(&sessions, now),
            now,
            &HashMap::new(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].progress, 10);
        assert!(out[0].completed);
        assert_eq!(out[0].completed_at, Some(at(2025, 3, 10, 9)));
    }

    #[test]
    fn daily_kind_takes_best_single_day() {
        let def = ChallengeDef::new("burst", "", ChallengeKind::Daily, 3, None).unwrap();
        let now = at(2025, 3, 10, 23);
        let sessions = vec![
            focus(at(2025, 3, 9, 9)),
            focus(at(2025, 3, 10, 9)),
            focus(at(2025, 3, 10, 11)),
            focus(at(2025, 3, 10, 13)),
        ];
        let out = evaluate_catalog(
            &[def],
            &sessions,
            &summary(&sessions, now),
            now,
            &HashMap::new(),
        );
        assert_eq!(out[0].progress, 3);
        assert!(out[0].completed);
        assert_eq!(out[0].completed_at, Some(at(2025, 3, 10, 13)));
    }

    #[test]
    fn streak_kind_follows_best_daily() {
        let def = ChallengeDef::new("run", "", ChallengeKind::Streak, 3, None).unwrap();
        let now = at(2025, 3, 10, 12);
        let sessions: Vec<Session> = (8..=10).map(|d| focus(at(2025, 3, d, 9))).collect();
        let out = evaluate_catalog(
            &[def],
            &sessions,
            &summary(&sessions, now),
            now,
            &HashMap::new(),
        );
        assert_eq!(out[0].progress, 3);
        assert!(out[0].completed);
        // Third consecutive day's session crossed the threshold.
        assert_eq!(out[0].completed_at, Some(at(2025, 3, 10, 9)));
    }

    #[test]
    fn streak_crossing_ignores_input_order_and_same_day_repeats() {
        let def = ChallengeDef::new("run", "", ChallengeKind::Streak, 3, None).unwrap();
        let now = at(2025, 3, 12, 12);
        // Unsorted input with a repeated day; the crossing is the first
        // session of the third consecutive day.
        let sessions = vec![
            focus(at(2025, 3, 10, 9)),
            focus(at(2025, 3, 8, 9)),
            focus(at(2025, 3, 9, 23)),
            focus(at(2025, 3, 9, 10)),
            focus(at(2025, 3, 10, 15)),
        ];
        let out = evaluate_catalog(
            &[def],
            &sessions,
            &summary(&sessions, now),
            now,
            &HashMap::new(),
        );
        assert!(out[0].completed);
        assert_eq!(out[0].completed_at, Some(at(2025, 3, 10, 9)));
    }

    #[test]
    fn weekly_and_monthly_windows() {
        let weekly = ChallengeDef::new("w", "", ChallengeKind::Weekly, 5, None).unwrap();
        let monthly = ChallengeDef::new("m", "", ChallengeKind::Monthly, 6, None).unwrap();
        let now = at(2025, 3, 14, 20);
        // Five sessions Mon-Fri of one week, one more earlier in the month.
        let mut sessions: Vec<Session> = (10..=14).map(|d| focus(at(2025, 3, d, 9))).collect();
        sessions.push(focus(at(2025, 3, 1, 9)));
        let out = evaluate_catalog(
            &[weekly, monthly],
            &sessions,
            &summary(&sessions, now),
            now,
            &HashMap::new(),
        );
        assert_eq!(out[0].progress, 5);
        assert!(out[0].completed);
        assert_eq!(out[0].completed_at, Some(at(2025, 3, 14, 9)));
        assert_eq!(out[1].progress, 6);
        assert!(out[1].completed);
    }

    #[test]
    fn recurring_monthly_counts_current_year_occurrence_only() {
        let def =
            ChallengeDef::new("march", "", ChallengeKind::RecurringMonthly, 3, Some(3)).unwrap();
        let now = at(2025, 3, 20, 12);
        let sessions = vec![
            // Last year's March: completed back then, but current progress
            // tracks this year's occurrence.
            focus(at(2024, 3, 1, 9)),
            focus(at(2024, 3, 2, 9)),
            focus(at(2024, 3, 3, 9)),
            focus(at(2025, 3, 5, 9)),
        ];
        let out = evaluate_catalog(
            &[def],
            &sessions,
            &summary(&sessions, now),
            now,
            &HashMap::new(),
        );
        assert_eq!(out[0].progress, 1);
        assert!(out[0].completed);
        assert_eq!(out[0].completed_at, Some(at(2024, 3, 3, 9)));
    }

    #[test]
    fn recurring_monthly_gauge_resets_after_year_rollover() {
        let def =
            ChallengeDef::new("march", "", ChallengeKind::RecurringMonthly, 10, Some(3)).unwrap();
        let sessions: Vec<Session> = (1..=5).map(|d| focus(at(2024, 3, d, 9))).collect();
        let now_2024 = at(2024, 3, 31, 12);
        let first = evaluate_catalog(
            &[def.clone()],
            &sessions,
            &summary(&sessions, now_2024),
            now_2024,
            &HashMap::new(),
        );
        assert_eq!(first[0].progress, 5);
        assert!(!first[0].completed);

        // Two years on with no new sessions the stored gauge must not
        // leak into the new occurrence.
        let prior: HashMap<Uuid, ChallengeProgress> =
            first.iter().map(|p| (p.challenge_id, p.clone())).collect();
        let now_2026 = at(2026, 1, 10, 12);
        let second = evaluate_catalog(
            &[def],
            &sessions,
            &summary(&sessions, now_2026),
            now_2026,
            &prior,
        );
        assert_eq!(second[0].progress, 0);
        assert!(!second[0].completed);
    }

    #[test]
    fn recurring_monthly_ignores_other_months() {
        let def =
            ChallengeDef::new("march", "", ChallengeKind::RecurringMonthly, 2, Some(3)).unwrap();
        let now = at(2025, 4, 10, 12);
        let sessions = vec![focus(at(2025, 4, 1, 9)), focus(at(2025, 4, 2, 9))];
        let out = evaluate_catalog(
            &[def],
            &sessions,
            &summary(&sessions, now),
            now,
            &HashMap::new(),
        );
        assert_eq!(out[0].progress, 0);
        assert!(!out[0].completed);
    }

    #[test]
    fn completion_latch_never_reopens() {
        let def = ChallengeDef::new("five", "", ChallengeKind::Daily, 5, None).unwrap();
        let now = at(2025, 6, 1, 12);
        let latched_at = at(2024, 1, 1, 9);
        let mut prior = HashMap::new();
        prior.insert(
            def.id,
            ChallengeProgress {
                challenge_id: def.id,
                progress: 5,
                completed: true,
                completed_at: Some(latched_at),
            },
        );
        // Fresh history no longer supports the old progress (pruned).
        let sessions = vec![focus(at(2025, 5, 30, 9))];
        let out = evaluate_catalog(
            &[def],
            &sessions,
            &summary(&sessions, now),
            now,
            &prior,
        );
        assert!(out[0].completed);
        assert_eq!(out[0].completed_at, Some(latched_at));
        assert_eq!(out[0].progress, 5);
    }

    #[test]
    fn inactive_definitions_are_skipped() {
        let mut def = ChallengeDef::new("t", "", ChallengeKind::Total, 1, None).unwrap();
        def.active = false;
        let now = at(2025, 3, 10, 12);
        let sessions = vec![focus(now)];
        let out = evaluate_catalog(
            &[def],
            &sessions,
            &summary(&sessions, now),
            now,
            &HashMap::new(),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn evaluation_is_idempotent() {
        let def = ChallengeDef::new("ten", "", ChallengeKind::Total, 10, None).unwrap();
        let now = at(2025, 3, 20, 12);
        let sessions: Vec<Session> = (1..=12).map(|d| focus(at(2025, 3, d, 9))).collect();
        let streaks = summary(&sessions, now);

        let first = evaluate_catalog(&[def.clone()], &sessions, &streaks, now, &HashMap::new());
        let prior: HashMap<Uuid, ChallengeProgress> =
            first.iter().map(|p| (p.challenge_id, p.clone())).collect();
        let second = evaluate_catalog(&[def], &sessions, &streaks, now, &prior);
        assert_eq!(first, second);
    }
}
