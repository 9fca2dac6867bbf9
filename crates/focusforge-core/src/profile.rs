//! Aggregated per-owner profile view.
//!
//! The profile is a cache, not a source of truth: every field is a pure
//! function of the owner's authoritative session set plus the challenge
//! catalog and level configuration, and deriving it twice from the same
//! sessions yields the same result. Derivation happens on demand per
//! read; the only stored artifacts are the monotonic best-streak cache
//! and the latched challenge-progress rows, both merged with their
//! never-regress rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::challenge::{evaluate_catalog, ChallengeKind, ChallengeProgress};
use crate::error::CoreError;
use crate::fitness::{fitness_series, FitnessPoint};
use crate::level::{LevelCurve, LevelInfo};
use crate::storage::{Config, Database};
use crate::streak::{StreakCalculator, StreakSummary};

/// One challenge joined with the owner's progress, for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub kind: ChallengeKind,
    pub target: u32,
    pub progress: u64,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Read-only aggregate exposed to the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileView {
    pub owner: String,
    pub lifetime_count: u64,
    pub streaks: StreakSummary,
    pub level: LevelInfo,
    pub active_challenges: Vec<ChallengeView>,
    pub completed_challenges: Vec<ChallengeView>,
    pub fitness: Vec<FitnessPoint>,
}

/// Derive the full profile for one owner from the authoritative store.
///
/// Reads only durably accepted sessions -- the pending queue never feeds
/// derivation. As side effects the best-streak cache and challenge
/// progress rows are refreshed under their monotonic merge rules, so a
/// later read with pruned history still sees past achievements.
///
/// # Errors
/// Returns an error only for storage failures; an owner with no history
/// yields the zero/default profile.
pub fn derive_profile(
    db: &mut Database,
    owner: &str,
    now: DateTime<Utc>,
    config: &Config,
) -> Result<ProfileView, CoreError> {
    let sessions = db.sessions_for(owner)?;
    let lifetime_count = sessions.iter().filter(|s| s.is_focus()).count() as u64;

    let cached_best = db.cached_best_streak(owner)?;
    let streaks = StreakCalculator::new(config.streak.weekly_threshold)
        .summarize(&sessions, now, cached_best);
    db.record_best_streak(owner, streaks.best_daily)?;

    let curve = db.load_level_config()?.unwrap_or_else(LevelCurve::builtin);
    let level = curve.level_for(lifetime_count);

    let defs = db.list_challenge_defs()?;
    let prior = db.load_progress(owner)?;
    let evaluated = evaluate_catalog(&defs, &sessions, &streaks, now, &prior);
    db.store_progress(owner, &evaluated)?;

    let mut active_challenges = Vec::new();
    let mut completed_challenges = Vec::new();
    for progress in &evaluated {
        let Some(def) = defs.iter().find(|d| d.id == progress.challenge_id) else {
            continue;
        };
        let view = challenge_view(def, progress);
        if progress.completed {
            completed_challenges.push(view);
        } else {
            active_challenges.push(view);
        }
    }

    let fitness = fitness_series(&sessions, now, &config.fitness);

    Ok(ProfileView {
        owner: owner.to_string(),
        lifetime_count,
        streaks,
        level,
        active_challenges,
        completed_challenges,
        fitness,
    })
}

/// Pre-populate cached aggregates for a set of owners. Purely a
/// performance optimization: correctness never needs it, since every read
/// re-derives against the current configuration.
pub fn backfill(
    db: &mut Database,
    owners: &[String],
    now: DateTime<Utc>,
    config: &Config,
) -> Result<usize, CoreError> {
    for owner in owners {
        derive_profile(db, owner, now, config)?;
    }
    Ok(owners.len())
}

fn challenge_view(
    def: &crate::challenge::ChallengeDef,
    progress: &ChallengeProgress,
) -> ChallengeView {
    ChallengeView {
        id: def.id,
        name: def.name.clone(),
        description: def.description.clone(),
        kind: def.kind,
        target: def.target,
        progress: progress.progress,
        completed: progress.completed,
        completed_at: progress.completed_at,
    }
}
