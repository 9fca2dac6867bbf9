//! SQLite-backed authoritative session store.
//!
//! Holds the durable truth the derivation engine reads from:
//! - accepted sessions, keyed by (owner, id) so re-inserting a synced
//!   session is a no-op
//! - the challenge catalog and per-owner progress rows
//! - the admin level-configuration table
//! - a key-value cache for denormalized aggregates (best daily streak)
//!
//! Progress rows enforce the completion latch and the "progress never
//! regresses" merge at write time, inside one transaction.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::data_dir;
use crate::challenge::{ChallengeDef, ChallengeKind, ChallengeProgress};
use crate::error::DatabaseError;
use crate::level::{LevelCurve, LevelTier};
use crate::session::{Session, SessionMode, SyncState};

/// SQLite database holding sessions and derived-state caches.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/focusforge/focusforge.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let path = data_dir()?.join("focusforge.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (and migrate) the database at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    #[cfg(test)]
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS sessions (
                    owner         TEXT NOT NULL,
                    id            TEXT NOT NULL,
                    mode          TEXT NOT NULL,
                    duration_secs INTEGER NOT NULL,
                    tag           TEXT,
                    completed_at  TEXT NOT NULL,
                    PRIMARY KEY (owner, id)
                );

                CREATE TABLE IF NOT EXISTS challenge_defs (
                    id               TEXT PRIMARY KEY,
                    name             TEXT NOT NULL,
                    description      TEXT NOT NULL DEFAULT '',
                    kind             TEXT NOT NULL,
                    target           INTEGER NOT NULL,
                    active           INTEGER NOT NULL DEFAULT 1,
                    recurrence_month INTEGER
                );

                CREATE TABLE IF NOT EXISTS challenge_progress (
                    owner        TEXT NOT NULL,
                    challenge_id TEXT NOT NULL,
                    progress     INTEGER NOT NULL,
                    completed    INTEGER NOT NULL,
                    completed_at TEXT,
                    PRIMARY KEY (owner, challenge_id)
                );

                CREATE TABLE IF NOT EXISTS level_config (
                    level     INTEGER PRIMARY KEY,
                    title     TEXT NOT NULL,
                    threshold INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_sessions_owner_completed
                    ON sessions(owner, completed_at);
                CREATE INDEX IF NOT EXISTS idx_sessions_owner_mode
                    ON sessions(owner, mode);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Insert an accepted session. Returns `false` when a session with the
    /// same (owner, id) is already present -- the duplicate is treated as
    /// already applied, which is what makes sync retries idempotent.
    ///
    /// # Errors
    /// Returns an error if the insert fails for any other reason.
    pub fn insert_session(&self, session: &Session) -> Result<bool, DatabaseError> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO sessions (owner, id, mode, duration_secs, tag, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.owner,
                session.id.to_string(),
                session.mode.as_str(),
                session.duration_secs,
                session.tag,
                session.completed_at.to_rfc3339(),
            ],
        )?;
        Ok(changed == 1)
    }

    /// All sessions for one owner, in storage order (callers must not rely
    /// on chronology).
    pub fn sessions_for(&self, owner: &str) -> Result<Vec<Session>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, mode, duration_secs, tag, completed_at FROM sessions WHERE owner = ?1",
        )?;
        let rows = stmt.query_map(params![owner], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, mode, duration_secs, tag, completed_at) = row?;
            sessions.push(Session {
                id: parse_uuid(&id)?,
                owner: owner.to_string(),
                mode: SessionMode::parse(&mode)
                    .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
                duration_secs,
                tag,
                completed_at: parse_ts(&completed_at)?,
                sync_state: SyncState::Synced,
            });
        }
        Ok(sessions)
    }

    /// Lifetime focus-session count for one owner.
    pub fn lifetime_focus_count(&self, owner: &str) -> Result<u64, DatabaseError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE owner = ?1 AND mode = 'focus'",
            params![owner],
            |row| row.get::<_, u64>(0),
        )?;
        Ok(count)
    }

    /// Administrative bulk clear for one owner. Cascades into the cached
    /// aggregates so nothing derived survives the source data.
    pub fn clear_owner(&mut self, owner: &str) -> Result<(), DatabaseError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM sessions WHERE owner = ?1", params![owner])?;
        tx.execute(
            "DELETE FROM challenge_progress WHERE owner = ?1",
            params![owner],
        )?;
        tx.execute(
            "DELETE FROM kv WHERE key = ?1",
            params![best_streak_key(owner)],
        )?;
        tx.commit()?;
        Ok(())
    }

    // --- challenge catalog ---

    /// Insert or replace a catalog entry. The definition must already be
    /// validated; storage re-runs the check so a malformed row can never
    /// be written.
    ///
    /// # Errors
    /// Returns an error for invalid definitions or failed writes.
    pub fn upsert_challenge_def(&self, def: &ChallengeDef) -> Result<(), DatabaseError> {
        def.validate()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        self.conn.execute(
            "INSERT OR REPLACE INTO challenge_defs
             (id, name, description, kind, target, active, recurrence_month)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                def.id.to_string(),
                def.name,
                def.description,
                def.kind.as_str(),
                def.target,
                def.active as i64,
                def.recurrence_month,
            ],
        )?;
        Ok(())
    }

    /// Full catalog, inactive entries included.
    pub fn list_challenge_defs(&self) -> Result<Vec<ChallengeDef>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, kind, target, active, recurrence_month
             FROM challenge_defs ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, u32>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, Option<u32>>(6)?,
            ))
        })?;

        let mut defs = Vec::new();
        for row in rows {
            let (id, name, description, kind, target, active, recurrence_month) = row?;
            defs.push(ChallengeDef {
                id: parse_uuid(&id)?,
                name,
                description,
                kind: ChallengeKind::parse(&kind)
                    .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
                target,
                active: active != 0,
                recurrence_month,
            });
        }
        Ok(defs)
    }

    /// Toggle a catalog entry's active flag. Stored completions are
    /// untouched: deactivation hides a challenge, it never unlatches it.
    pub fn set_challenge_active(&self, id: Uuid, active: bool) -> Result<(), DatabaseError> {
        self.conn.execute(
            "UPDATE challenge_defs SET active = ?2 WHERE id = ?1",
            params![id.to_string(), active as i64],
        )?;
        Ok(())
    }

    // --- challenge progress ---

    /// Stored progress rows for one owner, keyed by challenge id.
    pub fn load_progress(
        &self,
        owner: &str,
    ) -> Result<HashMap<Uuid, ChallengeProgress>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT challenge_id, progress, completed, completed_at
             FROM challenge_progress WHERE owner = ?1",
        )?;
        let rows = stmt.query_map(params![owner], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut map = HashMap::new();
        for row in rows {
            let (challenge_id, progress, completed, completed_at) = row?;
            let challenge_id = parse_uuid(&challenge_id)?;
            map.insert(
                challenge_id,
                ChallengeProgress {
                    challenge_id,
                    progress,
                    completed: completed != 0,
                    completed_at: completed_at.as_deref().map(parse_ts).transpose()?,
                },
            );
        }
        Ok(map)
    }

    /// Persist freshly evaluated progress, merging against stored rows:
    /// progress takes the max for cumulative kinds, a recurring-monthly
    /// gauge follows the fresh value so a year rollover can reset it, and
    /// a stored completion (flag and timestamp) is never overwritten.
    ///
    /// # Errors
    /// Returns an error if any row write fails; the whole batch rolls
    /// back.
    pub fn store_progress(
        &mut self,
        owner: &str,
        rows: &[ChallengeProgress],
    ) -> Result<(), DatabaseError> {
        let tx = self.conn.transaction()?;
        for row in rows {
            let kind: Option<String> = tx
                .query_row(
                    "SELECT kind FROM challenge_defs WHERE id = ?1",
                    params![row.challenge_id.to_string()],
                    |r| r.get(0),
                )
                .optional()?;
            let ratchets = kind.as_deref() != Some(ChallengeKind::RecurringMonthly.as_str());

            let existing: Option<(u64, i64, Option<String>)> = tx
                .query_row(
                    "SELECT progress, completed, completed_at FROM challenge_progress
                     WHERE owner = ?1 AND challenge_id = ?2",
                    params![owner, row.challenge_id.to_string()],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
                )
                .optional()?;

            let merge = |old: u64| if ratchets { old.max(row.progress) } else { row.progress };
            let (progress, completed, completed_at) = match existing {
                Some((old_progress, 1, old_at)) => {
                    // Latched: the flag and timestamp are immutable.
                    (merge(old_progress), true, old_at)
                }
                Some((old_progress, _, _)) => (
                    merge(old_progress),
                    row.completed,
                    row.completed_at.map(|t| t.to_rfc3339()),
                ),
                None => (
                    row.progress,
                    row.completed,
                    row.completed_at.map(|t| t.to_rfc3339()),
                ),
            };

            tx.execute(
                "INSERT OR REPLACE INTO challenge_progress
                 (owner, challenge_id, progress, completed, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    owner,
                    row.challenge_id.to_string(),
                    progress,
                    completed as i64,
                    completed_at,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    // --- level configuration ---

    /// Replace the admin level table. The curve carries its own
    /// validation, so only a well-formed table can reach this call.
    pub fn replace_level_config(&mut self, curve: &LevelCurve) -> Result<(), DatabaseError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM level_config", [])?;
        for tier in curve.tiers() {
            tx.execute(
                "INSERT INTO level_config (level, title, threshold) VALUES (?1, ?2, ?3)",
                params![tier.level, tier.title, tier.threshold],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Remove the admin level table; readers fall back to the built-in
    /// curve.
    pub fn clear_level_config(&self) -> Result<(), DatabaseError> {
        self.conn.execute("DELETE FROM level_config", [])?;
        Ok(())
    }

    /// Admin level table, or `None` when unset (callers fall back to the
    /// built-in curve).
    pub fn load_level_config(&self) -> Result<Option<LevelCurve>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT level, title, threshold FROM level_config ORDER BY level")?;
        let rows = stmt.query_map([], |row| {
            Ok(LevelTier {
                level: row.get(0)?,
                title: row.get(1)?,
                threshold: row.get(2)?,
            })
        })?;
        let tiers: Vec<LevelTier> = rows.collect::<Result<_, _>>()?;
        if tiers.is_empty() {
            return Ok(None);
        }
        LevelCurve::from_tiers(tiers)
            .map(Some)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
    }

    // --- aggregate cache ---

    /// Cached best daily streak, 0 when never recorded.
    pub fn cached_best_streak(&self, owner: &str) -> Result<u32, DatabaseError> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![best_streak_key(owner)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    /// Record a best daily streak, keeping the stored maximum. A lower
    /// fresh value never overwrites a higher cached one.
    pub fn record_best_streak(&self, owner: &str, value: u32) -> Result<(), DatabaseError> {
        let current = self.cached_best_streak(owner)?;
        if value > current {
            self.conn.execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![best_streak_key(owner), value.to_string()],
            )?;
        }
        Ok(())
    }

    /// Timestamp of the last completed reconciliation for one owner.
    pub fn last_sync(&self, owner: &str) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![last_sync_key(owner)],
                |row| row.get(0),
            )
            .optional()?;
        value.as_deref().map(parse_ts).transpose()
    }

    /// Record a completed reconciliation run.
    pub fn record_last_sync(&self, owner: &str, at: DateTime<Utc>) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![last_sync_key(owner), at.to_rfc3339()],
        )?;
        Ok(())
    }
}

fn best_streak_key(owner: &str) -> String {
    format!("best_daily_streak:{owner}")
}

fn last_sync_key(owner: &str) -> String {
    format!("last_sync_at:{owner}")
}

fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::QueryFailed(format!("bad uuid '{s}': {e}")))
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DatabaseError::QueryFailed(format!("bad timestamp '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::ChallengeKind;
    use chrono::TimeZone;

    fn focus(owner: &str, d: u32) -> Session {
        Session::new(
            owner,
            SessionMode::Focus,
            1500,
            None,
            Utc.with_ymd_and_hms(2025, 3, d, 9, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let db = Database::open_memory().unwrap();
        let session = focus("alice", 10);
        assert!(db.insert_session(&session).unwrap());
        assert!(!db.insert_session(&session).unwrap());
        assert_eq!(db.lifetime_focus_count("alice").unwrap(), 1);
    }

    #[test]
    fn sessions_are_scoped_per_owner() {
        let db = Database::open_memory().unwrap();
        db.insert_session(&focus("alice", 10)).unwrap();
        db.insert_session(&focus("bob", 10)).unwrap();
        assert_eq!(db.sessions_for("alice").unwrap().len(), 1);
        assert_eq!(db.lifetime_focus_count("bob").unwrap(), 1);
    }

    #[test]
    fn clear_owner_cascades_into_caches() {
        let mut db = Database::open_memory().unwrap();
        db.insert_session(&focus("alice", 10)).unwrap();
        db.record_best_streak("alice", 7).unwrap();
        db.clear_owner("alice").unwrap();
        assert!(db.sessions_for("alice").unwrap().is_empty());
        assert_eq!(db.cached_best_streak("alice").unwrap(), 0);
    }

    #[test]
    fn best_streak_cache_is_monotonic() {
        let db = Database::open_memory().unwrap();
        db.record_best_streak("alice", 5).unwrap();
        db.record_best_streak("alice", 3).unwrap();
        assert_eq!(db.cached_best_streak("alice").unwrap(), 5);
        db.record_best_streak("alice", 8).unwrap();
        assert_eq!(db.cached_best_streak("alice").unwrap(), 8);
    }

    #[test]
    fn challenge_def_roundtrip_and_toggle() {
        let db = Database::open_memory().unwrap();
        let def = ChallengeDef::new("Ten", "ten sessions", ChallengeKind::Total, 10, None).unwrap();
        db.upsert_challenge_def(&def).unwrap();
        let listed = db.list_challenge_defs().unwrap();
        assert_eq!(listed, vec![def.clone()]);

        db.set_challenge_active(def.id, false).unwrap();
        assert!(!db.list_challenge_defs().unwrap()[0].active);
    }

    #[test]
    fn malformed_challenge_def_never_reaches_storage() {
        let db = Database::open_memory().unwrap();
        let mut def =
            ChallengeDef::new("March", "", ChallengeKind::RecurringMonthly, 5, Some(3)).unwrap();
        def.recurrence_month = Some(13);
        assert!(db.upsert_challenge_def(&def).is_err());
        assert!(db.list_challenge_defs().unwrap().is_empty());
    }

    #[test]
    fn progress_write_enforces_latch_and_max() {
        let mut db = Database::open_memory().unwrap();
        let id = Uuid::new_v4();
        let latched_at = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        db.store_progress(
            "alice",
            &[ChallengeProgress {
                challenge_id: id,
                progress: 10,
                completed: true,
                completed_at: Some(latched_at),
            }],
        )
        .unwrap();

        // A later, lower evaluation must not unlatch or regress.
        db.store_progress(
            "alice",
            &[ChallengeProgress {
                challenge_id: id,
                progress: 2,
                completed: false,
                completed_at: None,
            }],
        )
        .unwrap();

        let row = &db.load_progress("alice").unwrap()[&id];
        assert_eq!(row.progress, 10);
        assert!(row.completed);
        assert_eq!(row.completed_at, Some(latched_at));
    }

    #[test]
    fn recurring_monthly_gauge_may_regress_at_write() {
        let mut db = Database::open_memory().unwrap();
        let def =
            ChallengeDef::new("March", "", ChallengeKind::RecurringMonthly, 10, Some(3)).unwrap();
        db.upsert_challenge_def(&def).unwrap();
        let latched_at = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        db.store_progress(
            "alice",
            &[ChallengeProgress {
                challenge_id: def.id,
                progress: 10,
                completed: true,
                completed_at: Some(latched_at),
            }],
        )
        .unwrap();

        // Year rolled over: the fresh gauge for the new occurrence is
        // lower, but the completion latch must survive.
        db.store_progress(
            "alice",
            &[ChallengeProgress {
                challenge_id: def.id,
                progress: 0,
                completed: false,
                completed_at: None,
            }],
        )
        .unwrap();

        let row = &db.load_progress("alice").unwrap()[&def.id];
        assert_eq!(row.progress, 0);
        assert!(row.completed);
        assert_eq!(row.completed_at, Some(latched_at));
    }

    #[test]
    fn last_sync_roundtrip() {
        let db = Database::open_memory().unwrap();
        assert!(db.last_sync("alice").unwrap().is_none());
        let ts = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        db.record_last_sync("alice", ts).unwrap();
        assert_eq!(db.last_sync("alice").unwrap(), Some(ts));
    }

    #[test]
    fn level_config_roundtrip() {
        let mut db = Database::open_memory().unwrap();
        assert!(db.load_level_config().unwrap().is_none());

        let curve = LevelCurve::from_tiers(vec![
            LevelTier { level: 1, title: "Egg".into(), threshold: 0 },
            LevelTier { level: 2, title: "Chick".into(), threshold: 5 },
        ])
        .unwrap();
        db.replace_level_config(&curve).unwrap();
        let loaded = db.load_level_config().unwrap().unwrap();
        assert_eq!(loaded.level_for(5).title, "Chick");

        db.clear_level_config().unwrap();
        assert!(db.load_level_config().unwrap().is_none());
    }
}
