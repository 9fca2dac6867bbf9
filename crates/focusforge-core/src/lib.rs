//! # Focusforge Core Library
//!
//! This library provides the core business logic for Focusforge, a
//! gamified focus timer. It implements a CLI-first philosophy where all
//! operations are available via a standalone CLI binary, with any GUI
//! being a thin layer over the same core library.
//!
//! ## Architecture
//!
//! - **Derivation engine**: pure, idempotent functions that turn an
//!   unordered, append-only session history into streaks, a level, a
//!   decaying focus-fitness score and challenge progress
//! - **Storage**: SQLite-based authoritative session store and TOML-based
//!   configuration
//! - **Sync**: a pending queue for offline-created sessions and a
//!   reconciler that merges them into the authoritative store exactly
//!   once
//!
//! ## Key Components
//!
//! - [`StreakCalculator`]: daily/weekly/best streak derivation
//! - [`LevelCurve`]: lifetime count to level/title mapping
//! - [`evaluate_catalog`]: challenge progress and completion latching
//! - [`derive_profile`]: the aggregated read-only profile view
//! - [`Reconciler`]: exactly-once local-to-authoritative merge

pub mod calendar;
pub mod challenge;
pub mod error;
pub mod fitness;
pub mod level;
pub mod profile;
pub mod session;
pub mod storage;
pub mod streak;
pub mod sync;

pub use challenge::{evaluate_catalog, ChallengeDef, ChallengeKind, ChallengeProgress};
pub use error::{ConfigError, CoreError, DatabaseError, SyncError, ValidationError};
pub use fitness::{fitness_series, FitnessConfig, FitnessPoint};
pub use level::{LevelCurve, LevelInfo, LevelTier, MAX_LEVEL};
pub use profile::{backfill, derive_profile, ChallengeView, ProfileView};
pub use session::{Session, SessionMode, SyncState};
pub use storage::{Config, Database};
pub use streak::{StreakCalculator, StreakSummary};
pub use sync::{PendingQueue, Reconciler, RemoteStore, SyncOutcome, SyncReport};
