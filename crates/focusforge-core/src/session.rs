//! Session data model.
//!
//! A session is one completed timer interval. Sessions are created the
//! instant a timer reaches zero and are immutable afterwards; the only
//! destructive operation is an administrative bulk clear per owner, which
//! cascades into cached aggregates.
//!
//! Only `Focus` sessions feed streaks, levels, challenges and the focus
//! score. `Break` sessions are stored but excluded from every derived
//! metric.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Timer mode for a completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Focus,
    Break,
}

impl SessionMode {
    /// Stable string form used in storage and wire payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Focus => "focus",
            SessionMode::Break => "break",
        }
    }

    /// Parse the storage string form.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "focus" => Ok(SessionMode::Focus),
            "break" => Ok(SessionMode::Break),
            other => Err(ValidationError::InvalidValue {
                field: "mode".to_string(),
                message: format!("unknown session mode '{other}'"),
            }),
        }
    }
}

/// Whether a locally created session has been merged into the
/// authoritative store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Pending,
    Synced,
}

/// One completed focus or break interval.
///
/// The id is client-generated (uuid v4) so that offline writes carry a
/// globally unique identity before they ever reach the server. The pair
/// (owner, id) is the primary key everywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub owner: String,
    pub mode: SessionMode,
    pub duration_secs: u32,
    #[serde(default)]
    pub tag: Option<String>,
    pub completed_at: DateTime<Utc>,
    pub sync_state: SyncState,
}

impl Session {
    /// Create a new pending session with a fresh client-generated id.
    ///
    /// # Errors
    /// Returns an error if `duration_secs` is zero or the owner is empty.
    pub fn new(
        owner: impl Into<String>,
        mode: SessionMode,
        duration_secs: u32,
        tag: Option<String>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let owner = owner.into();
        if owner.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "owner".to_string(),
                message: "owner must not be empty".to_string(),
            });
        }
        if duration_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "duration_secs".to_string(),
                message: "duration must be > 0".to_string(),
            });
        }
        Ok(Self {
            id: Uuid::new_v4(),
            owner,
            mode,
            duration_secs,
            tag,
            completed_at,
            sync_state: SyncState::Pending,
        })
    }

    /// True for sessions that count toward derived metrics.
    pub fn is_focus(&self) -> bool {
        self.mode == SessionMode::Focus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_pending_with_fresh_id() {
        let a = Session::new("alice", SessionMode::Focus, 1500, None, Utc::now()).unwrap();
        let b = Session::new("alice", SessionMode::Focus, 1500, None, Utc::now()).unwrap();
        assert_eq!(a.sync_state, SyncState::Pending);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn zero_duration_rejected() {
        let err = Session::new("alice", SessionMode::Focus, 0, None, Utc::now());
        assert!(err.is_err());
    }

    #[test]
    fn empty_owner_rejected() {
        let err = Session::new("", SessionMode::Break, 300, None, Utc::now());
        assert!(err.is_err());
    }

    #[test]
    fn mode_string_roundtrip() {
        assert_eq!(SessionMode::parse("focus").unwrap(), SessionMode::Focus);
        assert_eq!(SessionMode::parse("break").unwrap(), SessionMode::Break);
        assert!(SessionMode::parse("nap").is_err());
    }
}
