//! HTTP client for a server-backed authoritative store.
//!
//! Sessions are PUT keyed by their client-generated id, so the server
//! call is idempotent by construction: a 409 means the session is already
//! applied and is treated as success.

use serde_json::json;

use crate::error::SyncError;
use crate::session::Session;
use crate::sync::types::{InsertOutcome, SessionSink};

/// Remote session store speaking the focusforge server API.
pub struct RemoteStore {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteStore {
    /// Create a client for the server at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn session_url(&self, session: &Session) -> String {
        format!(
            "{}/owners/{}/sessions/{}",
            self.base_url, session.owner, session.id
        )
    }
}

impl SessionSink for RemoteStore {
    fn insert(&self, session: &Session) -> Result<InsertOutcome, SyncError> {
        let url = self.session_url(session);
        let body = json!({
            "mode": session.mode.as_str(),
            "duration_secs": session.duration_secs,
            "tag": session.tag,
            "completed_at": session.completed_at.to_rfc3339(),
        });

        let response = tokio::runtime::Handle::current().block_on(async {
            self.client.put(&url).json(&body).send().await
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::CREATED || status == reqwest::StatusCode::OK {
            Ok(InsertOutcome::Inserted)
        } else if status == reqwest::StatusCode::CONFLICT {
            Ok(InsertOutcome::AlreadyApplied)
        } else if status.is_client_error() {
            let reason = tokio::runtime::Handle::current()
                .block_on(async { response.text().await })
                .unwrap_or_else(|_| status.to_string());
            Err(SyncError::SessionRejected {
                id: session.id,
                reason,
            })
        } else {
            Err(SyncError::RemoteApi(format!("server returned {status}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionMode;
    use chrono::Utc;

    fn session() -> Session {
        Session::new("alice", SessionMode::Focus, 1500, None, Utc::now()).unwrap()
    }

    fn with_runtime<T>(f: impl FnOnce() -> T) -> T {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let _guard = rt.enter();
        f()
    }

    #[test]
    fn created_maps_to_inserted() {
        let mut server = mockito::Server::new();
        let s = session();
        let mock = server
            .mock("PUT", format!("/owners/alice/sessions/{}", s.id).as_str())
            .with_status(201)
            .create();

        let store = RemoteStore::new(server.url());
        let outcome = with_runtime(|| store.insert(&s)).unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);
        mock.assert();
    }

    #[test]
    fn conflict_maps_to_already_applied() {
        let mut server = mockito::Server::new();
        let s = session();
        server
            .mock("PUT", format!("/owners/alice/sessions/{}", s.id).as_str())
            .with_status(409)
            .create();

        let store = RemoteStore::new(server.url());
        let outcome = with_runtime(|| store.insert(&s)).unwrap();
        assert_eq!(outcome, InsertOutcome::AlreadyApplied);
    }

    #[test]
    fn client_error_is_a_rejection() {
        let mut server = mockito::Server::new();
        let s = session();
        server
            .mock("PUT", format!("/owners/alice/sessions/{}", s.id).as_str())
            .with_status(422)
            .with_body("duration must be > 0")
            .create();

        let store = RemoteStore::new(server.url());
        let err = with_runtime(|| store.insert(&s)).unwrap_err();
        match err {
            SyncError::SessionRejected { id, reason } => {
                assert_eq!(id, s.id);
                assert!(reason.contains("duration"));
            }
            other => panic!("expected rejection, got {other}"),
        }
    }

    #[test]
    fn server_error_is_transient() {
        let mut server = mockito::Server::new();
        let s = session();
        server
            .mock("PUT", format!("/owners/alice/sessions/{}", s.id).as_str())
            .with_status(503)
            .create();

        let store = RemoteStore::new(server.url());
        let err = with_runtime(|| store.insert(&s)).unwrap_err();
        assert!(matches!(err, SyncError::RemoteApi(_)));
    }
}
