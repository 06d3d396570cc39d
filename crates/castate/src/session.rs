//! Session lifecycle

use castate_traits::{ChainAbstractionClient, EvmProvider};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Where the SDK session stands
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SessionStatus {
    /// No session was attempted, or the adapter was disposed
    #[default]
    Uninitialized,
    /// Handshake or initial fetch in flight
    Initializing,
    /// Handshake and initial fetch succeeded
    Ready,
    /// The attempt failed; stays until `retry_session`
    Failed(String),
}

impl SessionStatus {
    /// True only in [`SessionStatus::Ready`]
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionStatus::Ready)
    }

    /// Whether the last attempt failed
    pub fn is_failed(&self) -> bool {
        matches!(self, SessionStatus::Failed(_))
    }

    /// Why the last attempt failed
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            SessionStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Uninitialized => write!(f, "uninitialized"),
            SessionStatus::Initializing => write!(f, "initializing"),
            SessionStatus::Ready => write!(f, "ready"),
            SessionStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// What `ensure_session` hands back
#[derive(Clone)]
pub struct SessionHandle {
    status: SessionStatus,
    client: Option<Arc<dyn ChainAbstractionClient>>,
}

impl SessionHandle {
    pub(crate) fn new(status: SessionStatus, client: Option<Arc<dyn ChainAbstractionClient>>) -> Self {
        Self { status, client }
    }

    /// Status at the time the call returned
    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// Whether the session is usable
    pub fn is_ready(&self) -> bool {
        self.status.is_ready()
    }

    /// The SDK client, present while initializing and once ready
    pub fn client(&self) -> Option<&Arc<dyn ChainAbstractionClient>> {
        self.client.as_ref()
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("status", &self.status)
            .field("has_client", &self.client.is_some())
            .finish()
    }
}

/// Session record kept by the adapter
#[derive(Default)]
pub(crate) struct SessionRecord {
    pub status: SessionStatus,
    pub client: Option<Arc<dyn ChainAbstractionClient>>,
    pub provider: Option<Arc<dyn EvmProvider>>,
    pub attempts: u32,
}

impl SessionRecord {
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(self.status.clone(), self.client.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_queries() {
        assert!(SessionStatus::Ready.is_ready());
        assert!(!SessionStatus::Initializing.is_ready());

        let failed = SessionStatus::Failed("backend down".into());
        assert!(failed.is_failed());
        assert_eq!(failed.failure_reason(), Some("backend down"));
        assert_eq!(failed.to_string(), "failed: backend down");
        assert_eq!(SessionStatus::default(), SessionStatus::Uninitialized);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(SessionStatus::Failed("x".into())).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "x");

        let json = serde_json::to_value(SessionStatus::Ready).unwrap();
        assert_eq!(json["status"], "ready");
    }

    #[test]
    fn test_empty_handle() {
        let handle = SessionRecord::default().handle();
        assert!(!handle.is_ready());
        assert!(handle.client().is_none());
    }
}
