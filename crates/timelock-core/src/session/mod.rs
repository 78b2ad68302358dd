//! The remote session collaborator.
//!
//! The engine's local tick count is authoritative; the remote record is a
//! durability/analytics replica. Every call is fire-and-forget from the
//! engine's point of view: [`SessionSync`] runs them in order on its own
//! task and only logs failures.

mod http;
mod memory;
mod sync;

pub use http::HttpSessionStore;
pub use memory::{MemorySessionStore, StoredSession};
pub use sync::SessionSync;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Local identifier of one timer run. Fresh for every start from idle.
pub type SessionKey = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Paused,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionStatus::Running => "running",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        })
    }
}

/// Remote store for timer sessions. Updates are idempotent upserts.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a running session and return its remote id.
    async fn open_session(&self, scheduled_secs: u32) -> Result<String, SessionError>;

    async fn sync_elapsed(&self, id: &str, elapsed_secs: u32) -> Result<(), SessionError>;

    async fn set_status(
        &self,
        id: &str,
        status: SessionStatus,
        elapsed_secs: Option<u32>,
    ) -> Result<(), SessionError>;
}

/// Drops every update. Used when no backend is configured.
pub struct NullSessionStore;

#[async_trait]
impl SessionStore for NullSessionStore {
    async fn open_session(&self, _scheduled_secs: u32) -> Result<String, SessionError> {
        Ok("local".into())
    }

    async fn sync_elapsed(&self, _id: &str, _elapsed_secs: u32) -> Result<(), SessionError> {
        Ok(())
    }

    async fn set_status(
        &self,
        _id: &str,
        _status: SessionStatus,
        _elapsed_secs: Option<u32>,
    ) -> Result<(), SessionError> {
        Ok(())
    }
}
