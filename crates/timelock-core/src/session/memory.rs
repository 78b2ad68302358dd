use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use super::{SessionStatus, SessionStore};
use crate::error::SessionError;

/// One session as the store sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredSession {
    pub id: String,
    pub scheduled_secs: u32,
    pub elapsed_secs: u32,
    pub status: SessionStatus,
    /// Every status write, in order.
    pub status_writes: Vec<SessionStatus>,
    pub elapsed_syncs: Vec<u32>,
}

/// In-process session store with the same clamping rules as the backend.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<Vec<StoredSession>>,
    offline: AtomicBool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with [`SessionError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn sessions(&self) -> Vec<StoredSession> {
        self.lock().clone()
    }

    pub fn get(&self, id: &str) -> Option<StoredSession> {
        self.lock().iter().find(|s| s.id == id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StoredSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_online(&self) -> Result<(), SessionError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SessionError::Unavailable);
        }
        Ok(())
    }

    fn update(
        &self,
        id: &str,
        f: impl FnOnce(&mut StoredSession),
    ) -> Result<(), SessionError> {
        self.check_online()?;
        let mut sessions = self.lock();
        let session = sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| SessionError::UnknownSession(id.to_string()))?;
        f(session);
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn open_session(&self, scheduled_secs: u32) -> Result<String, SessionError> {
        self.check_online()?;
        let id = Uuid::new_v4().to_string();
        self.lock().push(StoredSession {
            id: id.clone(),
            scheduled_secs,
            elapsed_secs: 0,
            status: SessionStatus::Running,
            status_writes: Vec::new(),
            elapsed_syncs: Vec::new(),
        });
        Ok(id)
    }

    async fn sync_elapsed(&self, id: &str, elapsed_secs: u32) -> Result<(), SessionError> {
        self.update(id, |s| {
            s.elapsed_secs = elapsed_secs.min(s.scheduled_secs);
            s.elapsed_syncs.push(elapsed_secs);
        })
    }

    async fn set_status(
        &self,
        id: &str,
        status: SessionStatus,
        elapsed_secs: Option<u32>,
    ) -> Result<(), SessionError> {
        self.update(id, |s| {
            if let Some(elapsed) = elapsed_secs {
                s.elapsed_secs = elapsed.min(s.scheduled_secs);
            }
            s.status = status;
            s.status_writes.push(status);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn elapsed_is_clamped_to_schedule() {
        let store = MemorySessionStore::new();
        let id = store.open_session(60).await.unwrap();

        store.sync_elapsed(&id, 90).await.unwrap();

        assert_eq!(store.get(&id).unwrap().elapsed_secs, 60);
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = MemorySessionStore::new();
        let id = store.open_session(60).await.unwrap();
        store.set_offline(true);

        assert!(store.open_session(10).await.is_err());
        assert!(matches!(
            store.set_status(&id, SessionStatus::Paused, Some(5)).await,
            Err(SessionError::Unavailable)
        ));
    }

    #[tokio::test]
    async fn unknown_session_is_reported() {
        let store = MemorySessionStore::new();
        assert!(matches!(
            store.sync_elapsed("nope", 5).await,
            Err(SessionError::UnknownSession(_))
        ));
    }
}
