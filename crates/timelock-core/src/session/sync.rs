use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{SessionKey, SessionStatus, SessionStore};
use crate::events::Event;

enum SyncCommand {
    Open {
        key: SessionKey,
        scheduled_secs: u32,
    },
    Elapsed {
        key: SessionKey,
        elapsed_secs: u32,
    },
    Status {
        key: SessionKey,
        status: SessionStatus,
        elapsed_secs: Option<u32>,
    },
}

/// Ordered background replica of the engine's lifecycle.
///
/// Commands are applied one at a time on a dedicated task, so the remote
/// record sees them in the order the engine produced them. Failures are
/// logged and dropped; the engine never waits on the store.
pub struct SessionSync {
    tx: mpsc::UnboundedSender<SyncCommand>,
    worker: JoinHandle<()>,
}

impl SessionSync {
    pub fn spawn(store: Arc<dyn SessionStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run(store, rx));
        Self { tx, worker }
    }

    /// Queue whatever remote write `event` implies. Events without a remote
    /// counterpart are ignored.
    pub fn submit(&self, event: &Event) {
        let command = match *event {
            Event::TimerStarted {
                session,
                scheduled_secs,
                ..
            } => SyncCommand::Open {
                key: session,
                scheduled_secs,
            },
            Event::SyncDue {
                session,
                elapsed_secs,
                ..
            } => SyncCommand::Elapsed {
                key: session,
                elapsed_secs,
            },
            Event::TimerResumed {
                session,
                elapsed_secs,
                ..
            } => status(session, SessionStatus::Running, elapsed_secs),
            Event::TimerPaused {
                session,
                elapsed_secs,
                ..
            } => status(session, SessionStatus::Paused, elapsed_secs),
            Event::TimerCompleted {
                session,
                elapsed_secs,
                ..
            } => status(session, SessionStatus::Completed, elapsed_secs),
            Event::TimerCancelled {
                session,
                elapsed_secs,
                ..
            } => status(session, SessionStatus::Cancelled, elapsed_secs),
            _ => return,
        };
        if self.tx.send(command).is_err() {
            warn!("session sync worker is gone; dropping update");
        }
    }

    /// Stop accepting commands and wait until the queue has drained.
    pub async fn flush(self) {
        drop(self.tx);
        if let Err(err) = self.worker.await {
            warn!(error = %err, "session sync worker panicked");
        }
    }
}

fn status(key: SessionKey, status: SessionStatus, elapsed_secs: u32) -> SyncCommand {
    SyncCommand::Status {
        key,
        status,
        elapsed_secs: Some(elapsed_secs),
    }
}

async fn run(store: Arc<dyn SessionStore>, mut rx: mpsc::UnboundedReceiver<SyncCommand>) {
    let mut remote: HashMap<SessionKey, String> = HashMap::new();

    while let Some(command) = rx.recv().await {
        match command {
            SyncCommand::Open {
                key,
                scheduled_secs,
            } => match store.open_session(scheduled_secs).await {
                Ok(id) => {
                    debug!(session = key, remote = %id, "session opened");
                    remote.insert(key, id);
                }
                Err(err) => warn!(session = key, error = %err, "failed to open remote session"),
            },
            SyncCommand::Elapsed { key, elapsed_secs } => {
                let Some(id) = remote.get(&key) else {
                    debug!(session = key, "no remote session; skipping elapsed sync");
                    continue;
                };
                if let Err(err) = store.sync_elapsed(id, elapsed_secs).await {
                    warn!(session = key, error = %err, "failed to sync elapsed time");
                }
            }
            SyncCommand::Status {
                key,
                status,
                elapsed_secs,
            } => {
                let id = if status.is_terminal() {
                    remote.remove(&key)
                } else {
                    remote.get(&key).cloned()
                };
                let Some(id) = id else {
                    debug!(session = key, %status, "no remote session; skipping status update");
                    continue;
                };
                if let Err(err) = store.set_status(&id, status, elapsed_secs).await {
                    warn!(session = key, %status, error = %err, "failed to update session status");
                }
            }
        }
    }
}
