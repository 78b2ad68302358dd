use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::manager::ChannelReport;
use crate::pattern::PresetName;
use crate::session::SessionKey;
use crate::timer::TimerState;

/// Every timer state change produces an Event.
/// The session sync worker and CLI observers subscribe to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        session: SessionKey,
        scheduled_secs: u32,
        at: DateTime<Utc>,
    },
    TimerPaused {
        session: SessionKey,
        elapsed_secs: u32,
        at: DateTime<Utc>,
    },
    TimerResumed {
        session: SessionKey,
        elapsed_secs: u32,
        at: DateTime<Utc>,
    },
    /// Periodic elapsed checkpoint for the remote replica.
    SyncDue {
        session: SessionKey,
        elapsed_secs: u32,
        at: DateTime<Utc>,
    },
    TimerCompleted {
        session: SessionKey,
        elapsed_secs: u32,
        at: DateTime<Utc>,
    },
    /// Emitted by both `reset` (elapsed before the reset) and `cancel`.
    TimerCancelled {
        session: SessionKey,
        elapsed_secs: u32,
        at: DateTime<Utc>,
    },
    /// A finished timer was returned to Idle.
    TimerRearmed {
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        #[serde(skip_serializing_if = "Option::is_none")]
        session: Option<SessionKey>,
        scheduled_secs: u32,
        elapsed_secs: u32,
        remaining_secs: u32,
        progress_pct: f64,
        at: DateTime<Utc>,
    },
    NotificationsFired {
        preset: PresetName,
        reports: Vec<ChannelReport>,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Session the event belongs to, if any.
    pub fn session(&self) -> Option<SessionKey> {
        match self {
            Event::TimerStarted { session, .. }
            | Event::TimerPaused { session, .. }
            | Event::TimerResumed { session, .. }
            | Event::SyncDue { session, .. }
            | Event::TimerCompleted { session, .. }
            | Event::TimerCancelled { session, .. } => Some(*session),
            Event::StateSnapshot { session, .. } => *session,
            Event::TimerRearmed { .. } | Event::NotificationsFired { .. } => None,
        }
    }
}
