//! Timer engine implementation.
//!
//! A tick-driven countdown state machine. It has no clock of its own: the
//! caller invokes `tick()` once per second while Running, and the local
//! tick count is the authoritative elapsed time.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (Paused | Completed | Cancelled)
//! Paused -> (Running | Cancelled | Idle)
//! (Completed | Cancelled) -> rearm -> Idle
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new();
//! engine.start(1500);
//! // Once per second:
//! engine.tick(); // Some(Event::SyncDue) every 5 s, Some(Event::TimerCompleted) at the end
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::events::Event;
use crate::session::SessionKey;

pub const DEFAULT_SYNC_EVERY_SECS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Completed,
    Cancelled,
}

impl TimerState {
    /// Completed and Cancelled end a session; only `rearm` leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, TimerState::Completed | TimerState::Cancelled)
    }
}

/// Point-in-time view of the engine, published by the timer service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimerStatus {
    pub state: TimerState,
    pub session: Option<SessionKey>,
    pub scheduled_secs: u32,
    pub elapsed_secs: u32,
    pub remaining_secs: u32,
    pub progress_pct: f64,
}

/// Core timer engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEngine {
    state: TimerState,
    scheduled_secs: u32,
    elapsed_secs: u32,
    /// Elapsed checkpoints are emitted every this many ticks.
    sync_every_secs: u32,
    session: Option<SessionKey>,
    /// Last key handed out; keys are never reused by one engine.
    #[serde(default)]
    last_session: SessionKey,
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerEngine {
    pub fn new() -> Self {
        Self::with_sync_interval(DEFAULT_SYNC_EVERY_SECS)
    }

    /// `sync_every_secs` of 0 is treated as 1.
    pub fn with_sync_interval(sync_every_secs: u32) -> Self {
        Self {
            state: TimerState::Idle,
            scheduled_secs: 0,
            elapsed_secs: 0,
            sync_every_secs: sync_every_secs.max(1),
            session: None,
            last_session: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn session(&self) -> Option<SessionKey> {
        self.session
    }

    pub fn scheduled_secs(&self) -> u32 {
        self.scheduled_secs
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs
    }

    pub fn remaining_secs(&self) -> u32 {
        self.scheduled_secs.saturating_sub(self.elapsed_secs)
    }

    /// 0.0 .. 100.0 progress through the scheduled duration.
    pub fn progress_pct(&self) -> f64 {
        if self.scheduled_secs == 0 {
            return 0.0;
        }
        (self.elapsed_secs as f64 / self.scheduled_secs as f64 * 100.0).min(100.0)
    }

    pub fn status(&self) -> TimerStatus {
        TimerStatus {
            state: self.state,
            session: self.session,
            scheduled_secs: self.scheduled_secs,
            elapsed_secs: self.elapsed_secs,
            remaining_secs: self.remaining_secs(),
            progress_pct: self.progress_pct(),
        }
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            state: self.state,
            session: self.session,
            scheduled_secs: self.scheduled_secs,
            elapsed_secs: self.elapsed_secs,
            remaining_secs: self.remaining_secs(),
            progress_pct: self.progress_pct(),
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a new session of `scheduled_secs`, or resume a paused one.
    ///
    /// When resuming, `scheduled_secs` is ignored.
    pub fn start(&mut self, scheduled_secs: u32) -> Option<Event> {
        match self.state {
            TimerState::Idle => {
                if scheduled_secs == 0 {
                    warn!("refusing to start a zero-length timer");
                    return None;
                }
                self.last_session += 1;
                let session = self.last_session;
                self.session = Some(session);
                self.scheduled_secs = scheduled_secs;
                self.elapsed_secs = 0;
                self.state = TimerState::Running;
                Some(Event::TimerStarted {
                    session,
                    scheduled_secs,
                    at: Utc::now(),
                })
            }
            TimerState::Paused => self.resume(),
            TimerState::Running => None, // Already running.
            TimerState::Completed | TimerState::Cancelled => {
                debug!(state = ?self.state, "timer finished; rearm before starting again");
                None
            }
        }
    }

    pub fn resume(&mut self) -> Option<Event> {
        if self.state != TimerState::Paused {
            return None;
        }
        let session = self.session?;
        self.state = TimerState::Running;
        Some(Event::TimerResumed {
            session,
            elapsed_secs: self.elapsed_secs,
            at: Utc::now(),
        })
    }

    pub fn pause(&mut self) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        let session = self.session?;
        self.state = TimerState::Paused;
        Some(Event::TimerPaused {
            session,
            elapsed_secs: self.elapsed_secs,
            at: Utc::now(),
        })
    }

    /// Advance one second. Returns `Some(Event::TimerCompleted)` when the
    /// schedule is exhausted and `Some(Event::SyncDue)` on checkpoints.
    pub fn tick(&mut self) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        let session = self.session?;
        self.elapsed_secs = self.elapsed_secs.saturating_add(1).min(self.scheduled_secs);

        if self.elapsed_secs >= self.scheduled_secs {
            self.state = TimerState::Completed;
            return Some(Event::TimerCompleted {
                session,
                elapsed_secs: self.elapsed_secs,
                at: Utc::now(),
            });
        }
        if self.elapsed_secs % self.sync_every_secs == 0 {
            return Some(Event::SyncDue {
                session,
                elapsed_secs: self.elapsed_secs,
                at: Utc::now(),
            });
        }
        None
    }

    /// Abandon the open session and return to Idle with elapsed 0.
    pub fn reset(&mut self) -> Option<Event> {
        if !matches!(self.state, TimerState::Running | TimerState::Paused) {
            return None;
        }
        let session = self.session.take()?;
        let elapsed_secs = self.elapsed_secs;
        self.state = TimerState::Idle;
        self.elapsed_secs = 0;
        Some(Event::TimerCancelled {
            session,
            elapsed_secs,
            at: Utc::now(),
        })
    }

    /// Terminal abort that keeps the elapsed value.
    pub fn cancel(&mut self) -> Option<Event> {
        if !matches!(self.state, TimerState::Running | TimerState::Paused) {
            return None;
        }
        let session = self.session?;
        self.state = TimerState::Cancelled;
        Some(Event::TimerCancelled {
            session,
            elapsed_secs: self.elapsed_secs,
            at: Utc::now(),
        })
    }

    /// Return a finished timer to Idle so a new session can start.
    pub fn rearm(&mut self) -> Option<Event> {
        if !self.state.is_terminal() {
            return None;
        }
        self.state = TimerState::Idle;
        self.elapsed_secs = 0;
        self.session = None;
        Some(Event::TimerRearmed { at: Utc::now() })
    }
}
