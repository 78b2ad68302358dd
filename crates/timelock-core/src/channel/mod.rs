//! Notification channels.
//!
//! Each channel instance runs at most one pattern at a time:
//!
//! ```text
//! Idle --fire--> Firing --(complete | cancel | error)--> Idle
//! ```
//!
//! A `fire` while `Firing` is rejected, not queued. `stop` is valid in any
//! state and is a no-op when idle.

mod haptic;
mod torch;
mod visual;

pub use haptic::HapticChannel;
pub use torch::TorchChannel;
pub use visual::{VisualChannel, VisualSettings};

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::ClockOutcome;
use crate::error::{ChannelError, PlatformError, ValidationError};
use crate::guard::SharedLease;
use crate::pattern::{Pattern, PresetName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Visual,
    Haptic,
    Torch,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] = [ChannelKind::Visual, ChannelKind::Haptic, ChannelKind::Torch];

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Visual => "visual",
            ChannelKind::Haptic => "haptic",
            ChannelKind::Torch => "torch",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "visual" | "screen" => Ok(ChannelKind::Visual),
            "haptic" | "vibration" => Ok(ChannelKind::Haptic),
            "torch" | "device" | "flashlight" => Ok(ChannelKind::Torch),
            other => Err(ValidationError::InvalidValue {
                field: "channel".into(),
                message: format!("unknown channel '{other}'"),
            }),
        }
    }
}

/// How a `fire` call ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FireOutcome {
    Completed,
    Cancelled,
    /// Another fire was already in flight on this channel.
    Rejected,
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Best-effort capability check. Never fails; `false` on any doubt.
    async fn probe(&self) -> bool;

    /// Play `pattern`. Resolves when the pattern finishes or is stopped.
    async fn fire(&self, pattern: &Pattern) -> Result<FireOutcome, ChannelError>;

    async fn fire_preset(&self, preset: PresetName) -> Result<FireOutcome, ChannelError> {
        self.fire(&preset.pattern()).await
    }

    /// Cancel the in-flight fire and release its resources right away.
    async fn stop(&self);

    fn is_active(&self) -> bool;

    /// Hardware handles currently held (0 or 1 per resource kind).
    fn live_handles(&self) -> usize;
}

#[derive(Default)]
struct Slot {
    cancel: Option<CancellationToken>,
    leases: Vec<Arc<dyn SharedLease>>,
}

/// Per-instance `{is_active, handles}` bookkeeping shared by all channels.
pub(crate) struct ChannelState {
    kind: ChannelKind,
    active: AtomicBool,
    slot: Mutex<Slot>,
}

impl ChannelState {
    pub(crate) fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            active: AtomicBool::new(false),
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Claim the channel for one fire. `None` if already firing.
    ///
    /// The token is stored under the slot lock in the same step that marks
    /// the channel active, so any `interrupt` that observes `is_active()`
    /// also finds the token.
    pub(crate) fn begin(&self) -> Option<FireScope<'_>> {
        let token = {
            let mut slot = self.lock();
            if self
                .active
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                drop(slot);
                warn!(channel = %self.kind, "fire already in progress, rejecting");
                return None;
            }
            let token = CancellationToken::new();
            slot.cancel = Some(token.clone());
            token
        };
        debug!(channel = %self.kind, "fire started");
        Some(FireScope { state: self, token })
    }

    /// Record a handle so `interrupt` can revoke it.
    pub(crate) fn attach(&self, lease: Arc<dyn SharedLease>) {
        self.lock().leases.push(lease);
    }

    /// Cancel the in-flight fire and revoke its handles. Returns how many
    /// handles this call released.
    pub(crate) fn interrupt(&self) -> usize {
        let (token, leases) = {
            let mut slot = self.lock();
            (slot.cancel.clone(), std::mem::take(&mut slot.leases))
        };
        let Some(token) = token else {
            debug!(channel = %self.kind, "stop on idle channel");
            return 0;
        };
        token.cancel();
        let released = leases.iter().filter(|lease| lease.revoke()).count();
        info!(channel = %self.kind, released, "channel stopped");
        released
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn live_handles(&self) -> usize {
        self.lock()
            .leases
            .iter()
            .filter(|lease| !lease.is_released())
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held for the duration of one fire; returns the channel to Idle on drop.
pub(crate) struct FireScope<'a> {
    state: &'a ChannelState,
    token: CancellationToken,
}

impl FireScope<'_> {
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for FireScope<'_> {
    fn drop(&mut self) {
        let leases = {
            let mut slot = self.state.lock();
            slot.cancel = None;
            std::mem::take(&mut slot.leases)
        };
        for lease in leases {
            lease.revoke();
        }
        self.state.active.store(false, Ordering::Release);
        debug!(channel = %self.state.kind, "fire finished");
    }
}

/// Map a clock result to the channel-level outcome.
///
/// A platform error that races with a stop counts as a cancellation.
pub(crate) fn settle(
    kind: ChannelKind,
    result: Result<ClockOutcome, PlatformError>,
    token: &CancellationToken,
) -> Result<FireOutcome, ChannelError> {
    match result {
        Ok(ClockOutcome::Completed) => {
            info!(channel = %kind, "pattern completed");
            Ok(FireOutcome::Completed)
        }
        Ok(ClockOutcome::Cancelled) => {
            info!(channel = %kind, "pattern cancelled");
            Ok(FireOutcome::Cancelled)
        }
        Err(err) if token.is_cancelled() => {
            debug!(channel = %kind, error = %err, "platform error after stop, treating as cancelled");
            Ok(FireOutcome::Cancelled)
        }
        Err(source) => {
            warn!(channel = %kind, error = %source, "pattern failed mid-sequence");
            Err(ChannelError::MidSequence {
                channel: kind,
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::{Release, ResourceGuard};
    use std::sync::atomic::AtomicUsize;

    struct Counted(Arc<AtomicUsize>);

    impl Release for Counted {
        fn release(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn second_begin_is_rejected_until_scope_ends() {
        let state = ChannelState::new(ChannelKind::Visual);
        let scope = state.begin().unwrap();
        assert!(state.is_active());
        assert!(state.begin().is_none());
        drop(scope);
        assert!(!state.is_active());
        assert!(state.begin().is_some());
    }

    #[test]
    fn interrupt_cancels_and_revokes_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let state = ChannelState::new(ChannelKind::Torch);
        let scope = state.begin().unwrap();
        let guard = ResourceGuard::new(Box::new(Counted(Arc::clone(&count))));
        state.attach(guard.lease());
        assert_eq!(state.live_handles(), 1);

        assert_eq!(state.interrupt(), 1);
        assert!(scope.token().is_cancelled());
        assert_eq!(state.interrupt(), 0);
        drop(guard);
        drop(scope);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(state.live_handles(), 0);
    }

    #[test]
    fn interrupt_seen_after_activation_always_cancels() {
        for _ in 0..200 {
            let state = Arc::new(ChannelState::new(ChannelKind::Torch));
            let stopper = {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    while !state.is_active() {
                        std::hint::spin_loop();
                    }
                    state.interrupt();
                })
            };

            let scope = state.begin().unwrap();
            stopper.join().unwrap();
            assert!(scope.token().is_cancelled());
        }
    }

    #[test]
    fn interrupt_on_idle_is_noop() {
        let state = ChannelState::new(ChannelKind::Haptic);
        assert_eq!(state.interrupt(), 0);
        assert!(!state.is_active());
    }

    #[test]
    fn channel_aliases_parse() {
        assert_eq!("screen".parse::<ChannelKind>().unwrap(), ChannelKind::Visual);
        assert_eq!("vibration".parse::<ChannelKind>().unwrap(), ChannelKind::Haptic);
        assert_eq!("device".parse::<ChannelKind>().unwrap(), ChannelKind::Torch);
        assert!("speaker".parse::<ChannelKind>().is_err());
    }

    #[test]
    fn errors_after_stop_settle_as_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome = settle(
            ChannelKind::Torch,
            Err(PlatformError::Io("track ended".into())),
            &token,
        );
        assert_eq!(outcome, Ok(FireOutcome::Cancelled));
    }
}
