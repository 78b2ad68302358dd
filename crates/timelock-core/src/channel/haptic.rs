//! Vibration.
//!
//! The platform vibrate call is pattern-aware: an engaged phase asks for a
//! vibration lasting that phase, a disengaged phase cancels.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{settle, ChannelKind, ChannelState, FireOutcome, NotificationChannel};
use crate::clock::{PatternClock, PhaseSink};
use crate::error::{ChannelError, PlatformError};
use crate::guard::{Release, ResourceGuard, SharedLease};
use crate::pattern::Pattern;
use crate::platform::Vibrator;

pub struct HapticChannel {
    vibrator: Arc<dyn Vibrator>,
    state: ChannelState,
}

impl HapticChannel {
    pub fn new(vibrator: Arc<dyn Vibrator>) -> Self {
        Self {
            vibrator,
            state: ChannelState::new(ChannelKind::Haptic),
        }
    }
}

/// The motor as a releasable resource: releasing it stops vibration.
struct VibrationSession {
    vibrator: Arc<dyn Vibrator>,
}

impl Release for VibrationSession {
    fn release(&self) {
        if let Err(err) = self.vibrator.cancel() {
            warn!(error = %err, "failed to stop vibration");
        }
    }
}

struct VibrationSink {
    vibrator: Arc<dyn Vibrator>,
}

#[async_trait]
impl PhaseSink for VibrationSink {
    async fn on_phase(&mut self, engaged: bool, hold: Duration) -> Result<(), PlatformError> {
        if !engaged || hold.is_zero() {
            return self.vibrator.cancel();
        }
        if !self.vibrator.vibrate(hold)? {
            warn!(hold_ms = hold.as_millis() as u64, "vibration request was rejected");
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for HapticChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Haptic
    }

    async fn probe(&self) -> bool {
        self.vibrator.is_supported()
    }

    async fn fire(&self, pattern: &Pattern) -> Result<FireOutcome, ChannelError> {
        if !self.vibrator.is_supported() {
            warn!("vibration is not supported on this device");
            return Err(ChannelError::CapabilityUnavailable {
                channel: ChannelKind::Haptic,
                reason: "no vibration motor".into(),
            });
        }
        let Some(scope) = self.state.begin() else {
            return Ok(FireOutcome::Rejected);
        };
        let token = scope.token().clone();

        let motor: ResourceGuard<dyn Release> = ResourceGuard::new(Box::new(VibrationSession {
            vibrator: Arc::clone(&self.vibrator),
        }));
        let shared: Arc<dyn SharedLease> = motor.lease();
        self.state.attach(shared);
        debug!(phases = pattern.len(), "vibration triggered");

        let mut sink = VibrationSink {
            vibrator: Arc::clone(&self.vibrator),
        };
        let result = PatternClock::run(pattern, &mut sink, &token).await;

        motor.release();
        drop(scope);
        settle(ChannelKind::Haptic, result, &token)
    }

    async fn stop(&self) {
        self.state.interrupt();
    }

    fn is_active(&self) -> bool {
        self.state.is_active()
    }

    fn live_handles(&self) -> usize {
        self.state.live_handles()
    }
}
