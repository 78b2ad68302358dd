//! Screen flashes.
//!
//! A full-viewport overlay is mounted on top of everything, its opacity
//! toggled per phase, and removed at the end. The display is kept awake for
//! the duration when the platform allows it; a refused wake lock does not
//! stop the flash.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{settle, ChannelKind, ChannelState, FireOutcome, NotificationChannel};
use crate::clock::{ClockOutcome, PatternClock, PhaseSink};
use crate::error::{ChannelError, PlatformError};
use crate::guard::{Lease, Release, ResourceGuard, SharedLease};
use crate::pattern::Pattern;
use crate::platform::{Overlay, OverlayStyle, Screen};

#[derive(Debug, Clone, PartialEq)]
pub struct VisualSettings {
    pub style: OverlayStyle,
    /// Pause at opacity zero before the overlay is removed.
    pub fade_out: Duration,
}

impl Default for VisualSettings {
    fn default() -> Self {
        Self {
            style: OverlayStyle::default(),
            fade_out: Duration::from_millis(100),
        }
    }
}

pub struct VisualChannel {
    screen: Arc<dyn Screen>,
    settings: VisualSettings,
    state: ChannelState,
}

impl VisualChannel {
    pub fn new(screen: Arc<dyn Screen>, settings: VisualSettings) -> Self {
        Self {
            screen,
            settings,
            state: ChannelState::new(ChannelKind::Visual),
        }
    }

    async fn keep_awake(&self) -> Option<ResourceGuard<dyn Release>> {
        if !self.screen.supports_wake_lock() {
            return None;
        }
        match self.screen.request_wake_lock().await {
            Ok(lock) => {
                debug!("wake lock activated");
                let guard = ResourceGuard::new(lock);
                let shared: Arc<dyn SharedLease> = guard.lease();
                self.state.attach(shared);
                Some(guard)
            }
            Err(err) => {
                warn!(error = %err, "wake lock request failed, flashing anyway");
                None
            }
        }
    }
}

struct OverlaySink {
    overlay: Arc<Lease<dyn Overlay>>,
    on: f32,
    off: f32,
}

#[async_trait]
impl PhaseSink for OverlaySink {
    async fn on_phase(&mut self, engaged: bool, _hold: Duration) -> Result<(), PlatformError> {
        if self.overlay.is_released() {
            return Ok(());
        }
        let opacity = if engaged { self.on } else { self.off };
        self.overlay.handle().set_opacity(opacity)
    }
}

#[async_trait]
impl NotificationChannel for VisualChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Visual
    }

    async fn probe(&self) -> bool {
        self.screen.is_available()
    }

    async fn fire(&self, pattern: &Pattern) -> Result<FireOutcome, ChannelError> {
        let Some(scope) = self.state.begin() else {
            return Ok(FireOutcome::Rejected);
        };
        let token = scope.token().clone();

        let wake_lock = self.keep_awake().await;
        if token.is_cancelled() {
            return Ok(FireOutcome::Cancelled);
        }

        let overlay = self
            .screen
            .mount_overlay(&self.settings.style)
            .map(ResourceGuard::new)
            .map_err(|source| match source {
                PlatformError::NotSupported(reason) => ChannelError::CapabilityUnavailable {
                    channel: ChannelKind::Visual,
                    reason,
                },
                source => ChannelError::AcquisitionFailure {
                    channel: ChannelKind::Visual,
                    source,
                },
            })
            .inspect_err(|err| warn!(error = %err, "failed to mount flash overlay"))?;
        let shared: Arc<dyn SharedLease> = overlay.lease();
        self.state.attach(shared);

        let mut sink = OverlaySink {
            overlay: overlay.lease(),
            on: self.settings.style.on_opacity,
            off: self.settings.style.off_opacity,
        };
        let result = PatternClock::run(pattern, &mut sink, &token).await;

        if matches!(result, Ok(ClockOutcome::Completed)) && !self.settings.fade_out.is_zero() {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(self.settings.fade_out) => {}
            }
        }

        overlay.release();
        if let Some(lock) = wake_lock {
            lock.release();
            debug!("wake lock released");
        }
        drop(scope);
        settle(ChannelKind::Visual, result, &token)
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
