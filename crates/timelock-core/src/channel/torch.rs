//! Camera torch flashes.
//!
//! The camera stream is acquired lazily when a fire starts and released when
//! it ends; it is never cached between fires because an open stream blocks
//! every other camera consumer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{settle, ChannelKind, ChannelState, FireOutcome, NotificationChannel};
use crate::clock::{PatternClock, PhaseSink};
use crate::error::{ChannelError, PlatformError};
use crate::guard::{Lease, ResourceGuard, SharedLease};
use crate::pattern::Pattern;
use crate::platform::{Camera, CameraStream};

pub struct TorchChannel {
    camera: Arc<dyn Camera>,
    state: ChannelState,
}

impl TorchChannel {
    pub fn new(camera: Arc<dyn Camera>) -> Self {
        Self {
            camera,
            state: ChannelState::new(ChannelKind::Torch),
        }
    }
}

struct TorchSink {
    lease: Arc<Lease<dyn CameraStream>>,
}

#[async_trait]
impl PhaseSink for TorchSink {
    async fn on_phase(&mut self, engaged: bool, _hold: Duration) -> Result<(), PlatformError> {
        if self.lease.is_released() {
            // Stopped underneath us; the release already put the torch out.
            return Ok(());
        }
        self.lease.handle().set_torch(engaged).await
    }
}

#[async_trait]
impl NotificationChannel for TorchChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Torch
    }

    /// Enumerates video inputs without requesting access, so browsers and
    /// hosts that hide devices before permission may under-report.
    async fn probe(&self) -> bool {
        if !self.camera.has_media_devices() {
            return false;
        }
        match self.camera.video_input_count().await {
            Ok(count) => count > 0,
            Err(err) => {
                warn!(error = %err, "torch support check failed");
                false
            }
        }
    }

    async fn fire(&self, pattern: &Pattern) -> Result<FireOutcome, ChannelError> {
        let Some(scope) = self.state.begin() else {
            return Ok(FireOutcome::Rejected);
        };
        let token = scope.token().clone();

        let guard = ResourceGuard::<dyn CameraStream>::acquire_torch(self.camera.as_ref())
            .await
            .inspect_err(|err| warn!(error = %err, "failed to initialize camera for flash"))?;
        if token.is_cancelled() {
            debug!("torch stopped while acquiring camera");
            guard.release();
            return Ok(FireOutcome::Cancelled);
        }

        let shared: Arc<dyn SharedLease> = guard.lease();
        self.state.attach(shared);

        let mut sink = TorchSink {
            lease: guard.lease(),
        };
        let result = PatternClock::run(pattern, &mut sink, &token).await;

        guard.release();
        drop(scope);
        settle(ChannelKind::Torch, result, &token)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PresetName;
    use crate::platform::memory::{SimulatedDevices, SimulatedPlatform};

    fn channel(devices: SimulatedDevices) -> (Arc<TorchChannel>, SimulatedPlatform) {
        let sim = SimulatedPlatform::new(devices);
        let channel = Arc::new(TorchChannel::new(sim.platform().camera));
        (channel, sim)
    }

    #[tokio::test(start_paused = true)]
    async fn completed_flash_ends_dark_and_released() {
        let (torch, sim) = channel(SimulatedDevices::default());

        let outcome = torch.fire_preset(PresetName::Short).await.unwrap();

        assert_eq!(outcome, FireOutcome::Completed);
        let log = sim.log();
        assert_eq!(log.torch, vec![true, false, true, false]);
        assert_eq!(log.streams_opened, 1);
        assert_eq!(log.open_streams(), 0);
        assert_eq!(torch.live_handles(), 0);
        assert!(!torch.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_torch_control_releases_partial_stream() {
        let (torch, sim) = channel(SimulatedDevices {
            torch: false,
            ..Default::default()
        });

        let err = torch.fire_preset(PresetName::Short).await.unwrap_err();

        assert!(matches!(err, ChannelError::CapabilityUnavailable { .. }));
        assert_eq!(sim.log().streams_opened, 1);
        assert_eq!(sim.log().open_streams(), 0);
        assert!(!torch.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn mid_sequence_failure_forces_off_and_releases() {
        let (torch, sim) = channel(SimulatedDevices {
            fail_torch_call: Some(2),
            ..Default::default()
        });

        let err = torch.fire_preset(PresetName::Medium).await.unwrap_err();

        assert!(matches!(err, ChannelError::MidSequence { .. }));
        let log = sim.log();
        assert_eq!(log.torch, vec![true, false]);
        assert_eq!(log.open_streams(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_requires_a_video_input() {
        let (torch, sim) = channel(SimulatedDevices::default());
        assert!(torch.probe().await);

        sim.update_devices(|d| d.cameras = 0);
        assert!(!torch.probe().await);

        sim.update_devices(|d| d.media_devices = false);
        assert!(!torch.probe().await);
    }
}
