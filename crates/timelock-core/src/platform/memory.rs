//! Simulated devices.
//!
//! Every call is recorded in a [`DeviceLog`] so tests (and `--simulate`
//! runs of the CLI) can see exactly what a channel did to the hardware.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::{Camera, CameraStream, Overlay, OverlayStyle, Platform, PlatformInfo, Screen, Vibrator};
use crate::error::PlatformError;
use crate::guard::Release;

/// What the simulated host supports and how it misbehaves.
#[derive(Debug, Clone)]
pub struct SimulatedDevices {
    pub screen: bool,
    pub wake_lock: bool,
    pub wake_lock_error: Option<PlatformError>,
    pub vibrator: bool,
    /// `Ok(false)` from every vibrate call.
    pub vibrator_declines: bool,
    pub media_devices: bool,
    pub cameras: usize,
    pub torch: bool,
    pub camera_error: Option<PlatformError>,
    /// Fail the n-th `set_torch` call (1-based) across the platform's lifetime.
    pub fail_torch_call: Option<usize>,
}

impl Default for SimulatedDevices {
    fn default() -> Self {
        Self {
            screen: true,
            wake_lock: true,
            wake_lock_error: None,
            vibrator: true,
            vibrator_declines: false,
            media_devices: true,
            cameras: 1,
            torch: true,
            camera_error: None,
            fail_torch_call: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceLog {
    pub overlays_mounted: usize,
    pub overlays_removed: usize,
    pub opacity: Vec<f32>,
    pub wake_locks_acquired: usize,
    pub wake_locks_released: usize,
    /// Milliseconds per vibrate call.
    pub vibrations: Vec<u64>,
    pub vibration_cancels: usize,
    pub streams_opened: usize,
    pub streams_released: usize,
    pub torch: Vec<bool>,
    pub torch_calls: usize,
}

impl DeviceLog {
    pub fn open_streams(&self) -> usize {
        self.streams_opened - self.streams_released
    }

    pub fn mounted_overlays(&self) -> usize {
        self.overlays_mounted - self.overlays_removed
    }

    pub fn held_wake_locks(&self) -> usize {
        self.wake_locks_acquired - self.wake_locks_released
    }
}

#[derive(Default)]
struct SimState {
    devices: Mutex<SimulatedDevices>,
    log: Mutex<DeviceLog>,
}

impl SimState {
    fn devices(&self) -> SimulatedDevices {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn log_mut(&self) -> MutexGuard<'_, DeviceLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory host. Clones share the same devices and log.
#[derive(Clone, Default)]
pub struct SimulatedPlatform {
    state: Arc<SimState>,
}

impl SimulatedPlatform {
    pub fn new(devices: SimulatedDevices) -> Self {
        Self {
            state: Arc::new(SimState {
                devices: Mutex::new(devices),
                log: Mutex::new(DeviceLog::default()),
            }),
        }
    }

    /// Snapshot of everything recorded so far.
    pub fn log(&self) -> DeviceLog {
        self.state.log_mut().clone()
    }

    pub fn update_devices(&self, f: impl FnOnce(&mut SimulatedDevices)) {
        f(&mut self
            .state
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner));
    }

    /// Bundle this simulator as a [`Platform`].
    pub fn platform(&self) -> Platform {
        Platform {
            screen: Arc::new(self.clone()),
            vibrator: Arc::new(self.clone()),
            camera: Arc::new(self.clone()),
            info: PlatformInfo::detect(),
        }
    }

    fn devices(&self) -> SimulatedDevices {
        self.state.devices()
    }

    fn log_mut(&self) -> MutexGuard<'_, DeviceLog> {
        self.state.log_mut()
    }
}

#[async_trait]
impl Screen for SimulatedPlatform {
    fn is_available(&self) -> bool {
        self.devices().screen
    }

    fn supports_wake_lock(&self) -> bool {
        self.devices().wake_lock
    }

    async fn request_wake_lock(&self) -> Result<Box<dyn Release>, PlatformError> {
        let devices = self.devices();
        if !devices.wake_lock {
            return Err(PlatformError::NotSupported("wake lock".into()));
        }
        if let Some(err) = devices.wake_lock_error {
            return Err(err);
        }
        self.log_mut().wake_locks_acquired += 1;
        debug!("simulated wake lock acquired");
        Ok(Box::new(SimWakeLock {
            state: Arc::clone(&self.state),
        }))
    }

    fn mount_overlay(&self, style: &OverlayStyle) -> Result<Box<dyn Overlay>, PlatformError> {
        if !self.devices().screen {
            return Err(PlatformError::NotSupported("screen overlay".into()));
        }
        let mut log = self.log_mut();
        log.overlays_mounted += 1;
        log.opacity.push(style.off_opacity);
        debug!(color = %style.color, "simulated overlay mounted");
        Ok(Box::new(SimOverlay {
            state: Arc::clone(&self.state),
        }))
    }
}

impl Vibrator for SimulatedPlatform {
    fn is_supported(&self) -> bool {
        self.devices().vibrator
    }

    fn vibrate(&self, duration: Duration) -> Result<bool, PlatformError> {
        let devices = self.devices();
        if !devices.vibrator {
            return Err(PlatformError::NotSupported("vibrator".into()));
        }
        self.log_mut().vibrations.push(duration.as_millis() as u64);
        Ok(!devices.vibrator_declines)
    }

    fn cancel(&self) -> Result<(), PlatformError> {
        self.log_mut().vibration_cancels += 1;
        Ok(())
    }
}

#[async_trait]
impl Camera for SimulatedPlatform {
    fn has_media_devices(&self) -> bool {
        self.devices().media_devices
    }

    async fn video_input_count(&self) -> Result<usize, PlatformError> {
        let devices = self.devices();
        if !devices.media_devices {
            return Err(PlatformError::NotSupported("media devices".into()));
        }
        Ok(devices.cameras)
    }

    async fn open_rear_stream(&self) -> Result<Box<dyn CameraStream>, PlatformError> {
        let devices = self.devices();
        if let Some(err) = devices.camera_error {
            return Err(err);
        }
        if devices.cameras == 0 {
            return Err(PlatformError::NotSupported("no video input".into()));
        }
        self.log_mut().streams_opened += 1;
        Ok(Box::new(SimStream {
            state: Arc::clone(&self.state),
            torch_capable: devices.torch,
        }))
    }
}

struct SimWakeLock {
    state: Arc<SimState>,
}

impl Release for SimWakeLock {
    fn release(&self) {
        self.state.log_mut().wake_locks_released += 1;
    }
}

struct SimOverlay {
    state: Arc<SimState>,
}

impl Release for SimOverlay {
    fn release(&self) {
        self.state.log_mut().overlays_removed += 1;
    }
}

impl Overlay for SimOverlay {
    fn set_opacity(&self, opacity: f32) -> Result<(), PlatformError> {
        self.state.log_mut().opacity.push(opacity);
        Ok(())
    }
}

struct SimStream {
    state: Arc<SimState>,
    torch_capable: bool,
}

impl Release for SimStream {
    /// Stopping the tracks puts a lit torch out.
    fn release(&self) {
        let mut log = self.state.log_mut();
        log.streams_released += 1;
        if log.torch.last() == Some(&true) {
            log.torch.push(false);
        }
    }
}

#[async_trait]
impl CameraStream for SimStream {
    fn torch_capable(&self) -> bool {
        self.torch_capable
    }

    async fn set_torch(&self, on: bool) -> Result<(), PlatformError> {
        let fail_at = self.state.devices().fail_torch_call;
        let mut log = self.state.log_mut();
        log.torch_calls += 1;
        if fail_at == Some(log.torch_calls) {
            return Err(PlatformError::Io("torch constraint rejected".into()));
        }
        log.torch.push(on);
        Ok(())
    }
}
