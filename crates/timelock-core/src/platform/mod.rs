//! Platform capability seams.
//!
//! Channels never touch devices directly; they go through these traits.
//! Backends:
//!
//! - [`memory`]: simulated devices with an inspectable log
//! - [`terminal`]: full-screen flash on an ANSI terminal
//! - [`sysfs`]: Linux `timed_output` vibrator and LED class torch

pub mod memory;
pub mod sysfs;
pub mod terminal;

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;
use crate::guard::Release;
use crate::storage::DevicesConfig;

/// Appearance of the flash overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayStyle {
    /// `#rrggbb`
    pub color: String,
    pub on_opacity: f32,
    pub off_opacity: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: "#ffffff".into(),
            on_opacity: 0.95,
            off_opacity: 0.0,
        }
    }
}

/// Screen surface used by the visual channel.
#[async_trait]
pub trait Screen: Send + Sync {
    /// Whether a full-viewport overlay can be shown at all.
    fn is_available(&self) -> bool;

    fn supports_wake_lock(&self) -> bool;

    /// Keep the display awake until the returned handle is released.
    async fn request_wake_lock(&self) -> Result<Box<dyn Release>, PlatformError>;

    /// Put a transparent overlay on top of everything else.
    /// Releasing the overlay removes it.
    fn mount_overlay(&self, style: &OverlayStyle) -> Result<Box<dyn Overlay>, PlatformError>;
}

pub trait Overlay: Release {
    fn set_opacity(&self, opacity: f32) -> Result<(), PlatformError>;
}

/// Pattern-aware vibration motor.
pub trait Vibrator: Send + Sync {
    fn is_supported(&self) -> bool;

    /// Vibrate for `duration`. `Ok(false)` means the platform declined.
    fn vibrate(&self, duration: Duration) -> Result<bool, PlatformError>;

    /// Stop any ongoing vibration (the `vibrate(0)` equivalent).
    fn cancel(&self) -> Result<(), PlatformError>;
}

/// Camera enumeration and stream acquisition for the torch channel.
#[async_trait]
pub trait Camera: Send + Sync {
    /// Whether the host exposes a media device API at all.
    fn has_media_devices(&self) -> bool;

    /// Number of video inputs visible without acquiring any of them.
    async fn video_input_count(&self) -> Result<usize, PlatformError>;

    /// Acquire the rear-facing camera stream.
    async fn open_rear_stream(&self) -> Result<Box<dyn CameraStream>, PlatformError>;
}

/// An open camera stream with its video track.
///
/// Releasing it turns the torch off and stops every track.
#[async_trait]
pub trait CameraStream: Release {
    fn torch_capable(&self) -> bool;

    async fn set_torch(&self, on: bool) -> Result<(), PlatformError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Android,
    Ios,
    Linux,
    MacOs,
    Windows,
    Unknown,
}

/// Display-only description of the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub os_family: OsFamily,
    /// Running as an attached, interactive app rather than piped/headless.
    pub standalone: bool,
}

impl PlatformInfo {
    pub fn detect() -> Self {
        let os_family = match std::env::consts::OS {
            "android" => OsFamily::Android,
            "ios" => OsFamily::Ios,
            "linux" => OsFamily::Linux,
            "macos" => OsFamily::MacOs,
            "windows" => OsFamily::Windows,
            _ => OsFamily::Unknown,
        };
        Self {
            os_family,
            standalone: std::io::stdout().is_terminal(),
        }
    }
}

/// The set of devices handed to a notification manager.
#[derive(Clone)]
pub struct Platform {
    pub screen: Arc<dyn Screen>,
    pub vibrator: Arc<dyn Vibrator>,
    pub camera: Arc<dyn Camera>,
    pub info: PlatformInfo,
}

impl Platform {
    /// Terminal screen plus the Linux sysfs vibrator and torch.
    pub fn host(devices: &DevicesConfig) -> Self {
        Self {
            screen: Arc::new(terminal::TerminalScreen::stdout()),
            vibrator: Arc::new(sysfs::SysfsVibrator::new(&devices.vibrator_path)),
            camera: Arc::new(sysfs::SysfsTorch::new(
                &devices.leds_dir,
                devices.torch_led.clone(),
            )),
            info: PlatformInfo::detect(),
        }
    }
}
