//! Linux sysfs backends.
//!
//! - Vibrator: the Android `timed_output` interface. Writing a millisecond
//!   count to `enable` vibrates for that long; writing `0` stops.
//! - Torch: an LED class device whose name mentions `flash` or `torch`.
//!   Writing `max_brightness` to `brightness` lights it, `0` turns it off.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Camera, CameraStream, Vibrator};
use crate::error::PlatformError;
use crate::guard::Release;

pub const DEFAULT_VIBRATOR_PATH: &str = "/sys/class/timed_output/vibrator/enable";
pub const DEFAULT_LEDS_DIR: &str = "/sys/class/leds";

pub struct SysfsVibrator {
    enable: PathBuf,
}

impl SysfsVibrator {
    pub fn new(enable: impl Into<PathBuf>) -> Self {
        Self {
            enable: enable.into(),
        }
    }
}

impl Vibrator for SysfsVibrator {
    fn is_supported(&self) -> bool {
        self.enable.exists()
    }

    fn vibrate(&self, duration: Duration) -> Result<bool, PlatformError> {
        fs::write(&self.enable, duration.as_millis().to_string())?;
        Ok(true)
    }

    fn cancel(&self) -> Result<(), PlatformError> {
        fs::write(&self.enable, "0")?;
        Ok(())
    }
}

pub struct SysfsTorch {
    leds_dir: PathBuf,
    /// Exact LED name; otherwise the first flash/torch LED is used.
    led: Option<String>,
}

impl SysfsTorch {
    pub fn new(leds_dir: impl Into<PathBuf>, led: Option<String>) -> Self {
        Self {
            leds_dir: leds_dir.into(),
            led,
        }
    }

    fn candidates(&self) -> Result<Vec<PathBuf>, PlatformError> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.leds_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_ascii_lowercase();
            let wanted = match &self.led {
                Some(led) => name == led.to_ascii_lowercase(),
                None => name.contains("flash") || name.contains("torch"),
            };
            if wanted {
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found)
    }
}

#[async_trait]
impl Camera for SysfsTorch {
    fn has_media_devices(&self) -> bool {
        self.leds_dir.is_dir()
    }

    async fn video_input_count(&self) -> Result<usize, PlatformError> {
        Ok(self.candidates()?.len())
    }

    async fn open_rear_stream(&self) -> Result<Box<dyn CameraStream>, PlatformError> {
        let led = self
            .candidates()?
            .into_iter()
            .next()
            .ok_or_else(|| PlatformError::NotSupported("no flash LED found".into()))?;

        let max = read_max_brightness(&led);
        let brightness = led.join("brightness");
        // Probe write access up front so permission problems surface here.
        OpenOptions::new().write(true).open(&brightness)?;
        debug!(led = %led.display(), max, "torch LED opened");

        Ok(Box::new(SysfsTorchStream { brightness, max }))
    }
}

fn read_max_brightness(led: &Path) -> u32 {
    fs::read_to_string(led.join("max_brightness"))
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0)
}

struct SysfsTorchStream {
    brightness: PathBuf,
    max: u32,
}

#[async_trait]
impl CameraStream for SysfsTorchStream {
    fn torch_capable(&self) -> bool {
        self.max > 0
    }

    async fn set_torch(&self, on: bool) -> Result<(), PlatformError> {
        let level = if on { self.max } else { 0 };
        fs::write(&self.brightness, level.to_string())?;
        Ok(())
    }
}

impl Release for SysfsTorchStream {
    fn release(&self) {
        if let Err(err) = fs::write(&self.brightness, "0") {
            warn!(error = %err, "failed to switch torch LED off on release");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_led(root: &Path, name: &str, max: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("max_brightness"), max).unwrap();
        fs::write(dir.join("brightness"), "0").unwrap();
        dir
    }

    #[tokio::test]
    async fn torch_toggles_brightness_and_releases_off() {
        let tmp = tempfile::tempdir().unwrap();
        fake_led(tmp.path(), "green:status", "1");
        let led = fake_led(tmp.path(), "white:flash", "255");
        let torch = SysfsTorch::new(tmp.path(), None);

        assert_eq!(torch.video_input_count().await.unwrap(), 1);
        let stream = torch.open_rear_stream().await.unwrap();
        assert!(stream.torch_capable());

        stream.set_torch(true).await.unwrap();
        assert_eq!(fs::read_to_string(led.join("brightness")).unwrap(), "255");

        stream.release();
        assert_eq!(fs::read_to_string(led.join("brightness")).unwrap(), "0");
    }

    #[tokio::test]
    async fn led_without_max_brightness_has_no_torch() {
        let tmp = tempfile::tempdir().unwrap();
        fake_led(tmp.path(), "torch", "garbage");
        let torch = SysfsTorch::new(tmp.path(), Some("torch".into()));

        let stream = torch.open_rear_stream().await.unwrap();
        assert!(!stream.torch_capable());
    }

    #[tokio::test]
    async fn missing_leds_dir_reports_not_supported() {
        let torch = SysfsTorch::new("/definitely/not/here", None);
        assert!(!torch.has_media_devices());
        assert!(matches!(
            torch.open_rear_stream().await,
            Err(PlatformError::NotSupported(_))
        ));
    }

    #[test]
    fn vibrator_writes_milliseconds() {
        let tmp = tempfile::tempdir().unwrap();
        let enable = tmp.path().join("enable");
        fs::write(&enable, "0").unwrap();
        let vib = SysfsVibrator::new(&enable);

        assert!(vib.is_supported());
        assert!(vib.vibrate(Duration::from_millis(300)).unwrap());
        assert_eq!(fs::read_to_string(&enable).unwrap(), "300");
        vib.cancel().unwrap();
        assert_eq!(fs::read_to_string(&enable).unwrap(), "0");
    }
}
