//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Default timer length and sync cadence
//! - Which notification channels fire on completion, and with which preset
//! - Device paths for the Linux vibrator and torch backends
//! - The optional session backend
//!
//! Configuration is stored at `~/.config/timelock/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::data_dir;
use crate::channel::{ChannelKind, VisualSettings};
use crate::error::{ConfigError, Result};
use crate::pattern::PresetName;
use crate::platform::sysfs::{DEFAULT_LEDS_DIR, DEFAULT_VIBRATOR_PATH};
use crate::platform::OverlayStyle;
use crate::timer::{TimerSettings, DEFAULT_SYNC_EVERY_SECS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_minutes")]
    pub default_minutes: u32,
    #[serde(default = "default_sync_every_secs")]
    pub sync_every_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelKind>,
    #[serde(default = "default_preset")]
    pub preset: PresetName,
    /// `#rrggbb` colour of the visual overlay.
    #[serde(default = "default_overlay_color")]
    pub overlay_color: String,
    #[serde(default = "default_on_opacity")]
    pub on_opacity: f64,
    #[serde(default = "default_fade_out_ms")]
    pub fade_out_ms: u64,
}

/// Linux sysfs device locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicesConfig {
    #[serde(default = "default_vibrator_path")]
    pub vibrator_path: String,
    #[serde(default = "default_leds_dir")]
    pub leds_dir: String,
    /// Exact LED name; autodetected from `flash`/`torch` names when unset.
    #[serde(default)]
    pub torch_led: Option<String>,
}

/// Remote session store. Sessions stay local when `base_url` is unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/timelock/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub devices: DevicesConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

// Default functions
fn default_minutes() -> u32 {
    50
}
fn default_sync_every_secs() -> u32 {
    DEFAULT_SYNC_EVERY_SECS
}
fn default_channels() -> Vec<ChannelKind> {
    vec![ChannelKind::Visual]
}
fn default_preset() -> PresetName {
    PresetName::Medium
}
fn default_overlay_color() -> String {
    "#ffffff".into()
}
fn default_on_opacity() -> f64 {
    0.95
}
fn default_fade_out_ms() -> u64 {
    100
}
fn default_vibrator_path() -> String {
    DEFAULT_VIBRATOR_PATH.into()
}
fn default_leds_dir() -> String {
    DEFAULT_LEDS_DIR.into()
}
fn default_timeout_secs() -> u64 {
    10
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            default_minutes: default_minutes(),
            sync_every_secs: default_sync_every_secs(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            preset: default_preset(),
            overlay_color: default_overlay_color(),
            on_opacity: default_on_opacity(),
            fade_out_ms: default_fade_out_ms(),
        }
    }
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            vibrator_path: default_vibrator_path(),
            leds_dir: default_leds_dir(),
            torch_led: None,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            access_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Config {
    fn get_json_value_by_path<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(root: &mut Value, key: &str, value: &str) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;

            let new_value = match existing {
                Value::Bool(_) => Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(e.to_string()))?,
                ),
                Value::Number(_) => {
                    if let Ok(n) = value.parse::<u64>() {
                        Value::Number(n.into())
                    } else if let Ok(n) = value.parse::<f64>() {
                        serde_json::Number::from_f64(n)
                            .map(Value::Number)
                            .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                    } else {
                        return Err(invalid(format!("cannot parse '{value}' as number")));
                    }
                }
                // `visual,haptic` is accepted as well as a JSON array.
                Value::Array(_) => match serde_json::from_str::<Value>(value) {
                    Ok(array @ Value::Array(_)) => array,
                    _ => Value::Array(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(|s| Value::String(s.to_string()))
                            .collect(),
                    ),
                },
                Value::Object(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                // Optional fields: empty clears them.
                Value::Null if value.is_empty() => Value::Null,
                _ => Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let load_failed = |message: String| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message,
        };
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content).map_err(|e| load_failed(e.to_string()))?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(load_failed(e.to_string()).into()),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key, keeping the field's type.
    ///
    /// Does not persist; call [`Config::save`] afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit the
    /// field.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        Ok(())
    }

    /// Every leaf key with its current value, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
            match value {
                Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    pub fn visual_settings(&self) -> VisualSettings {
        VisualSettings {
            style: OverlayStyle {
                color: self.notifications.overlay_color.clone(),
                on_opacity: self.notifications.on_opacity.clamp(0.0, 1.0) as f32,
                off_opacity: 0.0,
            },
            fade_out: Duration::from_millis(self.notifications.fade_out_ms),
        }
    }

    pub fn timer_settings(&self) -> TimerSettings {
        TimerSettings {
            channels: self.notifications.channels.clone(),
            preset: self.notifications.preset,
            sync_every_secs: self.timer.sync_every_secs,
            ..TimerSettings::default()
        }
    }
}
