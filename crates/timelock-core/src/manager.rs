//! The process-wide notification manager.
//!
//! Constructed once at startup from a [`Platform`] and shared by `Arc`.
//! Owns exactly one instance of each channel, which is what keeps hardware
//! ownership exclusive.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::channel::{
    ChannelKind, FireOutcome, HapticChannel, NotificationChannel, TorchChannel, VisualChannel,
    VisualSettings,
};
use crate::error::ChannelError;
use crate::pattern::{Pattern, PresetName};
use crate::platform::{Platform, PlatformInfo};

/// Result of probing every channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub visual: bool,
    pub haptic: bool,
    pub torch: bool,
    pub platform: PlatformInfo,
}

impl Capabilities {
    pub fn supports(&self, kind: ChannelKind) -> bool {
        match kind {
            ChannelKind::Visual => self.visual,
            ChannelKind::Haptic => self.haptic,
            ChannelKind::Torch => self.torch,
        }
    }
}

/// What happened to one channel during a broadcast fire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelReport {
    pub channel: ChannelKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<FireOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelReport {
    fn from_result(channel: ChannelKind, result: Result<FireOutcome, ChannelError>) -> Self {
        match result {
            Ok(outcome) => Self {
                channel,
                outcome: Some(outcome),
                error: None,
            },
            Err(err) => Self {
                channel,
                outcome: None,
                error: Some(err.to_string()),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

pub struct NotificationManager {
    visual: Arc<VisualChannel>,
    haptic: Arc<HapticChannel>,
    torch: Arc<TorchChannel>,
    info: PlatformInfo,
}

impl NotificationManager {
    pub fn new(platform: Platform, visual: VisualSettings) -> Self {
        Self {
            visual: Arc::new(VisualChannel::new(platform.screen, visual)),
            haptic: Arc::new(HapticChannel::new(platform.vibrator)),
            torch: Arc::new(TorchChannel::new(platform.camera)),
            info: platform.info,
        }
    }

    pub fn channel(&self, kind: ChannelKind) -> Arc<dyn NotificationChannel> {
        match kind {
            ChannelKind::Visual => Arc::clone(&self.visual) as Arc<dyn NotificationChannel>,
            ChannelKind::Haptic => Arc::clone(&self.haptic) as Arc<dyn NotificationChannel>,
            ChannelKind::Torch => Arc::clone(&self.torch) as Arc<dyn NotificationChannel>,
        }
    }

    pub async fn probe_all(&self) -> Capabilities {
        let (visual, haptic, torch) =
            futures::join!(self.visual.probe(), self.haptic.probe(), self.torch.probe());
        Capabilities {
            visual,
            haptic,
            torch,
            platform: self.info.clone(),
        }
    }

    /// Fire `preset` on every listed channel at once.
    pub async fn fire_all(&self, channels: &[ChannelKind], preset: PresetName) -> Vec<ChannelReport> {
        info!(preset = %preset, "firing preset");
        self.fire_pattern(channels, &preset.pattern()).await
    }

    /// Play `pattern` on every listed channel at once.
    ///
    /// Duplicates are ignored. Each channel succeeds or fails on its own;
    /// reports come back in the order given.
    pub async fn fire_pattern(&self, channels: &[ChannelKind], pattern: &Pattern) -> Vec<ChannelReport> {
        let mut kinds: Vec<ChannelKind> = Vec::with_capacity(channels.len());
        for kind in channels {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }

        let firing = kinds.iter().map(|&kind| {
            let channel = self.channel(kind);
            async move {
                let result = channel.fire(pattern).await;
                if let Err(err) = &result {
                    warn!(channel = %kind, error = %err, "notification failed");
                }
                ChannelReport::from_result(kind, result)
            }
        });
        let reports = join_all(firing).await;
        info!(
            phases = pattern.len(),
            ok = reports.iter().filter(|r| r.is_ok()).count(),
            failed = reports.iter().filter(|r| !r.is_ok()).count(),
            "notifications fired"
        );
        reports
    }

    pub async fn stop_all(&self) {
        futures::join!(self.visual.stop(), self.haptic.stop(), self.torch.stop());
    }
}
