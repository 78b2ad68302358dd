use clap::Subcommand;
use serde::Serialize;
use timelock_core::platform::memory::DeviceLog;
use timelock_core::{ChannelKind, ChannelReport, Config, Pattern, PresetName};
use tracing::info;

use super::DeviceArgs;

#[derive(Subcommand)]
pub enum NotifyAction {
    /// Play a preset or custom pattern on one or more channels
    Fire {
        /// Channels to fire (visual, haptic, torch); defaults to the configured set
        #[arg(short, long = "channel", value_delimiter = ',')]
        channels: Vec<ChannelKind>,
        /// Named preset (short, medium, long, urgent)
        #[arg(short, long, conflicts_with = "pattern")]
        preset: Option<PresetName>,
        /// Custom on/off milliseconds, e.g. "300,200,300"
        #[arg(long)]
        pattern: Option<Pattern>,
        #[command(flatten)]
        devices: DeviceArgs,
    },
    /// List the built-in presets
    Presets,
}

#[derive(Serialize)]
struct FireSummary {
    pattern: Vec<u64>,
    reports: Vec<ChannelReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    devices: Option<DeviceLog>,
}

#[derive(Serialize)]
struct PresetEntry {
    name: PresetName,
    durations_ms: Vec<u64>,
    total_ms: u64,
}

pub async fn run(action: NotifyAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        NotifyAction::Fire {
            channels,
            preset,
            pattern,
            devices,
        } => {
            let config = Config::load_or_default();
            let channels = if channels.is_empty() {
                config.notifications.channels.clone()
            } else {
                channels
            };
            let pattern = match pattern {
                Some(pattern) => pattern,
                None => preset.unwrap_or(config.notifications.preset).pattern(),
            };

            let (manager, sim) = super::manager(&config, &devices);
            let reports = tokio::select! {
                reports = manager.fire_pattern(&channels, &pattern) => reports,
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted; stopping notifications");
                    manager.stop_all().await;
                    Vec::new()
                }
            };

            let failed = reports.iter().filter(|r| !r.is_ok()).count();
            let summary = FireSummary {
                pattern: pattern.durations_ms().to_vec(),
                reports,
                devices: sim.map(|sim| sim.log()),
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);

            if failed > 0 {
                return Err(format!("{failed} channel(s) failed").into());
            }
        }
        NotifyAction::Presets => {
            let presets: Vec<PresetEntry> = PresetName::ALL
                .iter()
                .map(|&name| {
                    let pattern = name.pattern();
                    PresetEntry {
                        name,
                        durations_ms: pattern.durations_ms().to_vec(),
                        total_ms: pattern.total().as_millis() as u64,
                    }
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&presets)?);
        }
    }
    Ok(())
}
