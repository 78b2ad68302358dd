use std::sync::Arc;

use clap::Subcommand;
use serde::Serialize;
use timelock_core::platform::memory::DeviceLog;
use timelock_core::{
    ChannelKind, ChannelReport, Config, Event, HttpSessionStore, MemorySessionStore,
    NullSessionStore, PresetName, SessionStore, StoredSession, TimerService, TimerStatus,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::DeviceArgs;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Count down, then fire the notification channels
    Run {
        /// Length in seconds
        #[arg(long, conflicts_with = "minutes")]
        seconds: Option<u32>,
        /// Length in minutes; defaults to timer.default_minutes
        #[arg(short, long)]
        minutes: Option<u32>,
        /// Channels fired on completion; defaults to the configured set
        #[arg(short, long = "channel", value_delimiter = ',')]
        channels: Vec<ChannelKind>,
        /// Preset played on completion
        #[arg(short, long)]
        preset: Option<PresetName>,
        /// Do not replicate the session to the configured backend
        #[arg(long)]
        offline: bool,
        /// Print every timer event as a JSON line on stdout
        #[arg(long)]
        events: bool,
        #[command(flatten)]
        devices: DeviceArgs,
    },
}

#[derive(Serialize)]
struct RunSummary {
    status: TimerStatus,
    reports: Vec<ChannelReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    devices: Option<DeviceLog>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sessions: Option<Vec<StoredSession>>,
}

enum Store {
    Remote(Arc<HttpSessionStore>),
    Memory(Arc<MemorySessionStore>),
    Null,
}

impl Store {
    fn select(config: &Config, offline: bool, simulate: bool) -> Result<Self, Box<dyn std::error::Error>> {
        if simulate {
            return Ok(Store::Memory(Arc::new(MemorySessionStore::new())));
        }
        match config.backend.base_url.as_deref() {
            Some(base_url) if !offline => {
                let store = HttpSessionStore::new(
                    base_url,
                    config.backend.access_token.clone(),
                    config.backend.timeout(),
                )?;
                info!(base_url, "replicating sessions to backend");
                Ok(Store::Remote(Arc::new(store)))
            }
            _ => Ok(Store::Null),
        }
    }

    fn as_store(&self) -> Arc<dyn SessionStore> {
        match self {
            Store::Remote(store) => Arc::clone(store) as Arc<dyn SessionStore>,
            Store::Memory(store) => Arc::clone(store) as Arc<dyn SessionStore>,
            Store::Null => Arc::new(NullSessionStore),
        }
    }
}

pub async fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TimerAction::Run {
            seconds,
            minutes,
            channels,
            preset,
            offline,
            events,
            devices,
        } => {
            let config = Config::load_or_default();
            let scheduled = match (seconds, minutes) {
                (Some(secs), _) => secs,
                (None, Some(mins)) => mins.saturating_mul(60),
                (None, None) => config.timer.default_minutes.saturating_mul(60),
            };
            if scheduled == 0 {
                return Err("timer length must be at least one second".into());
            }

            let mut settings = config.timer_settings();
            if !channels.is_empty() {
                settings.channels = channels;
            }
            if let Some(preset) = preset {
                settings.preset = preset;
            }
            let notify_on_completion = !settings.channels.is_empty();

            let store = Store::select(&config, offline, devices.simulate)?;
            let (manager, sim) = super::manager(&config, &devices);
            let timer = TimerService::spawn(Arc::clone(&manager), store.as_store(), settings);
            let mut stream = timer.subscribe();

            // Polled first on every pass, so the handler is installed before
            // any output and a SIGINT between iterations is not lost.
            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            timer.start(scheduled);
            let mut reports = Vec::new();
            loop {
                tokio::select! {
                    biased;
                    _ = &mut ctrl_c => {
                        info!("interrupted; cancelling timer");
                        manager.stop_all().await;
                        timer.reset();
                        break;
                    }
                    received = stream.recv() => match received {
                        Ok(event) => {
                            if events {
                                println!("{}", serde_json::to_string(&event)?);
                            }
                            match event {
                                Event::NotificationsFired { reports: fired, .. } => {
                                    reports = fired;
                                    break;
                                }
                                Event::TimerCompleted { .. } if !notify_on_completion => break,
                                _ => {}
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "event output fell behind");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }

            let watch = timer.watch();
            timer.shutdown().await;
            let status = *watch.borrow();

            let summary = RunSummary {
                status,
                reports,
                devices: sim.map(|sim| sim.log()),
                sessions: match &store {
                    Store::Memory(store) => Some(store.sessions()),
                    _ => None,
                },
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}
