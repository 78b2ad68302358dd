pub mod config;
pub mod notify;
pub mod probe;
pub mod timer;

use std::sync::Arc;

use clap::Args;
use timelock_core::platform::memory::{SimulatedDevices, SimulatedPlatform};
use timelock_core::{Config, NotificationManager, Platform};

/// Device selection shared by every command that touches hardware.
#[derive(Args, Debug, Clone, Default)]
pub struct DeviceArgs {
    /// Use simulated devices instead of the terminal and sysfs backends
    #[arg(long)]
    pub simulate: bool,
}

/// Notification manager for this run, plus the simulator when one is used.
pub fn manager(
    config: &Config,
    devices: &DeviceArgs,
) -> (Arc<NotificationManager>, Option<SimulatedPlatform>) {
    let (platform, sim) = if devices.simulate {
        let sim = SimulatedPlatform::new(SimulatedDevices::default());
        (sim.platform(), Some(sim))
    } else {
        (Platform::host(&config.devices), None)
    };
    let manager = NotificationManager::new(platform, config.visual_settings());
    (Arc::new(manager), sim)
}
