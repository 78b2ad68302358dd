use clap::Args;
use timelock_core::Config;

use super::DeviceArgs;

#[derive(Args)]
pub struct ProbeArgs {
    #[command(flatten)]
    devices: DeviceArgs,
}

/// Print channel capabilities as JSON.
pub async fn run(args: ProbeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let (manager, _sim) = super::manager(&config, &args.devices);
    let caps = manager.probe_all().await;
    println!("{}", serde_json::to_string_pretty(&caps)?);
    Ok(())
}
