use crate::app_config::AppConfig;
use crate::domain::light_api::LightApi;
use crate::hue::HueBridge;
use crate::shim::DumbSwitchShim;
use clap::Parser;
use futures::future::join_all;
use std::sync::Arc;
use tokio::{signal, task};
use tracing::{info, trace, warn};
use tracing_subscriber::filter::LevelFilter;

mod app_config;
mod domain;
mod hue;
mod log_level;
mod shim;

/// Turns dumb wall switches, observed through the reachability of their Hue lights, into Hue light switches.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Configuration file, with or without extension
    #[arg(default_value = "config")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let log_level = log_level::init(LevelFilter::INFO);

    info!("🪵 Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(&args.config)?;
    log_level.set_base(config.log_level());
    info!("✅  Loaded configuration");

    if config.dumb_switches().is_empty() {
        warn!("⚠️ No dumb switches configured, nothing to do");
        return Ok(());
    }

    let client = hue::new_client(&config)?;
    let bridge: Arc<dyn LightApi> = Arc::new(HueBridge::new(client, config.api_url()));

    match hue::observe(bridge.as_ref()).await {
        Ok(lights) => {
            trace!("Observed Hue lights: {:?}", &lights);
            for (switch, light_id) in hue::unknown_light_ids(&config, &lights) {
                warn!(switch, light_id, "⚠️ Switch '{}' uses light {}, which the bridge does not know", switch, light_id);
            }
            info!("✅  Discovered all lights");
        }
        Err(e) => warn!("⚠️ Unable to discover the Hue lights: {}", e),
    }

    let mut handles = Vec::with_capacity(config.dumb_switches().len());
    for (name, switch) in config.dumb_switches() {
        let shim = DumbSwitchShim::new(name.as_str(), switch, config.shim().clone(), bridge.clone(), log_level.clone()).await;
        info!(switch = name, "✅  Initialized switch shim '{}' ({})", shim.name(), shim.position());
        handles.push(task::spawn(shim.run()));
    }

    info!("🔥 {} is up and running", env!("CARGO_PKG_NAME"));

    tokio::select! {
        _ = join_all(handles) => warn!("🔴 All switch shims stopped"),
        result = signal::ctrl_c() => {
            result?;
            info!("👋 Shutting down");
        }
    }

    Ok(())
}
