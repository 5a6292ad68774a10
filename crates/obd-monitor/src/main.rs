//! OBD-II Monitor - Main Entry Point
//!
//! Usage: `obd-monitor [config.toml]`. Readings go to stdout as JSON lines,
//! logs to stderr.

use anyhow::Context;
use obd_monitor::{init_logging, monitor, MonitorConfig};
use obd_protocol::{ObdClient, Transport};
use obd_scheduler::PidScheduler;
use std::path::PathBuf;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = MonitorConfig::load(config_path.as_deref()).context("Failed to load configuration")?;
    init_logging(config.json_logs)?;

    info!("=== OBD Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let scheduler = config.build_scheduler()?;
    if config.obd.simulate {
        run(ObdClient::simulated(&config.obd), scheduler, config.samples).await
    } else {
        let client = ObdClient::open_serial(&config.obd)
            .await
            .with_context(|| format!("Failed to open {}", config.obd.device))?;
        run(client, scheduler, config.samples).await
    }
}

async fn run<T: Transport>(
    mut client: ObdClient<T>,
    scheduler: PidScheduler,
    samples: usize,
) -> anyhow::Result<()> {
    client.connect().await.context("Adapter bootstrap failed")?;

    match client.version().await {
        Ok(version) => info!("Adapter: {}", version),
        Err(e) => warn!("Adapter version unavailable: {}", e),
    }
    match client.battery_voltage().await {
        Ok(volts) => info!("Battery voltage: {:.1} V", volts),
        Err(e) => warn!("Battery voltage unavailable: {}", e),
    }

    tokio::select! {
        written = monitor(&mut client, scheduler, samples, std::io::stdout()) => {
            info!("Wrote {} readings", written?);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    client.disconnect();
    Ok(())
}
