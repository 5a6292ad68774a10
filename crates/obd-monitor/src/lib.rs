//! OBD-II Monitor
//!
//! Configuration, logging setup and the reading pump behind the
//! `obd-monitor` binary.

use anyhow::Context;
use obd_protocol::{ObdClient, ObdConfig, Pid, Reading, Transport};
use obd_scheduler::{PidScheduler, SchedulerConfig};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Readings buffered between the scheduler and the writer
const READING_QUEUE: usize = 64;

/// Default filter when `RUST_LOG` is unset
const DEFAULT_LOG_FILTER: &str = "obd_monitor=info,obd_protocol=info,obd_scheduler=info";

/// One polled parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidRate {
    /// Catalogue name, e.g. "rpm"
    pub name: String,
    /// Sampling rate; the scheduler base rate when absent
    pub rate_hz: Option<f64>,
}

/// Monitor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub obd: ObdConfig,
    pub scheduler: SchedulerConfig,
    /// Parameters to poll; the default engine set when empty
    pub pids: Vec<PidRate>,
    /// Stop after this many readings (0 = until interrupted)
    pub samples: usize,
    /// Emit logs as JSON
    pub json_logs: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            obd: ObdConfig::default(),
            scheduler: SchedulerConfig::default(),
            pids: Vec::new(),
            samples: 0,
            json_logs: false,
        }
    }
}

impl MonitorConfig {
    /// Load from an optional file, then `MONITOR_`-prefixed environment
    /// variables (e.g. `MONITOR_OBD__DEVICE`).
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let config: Self = builder
            .add_source(
                config::Environment::with_prefix("MONITOR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Scheduler for the configured parameters
    pub fn build_scheduler(&self) -> anyhow::Result<PidScheduler> {
        if self.pids.is_empty() {
            return Ok(PidScheduler::with_default_pids(self.scheduler.clone()));
        }

        let mut scheduler = PidScheduler::new(self.scheduler.clone());
        for entry in &self.pids {
            let pid = Pid::from_name(&entry.name)
                .with_context(|| format!("Unknown PID name {:?}", entry.name))?;
            scheduler.add(pid, entry.rate_hz.unwrap_or(self.scheduler.base_rate_hz));
        }
        Ok(scheduler)
    }
}

/// Initialize logging to stderr, filtered by `RUST_LOG`
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let text = (!json).then(|| fmt::layer().with_target(true).with_writer(std::io::stderr));
    let structured = json.then(|| fmt::layer().json().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(structured)
        .try_init()
        .context("Failed to set tracing subscriber")
}

/// Poll through `client` and write each reading to `out` as one JSON line.
///
/// Returns the number of readings written once `samples` is reached, the
/// scheduler runs out of parameters, or writing fails.
pub async fn monitor<T, W>(
    client: &mut ObdClient<T>,
    mut scheduler: PidScheduler,
    samples: usize,
    mut out: W,
) -> anyhow::Result<usize>
where
    T: Transport,
    W: Write,
{
    let (reading_tx, mut reading_rx) = mpsc::channel::<Reading>(READING_QUEUE);

    let writer = async move {
        let mut written = 0;
        while let Some(reading) = reading_rx.recv().await {
            writeln!(out, "{}", serde_json::to_string(&reading)?)?;
            written += 1;
            if samples > 0 && written >= samples {
                break;
            }
        }
        out.flush()?;
        anyhow::Ok(written)
    };

    let (scheduled, written) = tokio::join!(scheduler.run(client, reading_tx), writer);
    scheduled.context("Scheduler stopped")?;
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use obd_protocol::SimulatedAdapter;

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("obd-monitor-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
samples = 10
json_logs = true

[obd]
simulate = true
timeout_ms = 1000

[scheduler]
retry_backoff_ms = 250

[[pids]]
name = "rpm"
rate_hz = 10.0

[[pids]]
name = "coolant_temp"
"#,
        )
        .unwrap();

        let config = MonitorConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.samples, 10);
        assert!(config.json_logs);
        assert!(config.obd.simulate);
        assert_eq!(config.obd.timeout_ms, 1000);
        assert_eq!(config.obd.baud_rate, 38400);
        assert_eq!(config.scheduler.retry_backoff_ms, 250);
        assert_eq!(config.scheduler.base_rate_hz, 5.0);
        assert_eq!(config.pids.len(), 2);
        assert_eq!(config.pids[1].rate_hz, None);
    }

    #[tokio::test]
    async fn test_build_scheduler() {
        let config = MonitorConfig {
            pids: vec![
                PidRate {
                    name: "rpm".into(),
                    rate_hz: Some(10.0),
                },
                PidRate {
                    name: "coolant_temp".into(),
                    rate_hz: None,
                },
            ],
            ..Default::default()
        };
        let scheduler = config.build_scheduler().unwrap();
        assert_eq!(scheduler.pid_count(), 2);
        assert!(scheduler.contains(Pid::CoolantTemp));

        let defaults = MonitorConfig::default().build_scheduler().unwrap();
        assert_eq!(defaults.pid_count(), 8);
    }

    #[tokio::test]
    async fn test_unknown_pid_name_rejected() {
        let config = MonitorConfig {
            pids: vec![PidRate {
                name: "warp_drive".into(),
                rate_hz: None,
            }],
            ..Default::default()
        };
        let err = config.build_scheduler().err().unwrap();
        assert!(err.to_string().contains("warp_drive"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_writes_json_lines() {
        let obd = ObdConfig {
            timeout_ms: 200,
            ..Default::default()
        };
        let mut client = ObdClient::new(SimulatedAdapter::new(), &obd);
        client.connect().await.unwrap();

        let mut scheduler = PidScheduler::new(SchedulerConfig::default());
        scheduler.add(Pid::CoolantTemp, 10.0);

        let mut out = Vec::new();
        let written = monitor(&mut client, scheduler, 3, &mut out).await.unwrap();
        assert_eq!(written, 3);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        let reading: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(reading["name"], "coolant_temp");
        assert_eq!(reading["value"], 83.0);
        assert_eq!(reading["unit"], "°C");
    }
}
