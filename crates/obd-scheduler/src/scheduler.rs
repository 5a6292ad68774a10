//! PID Scheduler Implementation

use obd_protocol::{ObdClient, ObdError, Pid, Reading, Transport};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Rate used when a configured rate is zero, negative or not finite
const FALLBACK_RATE_HZ: f64 = 1.0;

/// Configuration for the PID scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Base sampling rate in Hz (default: 5.0)
    pub base_rate_hz: f64,
    /// Cap on the failure count used for backoff
    pub max_retries: u32,
    /// Retry backoff base in milliseconds
    pub retry_backoff_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_rate_hz: 5.0,
            max_retries: 3,
            retry_backoff_ms: 100,
        }
    }
}

/// A scheduled PID with priority and timing info
#[derive(Debug, Clone)]
pub struct ScheduledPid {
    /// The PID to query
    pub pid: Pid,
    /// Current sampling rate in Hz
    pub rate_hz: f64,
    /// Next scheduled query time
    pub next_query: Instant,
    /// Priority (higher = more important)
    pub priority: u8,
    /// Consecutive failure count
    pub failures: u32,
}

impl ScheduledPid {
    /// Create a new scheduled PID, due immediately
    pub fn new(pid: Pid, rate_hz: f64) -> Self {
        let rate_hz = if rate_hz.is_finite() && rate_hz > 0.0 {
            rate_hz
        } else {
            FALLBACK_RATE_HZ
        };
        Self {
            pid,
            rate_hz,
            next_query: Instant::now(),
            priority: pid.sampling_priority(),
            failures: 0,
        }
    }

    /// Calculate interval between queries
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz)
    }

    /// Schedule next query, delayed by `backoff` per consecutive failure
    pub fn schedule_next(&mut self, backoff: Duration) {
        self.next_query = Instant::now() + self.interval() + backoff * self.failures;
    }
}

impl Eq for ScheduledPid {}

impl PartialEq for ScheduledPid {
    fn eq(&self, other: &Self) -> bool {
        self.next_query == other.next_query && self.priority == other.priority
    }
}

impl Ord for ScheduledPid {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior (earliest time first)
        // Then by priority (higher priority first)
        other
            .next_query
            .cmp(&self.next_query)
            .then_with(|| self.priority.cmp(&other.priority))
    }
}

impl PartialOrd for ScheduledPid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// PID Scheduler for managing OBD-II queries
pub struct PidScheduler {
    /// Scheduled PIDs in priority queue
    queue: BinaryHeap<ScheduledPid>,
    config: SchedulerConfig,
}

impl PidScheduler {
    /// Create an empty scheduler
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            queue: BinaryHeap::new(),
            config,
        }
    }

    /// Create a scheduler with the default engine PID set
    pub fn with_default_pids(config: SchedulerConfig) -> Self {
        let base = config.base_rate_hz;
        let mut scheduler = Self::new(config);

        // Critical PIDs at the base rate
        scheduler.add(Pid::Rpm, base);
        scheduler.add(Pid::Speed, base);
        scheduler.add(Pid::CoolantTemp, base);
        scheduler.add(Pid::EngineLoad, base);

        scheduler.add(Pid::Maf, 1.0);

        // Slow PIDs (0.5Hz)
        scheduler.add(Pid::ShortFuelTrimBank1, 0.5);
        scheduler.add(Pid::LongFuelTrimBank1, 0.5);
        scheduler.add(Pid::O2Bank1Sensor1, 0.5);

        info!("PID scheduler created with {} PIDs", scheduler.pid_count());
        scheduler
    }

    /// Add `pid`, replacing its rate if already scheduled
    pub fn add(&mut self, pid: Pid, rate_hz: f64) {
        self.queue.retain(|item| item.pid != pid);
        self.queue.push(ScheduledPid::new(pid, rate_hz));
    }

    /// Get the number of scheduled PIDs
    pub fn pid_count(&self) -> usize {
        self.queue.len()
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.queue.iter().any(|item| item.pid == pid)
    }

    fn backoff(&self) -> Duration {
        Duration::from_millis(self.config.retry_backoff_ms)
    }

    /// Run the scheduler loop.
    ///
    /// Returns when the receiver is dropped or no PID is left. PIDs the
    /// vehicle answers with `NO DATA` are dropped for good; other failures
    /// push the PID back by the retry backoff per consecutive failure.
    pub async fn run<T: Transport>(
        &mut self,
        client: &mut ObdClient<T>,
        reading_tx: mpsc::Sender<Reading>,
    ) -> Result<(), ObdError> {
        info!("Starting PID scheduler");

        while let Some(mut scheduled) = self.queue.pop() {
            if reading_tx.is_closed() {
                self.queue.push(scheduled);
                break;
            }

            tokio::time::sleep_until(scheduled.next_query).await;

            let reading = match client.read(scheduled.pid).await {
                Ok(reading) => {
                    scheduled.failures = 0;
                    Some(reading)
                }
                Err(ObdError::NoData) => {
                    warn!("PID {:02X} unsupported, dropping it", scheduled.pid.as_hex());
                    continue;
                }
                Err(e @ ObdError::NotReady(_)) => {
                    self.queue.push(scheduled);
                    return Err(e);
                }
                Err(e) => {
                    scheduled.failures = (scheduled.failures + 1).min(self.config.max_retries);
                    warn!(
                        "PID {:02X} query failed (attempt {}): {}",
                        scheduled.pid.as_hex(),
                        scheduled.failures,
                        e
                    );
                    None
                }
            };

            scheduled.schedule_next(self.backoff());
            self.queue.push(scheduled);

            if let Some(reading) = reading {
                debug!("{} = {:?} {}", reading.name, reading.value, reading.unit);
                if reading_tx.send(reading).await.is_err() {
                    break;
                }
            }
        }

        if self.queue.is_empty() {
            warn!("No PIDs left to schedule");
        }
        info!("PID scheduler stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obd_protocol::{ConnectionState, ObdConfig, ScriptedTransport, SimulatedAdapter};

    fn obd_config() -> ObdConfig {
        ObdConfig {
            timeout_ms: 200,
            ..Default::default()
        }
    }

    async fn simulated(adapter: SimulatedAdapter) -> ObdClient<SimulatedAdapter> {
        let mut client = ObdClient::new(adapter, &obd_config());
        client.connect().await.unwrap();
        client
    }

    async fn collect(mut rx: mpsc::Receiver<Reading>, count: usize) -> Vec<Reading> {
        let mut readings = Vec::new();
        while readings.len() < count {
            match rx.recv().await {
                Some(reading) => readings.push(reading),
                None => break,
            }
        }
        readings
    }

    #[tokio::test]
    async fn test_scheduler_creation() {
        let scheduler = PidScheduler::with_default_pids(SchedulerConfig::default());
        assert_eq!(scheduler.pid_count(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_pid_ordering() {
        let mut pid1 = ScheduledPid::new(Pid::Rpm, 5.0);
        let mut pid2 = ScheduledPid::new(Pid::Maf, 1.0);

        let now = Instant::now();
        pid1.next_query = now;
        pid2.next_query = now;
        assert!(pid1 > pid2); // Higher priority

        pid2.next_query = now - Duration::from_millis(1);
        assert!(pid2 > pid1); // Earlier
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_rate_falls_back() {
        let scheduled = ScheduledPid::new(Pid::Rpm, 0.0);
        assert_eq!(scheduled.interval(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_faster_pid_sampled_more_often() {
        let mut client = simulated(SimulatedAdapter::new()).await;
        let mut scheduler = PidScheduler::new(SchedulerConfig::default());
        scheduler.add(Pid::Rpm, 10.0);
        scheduler.add(Pid::Speed, 5.0);

        let (tx, rx) = mpsc::channel(4);
        let (result, readings) = tokio::join!(scheduler.run(&mut client, tx), collect(rx, 6));

        result.unwrap();
        let rpm = readings.iter().filter(|r| r.pid == Pid::Rpm.as_hex()).count();
        let speed = readings.iter().filter(|r| r.pid == Pid::Speed.as_hex()).count();
        assert_eq!(rpm + speed, 6);
        assert!(rpm > speed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_pid_dropped() {
        let mut client = simulated(SimulatedAdapter::new().without(Pid::FuelPressure)).await;
        let mut scheduler = PidScheduler::new(SchedulerConfig::default());
        scheduler.add(Pid::FuelPressure, 10.0);
        scheduler.add(Pid::Rpm, 10.0);

        let (tx, rx) = mpsc::channel(4);
        let (result, readings) = tokio::join!(scheduler.run(&mut client, tx), collect(rx, 3));

        result.unwrap();
        assert!(readings.iter().all(|r| r.pid == Pid::Rpm.as_hex()));
        assert!(!scheduler.contains(Pid::FuelPressure));
        assert_eq!(scheduler.pid_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_backs_off() {
        let transport = ScriptedTransport::new()
            .reply("OK\r\r>")
            .reply("OK\r\r>")
            .reply("OK\r\r>")
            .reply("UNABLE TO CONNECT\r\r>")
            .reply("41 0C 1A F8\r\r>");
        let mut client = ObdClient::new(transport, &obd_config());
        client.connect().await.unwrap();

        let mut scheduler = PidScheduler::new(SchedulerConfig::default());
        scheduler.add(Pid::Rpm, 10.0);

        let started = Instant::now();
        let (tx, rx) = mpsc::channel(1);
        let (result, readings) = tokio::join!(scheduler.run(&mut client, tx), async {
            let readings = collect(rx, 1).await;
            (readings, started.elapsed())
        });

        result.unwrap();
        let (readings, elapsed) = readings;
        assert_eq!(readings[0].value.as_scalar(), Some(1726.0));
        // One interval plus one backoff step
        assert!(elapsed >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_ready_client_is_an_error() {
        let mut client = ObdClient::simulated(&obd_config());
        let mut scheduler = PidScheduler::new(SchedulerConfig::default());
        scheduler.add(Pid::Rpm, 1.0);

        let (tx, _rx) = mpsc::channel(1);
        let err = scheduler.run(&mut client, tx).await.unwrap_err();
        assert_eq!(err, ObdError::NotReady(ConnectionState::Disconnected));
        assert_eq!(scheduler.pid_count(), 1);
    }
}
