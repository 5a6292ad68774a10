//! OBD-II Client for ELM327 Adapters
//!
//! Owns the exchange engine and the link lifecycle. Reads are refused until
//! bootstrap has brought the adapter to `Ready`.

use crate::bootstrap::{Bootstrap, BootstrapError, ConnectionState};
use crate::config::ObdConfig;
use crate::engine::{ExchangeEngine, Request};
use crate::error::ObdError;
use crate::parser;
use crate::pid::{Pid, Reading};
use crate::retry::Retry;
use crate::simulator::SimulatedAdapter;
use crate::transport::{SerialTransport, Transport};
use tracing::{debug, info};

/// OBD-II client for communicating with ELM327-compatible adapters
pub struct ObdClient<T: Transport> {
    engine: ExchangeEngine<T>,
    state: ConnectionState,
    bootstrap: Bootstrap,
    /// Append the expected response count to mode 01 requests
    append_response_count: bool,
}

impl ObdClient<SerialTransport> {
    /// Open the serial device named in `config`
    pub async fn open_serial(config: &ObdConfig) -> Result<Self, ObdError> {
        info!("Creating OBD client for device: {}", config.device);
        let transport =
            SerialTransport::open(&config.device, config.baud_rate, config.poll_interval())?;
        Ok(Self::new(transport, config))
    }
}

impl ObdClient<SimulatedAdapter> {
    /// Client backed by the in-process adapter simulation (no hardware required)
    pub fn simulated(config: &ObdConfig) -> Self {
        info!("Creating simulated OBD client");
        Self::new(SimulatedAdapter::new(), config)
    }
}

impl<T: Transport> ObdClient<T> {
    pub fn new(transport: T, config: &ObdConfig) -> Self {
        Self {
            engine: ExchangeEngine::new(transport, config.engine_config()),
            state: ConnectionState::Disconnected,
            bootstrap: Bootstrap::from_config(config),
            append_response_count: config.append_response_count,
        }
    }

    /// Run the bootstrap sequence; the client is `Ready` on success
    pub async fn connect(&mut self) -> Result<(), BootstrapError> {
        self.bootstrap.run(&mut self.engine, &mut self.state).await
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if client is connected
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    /// Disconnect from the OBD adapter
    pub fn disconnect(&mut self) {
        if self.state != ConnectionState::Disconnected {
            info!("Disconnecting OBD client");
            self.state = ConnectionState::Disconnected;
        }
    }

    pub fn transport(&self) -> &T {
        self.engine.transport()
    }

    fn ensure_ready(&self) -> Result<(), ObdError> {
        match self.state {
            ConnectionState::Ready => Ok(()),
            state => Err(ObdError::NotReady(state)),
        }
    }

    fn request(&self, pid: Pid) -> Request {
        let descriptor = pid.descriptor();
        let request = Request::new(descriptor.mode, pid.as_hex());
        if self.append_response_count {
            request.with_response_count(1)
        } else {
            request
        }
    }

    /// Query one parameter and decode it
    pub async fn read(&mut self, pid: Pid) -> Result<Reading, ObdError> {
        self.ensure_ready()?;
        debug!("Querying PID {:02X}", pid.as_hex());
        let request = self.request(pid);
        let data = self.engine.run_exchange(&request, pid.response_bytes()).await?;
        decode(pid, data)
    }

    /// Query one parameter, retrying failed exchanges per `retry`
    pub async fn read_with_retry(&mut self, pid: Pid, retry: &Retry) -> Result<Reading, ObdError> {
        self.ensure_ready()?;
        let request = self.request(pid);
        let data = retry.exchange(&mut self.engine, &request, pid.response_bytes()).await?;
        decode(pid, data)
    }

    /// Query a single-valued parameter
    pub async fn read_scalar(&mut self, pid: Pid) -> Result<f64, ObdError> {
        let reading = self.read(pid).await?;
        reading
            .value
            .as_scalar()
            .ok_or_else(|| ObdError::ProtocolError(format!("{} is not a scalar", reading.name)))
    }

    /// Engine speed (rpm)
    pub async fn engine_rpm(&mut self) -> Result<f64, ObdError> {
        self.read_scalar(Pid::Rpm).await
    }

    /// Engine coolant temperature (°C)
    pub async fn coolant_temperature(&mut self) -> Result<f64, ObdError> {
        self.read_scalar(Pid::CoolantTemp).await
    }

    /// Vehicle speed (km/h)
    pub async fn vehicle_speed(&mut self) -> Result<f64, ObdError> {
        self.read_scalar(Pid::Speed).await
    }

    /// Adapter identification string (`ATI`)
    pub async fn version(&mut self) -> Result<String, ObdError> {
        self.query_text("ATI").await
    }

    /// Ignition input state (`AT IGN`)
    pub async fn ignition_on(&mut self) -> Result<bool, ObdError> {
        let text = self.query_text("AT IGN").await?;
        match text.to_ascii_uppercase().as_str() {
            "ON" => Ok(true),
            "OFF" => Ok(false),
            _ => Err(ObdError::Garbage(text)),
        }
    }

    /// Supply voltage seen by the adapter (`AT RV`), in volts
    pub async fn battery_voltage(&mut self) -> Result<f64, ObdError> {
        let text = self.query_text("AT RV").await?;
        text.trim_end_matches(['V', 'v'])
            .trim()
            .parse::<f64>()
            .map_err(|_| ObdError::Garbage(text))
    }

    /// First non-echo line of the reply to an adapter command
    async fn query_text(&mut self, command: &str) -> Result<String, ObdError> {
        self.ensure_ready()?;
        let reply = self.engine.run_command(command).await?;
        let line = parser::data_lines(&reply, command).next().map(str::to_string);
        line.ok_or(ObdError::NoResponse)
    }
}

fn decode(pid: Pid, data: Vec<u8>) -> Result<Reading, ObdError> {
    let timestamp_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    Reading::decode(pid, data, timestamp_ms).ok_or(ObdError::NoData)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pid::PhysicalValue;
    use crate::transport::ScriptedTransport;

    fn config() -> ObdConfig {
        ObdConfig {
            timeout_ms: 200,
            ..Default::default()
        }
    }

    async fn ready_simulated() -> ObdClient<SimulatedAdapter> {
        let mut client = ObdClient::simulated(&config());
        client.connect().await.unwrap();
        client
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_client_bootstraps() {
        let client = ready_simulated().await;
        assert!(client.is_connected());
        assert_eq!(client.state(), ConnectionState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_coolant_temperature() {
        let mut client = ready_simulated().await;
        assert_eq!(client.coolant_temperature().await.unwrap(), 83.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_rpm_reading() {
        let mut client = ready_simulated().await;
        let reading = client.read(Pid::Rpm).await.unwrap();
        assert_eq!(reading.pid, 0x0C);
        assert_eq!(reading.name, "rpm");
        assert_eq!(reading.value, PhysicalValue::Scalar(1726.0));
        assert_eq!(reading.raw_bytes, vec![0x1A, 0xF8]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_pid_is_no_data() {
        let mut client = ObdClient::new(SimulatedAdapter::new().without(Pid::FuelPressure), &config());
        client.connect().await.unwrap();
        assert_eq!(client.read(Pid::FuelPressure).await.unwrap_err(), ObdError::NoData);
        // The link survives a failed read
        assert_eq!(client.vehicle_speed().await.unwrap(), 40.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_before_connect_is_refused() {
        let mut client = ObdClient::simulated(&config());
        let err = client.read(Pid::Rpm).await.unwrap_err();
        assert_eq!(err, ObdError::NotReady(ConnectionState::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mismatched_pid_is_protocol_error() {
        let transport = ScriptedTransport::new()
            .reply("OK\r\r>")
            .reply("OK\r\r>")
            .reply("OK\r\r>")
            .reply("41 0D 1A F8\r\r>");
        let mut client = ObdClient::new(transport, &config());
        client.connect().await.unwrap();
        let err = client.read(Pid::Rpm).await.unwrap_err();
        assert!(matches!(err, ObdError::ProtocolError(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_count_appended() {
        let transport = ScriptedTransport::new()
            .reply("OK\r\r>")
            .reply("OK\r\r>")
            .reply("OK\r\r>")
            .reply("41 05 7B\r\r>");
        let mut client = ObdClient::new(
            transport,
            &ObdConfig {
                append_response_count: true,
                ..config()
            },
        );
        client.connect().await.unwrap();
        assert_eq!(client.coolant_temperature().await.unwrap(), 83.0);
        assert_eq!(client.transport().written().last().map(String::as_str), Some("01051"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_reads_agree() {
        let mut client = ready_simulated().await;
        let first = client.read(Pid::Maf).await.unwrap();
        let second = client.read(Pid::Maf).await.unwrap();
        assert_eq!(first.value, second.value);
        assert_eq!(first.raw_bytes, second.raw_bytes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_adapter_queries() {
        let mut client = ready_simulated().await;
        assert_eq!(client.version().await.unwrap(), "ELM327 v1.5");
        assert!(client.ignition_on().await.unwrap());
        assert_eq!(client.battery_voltage().await.unwrap(), 12.6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_adapter_query_without_text() {
        let transport = ScriptedTransport::new()
            .reply("OK\r\r>")
            .reply("OK\r\r>")
            .reply("OK\r\r>")
            .reply("ATI\r\r>");
        let mut client = ObdClient::new(transport, &config());
        client.connect().await.unwrap();
        assert_eq!(client.version().await.unwrap_err(), ObdError::NoResponse);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_with_retry() {
        let transport = ScriptedTransport::new()
            .reply("OK\r\r>")
            .reply("OK\r\r>")
            .reply("OK\r\r>")
            .reply("SEARCHING...\rUNABLE TO CONNECT\r\r>")
            .reply("41 0D 3C\r\r>");
        let mut client = ObdClient::new(transport, &config());
        client.connect().await.unwrap();
        let retry = Retry::new(2, std::time::Duration::from_millis(10));
        let reading = client.read_with_retry(Pid::Speed, &retry).await.unwrap();
        assert_eq!(reading.value.as_scalar(), Some(60.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_refuses_reads() {
        let mut client = ready_simulated().await;
        client.disconnect();
        assert!(!client.is_connected());
        assert!(matches!(
            client.engine_rpm().await,
            Err(ObdError::NotReady(ConnectionState::Disconnected))
        ));
    }
}
