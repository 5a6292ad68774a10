//! Client Configuration

use crate::engine::EngineConfig;
use crate::protocol::ObdProtocol;
use crate::retry::Retry;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Bluetooth address of the adapter paired by default
pub const DEFAULT_BLUETOOTH_ADDRESS: &str = "001D,A5,68988C";

/// Serial link to the adapter and exchange parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObdConfig {
    /// Serial port device path (e.g., "/dev/ttyUSB0" or "COM3")
    pub device: String,
    /// Serial link speed
    pub baud_rate: u32,
    /// Reply timeout per exchange (milliseconds)
    pub timeout_ms: u64,
    /// Pause between transport polls (milliseconds)
    pub poll_interval_ms: u64,
    /// Receive buffer capacity per reply (bytes)
    pub reply_capacity: usize,
    /// Reply terminator printed by the adapter
    pub prompt: char,
    /// Append the expected response count to mode 01 requests
    pub append_response_count: bool,
    /// Bus protocol selected during setup
    pub protocol: ObdProtocol,
    /// Setup commands sent before the protocol selection, in order
    pub setup_commands: Vec<String>,
    /// Attempts per setup command
    pub setup_tries: u32,
    /// Pause between setup attempts (milliseconds)
    pub retry_delay_ms: u64,
    /// Wireless link bootstrap, absent for wired adapters
    pub bluetooth: Option<BluetoothConfig>,
    /// Use the in-process adapter simulation instead of a serial port
    pub simulate: bool,
}

impl Default for ObdConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: 38400,
            timeout_ms: 9000,
            poll_interval_ms: 10,
            reply_capacity: crate::engine::DEFAULT_CAPACITY,
            prompt: '>',
            append_response_count: false,
            protocol: ObdProtocol::Auto,
            setup_commands: vec!["ATE0".to_string(), "ATL0".to_string()],
            setup_tries: 3,
            retry_delay_ms: 100,
            bluetooth: None,
            simulate: false,
        }
    }
}

/// HC-05 style serial module paired with the adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Adapter address in module notation (NAP,UAP,LAP)
    pub address: String,
    /// Pairing timeout passed to the module (seconds)
    pub pair_timeout_s: u32,
    /// Attempts per link command
    pub tries: u32,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_BLUETOOTH_ADDRESS.to_string(),
            pair_timeout_s: 20,
            tries: 3,
        }
    }
}

impl ObdConfig {
    /// Load from an optional file, then `OBD_`-prefixed environment variables.
    ///
    /// Nested keys use a double underscore, e.g. `OBD_BLUETOOTH__ADDRESS`.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder
            .add_source(
                config::Environment::with_prefix("OBD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Framing parameters for the exchange engine
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            timeout: self.timeout(),
            poll_interval: self.poll_interval(),
            capacity: self.reply_capacity,
            prompt: u8::try_from(self.prompt).unwrap_or(crate::engine::DEFAULT_PROMPT),
        }
    }

    /// Retry budget for bootstrap commands
    pub fn setup_retry(&self) -> Retry {
        Retry::new(self.setup_tries, Duration::from_millis(self.retry_delay_ms))
    }

    /// Full ordered setup script, protocol selection last
    pub fn setup_script(&self) -> Vec<String> {
        let mut script = self.setup_commands.clone();
        script.push(self.protocol.to_elm_command());
        script
    }
}
