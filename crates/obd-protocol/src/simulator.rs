//! Simulated ELM327 Adapter
//!
//! In-process stand-in for a real adapter, answering AT commands and mode
//! 01 requests from a table of raw payload bytes. Replies are deterministic
//! so repeated reads decode to identical values.

use crate::error::ObdError;
use crate::pid::Pid;
use crate::transport::Transport;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

/// Version string reported by `ATZ` and `ATI`
pub const SIMULATED_VERSION: &str = "ELM327 v1.5";

/// Emulated adapter state
#[derive(Debug, Clone)]
pub struct SimulatedAdapter {
    echo: bool,
    ignition: bool,
    battery_voltage: f64,
    values: HashMap<u8, Vec<u8>>,
    outbound: Vec<u8>,
}

impl Default for SimulatedAdapter {
    fn default() -> Self {
        let values = [
            (Pid::EngineLoad, vec![0x64]),
            (Pid::CoolantTemp, vec![0x7B]),
            (Pid::ShortFuelTrimBank1, vec![0x80]),
            (Pid::LongFuelTrimBank1, vec![0x84]),
            (Pid::IntakeManifoldPressure, vec![0x21]),
            (Pid::Rpm, vec![0x1A, 0xF8]),
            (Pid::Speed, vec![0x28]),
            (Pid::TimingAdvance, vec![0x90]),
            (Pid::IntakeAirTemp, vec![0x38]),
            (Pid::Maf, vec![0x01, 0xF4]),
            (Pid::ThrottlePosition, vec![0x45]),
            (Pid::O2Bank1Sensor1, vec![0x5A, 0x80]),
            (Pid::RunTime, vec![0x02, 0x58]),
            (Pid::FuelLevel, vec![0x99]),
            (Pid::BarometricPressure, vec![0x65]),
            (Pid::ControlModuleVoltage, vec![0x37, 0xDC]),
            (Pid::AmbientAirTemp, vec![0x3C]),
        ]
        .into_iter()
        .map(|(pid, bytes)| (pid.as_hex(), bytes))
        .collect();

        Self {
            echo: true,
            ignition: true,
            battery_voltage: 12.6,
            values,
            outbound: Vec::new(),
        }
    }
}

impl SimulatedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the raw payload returned for `pid`
    pub fn with_value(mut self, pid: Pid, bytes: Vec<u8>) -> Self {
        self.values.insert(pid.as_hex(), bytes);
        self
    }

    /// Make `pid` unsupported (`NO DATA`)
    pub fn without(mut self, pid: Pid) -> Self {
        self.values.remove(&pid.as_hex());
        self
    }

    pub fn with_ignition(mut self, on: bool) -> Self {
        self.ignition = on;
        self
    }

    pub fn with_battery_voltage(mut self, volts: f64) -> Self {
        self.battery_voltage = volts;
        self
    }

    /// Reply text for one command, updating adapter state
    fn respond(&mut self, command: &str) -> String {
        let command: String = command
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        // Serial module commands answer a line, no prompt
        if command == "AT" || command.starts_with("AT+") {
            return "OK\r\n".to_string();
        }

        match command.as_str() {
            "ATZ" => {
                self.echo = true;
                format!("\r\r{}\r\r>", SIMULATED_VERSION)
            }
            "ATE0" => {
                self.echo = false;
                "OK\r\r>".to_string()
            }
            "ATE1" => {
                self.echo = true;
                "OK\r\r>".to_string()
            }
            "ATI" => format!("{}\r\r>", SIMULATED_VERSION),
            "ATRV" => format!("{:.1}V\r\r>", self.battery_voltage),
            "ATIGN" => {
                let state = if self.ignition { "ON" } else { "OFF" };
                format!("{}\r\r>", state)
            }
            c if c.starts_with("AT") => "OK\r\r>".to_string(),
            c if c.starts_with("01") => match c.get(2..4) {
                Some(pid) => self.current_data(pid),
                None => "?\r\r>".to_string(),
            },
            _ => "?\r\r>".to_string(),
        }
    }

    fn current_data(&self, pid: &str) -> String {
        let Ok(pid) = u8::from_str_radix(pid, 16) else {
            return "?\r\r>".to_string();
        };
        match self.values.get(&pid) {
            Some(bytes) => {
                let mut reply = format!("41 {:02X}", pid);
                for byte in bytes {
                    reply.push_str(&format!(" {:02X}", byte));
                }
                reply.push_str(" \r\r>");
                reply
            }
            None => "NO DATA\r\r>".to_string(),
        }
    }
}

#[async_trait]
impl Transport for SimulatedAdapter {
    async fn write_line(&mut self, line: &str) -> Result<(), ObdError> {
        if self.echo {
            self.outbound.extend_from_slice(line.as_bytes());
            self.outbound.push(b'\r');
        }
        let reply = self.respond(line);
        debug!("Simulated adapter: {:?} -> {:?}", line, reply);
        self.outbound.extend_from_slice(reply.as_bytes());
        Ok(())
    }

    async fn read_available(&mut self) -> Result<Vec<u8>, ObdError> {
        Ok(std::mem::take(&mut self.outbound))
    }
}
