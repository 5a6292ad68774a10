//! OBD-II Protocol Implementation
//!
//! Async command/response client for ELM327-compatible OBD-II adapters.
//! One exchange at a time: send a command, accumulate the reply up to the
//! prompt, classify it, then parse and decode the payload.

pub mod bluetooth;
pub mod bootstrap;
pub mod classifier;
mod client;
pub mod config;
pub mod engine;
mod error;
pub mod parser;
mod pid;
mod protocol;
pub mod retry;
pub mod simulator;
pub mod transport;

pub use bluetooth::LinkError;
pub use bootstrap::{Bootstrap, BootstrapError, ConnectionState};
pub use classifier::{Classifier, ClassifierRule, ReplyOutcome};
pub use client::ObdClient;
pub use config::{BluetoothConfig, ObdConfig};
pub use engine::{EngineConfig, ExchangeEngine, Request};
pub use error::{ObdError, ParseError};
pub use pid::{Decoder, ParameterDescriptor, PhysicalValue, Pid, Reading, Scale, CATALOGUE};
pub use protocol::ObdProtocol;
pub use retry::Retry;
pub use simulator::SimulatedAdapter;
pub use transport::{ScriptedTransport, SerialTransport, Transport};

/// OBD-II mode constants
pub mod mode {
    /// Current data
    pub const CURRENT_DATA: u8 = 0x01;
}
