//! Byte Transport to the Adapter
//!
//! The exchange engine only needs to write a command line and poll for
//! whatever bytes have arrived; framing is done above this layer.

use crate::error::ObdError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialStream;
use tracing::{debug, info};

/// Line terminator the adapter expects after every command
pub const COMMAND_TERMINATOR: char = '\r';

/// Byte-oriented link to an ELM327-style adapter
#[async_trait]
pub trait Transport: Send {
    /// Write `line` followed by a carriage return
    async fn write_line(&mut self, line: &str) -> Result<(), ObdError>;

    /// Return the bytes received since the last call, possibly none
    async fn read_available(&mut self) -> Result<Vec<u8>, ObdError>;
}

/// Serial port transport (USB cable or Bluetooth SPP device node)
pub struct SerialTransport {
    port: SerialStream,
    /// How long one poll waits for the first byte
    read_wait: Duration,
}

impl SerialTransport {
    /// Open `device` at `baud_rate`
    pub fn open(device: &str, baud_rate: u32, read_wait: Duration) -> Result<Self, ObdError> {
        info!("Opening serial port {} at {} baud", device, baud_rate);

        let builder = tokio_serial::new(device, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .timeout(read_wait);
        let port = SerialStream::open(&builder)
            .map_err(|e| ObdError::Serial(format!("Failed to open {}: {}", device, e)))?;

        Ok(Self { port, read_wait })
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn write_line(&mut self, line: &str) -> Result<(), ObdError> {
        let mut frame = String::with_capacity(line.len() + 1);
        frame.push_str(line);
        frame.push(COMMAND_TERMINATOR);

        self.port.write_all(frame.as_bytes()).await?;
        self.port.flush().await?;
        Ok(())
    }

    async fn read_available(&mut self) -> Result<Vec<u8>, ObdError> {
        let mut buf = [0u8; 64];
        match tokio::time::timeout(self.read_wait, self.port.read(&mut buf)).await {
            Ok(Ok(n)) => Ok(buf[..n].to_vec()),
            Ok(Err(e)) => Err(e.into()),
            // Nothing arrived within one poll
            Err(_) => Ok(Vec::new()),
        }
    }
}

/// Transport that plays back canned replies, one per written line
///
/// Each reply is a list of chunks; one chunk is returned per
/// `read_available` call so replies arrive incrementally.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: VecDeque<Vec<Vec<u8>>>,
    inbound: VecDeque<Vec<u8>>,
    written: Vec<String>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply delivered in one chunk
    pub fn reply(mut self, text: &str) -> Self {
        self.replies.push_back(vec![text.as_bytes().to_vec()]);
        self
    }

    /// Queue a reply delivered as several chunks
    pub fn reply_chunks(mut self, chunks: &[&str]) -> Self {
        self.replies
            .push_back(chunks.iter().map(|c| c.as_bytes().to_vec()).collect());
        self
    }

    /// Queue a write that gets no reply at all
    pub fn silence(mut self) -> Self {
        self.replies.push_back(Vec::new());
        self
    }

    /// Bytes already waiting before the first command
    pub fn with_residue(mut self, text: &str) -> Self {
        self.inbound.push_back(text.as_bytes().to_vec());
        self
    }

    /// Lines written so far, without terminators
    pub fn written(&self) -> &[String] {
        &self.written
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn write_line(&mut self, line: &str) -> Result<(), ObdError> {
        debug!("Scripted transport received {:?}", line);
        self.written.push(line.to_string());
        if let Some(chunks) = self.replies.pop_front() {
            self.inbound.extend(chunks);
        }
        Ok(())
    }

    async fn read_available(&mut self) -> Result<Vec<u8>, ObdError> {
        Ok(self.inbound.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replies_follow_writes() {
        let mut transport = ScriptedTransport::new().reply_chunks(&["41 0C", " 1A F8\r>"]);
        assert!(transport.read_available().await.unwrap().is_empty());

        transport.write_line("010C").await.unwrap();
        assert_eq!(transport.read_available().await.unwrap(), b"41 0C".to_vec());
        assert_eq!(transport.read_available().await.unwrap(), b" 1A F8\r>".to_vec());
        assert!(transport.read_available().await.unwrap().is_empty());
        assert_eq!(transport.written(), &["010C".to_string()]);
    }

    #[tokio::test]
    async fn test_residue_available_before_write() {
        let mut transport = ScriptedTransport::new().with_residue("stale>");
        assert_eq!(transport.read_available().await.unwrap(), b"stale>".to_vec());
    }
}
