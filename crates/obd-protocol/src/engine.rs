//! Command/Response Engine
//!
//! Runs one request/reply cycle against the adapter: flush stale input,
//! send the command once, accumulate bytes until the prompt, then classify
//! and parse. All state lives for one exchange only; `&mut self` on every
//! operation keeps a single exchange in flight.

use crate::classifier::{Classifier, ReplyOutcome};
use crate::error::ObdError;
use crate::parser::{self, PayloadHeader};
use crate::transport::Transport;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Prompt the ELM327 prints when it is ready for the next command
pub const DEFAULT_PROMPT: u8 = b'>';

/// Default receive buffer capacity in bytes
pub const DEFAULT_CAPACITY: usize = 64;

/// Upper bound on bytes discarded by a single flush
const MAX_FLUSH_BYTES: usize = 4096;

/// Framing and timing parameters for the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Time allowed between sending a command and seeing the prompt
    pub timeout: Duration,
    /// Pause between polls when no bytes were available
    pub poll_interval: Duration,
    /// Maximum reply size
    pub capacity: usize,
    /// Byte that terminates a reply
    pub prompt: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(9000),
            poll_interval: Duration::from_millis(10),
            capacity: DEFAULT_CAPACITY,
            prompt: DEFAULT_PROMPT,
        }
    }
}

impl EngineConfig {
    /// Line-terminated framing, for modules that reply without a prompt
    pub fn line_framed(timeout: Duration) -> Self {
        Self {
            timeout,
            prompt: b'\n',
            ..Default::default()
        }
    }
}

/// A diagnostic request (mode + optional PID)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub mode: u8,
    pub pid: Option<u8>,
    /// Number of responses to wait for, appended as one hex digit (1..=15)
    pub response_count: Option<u8>,
}

impl Request {
    pub fn new(mode: u8, pid: u8) -> Self {
        Self {
            mode,
            pid: Some(pid),
            response_count: None,
        }
    }

    pub fn with_response_count(mut self, count: u8) -> Self {
        self.response_count = Some(count.clamp(1, 0x0F));
        self
    }

    /// Command text as sent on the wire, without terminator
    pub fn command(&self) -> String {
        let mut command = format!("{:02X}", self.mode);
        if let Some(pid) = self.pid {
            command.push_str(&format!("{:02X}", pid));
        }
        if let Some(count) = self.response_count {
            command.push_str(&format!("{:X}", count));
        }
        command
    }

    /// Header a reply to this request must start with
    pub fn header(&self) -> PayloadHeader {
        PayloadHeader::for_request(self.mode, self.pid)
    }
}

/// Request/reply state machine over one transport
pub struct ExchangeEngine<T: Transport> {
    transport: T,
    classifier: Classifier,
    config: EngineConfig,
    /// Raw reply of the exchange in flight
    buffer: Vec<u8>,
}

impl<T: Transport> ExchangeEngine<T> {
    pub fn new(transport: T, config: EngineConfig) -> Self {
        Self::with_classifier(transport, config, Classifier::default())
    }

    pub fn with_classifier(transport: T, config: EngineConfig, classifier: Classifier) -> Self {
        let buffer = Vec::with_capacity(config.capacity);
        Self {
            transport,
            classifier,
            config,
            buffer,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Swap framing parameters, returning the previous ones
    pub fn replace_config(&mut self, config: EngineConfig) -> EngineConfig {
        std::mem::replace(&mut self.config, config)
    }

    /// Discard any bytes left over from a previous exchange
    pub async fn flush(&mut self) -> Result<usize, ObdError> {
        let mut discarded = 0;
        while discarded < MAX_FLUSH_BYTES {
            let chunk = self.transport.read_available().await?;
            if chunk.is_empty() {
                break;
            }
            discarded += chunk.len();
        }
        if discarded > 0 {
            debug!("Flushed {} residual bytes", discarded);
        }
        Ok(discarded)
    }

    /// Send `command` and return the classified-successful reply text.
    ///
    /// The returned text has the prompt removed but is otherwise raw
    /// (echo and line breaks included).
    pub async fn run_command(&mut self, command: &str) -> Result<String, ObdError> {
        let result = self.cycle(command).await;
        record_outcome(&result);
        result
    }

    /// Run a full exchange for `request` and return exactly `expected` data bytes
    pub async fn run_exchange(
        &mut self,
        request: &Request,
        expected: usize,
    ) -> Result<Vec<u8>, ObdError> {
        let command = request.command();
        let result = self.cycle(&command).await.and_then(|reply| {
            parser::parse(&reply, &command, &request.header(), expected).map_err(|e| {
                warn!("Reply to {} rejected: {}", command, e);
                ObdError::from(e)
            })
        });
        record_outcome(&result);
        result
    }

    async fn cycle(&mut self, command: &str) -> Result<String, ObdError> {
        self.flush().await?;
        self.buffer.clear();

        debug!("-> {}", command);
        self.transport.write_line(command).await?;

        self.accumulate().await.map_err(|e| {
            warn!("Exchange {} failed: {}", command, e);
            e
        })?;

        let reply = String::from_utf8_lossy(&self.buffer).into_owned();
        debug!("<- {:?}", reply);

        match self.classifier.classify(&reply) {
            ReplyOutcome::Success => Ok(reply),
            outcome => {
                debug!("Reply to {} classified as {}", command, outcome.as_str());
                Err(ObdError::from_outcome(outcome, &reply, self.config.capacity))
            }
        }
    }

    /// Poll until the prompt, the timeout, or the capacity bound
    async fn accumulate(&mut self) -> Result<(), ObdError> {
        let started = Instant::now();
        loop {
            let chunk = self.transport.read_available().await?;
            for &byte in &chunk {
                if byte == self.config.prompt {
                    return Ok(());
                }
                // Some adapters pad replies with NULs
                if byte == 0 {
                    continue;
                }
                if self.buffer.len() >= self.config.capacity {
                    return Err(ObdError::BufferOverflow(self.config.capacity));
                }
                self.buffer.push(byte);
            }

            if started.elapsed() > self.config.timeout {
                return Err(ObdError::NoResponse);
            }
            if chunk.is_empty() {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }
    }
}

/// Count one finished exchange under its final outcome
fn record_outcome<V>(result: &Result<V, ObdError>) {
    let outcome = match result {
        Ok(_) => ReplyOutcome::Success,
        Err(e) => e.outcome(),
    };
    metrics::counter!("obd_exchanges_total", "outcome" => outcome.as_str()).increment(1);
}
