//! OBD-II Error Types

use crate::bootstrap::ConnectionState;
use crate::classifier::ReplyOutcome;
use thiserror::Error;

/// Errors that can occur during one OBD-II exchange
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObdError {
    /// No prompt seen before the timeout elapsed, or the reply was empty
    #[error("No response from adapter")]
    NoResponse,

    /// Reply exceeded the receive buffer capacity
    #[error("Reply exceeded buffer capacity of {0} bytes")]
    BufferOverflow(usize),

    /// Adapter rejected the command or sent undecodable bytes
    #[error("Garbage reply: {0}")]
    Garbage(String),

    /// Adapter could not reach the vehicle bus
    #[error("Adapter unable to connect to vehicle bus")]
    UnableToConnect,

    /// Parameter not supported or no data available
    #[error("No data for request")]
    NoData,

    /// Header mismatch or bus protocol fault
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Exchange attempted before the link was ready
    #[error("Adapter not ready (state: {0:?})")]
    NotReady(ConnectionState),
}

impl ObdError {
    /// Status code from the fixed outcome set
    ///
    /// Transport failures and exchanges attempted before the link is ready
    /// report as `NoResponse`.
    pub fn outcome(&self) -> ReplyOutcome {
        match self {
            ObdError::NoResponse | ObdError::Serial(_) | ObdError::NotReady(_) => {
                ReplyOutcome::NoResponse
            }
            ObdError::BufferOverflow(_) => ReplyOutcome::BufferOverflow,
            ObdError::Garbage(_) => ReplyOutcome::Garbage,
            ObdError::UnableToConnect => ReplyOutcome::UnableToConnect,
            ObdError::NoData => ReplyOutcome::NoData,
            ObdError::ProtocolError(_) => ReplyOutcome::ProtocolError,
        }
    }

    /// Build the error for a non-success classification
    pub(crate) fn from_outcome(outcome: ReplyOutcome, reply: &str, capacity: usize) -> Self {
        match outcome {
            ReplyOutcome::Success | ReplyOutcome::NoResponse => ObdError::NoResponse,
            ReplyOutcome::BufferOverflow => ObdError::BufferOverflow(capacity),
            ReplyOutcome::Garbage => ObdError::Garbage(reply.trim().to_string()),
            ReplyOutcome::UnableToConnect => ObdError::UnableToConnect,
            ReplyOutcome::NoData => ObdError::NoData,
            ReplyOutcome::ProtocolError => ObdError::ProtocolError(reply.trim().to_string()),
        }
    }
}

impl From<std::io::Error> for ObdError {
    fn from(err: std::io::Error) -> Self {
        ObdError::Serial(err.to_string())
    }
}

impl From<tokio_serial::Error> for ObdError {
    fn from(err: tokio_serial::Error) -> Self {
        ObdError::Serial(err.to_string())
    }
}

/// Errors while turning a framed reply into payload bytes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Nothing but echo and status lines before the prompt
    #[error("Reply carries no data line")]
    Empty,

    /// A token did not decode as a hexadecimal byte
    #[error("Invalid hex token: {0:?}")]
    InvalidHex(String),

    /// Reply header does not echo the request
    #[error("Header mismatch: expected {expected:02X?}, got {actual:02X?}")]
    HeaderMismatch { expected: Vec<u8>, actual: Vec<u8> },

    /// Payload width differs from the declared width
    #[error("Expected {expected} data bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

impl From<ParseError> for ObdError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Empty => ObdError::NoResponse,
            ParseError::InvalidHex(_) => ObdError::Garbage(err.to_string()),
            ParseError::HeaderMismatch { .. } => ObdError::ProtocolError(err.to_string()),
            ParseError::LengthMismatch { .. } => ObdError::NoData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_outcomes() {
        let garbage: ObdError = ParseError::InvalidHex("ZZ".into()).into();
        assert_eq!(garbage.outcome(), ReplyOutcome::Garbage);

        let mismatch: ObdError = ParseError::HeaderMismatch {
            expected: vec![0x41, 0x0C],
            actual: vec![0x41, 0x0D],
        }
        .into();
        assert_eq!(mismatch.outcome(), ReplyOutcome::ProtocolError);

        let short: ObdError = ParseError::LengthMismatch { expected: 2, actual: 1 }.into();
        assert_eq!(short.outcome(), ReplyOutcome::NoData);

        let empty: ObdError = ParseError::Empty.into();
        assert_eq!(empty, ObdError::NoResponse);
    }

    #[test]
    fn test_transport_errors_report_no_response() {
        let err: ObdError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone").into();
        assert_eq!(err.outcome(), ReplyOutcome::NoResponse);
        assert_eq!(
            ObdError::NotReady(ConnectionState::Failed).outcome(),
            ReplyOutcome::NoResponse
        );
    }
}
