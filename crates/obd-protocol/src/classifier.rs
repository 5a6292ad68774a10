//! Reply Classification
//!
//! Maps a framed adapter reply to one outcome using an ordered rule table.
//! Rules are evaluated top to bottom and the first match wins, so the order
//! of the table is part of its contract.

use serde::{Deserialize, Serialize};

/// Outcome of one exchange, with the adapter status codes as discriminants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReplyOutcome {
    Success = 0,
    NoResponse = 1,
    BufferOverflow = 2,
    Garbage = 3,
    UnableToConnect = 4,
    NoData = 5,
    ProtocolError = 6,
}

impl ReplyOutcome {
    /// Numeric status code
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Label used for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyOutcome::Success => "success",
            ReplyOutcome::NoResponse => "no_response",
            ReplyOutcome::BufferOverflow => "buffer_overflow",
            ReplyOutcome::Garbage => "garbage",
            ReplyOutcome::UnableToConnect => "unable_to_connect",
            ReplyOutcome::NoData => "no_data",
            ReplyOutcome::ProtocolError => "protocol_error",
        }
    }
}

/// One `(marker, outcome)` pair of the classification table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierRule {
    /// Substring looked for in the reply (case-insensitive)
    pub marker: String,
    /// Outcome reported when the marker is present
    pub outcome: ReplyOutcome,
}

impl ClassifierRule {
    pub fn new(marker: &str, outcome: ReplyOutcome) -> Self {
        Self {
            marker: marker.to_ascii_uppercase(),
            outcome,
        }
    }
}

/// Ordered marker table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classifier {
    rules: Vec<ClassifierRule>,
}

impl Default for Classifier {
    /// ELM327 marker table
    fn default() -> Self {
        Self::with_rules(vec![
            ClassifierRule::new("UNABLE TO CONNECT", ReplyOutcome::UnableToConnect),
            ClassifierRule::new("NO DATA", ReplyOutcome::NoData),
            ClassifierRule::new("?", ReplyOutcome::Garbage),
            ClassifierRule::new("BUS INIT: ...ERROR", ReplyOutcome::ProtocolError),
            ClassifierRule::new("BUS INIT: ERROR", ReplyOutcome::ProtocolError),
            ClassifierRule::new("BUS ERROR", ReplyOutcome::ProtocolError),
            ClassifierRule::new("CAN ERROR", ReplyOutcome::ProtocolError),
            ClassifierRule::new("DATA ERROR", ReplyOutcome::ProtocolError),
            ClassifierRule::new("FB ERROR", ReplyOutcome::ProtocolError),
        ])
    }
}

impl Classifier {
    /// Build a classifier from a custom table, evaluated in the given order
    pub fn with_rules(rules: Vec<ClassifierRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    /// Classify a framed reply.
    ///
    /// An empty reply (whitespace and prompt characters only) is always
    /// `NoResponse`; that check precedes the table.
    pub fn classify(&self, reply: &str) -> ReplyOutcome {
        if reply.chars().all(|c| c.is_whitespace() || c == '>') {
            return ReplyOutcome::NoResponse;
        }

        let upper = reply.to_ascii_uppercase();
        self.rules
            .iter()
            .find(|rule| upper.contains(rule.marker.as_str()))
            .map(|rule| rule.outcome)
            .unwrap_or(ReplyOutcome::Success)
    }
}
