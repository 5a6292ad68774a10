//! Hex Payload Parsing
//!
//! Turns a framed, successfully classified reply into the data bytes that
//! follow the echoed mode/PID header.

use crate::error::ParseError;

/// Offset the adapter adds to the request mode in a positive reply
pub const RESPONSE_MODE_OFFSET: u8 = 0x40;

/// Mode and PID bytes a reply must start with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    /// Response mode (request mode + 0x40)
    pub mode: u8,
    /// Echoed PID, absent for modes without one
    pub pid: Option<u8>,
}

impl PayloadHeader {
    /// Header expected in reply to `mode`/`pid`
    pub fn for_request(mode: u8, pid: Option<u8>) -> Self {
        Self {
            mode: mode.wrapping_add(RESPONSE_MODE_OFFSET),
            pid,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![self.mode];
        bytes.extend(self.pid);
        bytes
    }
}

/// Lines of a reply that carry data: prompt, echo and status lines removed
pub fn data_lines<'a>(reply: &'a str, command: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    let echo = normalize(command);
    reply
        .split(['\r', '\n'])
        .map(|line| line.trim_matches(|c: char| c.is_whitespace() || c == '>'))
        .filter(|line| !line.is_empty())
        .filter(move |line| normalize(line) != echo)
        .filter(|line| !is_status_line(line))
}

fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn is_status_line(line: &str) -> bool {
    let upper = line.to_ascii_uppercase();
    upper.starts_with("SEARCHING") || upper.starts_with("BUS INIT")
}

/// Decode whitespace-separated hex tokens into bytes.
///
/// Tokens longer than two digits (spaces disabled on the adapter) are split
/// into pairs; odd-length or non-hex tokens are rejected.
pub fn decode_hex(line: &str) -> Result<Vec<u8>, ParseError> {
    let mut bytes = Vec::new();
    for token in line.split_whitespace() {
        if token.len() % 2 != 0 || !token.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseError::InvalidHex(token.to_string()));
        }
        for i in (0..token.len()).step_by(2) {
            let byte = u8::from_str_radix(&token[i..i + 2], 16)
                .map_err(|_| ParseError::InvalidHex(token.to_string()))?;
            bytes.push(byte);
        }
    }
    Ok(bytes)
}

/// Extract exactly `expected` data bytes from `reply`.
///
/// `command` is the request as sent, used to drop its echo. Only the first
/// data line is considered; lines from additional ECUs are ignored.
pub fn parse(
    reply: &str,
    command: &str,
    header: &PayloadHeader,
    expected: usize,
) -> Result<Vec<u8>, ParseError> {
    let line = data_lines(reply, command).next().ok_or(ParseError::Empty)?;
    let bytes = decode_hex(line)?;

    let header_bytes = header.to_bytes();
    let header_len = header_bytes.len();
    if bytes.len() < header_len || bytes[..header_len] != header_bytes[..] {
        return Err(ParseError::HeaderMismatch {
            actual: bytes.iter().take(header_len).copied().collect(),
            expected: header_bytes,
        });
    }

    let data = &bytes[header_len..];
    if data.len() != expected {
        return Err(ParseError::LengthMismatch {
            expected,
            actual: data.len(),
        });
    }

    Ok(data.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rpm_header() -> PayloadHeader {
        PayloadHeader::for_request(0x01, Some(0x0C))
    }

    #[test]
    fn test_header_for_request() {
        assert_eq!(rpm_header().to_bytes(), vec![0x41, 0x0C]);
        assert_eq!(PayloadHeader::for_request(0x03, None).to_bytes(), vec![0x43]);
    }

    #[test]
    fn test_parse_plain_reply() {
        let data = parse("41 0C 1A F8 \r\r>", "010C", &rpm_header(), 2).unwrap();
        assert_eq!(data, vec![0x1A, 0xF8]);
    }

    #[test]
    fn test_parse_strips_echo_and_status() {
        let reply = "010C\rSEARCHING...\r41 0C 1A F8\r\r>";
        let data = parse(reply, "010C", &rpm_header(), 2).unwrap();
        assert_eq!(data, vec![0x1A, 0xF8]);
    }

    #[test]
    fn test_parse_spaces_off() {
        let data = parse("410C1AF8\r>", "010C", &rpm_header(), 2).unwrap();
        assert_eq!(data, vec![0x1A, 0xF8]);
    }

    #[test]
    fn test_invalid_token() {
        let err = parse("41 0C 1G F8\r>", "010C", &rpm_header(), 2).unwrap_err();
        assert_eq!(err, ParseError::InvalidHex("1G".into()));

        let err = parse("41 0C 1AF\r>", "010C", &rpm_header(), 2).unwrap_err();
        assert!(matches!(err, ParseError::InvalidHex(_)));
    }

    #[test]
    fn test_header_mismatch() {
        let err = parse("41 0D 1A F8\r>", "010C", &rpm_header(), 2).unwrap_err();
        assert_eq!(
            err,
            ParseError::HeaderMismatch {
                expected: vec![0x41, 0x0C],
                actual: vec![0x41, 0x0D],
            }
        );
    }

    #[test]
    fn test_length_mismatch() {
        let err = parse("41 0C 1A\r>", "010C", &rpm_header(), 2).unwrap_err();
        assert_eq!(err, ParseError::LengthMismatch { expected: 2, actual: 1 });

        let err = parse("41 0C 1A F8 00\r>", "010C", &rpm_header(), 2).unwrap_err();
        assert_eq!(err, ParseError::LengthMismatch { expected: 2, actual: 3 });
    }

    #[test]
    fn test_echo_only_reply_is_empty() {
        assert_eq!(parse("010C\r\r>", "010C", &rpm_header(), 2).unwrap_err(), ParseError::Empty);
        assert_eq!(
            parse("010C\rSEARCHING...\r\r>", "010C", &rpm_header(), 2).unwrap_err(),
            ParseError::Empty
        );
    }

    #[test]
    fn test_only_first_ecu_line_used() {
        let reply = "41 0C 1A F8\r41 0C 00 00\r\r>";
        let data = parse(reply, "010C", &rpm_header(), 2).unwrap();
        assert_eq!(data, vec![0x1A, 0xF8]);
    }

    proptest! {
        #[test]
        fn prop_parse_returns_declared_width(data in proptest::collection::vec(any::<u8>(), 0..6)) {
            let tokens: Vec<String> = data.iter().map(|b| format!("{:02X}", b)).collect();
            let reply = format!("41 0C {}\r\r>", tokens.join(" "));
            let parsed = parse(&reply, "010C", &rpm_header(), data.len()).unwrap();
            prop_assert_eq!(parsed, data);
        }
    }
}
