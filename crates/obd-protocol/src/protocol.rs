//! OBD-II Bus Protocol Selection

use serde::{Deserialize, Serialize};

/// Bus protocols the adapter can be told to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObdProtocol {
    /// Automatic protocol detection
    #[default]
    Auto,
    /// SAE J1850 PWM (41.6 kbaud)
    J1850Pwm,
    /// SAE J1850 VPW (10.4 kbaud)
    J1850Vpw,
    /// ISO 9141-2 (10.4 kbaud, 5 baud init)
    Iso9141_2,
    /// ISO 14230-4 KWP (slow init, 10.4 kbaud)
    Iso14230_4Kwp,
    /// ISO 14230-4 KWP (fast init, 10.4 kbaud)
    Iso14230_4KwpFast,
    /// ISO 15765-4 CAN (11 bit ID, 500 kbaud)
    Iso15765_4Can11bit500,
    /// ISO 15765-4 CAN (29 bit ID, 500 kbaud)
    Iso15765_4Can29bit500,
    /// ISO 15765-4 CAN (11 bit ID, 250 kbaud)
    Iso15765_4Can11bit250,
    /// ISO 15765-4 CAN (29 bit ID, 250 kbaud)
    Iso15765_4Can29bit250,
}

impl ObdProtocol {
    /// Protocol number used by `ATSPn`
    pub fn elm_number(&self) -> u8 {
        match self {
            ObdProtocol::Auto => 0,
            ObdProtocol::J1850Pwm => 1,
            ObdProtocol::J1850Vpw => 2,
            ObdProtocol::Iso9141_2 => 3,
            ObdProtocol::Iso14230_4Kwp => 4,
            ObdProtocol::Iso14230_4KwpFast => 5,
            ObdProtocol::Iso15765_4Can11bit500 => 6,
            ObdProtocol::Iso15765_4Can29bit500 => 7,
            ObdProtocol::Iso15765_4Can11bit250 => 8,
            ObdProtocol::Iso15765_4Can29bit250 => 9,
        }
    }

    /// Get the ELM327 AT command selecting this protocol
    pub fn to_elm_command(&self) -> String {
        format!("ATSP{}", self.elm_number())
    }
}
