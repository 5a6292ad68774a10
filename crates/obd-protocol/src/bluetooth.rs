//! Bluetooth Serial Module Link
//!
//! Brings up the wireless link to the adapter through an HC-05 style
//! module in command mode. The module answers `OK` lines without a prompt,
//! so the engine runs with line framing for this stage only.

use crate::config::BluetoothConfig;
use crate::engine::{EngineConfig, ExchangeEngine};
use crate::error::ObdError;
use crate::retry::{reply_ok, Retry};
use crate::transport::Transport;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Reply from `AT+INIT` when the module is already initialised
const ALREADY_INITIALISED: &str = "ERROR:(17)";

/// Link bootstrap failures, one per stage
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinkError {
    #[error("Bluetooth module did not answer ping: {0}")]
    NoPing(ObdError),

    #[error("Bluetooth module initialisation failed: {0}")]
    InitFailed(ObdError),

    #[error("Bluetooth bind failed: {0}")]
    BindFailed(ObdError),

    #[error("Bluetooth pairing failed: {0}")]
    PairFailed(ObdError),

    #[error("Bluetooth link failed: {0}")]
    LinkFailed(ObdError),
}

impl LinkError {
    /// Status code of the failed stage
    pub fn code(&self) -> u8 {
        match self {
            LinkError::NoPing(_) => 8,
            LinkError::InitFailed(_) => 9,
            LinkError::BindFailed(_) => 10,
            LinkError::PairFailed(_) => 11,
            LinkError::LinkFailed(_) => 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Ping,
    Init,
    Bind,
    Pair,
    Link,
}

impl Stage {
    fn fail(self, err: ObdError) -> LinkError {
        match self {
            Stage::Ping => LinkError::NoPing(err),
            Stage::Init => LinkError::InitFailed(err),
            Stage::Bind => LinkError::BindFailed(err),
            Stage::Pair => LinkError::PairFailed(err),
            Stage::Link => LinkError::LinkFailed(err),
        }
    }

    fn accepts(self, reply: &str) -> bool {
        match self {
            Stage::Init => reply_ok(reply) || reply.contains(ALREADY_INITIALISED),
            _ => reply_ok(reply),
        }
    }
}

/// Ordered link script for `config`
fn script(config: &BluetoothConfig) -> Vec<(Stage, String)> {
    let address = &config.address;
    vec![
        (Stage::Ping, "AT".to_string()),
        (Stage::Init, "AT+INIT".to_string()),
        (Stage::Bind, format!("AT+BIND={}", address)),
        (Stage::Pair, format!("AT+PAIR={},{}", address, config.pair_timeout_s)),
        (Stage::Link, format!("AT+LINK={}", address)),
    ]
}

/// Run the link script; stops at the first stage that exhausts its retries.
///
/// The engine's framing is switched to line mode for the duration and
/// restored afterwards, whatever the outcome.
pub async fn connect<T: Transport>(
    engine: &mut ExchangeEngine<T>,
    config: &BluetoothConfig,
    retry_delay: Duration,
) -> Result<(), LinkError> {
    info!("Linking Bluetooth module to {}", config.address);

    // Pairing blocks the module for up to its own timeout
    let timeout = engine
        .config()
        .timeout
        .max(Duration::from_secs(u64::from(config.pair_timeout_s) + 1));
    let previous = engine.replace_config(EngineConfig::line_framed(timeout));

    let retry = Retry::new(config.tries, retry_delay);
    let mut result = Ok(());
    for (stage, command) in script(config) {
        if let Err(e) = retry.command(engine, &command, |reply| stage.accepts(reply)).await {
            warn!("Bluetooth stage {:?} failed: {}", stage, e);
            result = Err(stage.fail(e));
            break;
        }
    }

    engine.replace_config(previous);
    if result.is_ok() {
        info!("Bluetooth link established");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ScriptedTransport;

    fn config() -> BluetoothConfig {
        BluetoothConfig {
            tries: 2,
            ..Default::default()
        }
    }

    fn engine(transport: ScriptedTransport) -> ExchangeEngine<ScriptedTransport> {
        ExchangeEngine::new(
            transport,
            EngineConfig {
                timeout: Duration::from_millis(100),
                ..Default::default()
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_link_sequence() {
        let transport = ScriptedTransport::new()
            .reply("OK\r\n")
            .reply("ERROR:(17)\r\n")
            .reply("OK\r\n")
            .reply("OK\r\n")
            .reply("OK\r\n");
        let mut engine = engine(transport);

        connect(&mut engine, &config(), Duration::from_millis(10)).await.unwrap();

        assert_eq!(
            engine.transport().written(),
            &[
                "AT".to_string(),
                "AT+INIT".to_string(),
                "AT+BIND=001D,A5,68988C".to_string(),
                "AT+PAIR=001D,A5,68988C,20".to_string(),
                "AT+LINK=001D,A5,68988C".to_string(),
            ]
        );
        // Prompt framing restored for the adapter
        assert_eq!(engine.config().prompt, b'>');
    }

    #[tokio::test(start_paused = true)]
    async fn test_pair_failure_stops_sequence() {
        let transport = ScriptedTransport::new()
            .reply("OK\r\n")
            .reply("OK\r\n")
            .reply("OK\r\n")
            .reply("FAIL\r\n")
            .reply("FAIL\r\n");
        let mut engine = engine(transport);

        let err = connect(&mut engine, &config(), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::PairFailed(_)));
        assert_eq!(err.code(), 11);
        // No AT+LINK after the exhausted pairing
        assert_eq!(engine.transport().written().len(), 5);
        assert_eq!(engine.config().prompt, b'>');
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_module_is_no_ping() {
        let mut engine = engine(ScriptedTransport::new().silence().silence());
        let err = connect(&mut engine, &config(), Duration::ZERO).await.unwrap_err();
        assert_eq!(err, LinkError::NoPing(ObdError::NoResponse));
        assert_eq!(err.code(), 8);
    }
}
