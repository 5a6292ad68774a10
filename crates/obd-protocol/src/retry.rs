//! Bounded Retry
//!
//! At-least-one-success-in-N-tries around single exchanges. The engine
//! itself never retries; callers opt in through this wrapper.

use crate::engine::{ExchangeEngine, Request};
use crate::error::ObdError;
use crate::transport::Transport;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry budget for one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retry {
    /// Total attempts, including the first (at least 1)
    pub tries: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            tries: 3,
            delay: Duration::from_millis(100),
        }
    }
}

impl Retry {
    pub fn new(tries: u32, delay: Duration) -> Self {
        Self {
            tries: tries.max(1),
            delay,
        }
    }

    /// Send `command` until a successful reply satisfies `accept`.
    ///
    /// A successful exchange whose reply is rejected by `accept` counts as a
    /// failed attempt reported as `Garbage`. Returns the last error when the
    /// budget is exhausted.
    pub async fn command<T, F>(
        &self,
        engine: &mut ExchangeEngine<T>,
        command: &str,
        accept: F,
    ) -> Result<String, ObdError>
    where
        T: Transport,
        F: Fn(&str) -> bool,
    {
        let tries = self.tries.max(1);
        let mut last_error = ObdError::NoResponse;

        for attempt in 1..=tries {
            match engine.run_command(command).await {
                Ok(reply) if accept(&reply) => {
                    debug!("{} accepted on attempt {}", command, attempt);
                    return Ok(reply);
                }
                Ok(reply) => {
                    last_error = ObdError::Garbage(format!("unexpected reply {:?}", reply.trim()));
                }
                Err(e) => last_error = e,
            }

            warn!("{} attempt {}/{} failed: {}", command, attempt, tries, last_error);
            if attempt < tries {
                tokio::time::sleep(self.delay).await;
            }
        }

        Err(last_error)
    }

    /// Run `request` until one exchange yields the declared payload
    pub async fn exchange<T: Transport>(
        &self,
        engine: &mut ExchangeEngine<T>,
        request: &Request,
        expected: usize,
    ) -> Result<Vec<u8>, ObdError> {
        let tries = self.tries.max(1);
        let mut last_error = ObdError::NoResponse;

        for attempt in 1..=tries {
            match engine.run_exchange(request, expected).await {
                Ok(data) => return Ok(data),
                Err(e) => {
                    warn!(
                        "{} attempt {}/{} failed: {}",
                        request.command(),
                        attempt,
                        tries,
                        e
                    );
                    last_error = e;
                }
            }
            if attempt < tries {
                tokio::time::sleep(self.delay).await;
            }
        }

        Err(last_error)
    }
}

/// Accept replies containing `OK`
pub fn reply_ok(reply: &str) -> bool {
    reply.to_ascii_uppercase().contains("OK")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::transport::ScriptedTransport;

    fn engine(transport: ScriptedTransport) -> ExchangeEngine<ScriptedTransport> {
        ExchangeEngine::new(
            transport,
            EngineConfig {
                timeout: Duration::from_millis(200),
                ..Default::default()
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_within_budget() {
        let mut engine = engine(
            ScriptedTransport::new()
                .silence()
                .reply("?\r\r>")
                .reply("ATE0\rOK\r\r>"),
        );
        let reply = Retry::new(3, Duration::from_millis(50))
            .command(&mut engine, "ATE0", reply_ok)
            .await
            .unwrap();
        assert!(reply.contains("OK"));
        assert_eq!(engine.transport().written().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_returns_last_error() {
        let mut engine = engine(ScriptedTransport::new().reply("?\r>").reply("NO DATA\r>"));
        let err = Retry::new(2, Duration::from_millis(10))
            .command(&mut engine, "ATE0", reply_ok)
            .await
            .unwrap_err();
        assert_eq!(err, ObdError::NoData);
        assert_eq!(engine.transport().written().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_reply_counts_as_failure() {
        let mut engine = engine(ScriptedTransport::new().reply("ELM327 v1.5\r>"));
        let err = Retry::new(1, Duration::ZERO)
            .command(&mut engine, "ATE0", reply_ok)
            .await
            .unwrap_err();
        assert!(matches!(err, ObdError::Garbage(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exchange_retry() {
        let mut engine = engine(
            ScriptedTransport::new()
                .reply("41 0D\r>")
                .reply("41 0D 3C\r>"),
        );
        let data = Retry::new(2, Duration::from_millis(10))
            .exchange(&mut engine, &Request::new(0x01, 0x0D), 1)
            .await
            .unwrap();
        assert_eq!(data, vec![0x3C]);
    }

    #[test]
    fn test_zero_tries_means_one() {
        assert_eq!(Retry::new(0, Duration::ZERO).tries, 1);
    }
}
