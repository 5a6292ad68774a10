//! Connection Bootstrap
//!
//! Lifecycle of the link to the adapter. Bootstrap optionally brings up the
//! Bluetooth link, then sends the setup script one command at a time, each
//! with its own retry budget. The first command that exhausts its budget
//! fails the whole bootstrap and nothing after it is sent.

use crate::bluetooth::{self, LinkError};
use crate::config::{BluetoothConfig, ObdConfig};
use crate::engine::ExchangeEngine;
use crate::error::ObdError;
use crate::retry::{reply_ok, Retry};
use crate::transport::Transport;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

/// Lifecycle of the adapter link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Handshaking,
    Ready,
    Failed,
}

/// Bootstrap failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("Setup command {command} failed: {source}")]
    Setup {
        command: String,
        #[source]
        source: ObdError,
    },
}

/// Ordered setup script and retry policy
#[derive(Debug, Clone)]
pub struct Bootstrap {
    script: Vec<String>,
    retry: Retry,
    bluetooth: Option<BluetoothConfig>,
}

impl Bootstrap {
    pub fn new(script: Vec<String>, retry: Retry) -> Self {
        Self {
            script,
            retry,
            bluetooth: None,
        }
    }

    pub fn from_config(config: &ObdConfig) -> Self {
        Self {
            script: config.setup_script(),
            retry: config.setup_retry(),
            bluetooth: config.bluetooth.clone(),
        }
    }

    /// Bring up a Bluetooth link before the setup script
    pub fn with_bluetooth(mut self, bluetooth: BluetoothConfig) -> Self {
        self.bluetooth = Some(bluetooth);
        self
    }

    pub fn script(&self) -> &[String] {
        &self.script
    }

    /// Drive `state` from `Disconnected` to `Ready` or `Failed`
    pub async fn run<T: Transport>(
        &self,
        engine: &mut ExchangeEngine<T>,
        state: &mut ConnectionState,
    ) -> Result<(), BootstrapError> {
        *state = ConnectionState::Handshaking;
        info!("Bootstrapping adapter ({} setup commands)", self.script.len());

        match self.handshake(engine).await {
            Ok(()) => {
                *state = ConnectionState::Ready;
                info!("Adapter ready");
                Ok(())
            }
            Err(e) => {
                *state = ConnectionState::Failed;
                error!("Adapter bootstrap failed: {}", e);
                Err(e)
            }
        }
    }

    async fn handshake<T: Transport>(
        &self,
        engine: &mut ExchangeEngine<T>,
    ) -> Result<(), BootstrapError> {
        if let Some(bluetooth) = &self.bluetooth {
            bluetooth::connect(engine, bluetooth, self.retry.delay).await?;
        }

        for command in &self.script {
            self.retry
                .command(engine, command, reply_ok)
                .await
                .map_err(|source| BootstrapError::Setup {
                    command: command.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}
