//! Command correlator.
//!
//! Commands have their own correlation table, so command and query
//! identifiers never collide even though they share one inbound dispatch.
//! An error message for a pending command rejects it with the remote
//! payload instead of letting it time out.

mod catalogue;
mod relay;

pub use catalogue::{Command, CommandType};
pub use relay::{GpioInput, GpioOutput, OutputLevel, RelayBoardConfig};

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_TIMEOUT;
use crate::correlation::{new_correlation_id, CorrelationId, CorrelationTable, Delivery, Lifetime};
use crate::envelope::{CommandEnvelope, CommandResponse};
use crate::error::{BrokerError, Result};
use crate::outcome::Outcome;
use crate::topics::{command_topic, relay_board_topic};
use crate::transport::Transport;

/// Runs command exchanges over a transport.
pub struct CommandService {
    transport: Arc<dyn Transport>,
    table: CorrelationTable,
    token: String,
    default_timeout: Duration,
}

impl CommandService {
    pub fn new(transport: Arc<dyn Transport>, token: impl Into<String>) -> Self {
        Self {
            transport,
            table: CorrelationTable::new("command"),
            token: token.into(),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Deliver an inbound command result. Returns `false` if no command
    /// was waiting for it.
    pub fn handle_response(&self, command_id: &CorrelationId, payload: Value) -> bool {
        self.table.resolve(command_id, Delivery::Response(payload))
    }

    /// Deliver an inbound error message as a rejection.
    pub fn handle_error(&self, command_id: &CorrelationId, payload: Value) -> bool {
        self.table.resolve(command_id, Delivery::Rejected(payload))
    }

    pub fn is_pending(&self, command_id: &CorrelationId) -> bool {
        self.table.contains(command_id)
    }

    pub fn pending(&self) -> usize {
        self.table.len()
    }

    /// Send a command and wait for its result.
    #[tracing::instrument(name = "command.send", skip_all, fields(command_type = %command.command_type))]
    pub async fn send(
        &self,
        command: Command,
        timeout: Option<Duration>,
    ) -> Result<Outcome<CommandResponse>> {
        self.ensure_usable()?;

        let command_id = new_correlation_id();
        let deadline = Instant::now() + timeout.unwrap_or(self.default_timeout);
        let mut registration = self
            .table
            .register(command_id, deadline, Lifetime::SingleShot)?;

        let topic = command_topic(command.command_type);
        let envelope = CommandEnvelope {
            token: self.token.clone(),
            command_id,
            data: command.data,
        };
        let payload = Bytes::from(serde_json::to_vec(&envelope)?);
        match tokio::time::timeout_at(deadline, self.transport.publish(&topic, payload)).await {
            Ok(Ok(())) => debug!(%command_id, %topic, "Command published"),
            Ok(Err(e)) => {
                error!(%topic, error = %e, "Failed to publish command");
                return Err(e.into());
            }
            Err(_) => {
                info!(%command_id, %topic, "Command timed out while publishing");
                return Ok(Outcome::TimedOut);
            }
        }

        match registration.recv().await {
            Some(Delivery::Response(payload)) => {
                Ok(Outcome::Completed(CommandResponse { command_id, payload }))
            }
            Some(Delivery::Rejected(payload)) => {
                warn!(%command_id, error = %payload, "Command rejected");
                Err(BrokerError::Remote(payload))
            }
            None => {
                info!(%command_id, "Command timed out");
                Ok(Outcome::TimedOut)
            }
        }
    }

    /// Send a relay-board configuration. Completes once the publish succeeds.
    #[tracing::instrument(name = "command.relay_board", skip_all, fields(%board))]
    pub async fn relay_board(&self, board: &str, config: &RelayBoardConfig) -> Result<()> {
        self.ensure_usable()?;
        if board.is_empty() || board.contains(['/', '+', '#']) {
            return Err(BrokerError::InvalidArgument(format!(
                "invalid relay board name: {:?}",
                board
            )));
        }

        let topic = relay_board_topic(board);
        let payload = Bytes::from(serde_json::to_vec(config)?);
        if let Err(e) = self.transport.publish(&topic, payload).await {
            error!(%topic, error = %e, "Failed to publish relay-board command");
            return Err(e.into());
        }
        debug!(%topic, "Relay-board command published");
        Ok(())
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.transport.is_usable() {
            Ok(())
        } else {
            error!("Command failed: not connected to broker");
            Err(BrokerError::NotConnected)
        }
    }
}
