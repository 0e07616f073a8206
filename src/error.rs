//! Error types for broker exchanges.
//!
//! A timed-out exchange is not an error: it is reported as
//! [`Outcome::TimedOut`](crate::outcome::Outcome::TimedOut).

use uuid::Uuid;

use crate::transport::TransportError;

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Errors that can occur while running an exchange.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The transport reported itself unusable when the exchange started.
    #[error("not connected to broker")]
    NotConnected,

    /// A correlation identifier was registered twice.
    #[error("duplicate correlation id: {0}")]
    DuplicateCorrelation(Uuid),

    /// The remote side answered with an explicit error message.
    #[error("remote error: {0}")]
    Remote(serde_json::Value),

    /// Publishing or subscribing through the transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An envelope could not be encoded or a response could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Invalid argument provided by caller.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl BrokerError {
    /// Returns true if the exchange was refused because the transport was down.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, BrokerError::NotConnected)
    }

    /// Returns true if the remote side rejected the request.
    pub fn is_remote(&self) -> bool {
        matches!(self, BrokerError::Remote(_))
    }

    /// Returns the remote error payload, verbatim.
    pub fn remote_payload(&self) -> Option<&serde_json::Value> {
        match self {
            BrokerError::Remote(payload) => Some(payload),
            _ => None,
        }
    }

    /// Returns true if this is a transport-level failure.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, BrokerError::NotConnected | BrokerError::Transport(_))
    }
}
