//! Publish/subscribe transport seam.
//!
//! This module contains:
//! - `Transport` trait: outbound publishes, inbound handler registration, usability signal
//! - `MessageHandler` trait: receives every inbound `(topic, payload)` message
//! - Implementations: in-process channel, mock, MQTT (feature `mqtt`)
//!
//! Connection lifecycle (connect, reconnect, TLS) belongs to the transport.
//! The correlators above it only publish, receive and ask `is_usable()`.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;

pub mod channel;
pub mod dispatch;
pub mod mock;
#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use channel::ChannelTransport;
pub use dispatch::dispatch_to_handlers;
pub use mock::MockTransport;
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttTransport, MqttTransportConfig};

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Handler failed: {0}")]
    Handler(String),

    #[error("Subscribe not supported for this transport")]
    SubscribeNotSupported,
}

/// A single message as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: Bytes,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload as text, lossy on invalid UTF-8. Used for logging.
    pub fn payload_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Handler for messages delivered by the transport.
pub trait MessageHandler: Send + Sync {
    /// Process one inbound message.
    fn handle(&self, message: Arc<Message>) -> BoxFuture<'static, Result<()>>;
}

/// Interface to the publish/subscribe client.
///
/// Implementations:
/// - `ChannelTransport`: in-process broadcast loopback
/// - `MockTransport`: records publishes, scripted replies for tests
/// - `MqttTransport`: MQTT broker via rumqttc
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish a payload to a topic.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()>;

    /// Register a handler for inbound messages.
    ///
    /// Registration is explicit and done once at startup; the handler
    /// receives every message on the transport's subscribed topics.
    async fn subscribe(&self, handler: Box<dyn MessageHandler>) -> Result<()>;

    /// Whether the channel can currently carry a new exchange.
    fn is_usable(&self) -> bool;
}
