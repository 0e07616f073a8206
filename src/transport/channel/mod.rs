//! In-memory channel-based transport.
//!
//! Uses tokio broadcast channels for pub/sub within a single process.
//! Every endpoint created from the same channel sees every publish whose
//! topic matches one of its filters, so a test can stand up the remote
//! side of an exchange without a broker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info};

use super::{Message, MessageHandler, Result, Transport, TransportError};
use crate::topics::topic_matches;

/// Channel capacity for broadcast.
const CHANNEL_CAPACITY: usize = 1024;

/// Configuration for a channel transport endpoint.
#[derive(Clone, Debug, Default)]
pub struct ChannelConfig {
    /// Topic filters this endpoint's handlers receive.
    /// An empty list means the endpoint only publishes.
    pub filters: Vec<String>,
}

impl ChannelConfig {
    /// Create config for publishing only.
    pub fn publisher() -> Self {
        Self { filters: vec![] }
    }

    /// Create config for receiving the given topic filters.
    pub fn subscriber<I, S>(filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            filters: filters.into_iter().map(Into::into).collect(),
        }
    }

    fn accepts(&self, topic: &str) -> bool {
        self.filters.iter().any(|f| topic_matches(topic, f))
    }
}

/// In-memory transport using tokio broadcast channels.
///
/// Messages are published to a broadcast channel and received by all endpoints.
/// Topic filtering is done on the receiving side.
pub struct ChannelTransport {
    /// Broadcast sender for publishing messages.
    sender: broadcast::Sender<Arc<Message>>,
    /// Configuration including topic filters.
    config: ChannelConfig,
    /// Registered message handlers.
    handlers: Arc<RwLock<Vec<Box<dyn MessageHandler>>>>,
    /// Flag indicating if consumer task is running.
    consuming: Arc<RwLock<bool>>,
    /// Reported by `is_usable`.
    usable: Arc<AtomicBool>,
}

impl ChannelTransport {
    /// Create a new channel transport endpoint.
    pub fn new(config: ChannelConfig) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);

        info!(filters = ?config.filters, "Channel transport initialized");

        Self::from_parts(sender, config)
    }

    /// Create a publisher-only endpoint.
    pub fn publisher() -> Self {
        Self::new(ChannelConfig::publisher())
    }

    /// Create an endpoint receiving the given topic filters.
    pub fn subscriber<I, S>(filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ChannelConfig::subscriber(filters))
    }

    fn from_parts(sender: broadcast::Sender<Arc<Message>>, config: ChannelConfig) -> Self {
        Self {
            sender,
            config,
            handlers: Arc::new(RwLock::new(Vec::new())),
            consuming: Arc::new(RwLock::new(false)),
            usable: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Create a new endpoint that shares the same channel but has different filters.
    pub fn with_config(&self, config: ChannelConfig) -> Self {
        Self::from_parts(self.sender.clone(), config)
    }

    /// Mark this endpoint usable or not. Publishing while unusable fails.
    pub fn set_usable(&self, usable: bool) {
        self.usable.store(usable, Ordering::SeqCst);
    }

    /// Start consuming messages once the first handler is registered.
    async fn start_consuming(&self) -> Result<()> {
        // Check if already consuming
        {
            let mut consuming = self.consuming.write().await;
            if *consuming {
                return Ok(());
            }
            *consuming = true;
        }

        // Subscribe before spawning so nothing published after `subscribe`
        // returns can be missed.
        let mut receiver = self.sender.subscribe();
        let handlers = self.handlers.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => {
                        if !config.accepts(&message.topic) {
                            continue;
                        }

                        debug!(topic = %message.topic, "Received message via channel");

                        super::dispatch_to_handlers(&handlers, &message).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        error!(skipped = n, "Channel consumer lagged, skipped messages");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Channel closed, stopping consumer");
                        break;
                    }
                }
            }
        });

        info!(filters = ?self.config.filters, "Channel consumer started");

        Ok(())
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    #[tracing::instrument(name = "transport.publish", skip_all, fields(topic = %topic))]
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        if !self.is_usable() {
            return Err(TransportError::Publish(
                "channel transport is not usable".to_string(),
            ));
        }

        let message = Arc::new(Message::new(topic, payload));

        // Send to channel (ignore error if no receivers)
        match self.sender.send(message) {
            Ok(receiver_count) => {
                debug!(receivers = receiver_count, "Published message to channel");
            }
            Err(_) => {
                debug!("Published message (no receivers)");
            }
        }

        Ok(())
    }

    async fn subscribe(&self, handler: Box<dyn MessageHandler>) -> Result<()> {
        if self.config.filters.is_empty() {
            return Err(TransportError::SubscribeNotSupported);
        }

        let count = {
            let mut handlers = self.handlers.write().await;
            handlers.push(handler);
            handlers.len()
        };

        info!(handler_count = count, "Handler subscribed to channel transport");

        self.start_consuming().await
    }

    fn is_usable(&self) -> bool {
        self.usable.load(Ordering::SeqCst)
    }
}
