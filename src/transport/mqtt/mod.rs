//! MQTT transport implementation.
//!
//! Wraps a rumqttc client and its event loop. The event loop runs in a
//! background task that:
//! - re-subscribes the client's inbound topics on every ConnAck
//! - tracks connection state for `is_usable()`
//! - forwards every incoming publish to the registered handlers
//! - backs off between reconnect attempts
//!
//! Publishes use QoS 1. Query responses are subscribed at QoS 0: page
//! responses carry no offset, so a broker redelivery of an earlier page
//! must never reach a later round. A lost response times the exchange
//! out instead.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS, TlsConfiguration,
};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{dispatch_to_handlers, Message, MessageHandler, Result, Transport, TransportError};
use crate::config::BrokerConfig;
use crate::topics::Topics;
use crate::utils::retry::ReconnectDelays;

/// Capacity of the rumqttc request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Topic filter and the QoS it is subscribed with.
pub type Subscription = (String, QoS);

/// Inbound subscriptions of one client.
pub fn client_subscriptions(topics: &Topics) -> Vec<Subscription> {
    let query_in = topics.query_in();
    topics
        .subscriptions()
        .into_iter()
        .map(|topic| {
            let qos = if topic == query_in {
                QoS::AtMostOnce
            } else {
                QoS::AtLeastOnce
            };
            (topic, qos)
        })
        .collect()
}

/// TLS material, already read from disk.
#[derive(Clone)]
pub struct MqttTls {
    pub ca: Vec<u8>,
    pub client_auth: Option<(Vec<u8>, Vec<u8>)>,
}

impl std::fmt::Debug for MqttTls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTls")
            .field("ca_bytes", &self.ca.len())
            .field("client_auth", &self.client_auth.is_some())
            .finish()
    }
}

/// Configuration for the MQTT transport.
#[derive(Debug, Clone)]
pub struct MqttTransportConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    pub tls: Option<MqttTls>,
    /// Topic filters subscribed on every (re)connect.
    pub subscriptions: Vec<Subscription>,
}

impl MqttTransportConfig {
    /// Build from broker settings, reading TLS files if configured.
    pub fn from_broker_config(
        config: &BrokerConfig,
        subscriptions: Vec<Subscription>,
    ) -> Result<Self> {
        let tls = match &config.tls.ca_path {
            Some(ca_path) => {
                let ca = read_pem(ca_path)?;
                let client_auth = match config.tls.client_auth() {
                    Some((cert, key)) => Some((read_pem(cert)?, read_pem(key)?)),
                    None => None,
                };
                Some(MqttTls { ca, client_auth })
            }
            None => None,
        };

        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            client_id: config.client_id.clone(),
            keep_alive: config.keep_alive(),
            tls,
            subscriptions,
        })
    }

    fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        if let Some(tls) = &self.tls {
            options.set_transport(rumqttc::Transport::Tls(TlsConfiguration::Simple {
                ca: tls.ca.clone(),
                alpn: None,
                client_auth: tls.client_auth.clone(),
            }));
        }
        options
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        TransportError::Connection(format!("failed to read {}: {}", path.display(), e))
    })
}

/// MQTT transport.
pub struct MqttTransport {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    connected_rx: watch::Receiver<bool>,
    handlers: Arc<RwLock<Vec<Box<dyn MessageHandler>>>>,
    event_loop: JoinHandle<()>,
}

impl MqttTransport {
    /// Create the client and start its event loop.
    ///
    /// Returns immediately; use [`MqttTransport::wait_connected`] to wait
    /// for the first ConnAck.
    pub fn connect(config: MqttTransportConfig) -> Self {
        info!(
            host = %config.host,
            port = config.port,
            client_id = %config.client_id,
            tls = config.tls.is_some(),
            "Connecting to MQTT broker"
        );

        let (client, event_loop) = AsyncClient::new(config.mqtt_options(), REQUEST_CHANNEL_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        let (connected_tx, connected_rx) = watch::channel(false);
        let handlers: Arc<RwLock<Vec<Box<dyn MessageHandler>>>> = Arc::new(RwLock::new(Vec::new()));

        let task = EventLoopTask {
            client: client.clone(),
            subscriptions: config.subscriptions,
            connected: connected.clone(),
            connected_tx,
            handlers: handlers.clone(),
        };
        let event_loop = tokio::spawn(task.run(event_loop));

        Self {
            client,
            connected,
            connected_rx,
            handlers,
            event_loop,
        }
    }

    /// Wait until the broker acknowledged the connection.
    pub async fn wait_connected(&self, within: Duration) -> Result<()> {
        let mut rx = self.connected_rx.clone();
        let result = match tokio::time::timeout(within, rx.wait_for(|connected| *connected)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(TransportError::Connection("event loop stopped".to_string())),
            Err(_) => Err(TransportError::Connection(format!(
                "not connected within {:?}",
                within
            ))),
        };
        result
    }

    /// Disconnect cleanly and stop the event loop.
    pub async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        let result = self
            .client
            .disconnect()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()));
        self.event_loop.abort();
        result
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload.to_vec())
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))?;
        debug!(%topic, bytes = payload.len(), "Message published");
        Ok(())
    }

    async fn subscribe(&self, handler: Box<dyn MessageHandler>) -> Result<()> {
        self.handlers.write().await.push(handler);
        Ok(())
    }

    fn is_usable(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

struct EventLoopTask {
    client: AsyncClient,
    subscriptions: Vec<Subscription>,
    connected: Arc<AtomicBool>,
    connected_tx: watch::Sender<bool>,
    handlers: Arc<RwLock<Vec<Box<dyn MessageHandler>>>>,
}

impl EventLoopTask {
    async fn run(self, mut event_loop: EventLoop) {
        let mut delays = ReconnectDelays::new();
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        error!(code = ?ack.code, "MQTT broker refused connection");
                        continue;
                    }
                    delays.reset();
                    self.resubscribe();
                    self.set_connected(true);
                    info!("Connected to MQTT broker");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = Arc::new(Message::new(publish.topic, publish.payload));
                    debug!(topic = %message.topic, "Message received");
                    dispatch_to_handlers(&self.handlers, &message).await;
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    self.set_connected(false);
                    warn!("MQTT broker sent disconnect");
                }
                Ok(_) => {}
                Err(e) => {
                    self.set_connected(false);
                    let delay = delays.next_delay();
                    warn!(error = %e, retry_in = ?delay, "MQTT connection error");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn resubscribe(&self) {
        for (topic, qos) in &self.subscriptions {
            match self.client.try_subscribe(topic, *qos) {
                Ok(()) => debug!(%topic, ?qos, "Subscribed"),
                Err(e) => error!(%topic, error = %e, "Failed to subscribe"),
            }
        }
    }

    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        self.connected_tx.send_replace(connected);
    }
}
