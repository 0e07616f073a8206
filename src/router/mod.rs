//! Inbound dispatch.
//!
//! Every message the transport receives goes through [`InboundRouter::route`]:
//!
//! | Topic kind              | Routed to                                        |
//! |-------------------------|--------------------------------------------------|
//! | query response          | query table by `requestId`                       |
//! | error                   | query table by `requestId`, else command table   |
//! | domain event            | command table by `commandId`/`correlationId`,    |
//! |                         | else event subscribers                           |
//! | access protocol         | event subscribers                                |
//! | relay-board diagnostics | event subscribers                                |
//!
//! Unmatched identifiers are dropped at `debug`: late answers are expected
//! whenever a deadline wins the race. Malformed payloads are dropped at
//! `warn`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::command::CommandService;
use crate::envelope::{correlation_id_of, COMMAND_ID_KEYS, REQUEST_ID_KEY};
use crate::query::QueryService;
use crate::topics::{TopicKind, Topics};
use crate::transport::{self, Message, MessageHandler};

/// Capacity of the event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Category of an unsolicited inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Domain event not answering a pending command.
    Domain,
    AccessProtocol,
    RelayBoardDiagnostics,
}

/// Unsolicited inbound message handed to event subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerEvent {
    pub kind: EventKind,
    pub topic: String,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

/// Why a message was not delivered anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    UnknownTopic,
    Malformed,
    /// No pending exchange matched the identifier (late, duplicate or unsolicited).
    Unmatched,
}

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    Query,
    Command,
    Event(EventKind),
    Dropped(DropReason),
}

/// Routes inbound messages to the query and command correlators.
pub struct InboundRouter {
    queries: Arc<QueryService>,
    commands: Arc<CommandService>,
    topics: Topics,
    events: broadcast::Sender<BrokerEvent>,
}

impl InboundRouter {
    pub fn new(queries: Arc<QueryService>, commands: Arc<CommandService>, topics: Topics) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            queries,
            commands,
            topics,
            events,
        }
    }

    /// Subscribe to unsolicited inbound messages.
    pub fn subscribe_events(&self) -> broadcast::Receiver<BrokerEvent> {
        self.events.subscribe()
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Route one inbound message.
    pub fn route(&self, message: &Message) -> Routed {
        let Some(kind) = self.topics.classify(&message.topic) else {
            debug!(topic = %message.topic, "Ignoring message on unknown topic");
            return Routed::Dropped(DropReason::UnknownTopic);
        };

        let payload: Value = match serde_json::from_slice(&message.payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(topic = %message.topic, error = %e, payload = %message.payload_str(), "Dropping malformed message");
                return Routed::Dropped(DropReason::Malformed);
            }
        };

        let routed = match kind {
            TopicKind::QueryResponse => self.route_query_response(payload),
            TopicKind::Error => self.route_error(payload),
            TopicKind::DomainEvent => self.route_domain_event(&message.topic, payload),
            TopicKind::AccessProtocol => {
                self.emit(EventKind::AccessProtocol, &message.topic, payload)
            }
            TopicKind::RelayBoardDiagnostics => {
                self.emit(EventKind::RelayBoardDiagnostics, &message.topic, payload)
            }
        };

        if routed == Routed::Dropped(DropReason::Unmatched) {
            debug!(topic = %message.topic, "No pending exchange for message, dropping");
        }
        routed
    }

    fn route_query_response(&self, payload: Value) -> Routed {
        match correlation_id_of(&payload, &[REQUEST_ID_KEY]) {
            Some(id) if self.queries.handle_response(&id, payload) => Routed::Query,
            _ => Routed::Dropped(DropReason::Unmatched),
        }
    }

    fn route_error(&self, payload: Value) -> Routed {
        if let Some(id) = correlation_id_of(&payload, &[REQUEST_ID_KEY]) {
            return if self.queries.handle_error(&id, payload) {
                Routed::Query
            } else {
                Routed::Dropped(DropReason::Unmatched)
            };
        }
        match correlation_id_of(&payload, &COMMAND_ID_KEYS) {
            Some(id) if self.commands.handle_error(&id, payload) => Routed::Command,
            _ => Routed::Dropped(DropReason::Unmatched),
        }
    }

    fn route_domain_event(&self, topic: &str, payload: Value) -> Routed {
        if let Some(id) = correlation_id_of(&payload, &COMMAND_ID_KEYS) {
            if self.commands.is_pending(&id) && self.commands.handle_response(&id, payload.clone())
            {
                return Routed::Command;
            }
        }
        self.emit(EventKind::Domain, topic, payload)
    }

    fn emit(&self, kind: EventKind, topic: &str, payload: Value) -> Routed {
        let event = BrokerEvent {
            kind,
            topic: topic.to_string(),
            payload,
            received_at: Utc::now(),
        };
        if self.events.send(event).is_err() {
            debug!(%topic, ?kind, "No event subscribers");
        }
        Routed::Event(kind)
    }
}

/// Transport handler wrapping a shared router.
pub struct RouterHandle(pub Arc<InboundRouter>);

impl MessageHandler for RouterHandle {
    fn handle(&self, message: Arc<Message>) -> BoxFuture<'static, transport::Result<()>> {
        self.0.route(&message);
        Box::pin(async { Ok(()) })
    }
}
