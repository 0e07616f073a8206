//! Shared utilities for integration tests.
//!
//! Stands up a client and a simulated remote side on one in-process
//! channel. The remote answers queries from an in-memory dataset, answers
//! commands on the domain-event topic and records everything it sees.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use brokerlink::topics::Topics;
use brokerlink::transport::channel::ChannelConfig;
use brokerlink::transport::{ChannelTransport, Message, MessageHandler, Transport};
use brokerlink::utils::bootstrap::try_init_tracing;
use brokerlink::{BrokerClient, ClientOptions};
use bytes::Bytes;
use futures::future::BoxFuture;
use serde_json::{json, Value};

/// Client id used by every harness.
pub const CLIENT_ID: &str = "it-client";

/// Token the simulated remote accepts.
pub const TOKEN: &str = "it-token";

/// What the remote side knows and what it has seen.
#[derive(Debug, Default)]
pub struct RemoteState {
    /// Rows per resource.
    pub resources: HashMap<String, Vec<Value>>,
    /// Resources the remote never answers.
    pub silent: HashSet<String>,
    /// Page windows requested, in arrival order: (resource, offset, limit).
    pub windows: Vec<(String, u64, u64)>,
    /// Command bodies received, by command type.
    pub commands: Vec<(String, Value)>,
    /// Relay-board messages received: (topic, body).
    pub relay: Vec<(String, Value)>,
}

/// Remote side of every exchange.
pub struct SimulatedRemote {
    state: Mutex<RemoteState>,
    outbound: ChannelTransport,
    topics: Topics,
}

impl SimulatedRemote {
    fn state(&self) -> std::sync::MutexGuard<'_, RemoteState> {
        self.state.lock().expect("remote state poisoned")
    }

    /// Install `count` rows for `resource`, each `{"id": "<resource>-<i>", "n": i}`.
    pub fn seed(&self, resource: &str, count: u64) {
        let rows = (0..count)
            .map(|i| json!({"id": format!("{}-{}", resource, i), "n": i}))
            .collect();
        self.state().resources.insert(resource.to_string(), rows);
    }

    pub fn seed_rows(&self, resource: &str, rows: Vec<Value>) {
        self.state().resources.insert(resource.to_string(), rows);
    }

    pub fn go_silent(&self, resource: &str) {
        self.state().silent.insert(resource.to_string());
    }

    pub fn windows(&self) -> Vec<(String, u64, u64)> {
        self.state().windows.clone()
    }

    pub fn windows_for(&self, resource: &str) -> Vec<(u64, u64)> {
        self.state()
            .windows
            .iter()
            .filter(|(r, _, _)| r == resource)
            .map(|(_, offset, limit)| (*offset, *limit))
            .collect()
    }

    pub fn commands(&self) -> Vec<(String, Value)> {
        self.state().commands.clone()
    }

    pub fn relay_messages(&self) -> Vec<(String, Value)> {
        self.state().relay.clone()
    }

    /// Publish an unsolicited message from the remote side.
    pub async fn emit(&self, topic: &str, payload: Value) {
        self.outbound
            .publish(topic, Bytes::from(payload.to_string()))
            .await
            .expect("remote publish failed");
    }

    fn answer(&self, message: &Message) -> Vec<(String, Value)> {
        let Ok(body) = serde_json::from_slice::<Value>(&message.payload) else {
            return Vec::new();
        };

        if message.topic == "xs3/1/q" {
            self.answer_query(body)
        } else if let Some(command_type) = message.topic.strip_prefix("xs3/1/cmd/") {
            self.answer_command(command_type, body)
        } else {
            self.state().relay.push((message.topic.clone(), body));
            Vec::new()
        }
    }

    fn answer_query(&self, body: Value) -> Vec<(String, Value)> {
        let request_id = body["requestId"].clone();
        let resource = body["resource"].as_str().unwrap_or_default().to_string();
        let mut state = self.state();

        if state.silent.contains(&resource) {
            if let Some(params) = body.get("params") {
                let window = window_of(params);
                state.windows.push((resource, window.0, window.1));
            }
            return Vec::new();
        }
        if body["token"] != TOKEN {
            return vec![(
                self.topics.error_in(),
                json!({"requestId": request_id, "error": "invalid token"}),
            )];
        }
        let Some(rows) = state.resources.get(&resource).cloned() else {
            return vec![(
                self.topics.error_in(),
                json!({"requestId": request_id, "error": format!("unknown resource {}", resource)}),
            )];
        };

        let response = match body.get("params") {
            Some(params) => {
                let (offset, limit) = window_of(params);
                state.windows.push((resource, offset, limit));
                let filters = params.get("filters").and_then(Value::as_array);
                let matching: Vec<Value> = rows
                    .iter()
                    .filter(|row| filters.map_or(true, |f| f.iter().all(|c| matches(row, c))))
                    .cloned()
                    .collect();
                let data: Vec<Value> = matching
                    .iter()
                    .skip(offset as usize)
                    .take(limit as usize)
                    .cloned()
                    .collect();
                let mut page = json!({"data": data, "totalCount": rows.len()});
                if filters.is_some() {
                    page["filterCount"] = json!(matching.len());
                }
                page
            }
            None => rows
                .iter()
                .find(|row| row["id"] == body["id"])
                .cloned()
                .unwrap_or_else(|| json!({})),
        };

        vec![(
            self.topics.query_in(),
            json!({"requestId": request_id, "response": response}),
        )]
    }

    fn answer_command(&self, command_type: &str, body: Value) -> Vec<(String, Value)> {
        let command_id = body["commandId"].clone();
        self.state()
            .commands
            .push((command_type.to_string(), body.clone()));

        if command_type == "Logout" {
            return vec![(
                self.topics.error_in(),
                json!({"commandId": command_id, "error": "not logged in"}),
            )];
        }
        let mut result = body;
        if let Some(fields) = result.as_object_mut() {
            fields.remove("token");
            fields.remove("commandId");
            fields.insert("correlationId".to_string(), command_id);
        }
        vec![(format!("xs3/1/ces/{}Executed", command_type), result)]
    }
}

fn window_of(params: &Value) -> (u64, u64) {
    (
        params["pageOffset"].as_u64().unwrap_or(0),
        params["pageLimit"].as_u64().unwrap_or(0),
    )
}

/// Only `eq` filters are understood.
fn matches(row: &Value, filter: &Value) -> bool {
    let field = filter["field"].as_str().unwrap_or_default();
    filter["type"] == "eq" && row[field] == filter["value"]
}

struct RemoteHandle(Arc<SimulatedRemote>);

impl MessageHandler for RemoteHandle {
    fn handle(
        &self,
        message: Arc<Message>,
    ) -> BoxFuture<'static, brokerlink::transport::Result<()>> {
        let remote = self.0.clone();
        Box::pin(async move {
            for (topic, payload) in remote.answer(&message) {
                remote
                    .outbound
                    .publish(&topic, Bytes::from(payload.to_string()))
                    .await?;
            }
            Ok(())
        })
    }
}

/// A client wired to a simulated remote.
pub struct Harness {
    pub client: BrokerClient,
    pub remote: Arc<SimulatedRemote>,
    pub client_transport: Arc<ChannelTransport>,
    _remote_inbox: ChannelTransport,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_options(default_options()).await
    }

    pub async fn with_options(options: ClientOptions) -> Self {
        try_init_tracing();
        let topics = Topics::new(options.client_id.clone());
        let bus = ChannelTransport::publisher();

        let client_transport = Arc::new(
            bus.with_config(ChannelConfig::subscriber(topics.subscriptions())),
        );
        let remote_inbox = bus.with_config(ChannelConfig::subscriber([
            "xs3/1/q",
            "xs3/1/cmd/#",
            "readers/addon/rb/1/+/do",
        ]));
        let remote = Arc::new(SimulatedRemote {
            state: Mutex::new(RemoteState::default()),
            outbound: bus.with_config(ChannelConfig::publisher()),
            topics,
        });
        remote_inbox
            .subscribe(Box::new(RemoteHandle(remote.clone())))
            .await
            .expect("remote subscribe failed");

        let client = BrokerClient::new(client_transport.clone(), options)
            .await
            .expect("client setup failed");

        Self {
            client,
            remote,
            client_transport,
            _remote_inbox: remote_inbox,
        }
    }
}

pub fn default_options() -> ClientOptions {
    ClientOptions::new(CLIENT_ID, TOKEN)
        .with_query_timeout(Duration::from_secs(2))
        .with_command_timeout(Duration::from_secs(2))
}

/// Row numbers (`n`) of a list of rows.
pub fn row_numbers(rows: &[Value]) -> Vec<u64> {
    rows.iter().filter_map(|row| row["n"].as_u64()).collect()
}
