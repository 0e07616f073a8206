//! Client facade.
//!
//! Wires one transport to the query and command correlators and registers
//! the inbound router as the transport's message handler.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::info;

use crate::command::{Command, CommandService, RelayBoardConfig};
use crate::config::{Config, DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT};
use crate::envelope::{CommandResponse, QueryResponse};
use crate::error::Result;
use crate::outcome::Outcome;
use crate::query::{PagedResult, Query, QueryPaged, QueryService};
use crate::router::{BrokerEvent, InboundRouter, RouterHandle};
use crate::topics::Topics;
use crate::transport::Transport;

/// Session settings of a client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub client_id: String,
    pub token: String,
    pub page_size: i64,
    pub query_timeout: Duration,
    pub command_timeout: Duration,
}

impl ClientOptions {
    pub fn new(client_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            token: token.into(),
            page_size: DEFAULT_PAGE_SIZE as i64,
            query_timeout: DEFAULT_TIMEOUT,
            command_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            client_id: config.broker.client_id.clone(),
            token: config.broker.token.clone(),
            page_size: config.query.page_size,
            query_timeout: config.query.timeout(),
            command_timeout: config.command.timeout(),
        }
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// Request/response client over a publish/subscribe transport.
pub struct BrokerClient {
    transport: Arc<dyn Transport>,
    topics: Topics,
    queries: Arc<QueryService>,
    commands: Arc<CommandService>,
    router: Arc<InboundRouter>,
}

impl BrokerClient {
    /// Create a client and register its inbound router on `transport`.
    pub async fn new(transport: Arc<dyn Transport>, options: ClientOptions) -> Result<Self> {
        let topics = Topics::new(options.client_id.clone());
        let queries = Arc::new(
            QueryService::new(transport.clone(), options.token.clone())
                .with_default_timeout(options.query_timeout),
        );
        queries.set_page_size(options.page_size);
        let commands = Arc::new(
            CommandService::new(transport.clone(), options.token)
                .with_default_timeout(options.command_timeout),
        );
        let router = Arc::new(InboundRouter::new(
            queries.clone(),
            commands.clone(),
            topics.clone(),
        ));

        transport
            .subscribe(Box::new(RouterHandle(router.clone())))
            .await?;
        info!(client_id = %options.client_id, "Broker client ready");

        Ok(Self {
            transport,
            topics,
            queries,
            commands,
            router,
        })
    }

    /// Connect over MQTT with `config` and build a client.
    ///
    /// Waits up to `within` for the broker to acknowledge the connection.
    #[cfg(feature = "mqtt")]
    pub async fn connect_mqtt(config: &Config, within: Duration) -> Result<Self> {
        use crate::transport::mqtt::client_subscriptions;
        use crate::transport::{MqttTransport, MqttTransportConfig};

        let topics = Topics::new(config.broker.client_id.clone());
        let mqtt_config = MqttTransportConfig::from_broker_config(
            &config.broker,
            client_subscriptions(&topics),
        )?;
        let transport = MqttTransport::connect(mqtt_config);
        transport.wait_connected(within).await?;
        Self::new(Arc::new(transport), ClientOptions::from_config(config)).await
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Whether the transport can carry a new exchange.
    pub fn is_connected(&self) -> bool {
        self.transport.is_usable()
    }

    pub async fn query(
        &self,
        query: Query,
        timeout: Option<Duration>,
    ) -> Result<Outcome<QueryResponse>> {
        self.queries.query(query, timeout).await
    }

    pub async fn query_paged(
        &self,
        query: QueryPaged,
        timeout: Option<Duration>,
    ) -> Result<Outcome<PagedResult>> {
        self.queries.query_paged(query, timeout).await
    }

    pub fn page_size(&self) -> u64 {
        self.queries.page_size()
    }

    /// Values ≤ 0 are logged and ignored.
    pub fn set_page_size(&self, page_size: i64) {
        self.queries.set_page_size(page_size);
    }

    pub async fn send_command(
        &self,
        command: Command,
        timeout: Option<Duration>,
    ) -> Result<Outcome<CommandResponse>> {
        self.commands.send(command, timeout).await
    }

    pub async fn remote_disengage(
        &self,
        installation_point_id: &str,
        extended: bool,
    ) -> Result<Outcome<CommandResponse>> {
        self.send_command(
            Command::remote_disengage(installation_point_id, extended),
            None,
        )
        .await
    }

    pub async fn remote_disengage_permanent(
        &self,
        installation_point_id: &str,
        enable: bool,
    ) -> Result<Outcome<CommandResponse>> {
        self.send_command(
            Command::remote_disengage_permanent(installation_point_id, enable),
            None,
        )
        .await
    }

    pub async fn assign_authorization_profile_to_medium(
        &self,
        profile_id: &str,
        medium_id: &str,
    ) -> Result<Outcome<CommandResponse>> {
        self.send_command(
            Command::assign_authorization_profile_to_medium(profile_id, medium_id),
            None,
        )
        .await
    }

    pub async fn assign_person_to_medium(
        &self,
        person_id: &str,
        medium_id: &str,
    ) -> Result<Outcome<CommandResponse>> {
        self.send_command(Command::assign_person_to_medium(person_id, medium_id), None)
            .await
    }

    /// Configure a relay board. Completes once the publish succeeded.
    pub async fn relay_board(&self, board: &str, config: &RelayBoardConfig) -> Result<()> {
        self.commands.relay_board(board, config).await
    }

    /// Receive unsolicited inbound messages (domain events, access
    /// protocol, relay-board diagnostics).
    pub fn events(&self) -> broadcast::Receiver<BrokerEvent> {
        self.router.subscribe_events()
    }
}
