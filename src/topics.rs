//! Topic naming and matching.
//!
//! Topic layout on the broker:
//!
//! | Direction | Topic                              | Carries                    |
//! |-----------|------------------------------------|----------------------------|
//! | out       | `xs3/1/q`                          | single and paged queries   |
//! | in        | `xs3/1/{client_id}/q`              | query responses            |
//! | in        | `xs3/1/{client_id}/err`            | error responses            |
//! | out       | `xs3/1/cmd/{CommandType}`          | commands                   |
//! | in        | `xs3/1/ces/#`                      | command results and events |
//! | in        | `xs3/1/ase/#`                      | access-protocol events     |
//! | out       | `readers/addon/rb/1/{board}/do`    | relay-board configuration  |
//! | in        | `readers/addon/rb/1/diag`          | relay-board diagnostics    |

use crate::command::CommandType;

/// Root of the broker's topic tree.
pub const BASE: &str = "xs3/1";
/// Prefix for command topics.
pub const COMMAND_PREFIX: &str = "xs3/1/cmd";
/// Prefix for command results and domain events.
pub const DOMAIN_EVENTS_PREFIX: &str = "xs3/1/ces";
/// Prefix for access-protocol events.
pub const ACCESS_PROTOCOL_PREFIX: &str = "xs3/1/ase";
/// Prefix for relay-board topics.
pub const RELAY_BOARD_PREFIX: &str = "readers/addon/rb/1";
/// Outbound topic for all queries.
pub const QUERY_OUT: &str = "xs3/1/q";

const QUERY_IN_SUFFIX: &str = "q";
const ERROR_IN_SUFFIX: &str = "err";
const DIAGNOSTICS_SUFFIX: &str = "diag";

/// Kind of inbound topic, used for routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    QueryResponse,
    Error,
    DomainEvent,
    AccessProtocol,
    RelayBoardDiagnostics,
}

/// Topic names for one client session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    client_id: String,
}

impl Topics {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn query_out(&self) -> &'static str {
        QUERY_OUT
    }

    /// Topic where query responses for this client arrive.
    pub fn query_in(&self) -> String {
        format!("{}/{}/{}", BASE, self.client_id, QUERY_IN_SUFFIX)
    }

    /// Topic where error responses for this client arrive.
    pub fn error_in(&self) -> String {
        format!("{}/{}/{}", BASE, self.client_id, ERROR_IN_SUFFIX)
    }

    pub fn command(&self, command_type: CommandType) -> String {
        command_topic(command_type)
    }

    pub fn domain_events(&self) -> String {
        format!("{}/#", DOMAIN_EVENTS_PREFIX)
    }

    pub fn access_protocol(&self) -> String {
        format!("{}/#", ACCESS_PROTOCOL_PREFIX)
    }

    pub fn relay_board_command(&self, board: &str) -> String {
        relay_board_topic(board)
    }

    pub fn relay_board_diagnostics(&self) -> String {
        format!("{}/{}", RELAY_BOARD_PREFIX, DIAGNOSTICS_SUFFIX)
    }

    /// Every topic filter the transport must subscribe for this client.
    pub fn subscriptions(&self) -> Vec<String> {
        vec![
            self.query_in(),
            self.error_in(),
            self.domain_events(),
            self.access_protocol(),
            self.relay_board_diagnostics(),
        ]
    }

    /// Classify an inbound topic. Returns `None` for topics this client
    /// does not consume.
    pub fn classify(&self, topic: &str) -> Option<TopicKind> {
        if topic == self.query_in() {
            Some(TopicKind::QueryResponse)
        } else if topic == self.error_in() {
            Some(TopicKind::Error)
        } else if topic_matches(topic, &self.domain_events()) {
            Some(TopicKind::DomainEvent)
        } else if topic_matches(topic, &self.access_protocol()) {
            Some(TopicKind::AccessProtocol)
        } else if topic == self.relay_board_diagnostics() {
            Some(TopicKind::RelayBoardDiagnostics)
        } else {
            None
        }
    }
}

/// Outbound topic of a command type.
pub fn command_topic(command_type: CommandType) -> String {
    format!("{}/{}", COMMAND_PREFIX, command_type)
}

/// Outbound configuration topic of one relay board.
pub fn relay_board_topic(board: &str) -> String {
    format!("{}/{}/do", RELAY_BOARD_PREFIX, board)
}

/// Check if a topic matches an MQTT-style filter.
///
/// Matching rules:
/// - `#` matches the remaining levels, including none (`a/#` matches `a`)
/// - `+` matches exactly one level
/// - any other level must match exactly
pub fn topic_matches(topic: &str, filter: &str) -> bool {
    let mut topic_levels = topic.split('/');
    let mut filter_levels = filter.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
