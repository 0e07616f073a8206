//! Command envelopes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Outbound command. Command-specific fields sit next to the token and
/// the command identifier at the top level.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    pub token: String,
    pub command_id: Uuid,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

/// Inbound command result, kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponse {
    pub command_id: Uuid,
    pub payload: Value,
}

impl CommandResponse {
    /// Decode the payload into a typed result.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.payload)
    }
}
