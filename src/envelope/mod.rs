//! Wire envelopes exchanged with the broker.
//!
//! All payloads are JSON. Outbound envelopes carry the session token and
//! the correlation identifier; inbound messages echo the identifier under
//! `requestId` (queries) or `commandId`/`correlationId` (commands).

mod command;
mod query;

pub use command::{CommandEnvelope, CommandResponse};
pub use query::{
    PageBody, PageParams, PagedQueryRequest, PagedQueryResponse, QueryFilter, QueryRequest,
    QueryResponse, Resource,
};

use serde_json::Value;
use uuid::Uuid;

use crate::correlation::CorrelationId;

/// Key echoing the correlation identifier of a query.
pub const REQUEST_ID_KEY: &str = "requestId";

/// Keys echoing the correlation identifier of a command, in lookup order.
pub const COMMAND_ID_KEYS: [&str; 2] = ["commandId", "correlationId"];

/// Extract a correlation identifier from the first present key.
///
/// Values that are not UUID strings are treated as absent: nothing this
/// client issued can match them.
pub fn correlation_id_of(payload: &Value, keys: &[&str]) -> Option<CorrelationId> {
    keys.iter()
        .filter_map(|key| payload.get(*key))
        .filter_map(Value::as_str)
        .find_map(|raw| Uuid::parse_str(raw).ok())
}

/// Query responses that report `totalCount` belong to a paged exchange.
pub fn is_paged_response(payload: &Value) -> bool {
    payload
        .get("response")
        .and_then(Value::as_object)
        .is_some_and(|response| response.contains_key("totalCount"))
}
