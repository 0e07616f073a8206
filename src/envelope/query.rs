//! Query envelopes.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Name of a queryable resource on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(Cow<'static, str>);

impl Resource {
    pub const IDENTIFICATION_MEDIA: Resource = Resource(Cow::Borrowed("identification-media"));
    pub const AUTHORIZATION_PROFILES: Resource =
        Resource(Cow::Borrowed("authorization-profiles"));
    pub const ACCESS_PROTOCOL: Resource = Resource(Cow::Borrowed("access-protocol"));
    pub const PERSONS: Resource = Resource(Cow::Borrowed("persons"));
    pub const INSTALLATION_POINTS: Resource = Resource(Cow::Borrowed("installation-points"));
    pub const COMPONENTS: Resource = Resource(Cow::Borrowed("evva-components"));
    pub const OFFICE_MODES: Resource = Resource(Cow::Borrowed("office-modes"));
    pub const TIME_PROFILES: Resource = Resource(Cow::Borrowed("time-profiles"));
    pub const ZONES: Resource = Resource(Cow::Borrowed("zones"));

    /// A resource not in the predefined list.
    pub fn new(name: impl Into<String>) -> Self {
        Resource(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Resource {
    fn from(name: &str) -> Self {
        Resource::new(name)
    }
}

/// One filter clause of a paged query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    #[serde(rename = "type")]
    pub filter_type: String,
    pub field: String,
    pub value: Value,
}

impl QueryFilter {
    pub fn new(filter_type: impl Into<String>, field: impl Into<String>, value: Value) -> Self {
        Self {
            filter_type: filter_type.into(),
            field: field.into(),
            value,
        }
    }
}

/// Outbound single-resource query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub token: String,
    pub request_id: Uuid,
    pub resource: Resource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Page window parameters of a paged query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    pub page_offset: u64,
    pub page_limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<QueryFilter>>,
}

/// Outbound paged query for one page window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedQueryRequest {
    pub token: String,
    pub request_id: Uuid,
    pub resource: Resource,
    pub params: PageParams,
}

/// Inbound response to a single-resource query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub request_id: Uuid,
    #[serde(default)]
    pub response: Value,
}

/// Body of one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageBody {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_count: Option<i64>,
}

impl PageBody {
    /// Total the remote side reports for the result set.
    ///
    /// `filterCount` applies when the query carried filters, `totalCount`
    /// otherwise. Missing or negative counts read as zero.
    pub fn reported_total(&self, filtered: bool) -> u64 {
        let count = if filtered {
            self.filter_count
        } else {
            self.total_count
        };
        count.and_then(|c| u64::try_from(c).ok()).unwrap_or(0)
    }
}

/// Inbound response carrying one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedQueryResponse {
    pub request_id: Uuid,
    #[serde(default)]
    pub response: PageBody,
}
