//! Query correlator and paginator.
//!
//! `query` runs a single request/response exchange. `query_paged` runs a
//! multi-round exchange under one correlation identifier: the first page
//! reports the total, the remaining windows are requested one at a time,
//! and the caller gets every page once the set is complete. Both share a
//! single deadline per exchange.

mod paged;
mod plan;

pub use paged::{PagedResult, PagingState, QueryPaged};
pub use plan::{PagePlan, PageWindow};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT};
use crate::correlation::{new_correlation_id, CorrelationId, CorrelationTable, Delivery, Lifetime};
use crate::envelope::{
    PageParams, PagedQueryRequest, PagedQueryResponse, QueryRequest, QueryResponse, Resource,
};
use crate::error::{BrokerError, Result};
use crate::outcome::Outcome;
use crate::topics::QUERY_OUT;
use crate::transport::Transport;
use paged::PageSession;

/// A single-resource query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub resource: Resource,
    pub id: Option<String>,
}

impl Query {
    pub fn new(resource: Resource) -> Self {
        Self { resource, id: None }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Runs query exchanges over a transport.
pub struct QueryService {
    transport: Arc<dyn Transport>,
    table: CorrelationTable,
    token: String,
    page_size: AtomicU64,
    default_timeout: Duration,
}

impl QueryService {
    pub fn new(transport: Arc<dyn Transport>, token: impl Into<String>) -> Self {
        Self {
            transport,
            table: CorrelationTable::new("query"),
            token: token.into(),
            page_size: AtomicU64::new(DEFAULT_PAGE_SIZE),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Timeout applied when a call passes `None`.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn page_size(&self) -> u64 {
        self.page_size.load(Ordering::SeqCst)
    }

    /// Change the page size of later paged exchanges. Values ≤ 0 are ignored.
    pub fn set_page_size(&self, page_size: i64) {
        match u64::try_from(page_size) {
            Ok(size) if size > 0 => {
                self.page_size.store(size, Ordering::SeqCst);
                debug!(page_size = size, "Page size updated");
            }
            _ => warn!(page_size, "Ignoring non-positive page size"),
        }
    }

    /// Deliver an inbound query response. Returns `false` if no exchange
    /// was waiting for it.
    pub fn handle_response(&self, request_id: &CorrelationId, payload: serde_json::Value) -> bool {
        self.table.resolve(request_id, Delivery::Response(payload))
    }

    /// Deliver an inbound error message as a rejection.
    pub fn handle_error(&self, request_id: &CorrelationId, payload: serde_json::Value) -> bool {
        self.table.resolve(request_id, Delivery::Rejected(payload))
    }

    pub fn pending(&self) -> usize {
        self.table.len()
    }

    /// Query a single resource.
    ///
    /// Resolves with the response, `Outcome::TimedOut` when nothing
    /// arrives before the deadline, or `Err(Remote)` when the remote side
    /// answers with an error message.
    #[tracing::instrument(name = "query.single", skip_all, fields(resource = %query.resource))]
    pub async fn query(
        &self,
        query: Query,
        timeout: Option<Duration>,
    ) -> Result<Outcome<QueryResponse>> {
        self.ensure_usable()?;

        let request_id = new_correlation_id();
        let deadline = Instant::now() + timeout.unwrap_or(self.default_timeout);
        let mut registration = self
            .table
            .register(request_id, deadline, Lifetime::SingleShot)?;

        let envelope = QueryRequest {
            token: self.token.clone(),
            request_id,
            resource: query.resource,
            id: query.id,
        };
        match tokio::time::timeout_at(deadline, self.publish(&envelope)).await {
            Ok(published) => published?,
            Err(_) => {
                info!(%request_id, "Query timed out while publishing");
                return Ok(Outcome::TimedOut);
            }
        }

        match registration.recv().await {
            Some(Delivery::Response(payload)) => Ok(Outcome::Completed(
                serde_json::from_value::<QueryResponse>(payload)?,
            )),
            Some(Delivery::Rejected(payload)) => {
                warn!(%request_id, error = %payload, "Query rejected");
                Err(BrokerError::Remote(payload))
            }
            None => {
                info!(%request_id, "Query timed out");
                Ok(Outcome::TimedOut)
            }
        }
    }

    /// Query a paged resource and collect every page.
    ///
    /// Pages are requested sequentially; the next window is only published
    /// after the previous one was answered. The timeout covers the whole
    /// exchange, publishes included.
    ///
    /// Page responses carry no offset, so a response is taken as the page
    /// of the currently armed window. Over MQTT the response topic is
    /// subscribed at QoS 0 so the broker never redelivers an earlier page
    /// into a later round.
    #[tracing::instrument(name = "query.paged", skip_all, fields(resource = %query.resource))]
    pub async fn query_paged(
        &self,
        query: QueryPaged,
        timeout: Option<Duration>,
    ) -> Result<Outcome<PagedResult>> {
        self.ensure_usable()?;

        let page_size = match query.limit {
            Some(0) => {
                return Err(BrokerError::InvalidArgument(
                    "page limit must be positive".to_string(),
                ))
            }
            Some(limit) => limit,
            None => self.page_size(),
        };

        let request_id = new_correlation_id();
        let deadline = Instant::now() + timeout.unwrap_or(self.default_timeout);
        let registration = self
            .table
            .register(request_id, deadline, Lifetime::MultiRound)?;
        let mut session = PageSession::new(registration, &query, page_size);
        let mut window = session.first_window(&query);

        loop {
            debug!(%request_id, offset = window.offset, limit = window.limit, state = ?session.state(), "Requesting page");
            let publish = self.publish_page(&query, request_id, window);
            match tokio::time::timeout_at(deadline, publish).await {
                Ok(published) => published?,
                Err(_) => {
                    session.time_out();
                    info!(%request_id, offset = window.offset, "Paged query timed out while publishing");
                    return Ok(Outcome::TimedOut);
                }
            }

            let payload = match session.registration.recv().await {
                Some(Delivery::Response(payload)) => payload,
                Some(Delivery::Rejected(payload)) => {
                    warn!(%request_id, error = %payload, "Paged query rejected");
                    return Err(BrokerError::Remote(payload));
                }
                None => {
                    session.time_out();
                    info!(%request_id, offset = window.offset, "Paged query timed out");
                    return Ok(Outcome::TimedOut);
                }
            };

            let page: PagedQueryResponse = serde_json::from_value(payload)?;
            match session.accept(page) {
                Some(next) => {
                    if !session.registration.rearm() {
                        session.time_out();
                        return Ok(Outcome::TimedOut);
                    }
                    window = next;
                }
                None => {
                    let result = session.into_result();
                    debug!(%request_id, pages = result.page_count(), "Paged query complete");
                    return Ok(Outcome::Completed(result));
                }
            }
        }
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.transport.is_usable() {
            Ok(())
        } else {
            error!("Query failed: not connected to broker");
            Err(BrokerError::NotConnected)
        }
    }

    async fn publish_page(
        &self,
        query: &QueryPaged,
        request_id: CorrelationId,
        window: PageWindow,
    ) -> Result<()> {
        let envelope = PagedQueryRequest {
            token: self.token.clone(),
            request_id,
            resource: query.resource.clone(),
            params: PageParams {
                page_offset: window.offset,
                page_limit: window.limit,
                filters: query.filters.clone(),
            },
        };
        self.publish(&envelope).await
    }

    async fn publish<T: Serialize>(&self, envelope: &T) -> Result<()> {
        let payload = Bytes::from(serde_json::to_vec(envelope)?);
        if let Err(e) = self.transport.publish(QUERY_OUT, payload).await {
            error!(topic = QUERY_OUT, error = %e, "Failed to publish query");
            return Err(e.into());
        }
        Ok(())
    }
}
