//! Paged query inputs, per-exchange session state and aggregated result.

use serde_json::Value;
use tracing::debug;

use super::plan::{PagePlan, PageWindow};
use crate::correlation::Registration;
use crate::envelope::{PagedQueryResponse, QueryFilter, Resource};

/// A paged query request.
///
/// With both `offset` and `limit` set the exchange fetches exactly that
/// window. A lone `limit` is the page size of this exchange; a lone
/// `offset` is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPaged {
    pub resource: Resource,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    /// `None` means no filters. `Some(vec![])` still counts as filtered.
    pub filters: Option<Vec<QueryFilter>>,
}

impl QueryPaged {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            offset: None,
            limit: None,
            filters: None,
        }
    }

    /// Fetch exactly one window.
    pub fn with_window(mut self, offset: u64, limit: u64) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_filters(mut self, filters: Vec<QueryFilter>) -> Self {
        self.filters = Some(filters);
        self
    }

    pub(crate) fn is_pinned(&self) -> bool {
        self.offset.is_some() && self.limit.is_some()
    }

    pub(crate) fn is_filtered(&self) -> bool {
        self.filters.is_some()
    }
}

/// State of one paged exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingState {
    AwaitingFirstPage,
    AwaitingFollowupPage,
    Complete,
    TimedOut,
}

/// All pages of a paged exchange, in ascending offset order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PagedResult {
    pub pages: Vec<PagedQueryResponse>,
}

impl PagedResult {
    /// Every row of every page, in order.
    pub fn rows(&self) -> impl Iterator<Item = &Value> {
        self.pages.iter().flat_map(|page| page.response.data.iter())
    }

    pub fn into_rows(self) -> Vec<Value> {
        self.pages
            .into_iter()
            .flat_map(|page| page.response.data)
            .collect()
    }

    /// Total reported by the first page.
    pub fn reported_total(&self, filtered: bool) -> u64 {
        self.pages
            .first()
            .map(|page| page.response.reported_total(filtered))
            .unwrap_or(0)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// State record of one paged exchange, owned by the calling task.
pub(crate) struct PageSession<'a> {
    pub(crate) registration: Registration<'a>,
    state: PagingState,
    plan: PagePlan,
    pages: Vec<PagedQueryResponse>,
    page_size: u64,
    pinned: bool,
    filtered: bool,
}

impl<'a> PageSession<'a> {
    pub(crate) fn new(registration: Registration<'a>, query: &QueryPaged, page_size: u64) -> Self {
        Self {
            registration,
            state: PagingState::AwaitingFirstPage,
            plan: PagePlan::empty(),
            pages: Vec::new(),
            page_size,
            pinned: query.is_pinned(),
            filtered: query.is_filtered(),
        }
    }

    pub(crate) fn state(&self) -> PagingState {
        self.state
    }

    /// Window of the first request.
    pub(crate) fn first_window(&self, query: &QueryPaged) -> PageWindow {
        match (self.pinned, query.offset) {
            (true, Some(offset)) => PageWindow::new(offset, self.page_size),
            _ => PageWindow::new(0, self.page_size),
        }
    }

    /// Record a page. Returns the next window to request, or `None` once
    /// the exchange is complete.
    pub(crate) fn accept(&mut self, page: PagedQueryResponse) -> Option<PageWindow> {
        match self.state {
            PagingState::AwaitingFirstPage => {
                if !self.pinned {
                    let total = page.response.reported_total(self.filtered);
                    self.plan = PagePlan::for_total(total, self.page_size);
                    debug!(
                        request_id = %self.registration.id(),
                        total,
                        page_size = self.page_size,
                        followups = self.plan.remaining(),
                        "Page plan computed"
                    );
                }
                self.pages.push(page);
            }
            PagingState::AwaitingFollowupPage => self.pages.push(page),
            PagingState::Complete | PagingState::TimedOut => return None,
        }

        match self.plan.next() {
            Some(window) => {
                self.state = PagingState::AwaitingFollowupPage;
                Some(window)
            }
            None => {
                self.state = PagingState::Complete;
                None
            }
        }
    }

    pub(crate) fn time_out(&mut self) {
        self.state = PagingState::TimedOut;
    }

    pub(crate) fn into_result(self) -> PagedResult {
        PagedResult { pages: self.pages }
    }
}
