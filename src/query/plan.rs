//! Page plan: the follow-up windows of a paged exchange.

/// One (offset, limit) page of a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u64,
    pub limit: u64,
}

impl PageWindow {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }
}

/// Remaining windows after the first page, lowest offset first.
///
/// Windows are produced on demand from the reported total, so a huge
/// total costs nothing until its windows are actually requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagePlan {
    next_offset: u64,
    total: u64,
    page_size: u64,
}

impl PagePlan {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Plan the follow-up windows for a reported `total`.
    ///
    /// The first page `(0, page_size)` is already in hand. Every further
    /// full page gets one window; a nonzero remainder gets one shorter
    /// final window.
    pub fn for_total(total: u64, page_size: u64) -> Self {
        if page_size == 0 || total <= page_size {
            return Self::empty();
        }
        Self {
            next_offset: page_size,
            total,
            page_size,
        }
    }

    /// Number of windows not yet taken.
    pub fn remaining(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total
            .saturating_sub(self.next_offset)
            .div_ceil(self.page_size)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

impl Iterator for PagePlan {
    type Item = PageWindow;

    fn next(&mut self) -> Option<PageWindow> {
        if self.page_size == 0 || self.next_offset >= self.total {
            return None;
        }
        let limit = self.page_size.min(self.total - self.next_offset);
        let window = PageWindow::new(self.next_offset, limit);
        self.next_offset += limit;
        Some(window)
    }
}
