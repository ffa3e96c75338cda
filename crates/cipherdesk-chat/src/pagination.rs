//! Page cursor over a result set.

/// Default number of rows per page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Navigation request against a table's page cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAction {
    First,
    Prev,
    Next,
    Last,
    Goto(usize),
}

/// Page cursor. `current_page` is 1-based and always within
/// `1..=max(total_pages, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    current_page: usize,
    page_size: usize,
    total_items: usize,
}

impl Pagination {
    /// A cursor on page 1. A zero page size falls back to the default.
    pub fn new(total_items: usize, page_size: usize) -> Self {
        let page_size = if page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };
        Self {
            current_page: 1,
            page_size,
            total_items,
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    pub fn total_pages(&self) -> usize {
        self.total_items.div_ceil(self.page_size)
    }

    fn max_page(&self) -> usize {
        self.total_pages().max(1)
    }

    /// Apply a navigation action. Returns whether the page changed.
    pub fn apply(&mut self, action: PageAction) -> bool {
        match action {
            PageAction::First => self.first(),
            PageAction::Prev => self.prev(),
            PageAction::Next => self.next(),
            PageAction::Last => self.last(),
            PageAction::Goto(page) => self.goto(page),
        }
    }

    pub fn first(&mut self) -> bool {
        self.goto(1)
    }

    pub fn prev(&mut self) -> bool {
        if !self.can_prev() {
            return false;
        }
        self.goto(self.current_page - 1)
    }

    pub fn next(&mut self) -> bool {
        if !self.can_next() {
            return false;
        }
        self.goto(self.current_page + 1)
    }

    pub fn last(&mut self) -> bool {
        self.goto(self.max_page())
    }

    /// Jump to `page`, clamped to the valid range.
    pub fn goto(&mut self, page: usize) -> bool {
        let target = page.clamp(1, self.max_page());
        let changed = target != self.current_page;
        self.current_page = target;
        changed
    }

    pub fn can_first(&self) -> bool {
        self.current_page > 1
    }

    pub fn can_prev(&self) -> bool {
        self.current_page > 1
    }

    pub fn can_next(&self) -> bool {
        self.current_page < self.max_page()
    }

    pub fn can_last(&self) -> bool {
        self.current_page < self.max_page()
    }

    /// Controls are shown only when the rows do not fit on one page.
    pub fn shows_controls(&self) -> bool {
        self.total_items > self.page_size
    }

    /// Half-open row range of the active page.
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = (self.current_page - 1) * self.page_size;
        let end = (self.current_page * self.page_size).min(self.total_items);
        start.min(end)..end
    }

    /// "Showing {start}-{end} of {total} records", or "No records".
    pub fn caption(&self) -> String {
        if self.total_items == 0 {
            return "No records".to_string();
        }
        let range = self.range();
        format!(
            "Showing {}-{} of {} records",
            range.start + 1,
            range.end,
            self.total_items
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_is_ceiling() {
        assert_eq!(Pagination::new(0, 10).total_pages(), 0);
        assert_eq!(Pagination::new(1, 10).total_pages(), 1);
        assert_eq!(Pagination::new(10, 10).total_pages(), 1);
        assert_eq!(Pagination::new(11, 10).total_pages(), 2);
        assert_eq!(Pagination::new(95, 10).total_pages(), 10);
    }

    #[test]
    fn test_first_and_last_page_ranges() {
        let mut p = Pagination::new(23, 10);
        assert_eq!(p.range(), 0..10);
        assert!(p.last());
        assert_eq!(p.current_page(), 3);
        assert_eq!(p.range(), 20..23);
    }

    #[test]
    fn test_disabled_controls_at_edges() {
        let mut p = Pagination::new(25, 10);
        assert!(!p.can_first());
        assert!(!p.can_prev());
        assert!(p.can_next());
        assert!(!p.prev());
        assert!(!p.first());
        assert_eq!(p.current_page(), 1);

        p.last();
        assert!(!p.can_next());
        assert!(!p.can_last());
        assert!(!p.next());
        assert!(!p.last());
        assert_eq!(p.current_page(), 3);
    }

    #[test]
    fn test_goto_clamps() {
        let mut p = Pagination::new(25, 10);
        assert!(p.goto(99));
        assert_eq!(p.current_page(), 3);
        assert!(p.goto(0));
        assert_eq!(p.current_page(), 1);
        assert!(!p.goto(1));
    }

    #[test]
    fn test_empty_set_stays_on_page_one() {
        let mut p = Pagination::new(0, 10);
        assert_eq!(p.current_page(), 1);
        assert!(!p.next());
        assert!(!p.last());
        assert_eq!(p.range(), 0..0);
        assert_eq!(p.caption(), "No records");
    }

    #[test]
    fn test_controls_hidden_when_single_page() {
        assert!(!Pagination::new(10, 10).shows_controls());
        assert!(Pagination::new(11, 10).shows_controls());
    }

    #[test]
    fn test_caption_follows_page() {
        let mut p = Pagination::new(23, 10);
        assert_eq!(p.caption(), "Showing 1-10 of 23 records");
        p.next();
        assert_eq!(p.caption(), "Showing 11-20 of 23 records");
        p.apply(PageAction::Last);
        assert_eq!(p.caption(), "Showing 21-23 of 23 records");
    }

    #[test]
    fn test_zero_page_size_uses_default() {
        assert_eq!(Pagination::new(5, 0).page_size(), DEFAULT_PAGE_SIZE);
    }
}
