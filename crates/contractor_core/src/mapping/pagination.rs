//! Page arithmetic against a partially consumed external total.

use serde::{Deserialize, Serialize};

/// Page size used when a request does not name one.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Page `page` (zero-based) of `size` rows, given that the first
/// `external_total` rows of the logical result set come from elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub size: i64,
    pub external_total: i64,
}

impl Pagination {
    pub fn new(page: i64, size: i64) -> Self {
        Self {
            page,
            size,
            external_total: 0,
        }
    }

    /// Covers the entire result set in one page.
    pub fn max() -> Self {
        Self::new(0, i64::MAX)
    }

    pub fn with_external_total(mut self, external_total: i64) -> Self {
        self.external_total = external_total;
        self
    }

    /// Rows still owed by the local source for this page, never negative.
    pub fn limit(&self) -> i64 {
        let diff = self.start_row();
        if diff < 0 {
            return self.size.saturating_add(diff).max(0);
        }
        self.size
    }

    /// Rows to skip in the local source, never negative.
    pub fn offset(&self) -> i64 {
        self.start_row().max(0)
    }

    fn start_row(&self) -> i64 {
        self.page
            .saturating_mul(self.size)
            .saturating_sub(self.external_total)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}
