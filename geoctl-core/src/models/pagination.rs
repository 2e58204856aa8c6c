//! Pagination types

use serde::{Deserialize, Serialize};

/// Maximum items per page
const MAX_PAGE_SIZE: u32 = 100;

/// Default items per page
const DEFAULT_PAGE_SIZE: u32 = 20;

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Page number (1-indexed)
    pub page: u32,
    /// Items per page (max 100)
    pub page_size: u32,
}

impl Pagination {
    /// Create pagination with validation.
    ///
    /// - Page is clamped to minimum of 1
    /// - Page size is clamped to 1..=100
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Number of documents to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    /// Maximum number of documents to return.
    pub fn limit(&self) -> u32 {
        self.page_size
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    /// Items for current page
    pub items: Vec<T>,
    /// Total count across all pages
    pub total: u64,
    /// Current page number
    pub page: u32,
    /// Items per page
    pub page_size: u32,
    /// Number of pages; at least 1 even when empty
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Paginated<T> {
    /// Wrap one page of `total` matching items.
    pub fn new(items: Vec<T>, total: u64, page: Pagination) -> Self {
        let page_size = page.page_size.max(1);
        let total_pages = total.div_ceil(u64::from(page_size)).max(1);
        Self {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
            total_pages,
            has_next: u64::from(page.page) < total_pages,
            has_prev: page.page > 1,
        }
    }
}

/// Query parameters for pagination
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl From<PaginationParams> for Pagination {
    fn from(params: PaginationParams) -> Self {
        Self::new(
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
    }
}
