//! Typed query parameters shared by the listing operations.

use sea_orm::{
    ColumnTrait,
    sea_query::{Expr, LikeExpr, SimpleExpr},
};
use serde::{Deserialize, Serialize};

/// Largest page a caller may request
pub const MAX_PAGE_SIZE: u64 = 200;

/// Default page size when the caller does not specify one
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// One-based page selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Page number, starting at 1
    pub page: u64,
    /// Rows per page
    pub page_size: u64,
}

impl Pagination {
    /// Builds a pagination, clamping `page` to at least 1 and `page_size` to `1..=MAX_PAGE_SIZE`
    #[must_use]
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Rows to skip
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page.saturating_sub(1)).saturating_mul(self.page_size)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// Filter for recharge/consume record listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    /// Only records of this member
    pub member_id: Option<String>,
    /// Substring of member name or phone
    pub search: Option<String>,
    /// Page selection
    pub pagination: Pagination,
}

/// Filter for member listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberQuery {
    /// Substring of member id, name or phone
    pub search: Option<String>,
    /// Page selection
    pub pagination: Pagination,
}

/// One page of results plus totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Rows on this page
    pub records: Vec<T>,
    /// Rows matching the filter across all pages
    pub total: u64,
    /// Page number, starting at 1
    pub page: u64,
    /// Rows per page
    pub page_size: u64,
    /// Number of pages for `total`
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Wraps fetched rows with the totals for `pagination`
    #[must_use]
    pub fn new(records: Vec<T>, total: u64, pagination: Pagination) -> Self {
        Self {
            records,
            total,
            page: pagination.page,
            page_size: pagination.page_size,
            total_pages: total.div_ceil(pagination.page_size),
        }
    }
}

/// Trims a search term, treating blank input as no filter
pub(crate) fn search_term(search: Option<&String>) -> Option<&str> {
    search.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Escape character for LIKE patterns built by [`contains_literal`]
const LIKE_ESCAPE: char = '\\';

/// Escapes `%`, `_` and the escape character so they match literally
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Substring match on `column` where wildcards in `term` are plain text
pub(crate) fn contains_literal<C>(column: C, term: &str) -> SimpleExpr
where
    C: ColumnTrait,
{
    Expr::col(column).like(LikeExpr::new(format!("%{}%", escape_like(term))).escape(LIKE_ESCAPE))
}
