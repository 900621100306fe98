//! Data models for Acervo

pub mod item;
pub mod loan;
pub mod reader;
pub mod stats;

// Re-export commonly used types
pub use item::{CreateItem, Item, ItemQuery, UpdateItem};
pub use loan::{CreateLoan, Loan, LoanDetails, LoanQuery, LoanReceipt, LoanStatus};
pub use reader::{CreateReader, Reader, ReaderQuery, UpdateReader};
pub use stats::LibrarySummary;

/// The librarian performing a mutating operation.
///
/// Passed explicitly into the ledger so every loan and deactivation records
/// who registered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i32,
}

impl Actor {
    pub fn new(id: i32) -> Self {
        Self { id }
    }
}

/// Resolved page window for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub per_page: i64,
}

impl Page {
    /// Clamp user-supplied paging to sane bounds
    pub fn new(page: Option<i64>, per_page: Option<i64>, default_size: i64, max_size: i64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(default_size).clamp(1, max_size.max(1)),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_and_bounds() {
        let page = Page::new(None, None, 20, 100);
        assert_eq!(page, Page { page: 1, per_page: 20 });
        assert_eq!(page.offset(), 0);

        let page = Page::new(Some(0), Some(500), 20, 100);
        assert_eq!(page, Page { page: 1, per_page: 100 });

        let page = Page::new(Some(3), Some(10), 20, 100);
        assert_eq!(page.offset(), 20);

        let page = Page::new(Some(i64::MAX), None, 20, 100);
        assert_eq!(page.offset(), i64::MAX);
    }
}
