//! Item (catalog entry) model and copy accounting.
//!
//! An item owns two counters: `total_copies` (what the library holds) and
//! `available_copies` (what is on the shelf). Every mutation of those
//! counters goes through the methods below so that
//! `0 <= available_copies <= total_copies` holds after each of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::LedgerError;

/// Catalog item from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Item {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    pub isbn: String,
    pub genre: Option<String>,
    pub total_copies: i32,
    pub available_copies: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }

    /// Copies currently lent out, as far as the counters can tell
    pub fn copies_on_loan(&self) -> i32 {
        self.total_copies - self.available_copies
    }

    /// Take one copy off the shelf for a new loan.
    pub fn take_copy(&mut self) -> Result<(), LedgerError> {
        if self.available_copies <= 0 {
            return Err(LedgerError::NoCopiesAvailable {
                item_id: self.id,
                title: self.title.clone(),
            });
        }
        self.available_copies -= 1;
        Ok(())
    }

    /// Put a returned copy back, never above the total.
    pub fn return_copy(&mut self) {
        self.available_copies = (self.available_copies + 1).min(self.total_copies);
    }

    /// Change the number of copies held and shift availability by the delta.
    ///
    /// Availability is floored at zero: shrinking below the number of copies
    /// on loan under-counts rather than rejecting the edit.
    pub fn set_total_copies(&mut self, new_total: i32) -> Result<(), LedgerError> {
        if new_total < 0 {
            return Err(LedgerError::NegativeCopyCount {
                item_id: self.id,
                requested: new_total,
            });
        }
        self.available_copies = adjusted_available(self.total_copies, self.available_copies, new_total);
        self.total_copies = new_total;
        Ok(())
    }
}

/// `available + (new_total - old_total)`, kept within `0..=new_total`
pub fn adjusted_available(old_total: i32, available: i32, new_total: i32) -> i32 {
    let shifted = available as i64 + (new_total as i64 - old_total as i64);
    shifted.clamp(0, new_total.max(0) as i64) as i32
}

fn default_copies() -> i32 {
    1
}

/// Create item request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateItem {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 200, message = "Author must be 1-200 characters"))]
    pub author: String,
    #[validate(length(max = 100, message = "Publisher must be at most 100 characters"))]
    pub publisher: Option<String>,
    #[validate(range(min = 0, message = "Publication year cannot be negative"))]
    pub publication_year: Option<i32>,
    /// ISBN-10 or ISBN-13, digits only
    #[validate(length(min = 10, max = 13, message = "ISBN must be 10 to 13 characters"))]
    pub isbn: String,
    #[validate(length(max = 100, message = "Genre must be at most 100 characters"))]
    pub genre: Option<String>,
    /// Copies held; all of them start on the shelf
    #[serde(default = "default_copies")]
    #[validate(range(min = 0, message = "Copy count cannot be negative"))]
    pub total_copies: i32,
}

/// Update item request. A `total_copies` change is applied through the ledger.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateItem {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Author must be 1-200 characters"))]
    pub author: Option<String>,
    #[validate(length(max = 100, message = "Publisher must be at most 100 characters"))]
    pub publisher: Option<String>,
    #[validate(range(min = 0, message = "Publication year cannot be negative"))]
    pub publication_year: Option<i32>,
    #[validate(length(min = 10, max = 13, message = "ISBN must be 10 to 13 characters"))]
    pub isbn: Option<String>,
    #[validate(length(max = 100, message = "Genre must be at most 100 characters"))]
    pub genre: Option<String>,
    pub total_copies: Option<i32>,
}

impl UpdateItem {
    pub fn has_details(&self) -> bool {
        self.title.is_some()
            || self.author.is_some()
            || self.publisher.is_some()
            || self.publication_year.is_some()
            || self.isbn.is_some()
            || self.genre.is_some()
    }
}

/// New copy count for an item
#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjustCopies {
    pub total_copies: i32,
}

/// Item query parameters (API)
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ItemQuery {
    /// Matches title, author or ISBN, case-insensitive
    pub search: Option<String>,
    /// Only items with at least one copy on the shelf
    pub available_only: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(total: i32, available: i32) -> Item {
        let now = Utc::now();
        Item {
            id: 1,
            title: "Vidas Secas".to_string(),
            author: "Graciliano Ramos".to_string(),
            publisher: None,
            publication_year: Some(1938),
            isbn: "9788501067".to_string(),
            genre: None,
            total_copies: total,
            available_copies: available,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_take_copy_until_empty() {
        let mut item = item(2, 2);
        item.take_copy().unwrap();
        item.take_copy().unwrap();
        assert_eq!(item.available_copies, 0);

        let err = item.take_copy().unwrap_err();
        assert!(matches!(err, LedgerError::NoCopiesAvailable { item_id: 1, .. }));
        assert_eq!(item.available_copies, 0);
    }

    #[test]
    fn test_return_copy_is_capped_at_total() {
        let mut item = item(2, 1);
        item.return_copy();
        assert_eq!(item.available_copies, 2);
        item.return_copy();
        assert_eq!(item.available_copies, 2);
    }

    #[test]
    fn test_growing_total_adds_shelf_copies() {
        let mut item = item(2, 2);
        item.set_total_copies(5).unwrap();
        assert_eq!((item.total_copies, item.available_copies), (5, 5));
    }

    #[test]
    fn test_shrinking_total_floors_at_zero() {
        let mut item = item(5, 1);
        item.set_total_copies(2).unwrap();
        assert_eq!((item.total_copies, item.available_copies), (2, 0));
    }

    #[test]
    fn test_negative_total_is_rejected_without_change() {
        let mut item = item(3, 2);
        let err = item.set_total_copies(-1).unwrap_err();
        assert_eq!(err, LedgerError::NegativeCopyCount { item_id: 1, requested: -1 });
        assert_eq!((item.total_copies, item.available_copies), (3, 2));
    }

    #[test]
    fn test_adjusted_available_stays_in_bounds() {
        for old_total in 0..6 {
            for available in 0..=old_total {
                for new_total in 0..8 {
                    let got = adjusted_available(old_total, available, new_total);
                    assert!(got >= 0 && got <= new_total, "{old_total}/{available} -> {new_total} gave {got}");
                }
            }
        }
    }

    #[test]
    fn test_create_item_validation() {
        let request = CreateItem {
            title: String::new(),
            author: "Clarice Lispector".to_string(),
            publisher: None,
            publication_year: None,
            isbn: "123".to_string(),
            genre: None,
            total_copies: 1,
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("isbn"));
        assert!(!fields.contains_key("genre"));

        let request = CreateItem {
            title: "Perto do Coração Selvagem".to_string(),
            isbn: "9788532508126".to_string(),
            genre: Some("r".repeat(101)),
            ..request
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("genre"));

        let update = UpdateItem {
            genre: Some("g".repeat(101)),
            ..UpdateItem::default()
        };
        assert!(update.validate().unwrap_err().field_errors().contains_key("genre"));
        let update = UpdateItem {
            genre: Some("Romance".to_string()),
            ..UpdateItem::default()
        };
        assert!(update.validate().is_ok());
    }
}
