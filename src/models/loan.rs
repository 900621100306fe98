//! Loan model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::item::Item;

/// Loan model from database. `return_date` is null while the loan is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub item_id: i32,
    pub reader_id: i32,
    /// Librarian who registered the loan
    pub librarian_id: i32,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub returned_by: Option<i32>,
    pub notes: Option<String>,
}

impl Loan {
    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        is_overdue(self.return_date, self.due_date, today)
    }

    pub fn status(&self, today: NaiveDate) -> LoanStatus {
        LoanStatus::derive(self.return_date, self.due_date, today)
    }
}

fn is_overdue(return_date: Option<NaiveDate>, due_date: NaiveDate, today: NaiveDate) -> bool {
    return_date.is_none() && today > due_date
}

/// Display status of a loan on a given day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Open,
    Overdue,
    Returned,
}

impl LoanStatus {
    fn derive(return_date: Option<NaiveDate>, due_date: NaiveDate, today: NaiveDate) -> Self {
        if return_date.is_some() {
            LoanStatus::Returned
        } else if is_overdue(return_date, due_date, today) {
            LoanStatus::Overdue
        } else {
            LoanStatus::Open
        }
    }
}

/// Row shape for loan listings joined with item and reader
#[derive(Debug, Clone, FromRow)]
pub struct LoanDetailsRow {
    pub id: i32,
    pub item_id: i32,
    pub reader_id: i32,
    pub librarian_id: i32,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub returned_by: Option<i32>,
    pub notes: Option<String>,
    pub item_title: String,
    pub item_author: String,
    pub reader_name: String,
    pub reader_identifier: String,
}

impl LoanDetailsRow {
    pub fn into_details(self, today: NaiveDate) -> LoanDetails {
        LoanDetails {
            status: LoanStatus::derive(self.return_date, self.due_date, today),
            is_overdue: is_overdue(self.return_date, self.due_date, today),
            id: self.id,
            item_id: self.item_id,
            item_title: self.item_title,
            item_author: self.item_author,
            reader_id: self.reader_id,
            reader_name: self.reader_name,
            reader_identifier: self.reader_identifier,
            librarian_id: self.librarian_id,
            loan_date: self.loan_date,
            due_date: self.due_date,
            return_date: self.return_date,
            returned_by: self.returned_by,
            notes: self.notes,
        }
    }
}

/// Loan with item and reader names for display
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    pub item_id: i32,
    pub item_title: String,
    pub item_author: String,
    pub reader_id: i32,
    pub reader_name: String,
    pub reader_identifier: String,
    pub librarian_id: i32,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub returned_by: Option<i32>,
    pub notes: Option<String>,
    pub status: LoanStatus,
    pub is_overdue: bool,
}

/// Create loan request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateLoan {
    pub item_id: i32,
    pub reader_id: i32,
    /// Defaults to today plus the configured loan length
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Loan row to insert, fully resolved by the ledger
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub item_id: i32,
    pub reader_id: i32,
    pub librarian_id: i32,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
}

/// Outcome of a ledger mutation: the loan and the item counters after it
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanReceipt {
    pub loan: Loan,
    pub item: Item,
}

/// Loan query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct LoanQuery {
    pub reader_id: Option<i32>,
    pub item_id: Option<i32>,
    /// `open` (includes overdue), `overdue` or `returned`
    pub status: Option<LoanStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
