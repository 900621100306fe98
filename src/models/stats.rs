//! Library-wide counters

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LibrarySummary {
    pub items: i64,
    pub total_copies: i64,
    pub available_copies: i64,
    pub readers: i64,
    pub active_readers: i64,
    pub open_loans: i64,
    pub overdue_loans: i64,
    pub returned_loans: i64,
}
