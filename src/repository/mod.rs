//! Repository layer for database operations.
//!
//! Services talk to a [`LibraryStore`]. Reads and simple inserts go straight
//! through the store; every copy-count or loan mutation runs inside a
//! [`StoreTx`], which holds the row locks needed to make the ledger's
//! read-check-write sequences serializable. Dropping a transaction without
//! calling [`StoreTx::commit`] discards its writes.

pub mod items;
pub mod loans;
pub mod memory;
pub mod readers;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{
        item::{CreateItem, Item, ItemQuery, UpdateItem},
        loan::{Loan, LoanDetailsRow, LoanQuery, NewLoan},
        reader::{CreateReader, Reader, ReaderQuery, UpdateReader},
        LibrarySummary, Page,
    },
};

pub use memory::MemoryStore;

/// Read side and non-ledger writes
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Open a transaction for a ledger operation
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>>;

    /// Check the backing store is reachable
    async fn ping(&self) -> AppResult<()>;

    async fn items_get(&self, id: i32) -> AppResult<Item>;
    async fn items_list(&self, query: &ItemQuery, page: Page) -> AppResult<(Vec<Item>, i64)>;
    /// Items with copies on the shelf matching `term`, ordered by title
    async fn items_search_available(&self, term: &str, limit: i64) -> AppResult<Vec<Item>>;
    async fn items_create(&self, item: &CreateItem) -> AppResult<Item>;

    async fn readers_get(&self, id: i32) -> AppResult<Reader>;
    async fn readers_list(&self, query: &ReaderQuery, page: Page) -> AppResult<(Vec<Reader>, i64)>;
    /// Active readers matching `term`, ordered by name
    async fn readers_search_active(&self, term: &str, limit: i64) -> AppResult<Vec<Reader>>;
    async fn readers_create(&self, reader: &CreateReader) -> AppResult<Reader>;
    async fn readers_update(&self, id: i32, data: &UpdateReader) -> AppResult<Reader>;

    async fn loans_get(&self, id: i32) -> AppResult<LoanDetailsRow>;
    /// Loans newest first; `today` resolves the overdue filter
    async fn loans_list(
        &self,
        query: &LoanQuery,
        today: NaiveDate,
        page: Page,
    ) -> AppResult<(Vec<LoanDetailsRow>, i64)>;
    /// Open loans past due, oldest due date first
    async fn loans_overdue(&self, today: NaiveDate) -> AppResult<Vec<LoanDetailsRow>>;

    async fn stats_summary(&self, today: NaiveDate) -> AppResult<LibrarySummary>;
}

/// Unit of work for ledger mutations.
///
/// The `*_for_update` reads lock the returned row until commit or drop.
#[async_trait]
pub trait StoreTx: Send {
    async fn item_for_update(&mut self, id: i32) -> AppResult<Item>;
    /// Persist `total_copies` and `available_copies` of a locked item
    async fn item_save_copies(&mut self, item: &Item) -> AppResult<Item>;
    /// Apply descriptive field changes; copy counts are ignored
    async fn item_update_details(&mut self, id: i32, data: &UpdateItem) -> AppResult<Item>;
    /// Number of loans ever recorded against the item
    async fn item_loan_count(&mut self, id: i32) -> AppResult<i64>;
    async fn item_delete(&mut self, id: i32) -> AppResult<()>;

    /// Shared lock: blocks deactivation, not other loans
    async fn reader_for_share(&mut self, id: i32) -> AppResult<Reader>;
    async fn reader_for_update(&mut self, id: i32) -> AppResult<Reader>;
    async fn reader_open_loans(&mut self, id: i32) -> AppResult<i64>;
    /// Flip the active flag; `actor` is recorded on deactivation
    async fn reader_set_active(&mut self, id: i32, active: bool, actor: Option<i32>) -> AppResult<Reader>;

    async fn loan_for_update(&mut self, id: i32) -> AppResult<Loan>;
    async fn loan_insert(&mut self, loan: &NewLoan) -> AppResult<Loan>;
    async fn loan_close(&mut self, id: i32, returned_on: NaiveDate, actor: i32) -> AppResult<Loan>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// PostgreSQL-backed store holding the connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Open PostgreSQL transaction; rolled back on drop unless committed
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

/// `%term%` pattern for case-insensitive LIKE matching.
///
/// Wildcards typed by the user match literally; queries pair this with
/// `ESCAPE '\'`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.trim().to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Map a unique-constraint violation to a conflict carrying `message`
pub(crate) fn conflict_on_duplicate(message: String) -> impl FnOnce(sqlx::Error) -> AppError {
    move |err| {
        if let sqlx::Error::Database(ref db) = err {
            if db.is_unique_violation() {
                return AppError::Conflict(message);
            }
        }
        AppError::Database(err)
    }
}

#[async_trait]
impl LibraryStore for Repository {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn items_get(&self, id: i32) -> AppResult<Item> {
        self.items_get_by_id(id).await
    }

    async fn items_list(&self, query: &ItemQuery, page: Page) -> AppResult<(Vec<Item>, i64)> {
        self.items_search(query, page).await
    }

    async fn items_search_available(&self, term: &str, limit: i64) -> AppResult<Vec<Item>> {
        self.items_available_matching(term, limit).await
    }

    async fn items_create(&self, item: &CreateItem) -> AppResult<Item> {
        self.items_insert(item).await
    }

    async fn readers_get(&self, id: i32) -> AppResult<Reader> {
        self.readers_get_by_id(id).await
    }

    async fn readers_list(&self, query: &ReaderQuery, page: Page) -> AppResult<(Vec<Reader>, i64)> {
        self.readers_search(query, page).await
    }

    async fn readers_search_active(&self, term: &str, limit: i64) -> AppResult<Vec<Reader>> {
        self.readers_active_matching(term, limit).await
    }

    async fn readers_create(&self, reader: &CreateReader) -> AppResult<Reader> {
        self.readers_insert(reader).await
    }

    async fn readers_update(&self, id: i32, data: &UpdateReader) -> AppResult<Reader> {
        self.readers_update_reader(id, data).await
    }

    async fn loans_get(&self, id: i32) -> AppResult<LoanDetailsRow> {
        self.loans_get_details(id).await
    }

    async fn loans_list(
        &self,
        query: &LoanQuery,
        today: NaiveDate,
        page: Page,
    ) -> AppResult<(Vec<LoanDetailsRow>, i64)> {
        self.loans_search(query, today, page).await
    }

    async fn loans_overdue(&self, today: NaiveDate) -> AppResult<Vec<LoanDetailsRow>> {
        self.loans_overdue_on(today).await
    }

    async fn stats_summary(&self, today: NaiveDate) -> AppResult<LibrarySummary> {
        let summary = sqlx::query_as::<_, LibrarySummary>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM items) AS items,
                (SELECT COALESCE(SUM(total_copies), 0)::bigint FROM items) AS total_copies,
                (SELECT COALESCE(SUM(available_copies), 0)::bigint FROM items) AS available_copies,
                (SELECT COUNT(*) FROM readers) AS readers,
                (SELECT COUNT(*) FROM readers WHERE active) AS active_readers,
                (SELECT COUNT(*) FROM loans WHERE return_date IS NULL) AS open_loans,
                (SELECT COUNT(*) FROM loans WHERE return_date IS NULL AND due_date < $1) AS overdue_loans,
                (SELECT COUNT(*) FROM loans WHERE return_date IS NOT NULL) AS returned_loans
            "#,
        )
        .bind(today)
        .fetch_one(&self.pool)
        .await?;
        Ok(summary)
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn item_for_update(&mut self, id: i32) -> AppResult<Item> {
        items::lock_item(&mut self.tx, id).await
    }

    async fn item_save_copies(&mut self, item: &Item) -> AppResult<Item> {
        items::save_copies(&mut self.tx, item).await
    }

    async fn item_update_details(&mut self, id: i32, data: &UpdateItem) -> AppResult<Item> {
        items::update_details(&mut self.tx, id, data).await
    }

    async fn item_loan_count(&mut self, id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE item_id = $1")
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn item_delete(&mut self, id: i32) -> AppResult<()> {
        items::delete(&mut self.tx, id).await
    }

    async fn reader_for_share(&mut self, id: i32) -> AppResult<Reader> {
        readers::lock_reader(&mut self.tx, id, "FOR SHARE").await
    }

    async fn reader_for_update(&mut self, id: i32) -> AppResult<Reader> {
        readers::lock_reader(&mut self.tx, id, "FOR UPDATE").await
    }

    async fn reader_open_loans(&mut self, id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE reader_id = $1 AND return_date IS NULL",
        )
        .bind(id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn reader_set_active(&mut self, id: i32, active: bool, actor: Option<i32>) -> AppResult<Reader> {
        readers::set_active(&mut self.tx, id, active, actor).await
    }

    async fn loan_for_update(&mut self, id: i32) -> AppResult<Loan> {
        loans::lock_loan(&mut self.tx, id).await
    }

    async fn loan_insert(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        loans::insert(&mut self.tx, loan).await
    }

    async fn loan_close(&mut self, id: i32, returned_on: NaiveDate, actor: i32) -> AppResult<Loan> {
        loans::close(&mut self.tx, id, returned_on, actor).await
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("  Dom Casmurro "), "%dom casmurro%");
        assert_eq!(like_pattern("50%"), "%50\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern(r"c:\x"), r"%c:\\x%");
    }

    #[test]
    fn test_other_database_errors_are_not_conflicts() {
        let err = conflict_on_duplicate("ISBN taken".to_string())(sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::Database(sqlx::Error::RowNotFound)));
    }
}
