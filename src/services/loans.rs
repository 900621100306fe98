//! Loan queries

use std::sync::Arc;

use crate::{
    error::AppResult,
    models::loan::{LoanDetails, LoanQuery, LoanStatus},
    repository::LibraryStore,
};

use super::{Clock, Paging};

#[derive(Clone)]
pub struct LoansService {
    store: Arc<dyn LibraryStore>,
    clock: Clock,
    paging: Paging,
}

impl LoansService {
    pub fn new(store: Arc<dyn LibraryStore>, clock: Clock, paging: Paging) -> Self {
        Self { store, clock, paging }
    }

    pub async fn get_loan(&self, id: i32) -> AppResult<LoanDetails> {
        let row = self.store.loans_get(id).await?;
        Ok(row.into_details(self.clock.today()))
    }

    /// List loans, newest first
    pub async fn list_loans(&self, query: &LoanQuery) -> AppResult<(Vec<LoanDetails>, i64)> {
        let today = self.clock.today();
        let page = self.paging.page(query.page, query.per_page);
        let (rows, total) = self.store.loans_list(query, today, page).await?;
        Ok((rows.into_iter().map(|r| r.into_details(today)).collect(), total))
    }

    /// All open loans of a reader
    pub async fn get_reader_loans(&self, reader_id: i32) -> AppResult<Vec<LoanDetails>> {
        // Verify reader exists
        self.store.readers_get(reader_id).await?;

        let today = self.clock.today();
        let query = LoanQuery {
            reader_id: Some(reader_id),
            status: Some(LoanStatus::Open),
            ..LoanQuery::default()
        };
        // Walk every page; the list is never truncated
        let mut page = self.paging.page(Some(1), Some(self.paging.max_size));
        let mut loans = Vec::new();
        loop {
            let (rows, total) = self.store.loans_list(&query, today, page).await?;
            let fetched = rows.len();
            loans.extend(rows.into_iter().map(|r| r.into_details(today)));
            if fetched == 0 || loans.len() as i64 >= total {
                break;
            }
            page.page += 1;
        }
        Ok(loans)
    }

    /// Open loans past their due date, oldest first
    pub async fn overdue_loans(&self) -> AppResult<Vec<LoanDetails>> {
        let today = self.clock.today();
        let rows = self.store.loans_overdue(today).await?;
        Ok(rows.into_iter().map(|r| r.into_details(today)).collect())
    }
}
