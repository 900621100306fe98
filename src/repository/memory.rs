//! In-memory store for tests, local demos and embedding.
//!
//! Transactions take the single state lock for their whole lifetime and
//! work on a copy of the state; `commit` swaps the copy in, dropping the
//! transaction throws it away. That gives the same all-or-nothing and
//! serialization guarantees the PostgreSQL row locks give, at the cost of
//! serializing every transaction.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{LibraryStore, StoreTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        item::{CreateItem, Item, ItemQuery, UpdateItem},
        loan::{Loan, LoanDetailsRow, LoanQuery, LoanStatus, NewLoan},
        reader::{CreateReader, Reader, ReaderQuery, UpdateReader},
        LibrarySummary, Page,
    },
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    items: BTreeMap<i32, Item>,
    readers: BTreeMap<i32, Reader>,
    loans: BTreeMap<i32, Loan>,
    last_item_id: i32,
    last_reader_id: i32,
    last_loan_id: i32,
}

impl MemoryState {
    fn item(&self, id: i32) -> AppResult<&Item> {
        self.items
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", id)))
    }

    fn reader(&self, id: i32) -> AppResult<&Reader> {
        self.readers
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Reader {} not found", id)))
    }

    fn loan(&self, id: i32) -> AppResult<&Loan> {
        self.loans
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", id)))
    }

    fn isbn_taken(&self, isbn: &str, exclude_id: Option<i32>) -> bool {
        self.items
            .values()
            .any(|i| i.isbn == isbn && Some(i.id) != exclude_id)
    }

    fn identifier_taken(&self, identifier: &str, exclude_id: Option<i32>) -> bool {
        self.readers
            .values()
            .any(|r| r.identifier.eq_ignore_ascii_case(identifier) && Some(r.id) != exclude_id)
    }

    fn details(&self, loan: &Loan) -> AppResult<LoanDetailsRow> {
        let item = self.item(loan.item_id)?;
        let reader = self.reader(loan.reader_id)?;
        Ok(LoanDetailsRow {
            id: loan.id,
            item_id: loan.item_id,
            reader_id: loan.reader_id,
            librarian_id: loan.librarian_id,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: loan.return_date,
            returned_by: loan.returned_by,
            notes: loan.notes.clone(),
            item_title: item.title.clone(),
            item_author: item.author.clone(),
            reader_name: reader.name.clone(),
            reader_identifier: reader.identifier.clone(),
        })
    }
}

fn matches_term(term: &str, fields: &[&str]) -> bool {
    let needle = term.trim().to_lowercase();
    needle.is_empty() || fields.iter().any(|f| f.to_lowercase().contains(&needle))
}

fn paginate<T>(rows: Vec<T>, page: Page) -> Vec<T> {
    rows.into_iter()
        .skip(page.offset().max(0) as usize)
        .take(page.per_page.max(0) as usize)
        .collect()
}

fn by_title(a: &Item, b: &Item) -> std::cmp::Ordering {
    a.title.to_lowercase().cmp(&b.title.to_lowercase()).then(a.id.cmp(&b.id))
}

fn by_name(a: &Reader, b: &Reader) -> std::cmp::Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase()).then(a.id.cmp(&b.id))
}

/// In-memory [`LibraryStore`]
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LibraryStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn items_get(&self, id: i32) -> AppResult<Item> {
        self.state.lock().await.item(id).cloned()
    }

    async fn items_list(&self, query: &ItemQuery, page: Page) -> AppResult<(Vec<Item>, i64)> {
        let state = self.state.lock().await;
        let term = query.search.as_deref().unwrap_or("");
        let available_only = query.available_only.unwrap_or(false);

        let mut items: Vec<Item> = state
            .items
            .values()
            .filter(|i| matches_term(term, &[i.title.as_str(), i.author.as_str(), i.isbn.as_str()]))
            .filter(|i| !available_only || i.is_available())
            .cloned()
            .collect();
        items.sort_by(by_title);

        let total = items.len() as i64;
        Ok((paginate(items, page), total))
    }

    async fn items_search_available(&self, term: &str, limit: i64) -> AppResult<Vec<Item>> {
        let state = self.state.lock().await;
        let mut items: Vec<Item> = state
            .items
            .values()
            .filter(|i| i.is_available() && matches_term(term, &[i.title.as_str(), i.author.as_str(), i.isbn.as_str()]))
            .cloned()
            .collect();
        items.sort_by(by_title);
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }

    async fn items_create(&self, item: &CreateItem) -> AppResult<Item> {
        let mut state = self.state.lock().await;
        if state.isbn_taken(&item.isbn, None) {
            return Err(AppError::Conflict(format!("ISBN {} is already catalogued", item.isbn)));
        }

        state.last_item_id += 1;
        let now = Utc::now();
        let created = Item {
            id: state.last_item_id,
            title: item.title.clone(),
            author: item.author.clone(),
            publisher: item.publisher.clone(),
            publication_year: item.publication_year,
            isbn: item.isbn.clone(),
            genre: item.genre.clone(),
            total_copies: item.total_copies,
            available_copies: item.total_copies,
            created_at: now,
            updated_at: now,
        };
        state.items.insert(created.id, created.clone());
        Ok(created)
    }

    async fn readers_get(&self, id: i32) -> AppResult<Reader> {
        self.state.lock().await.reader(id).cloned()
    }

    async fn readers_list(&self, query: &ReaderQuery, page: Page) -> AppResult<(Vec<Reader>, i64)> {
        let state = self.state.lock().await;
        let term = query.search.as_deref().unwrap_or("");

        let mut readers: Vec<Reader> = state
            .readers
            .values()
            .filter(|r| matches_term(term, &[r.name.as_str(), r.identifier.as_str()]))
            .filter(|r| query.active.map_or(true, |active| r.active == active))
            .cloned()
            .collect();
        readers.sort_by(by_name);

        let total = readers.len() as i64;
        Ok((paginate(readers, page), total))
    }

    async fn readers_search_active(&self, term: &str, limit: i64) -> AppResult<Vec<Reader>> {
        let state = self.state.lock().await;
        let mut readers: Vec<Reader> = state
            .readers
            .values()
            .filter(|r| r.active && matches_term(term, &[r.name.as_str(), r.identifier.as_str()]))
            .cloned()
            .collect();
        readers.sort_by(by_name);
        readers.truncate(limit.max(0) as usize);
        Ok(readers)
    }

    async fn readers_create(&self, reader: &CreateReader) -> AppResult<Reader> {
        let mut state = self.state.lock().await;
        if state.identifier_taken(&reader.identifier, None) {
            return Err(AppError::Conflict(format!(
                "Identifier {} is already registered",
                reader.identifier
            )));
        }

        state.last_reader_id += 1;
        let now = Utc::now();
        let created = Reader {
            id: state.last_reader_id,
            name: reader.name.clone(),
            identifier: reader.identifier.clone(),
            email: reader.email.clone(),
            phone: reader.phone.clone(),
            active: true,
            created_at: now,
            updated_at: now,
            deactivated_at: None,
            deactivated_by: None,
        };
        state.readers.insert(created.id, created.clone());
        Ok(created)
    }

    async fn readers_update(&self, id: i32, data: &UpdateReader) -> AppResult<Reader> {
        let mut state = self.state.lock().await;
        state.reader(id)?;
        if let Some(ref identifier) = data.identifier {
            if state.identifier_taken(identifier, Some(id)) {
                return Err(AppError::Conflict(format!("Identifier {} is already registered", identifier)));
            }
        }

        let reader = state
            .readers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Reader {} not found", id)))?;
        if let Some(ref name) = data.name {
            reader.name = name.clone();
        }
        if let Some(ref identifier) = data.identifier {
            reader.identifier = identifier.clone();
        }
        if data.email.is_some() {
            reader.email = data.email.clone();
        }
        if data.phone.is_some() {
            reader.phone = data.phone.clone();
        }
        reader.updated_at = Utc::now();
        Ok(reader.clone())
    }

    async fn loans_get(&self, id: i32) -> AppResult<LoanDetailsRow> {
        let state = self.state.lock().await;
        let loan = state.loan(id)?;
        state.details(loan)
    }

    async fn loans_list(
        &self,
        query: &LoanQuery,
        today: NaiveDate,
        page: Page,
    ) -> AppResult<(Vec<LoanDetailsRow>, i64)> {
        let state = self.state.lock().await;
        let mut loans: Vec<&Loan> = state
            .loans
            .values()
            .filter(|l| query.reader_id.map_or(true, |id| l.reader_id == id))
            .filter(|l| query.item_id.map_or(true, |id| l.item_id == id))
            .filter(|l| match query.status {
                Some(LoanStatus::Open) => l.is_open(),
                Some(LoanStatus::Overdue) => l.is_overdue(today),
                Some(LoanStatus::Returned) => !l.is_open(),
                None => true,
            })
            .collect();
        loans.sort_by(|a, b| b.loan_date.cmp(&a.loan_date).then(b.id.cmp(&a.id)));

        let total = loans.len() as i64;
        let rows = paginate(loans, page)
            .into_iter()
            .map(|l| state.details(l))
            .collect::<AppResult<Vec<_>>>()?;
        Ok((rows, total))
    }

    async fn loans_overdue(&self, today: NaiveDate) -> AppResult<Vec<LoanDetailsRow>> {
        let state = self.state.lock().await;
        let mut loans: Vec<&Loan> = state.loans.values().filter(|l| l.is_overdue(today)).collect();
        loans.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
        loans.into_iter().map(|l| state.details(l)).collect()
    }

    async fn stats_summary(&self, today: NaiveDate) -> AppResult<LibrarySummary> {
        let state = self.state.lock().await;
        Ok(LibrarySummary {
            items: state.items.len() as i64,
            total_copies: state.items.values().map(|i| i.total_copies as i64).sum(),
            available_copies: state.items.values().map(|i| i.available_copies as i64).sum(),
            readers: state.readers.len() as i64,
            active_readers: state.readers.values().filter(|r| r.active).count() as i64,
            open_loans: state.loans.values().filter(|l| l.is_open()).count() as i64,
            overdue_loans: state.loans.values().filter(|l| l.is_overdue(today)).count() as i64,
            returned_loans: state.loans.values().filter(|l| !l.is_open()).count() as i64,
        })
    }
}

/// Transaction over a private copy of the state
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn item_for_update(&mut self, id: i32) -> AppResult<Item> {
        self.working.item(id).cloned()
    }

    async fn item_save_copies(&mut self, item: &Item) -> AppResult<Item> {
        let stored = self
            .working
            .items
            .get_mut(&item.id)
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", item.id)))?;
        stored.total_copies = item.total_copies;
        stored.available_copies = item.available_copies;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn item_update_details(&mut self, id: i32, data: &UpdateItem) -> AppResult<Item> {
        self.working.item(id)?;
        if let Some(ref isbn) = data.isbn {
            if self.working.isbn_taken(isbn, Some(id)) {
                return Err(AppError::Conflict(format!("ISBN {} is already catalogued", isbn)));
            }
        }

        let item = self
            .working
            .items
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", id)))?;
        if let Some(ref title) = data.title {
            item.title = title.clone();
        }
        if let Some(ref author) = data.author {
            item.author = author.clone();
        }
        if data.publisher.is_some() {
            item.publisher = data.publisher.clone();
        }
        if data.publication_year.is_some() {
            item.publication_year = data.publication_year;
        }
        if let Some(ref isbn) = data.isbn {
            item.isbn = isbn.clone();
        }
        if data.genre.is_some() {
            item.genre = data.genre.clone();
        }
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn item_loan_count(&mut self, id: i32) -> AppResult<i64> {
        Ok(self.working.loans.values().filter(|l| l.item_id == id).count() as i64)
    }

    async fn item_delete(&mut self, id: i32) -> AppResult<()> {
        self.working
            .items
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", id)))
    }

    async fn reader_for_share(&mut self, id: i32) -> AppResult<Reader> {
        self.working.reader(id).cloned()
    }

    async fn reader_for_update(&mut self, id: i32) -> AppResult<Reader> {
        self.working.reader(id).cloned()
    }

    async fn reader_open_loans(&mut self, id: i32) -> AppResult<i64> {
        Ok(self
            .working
            .loans
            .values()
            .filter(|l| l.reader_id == id && l.is_open())
            .count() as i64)
    }

    async fn reader_set_active(&mut self, id: i32, active: bool, actor: Option<i32>) -> AppResult<Reader> {
        let reader = self
            .working
            .readers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Reader {} not found", id)))?;
        let now = Utc::now();
        reader.active = active;
        reader.deactivated_at = if active { None } else { Some(now) };
        reader.deactivated_by = if active { None } else { actor };
        reader.updated_at = now;
        Ok(reader.clone())
    }

    async fn loan_for_update(&mut self, id: i32) -> AppResult<Loan> {
        self.working.loan(id).cloned()
    }

    async fn loan_insert(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        self.working.item(loan.item_id)?;
        self.working.reader(loan.reader_id)?;

        self.working.last_loan_id += 1;
        let created = Loan {
            id: self.working.last_loan_id,
            item_id: loan.item_id,
            reader_id: loan.reader_id,
            librarian_id: loan.librarian_id,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: None,
            returned_by: None,
            notes: loan.notes.clone(),
        };
        self.working.loans.insert(created.id, created.clone());
        Ok(created)
    }

    async fn loan_close(&mut self, id: i32, returned_on: NaiveDate, actor: i32) -> AppResult<Loan> {
        let loan = self
            .working
            .loans
            .get_mut(&id)
            .filter(|l| l.is_open())
            .ok_or_else(|| AppError::Internal(format!("Loan {} was not open when closing", id)))?;
        loan.return_date = Some(returned_on);
        loan.returned_by = Some(actor);
        Ok(loan.clone())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
