//! Loan ledger: copy-count-aware lending.
//!
//! Each operation runs in one store transaction. The row locks are always
//! taken in the same order (reader, then loan, then item) so concurrent
//! operations cannot deadlock each other.

use std::sync::Arc;

use chrono::Duration;

use crate::{
    error::{AppError, AppResult, LedgerError},
    models::{
        item::Item,
        loan::{CreateLoan, LoanReceipt, NewLoan},
        reader::Reader,
        Actor,
    },
    repository::{LibraryStore, StoreTx},
};

use super::Clock;

#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LibraryStore>,
    clock: Clock,
    default_loan_days: i64,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LibraryStore>, clock: Clock, default_loan_days: i64) -> Self {
        Self {
            store,
            clock,
            default_loan_days,
        }
    }

    /// Lend one copy of an item to a reader
    pub async fn create_loan(&self, actor: Actor, request: &CreateLoan) -> AppResult<LoanReceipt> {
        let today = self.clock.today();
        let due_date = request
            .due_date
            .unwrap_or(today + Duration::days(self.default_loan_days));
        if due_date < today {
            return Err(AppError::Validation(format!(
                "Due date {} is before the loan date {}",
                due_date, today
            )));
        }

        let mut tx = self.store.begin().await?;

        let reader = tx.reader_for_share(request.reader_id).await?;
        if !reader.active {
            return Err(LedgerError::ReaderInactive {
                reader_id: reader.id,
                name: reader.name,
            }
            .into());
        }

        let mut item = tx.item_for_update(request.item_id).await?;
        item.take_copy()?;
        let item = tx.item_save_copies(&item).await?;

        let loan = tx
            .loan_insert(&NewLoan {
                item_id: item.id,
                reader_id: reader.id,
                librarian_id: actor.id,
                loan_date: today,
                due_date,
                notes: request.notes.clone(),
            })
            .await?;

        tx.commit().await?;

        tracing::info!(
            loan_id = loan.id,
            item_id = item.id,
            reader_id = reader.id,
            actor = actor.id,
            available = item.available_copies,
            "Loan created"
        );

        Ok(LoanReceipt { loan, item })
    }

    /// Close an open loan and put the copy back on the shelf.
    ///
    /// A loan that is already closed yields `LoanAlreadyClosed` without
    /// touching anything, so repeating the call is harmless.
    pub async fn return_loan(&self, actor: Actor, loan_id: i32) -> AppResult<LoanReceipt> {
        let today = self.clock.today();
        let mut tx = self.store.begin().await?;

        let loan = tx.loan_for_update(loan_id).await?;
        if let Some(returned_on) = loan.return_date {
            tracing::warn!(loan_id, %returned_on, "Return requested for a closed loan");
            return Err(LedgerError::LoanAlreadyClosed { loan_id, returned_on }.into());
        }

        let mut item = tx.item_for_update(loan.item_id).await?;
        item.return_copy();
        let item = tx.item_save_copies(&item).await?;
        let loan = tx.loan_close(loan_id, today, actor.id).await?;

        tx.commit().await?;

        tracing::info!(
            loan_id,
            item_id = item.id,
            actor = actor.id,
            available = item.available_copies,
            "Loan returned"
        );

        Ok(LoanReceipt { loan, item })
    }

    /// Deactivate a reader that holds no open loans
    pub async fn deactivate_reader(&self, actor: Actor, reader_id: i32) -> AppResult<Reader> {
        let mut tx = self.store.begin().await?;

        let reader = tx.reader_for_update(reader_id).await?;
        if !reader.active {
            return Ok(reader);
        }

        let open_loans = tx.reader_open_loans(reader_id).await?;
        if open_loans > 0 {
            return Err(LedgerError::ReaderHasOpenLoans {
                reader_id,
                name: reader.name,
                open_loans,
            }
            .into());
        }

        let reader = tx.reader_set_active(reader_id, false, Some(actor.id)).await?;
        tx.commit().await?;

        tracing::info!(reader_id, actor = actor.id, "Reader deactivated");
        Ok(reader)
    }

    pub async fn reactivate_reader(&self, reader_id: i32) -> AppResult<Reader> {
        let mut tx = self.store.begin().await?;

        let reader = tx.reader_for_update(reader_id).await?;
        if reader.active {
            return Ok(reader);
        }

        let reader = tx.reader_set_active(reader_id, true, None).await?;
        tx.commit().await?;

        tracing::info!(reader_id, "Reader reactivated");
        Ok(reader)
    }

    /// Set the number of copies an item holds
    pub async fn adjust_copy_count(&self, item_id: i32, new_total: i32) -> AppResult<Item> {
        if new_total < 0 {
            return Err(LedgerError::NegativeCopyCount {
                item_id,
                requested: new_total,
            }
            .into());
        }

        let mut tx = self.store.begin().await?;
        let item = apply_copy_count(tx.as_mut(), item_id, new_total).await?;
        tx.commit().await?;
        Ok(item)
    }
}

/// Copy-count change inside a caller's transaction
pub(crate) async fn apply_copy_count(tx: &mut dyn StoreTx, item_id: i32, new_total: i32) -> AppResult<Item> {
    let mut item = tx.item_for_update(item_id).await?;
    let (old_total, old_available) = (item.total_copies, item.available_copies);
    let on_loan = item.copies_on_loan();

    item.set_total_copies(new_total)?;
    if new_total < on_loan {
        // Availability is clamped at zero; the counters now under-count loans.
        tracing::warn!(
            item_id,
            new_total,
            on_loan,
            "Copy count reduced below the number of copies on loan"
        );
    }
    let item = tx.item_save_copies(&item).await?;

    tracing::info!(
        item_id,
        old_total,
        old_available,
        total = item.total_copies,
        available = item.available_copies,
        "Copy count adjusted"
    );
    Ok(item)
}
