//! Catalog management service

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::item::{CreateItem, Item, ItemQuery, UpdateItem},
    repository::LibraryStore,
};

use super::{ledger, Paging};

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn LibraryStore>,
    ledger: ledger::LedgerService,
    paging: Paging,
}

impl CatalogService {
    pub fn new(store: Arc<dyn LibraryStore>, ledger: ledger::LedgerService, paging: Paging) -> Self {
        Self { store, ledger, paging }
    }

    pub async fn get_item(&self, id: i32) -> AppResult<Item> {
        self.store.items_get(id).await
    }

    /// List items by title with optional text and availability filters
    pub async fn list_items(&self, query: &ItemQuery) -> AppResult<(Vec<Item>, i64)> {
        let page = self.paging.page(query.page, query.per_page);
        self.store.items_list(query, page).await
    }

    /// Items that can be lent right now, for the loan form picker
    pub async fn search_available(&self, term: &str) -> AppResult<Vec<Item>> {
        self.store
            .items_search_available(term, self.paging.search_size)
            .await
    }

    pub async fn create_item(&self, item: &CreateItem) -> AppResult<Item> {
        item.validate()?;
        let created = self.store.items_create(item).await?;
        tracing::info!(item_id = created.id, copies = created.total_copies, "Item catalogued");
        Ok(created)
    }

    /// Update descriptive fields and, when given, the copy count in one transaction
    pub async fn update_item(&self, id: i32, data: &UpdateItem) -> AppResult<Item> {
        data.validate()?;

        let mut tx = self.store.begin().await?;
        let mut item = tx.item_for_update(id).await?;
        if data.has_details() {
            item = tx.item_update_details(id, data).await?;
        }
        if let Some(total) = data.total_copies {
            item = ledger::apply_copy_count(tx.as_mut(), id, total).await?;
        }
        tx.commit().await?;

        Ok(item)
    }

    /// Change the number of copies held
    pub async fn adjust_copies(&self, id: i32, total_copies: i32) -> AppResult<Item> {
        self.ledger.adjust_copy_count(id, total_copies).await
    }

    /// Delete an item that has never been lent
    pub async fn delete_item(&self, id: i32) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        let item = tx.item_for_update(id).await?;

        let loans = tx.item_loan_count(id).await?;
        if loans > 0 {
            return Err(AppError::BusinessRule(format!(
                "Item '{}' has {} loan record(s) and cannot be deleted",
                item.title, loans
            )));
        }

        tx.item_delete(id).await?;
        tx.commit().await?;

        tracing::info!(item_id = id, "Item deleted");
        Ok(())
    }
}
