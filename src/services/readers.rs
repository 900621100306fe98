//! Reader registry service

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::AppResult,
    models::reader::{CreateReader, Reader, ReaderQuery, UpdateReader},
    repository::LibraryStore,
};

use super::Paging;

#[derive(Clone)]
pub struct ReadersService {
    store: Arc<dyn LibraryStore>,
    paging: Paging,
}

impl ReadersService {
    pub fn new(store: Arc<dyn LibraryStore>, paging: Paging) -> Self {
        Self { store, paging }
    }

    pub async fn get_reader(&self, id: i32) -> AppResult<Reader> {
        self.store.readers_get(id).await
    }

    /// List readers by name
    pub async fn list_readers(&self, query: &ReaderQuery) -> AppResult<(Vec<Reader>, i64)> {
        let page = self.paging.page(query.page, query.per_page);
        self.store.readers_list(query, page).await
    }

    /// Active readers, for the loan form picker
    pub async fn search_active(&self, term: &str) -> AppResult<Vec<Reader>> {
        self.store
            .readers_search_active(term, self.paging.search_size)
            .await
    }

    pub async fn create_reader(&self, reader: &CreateReader) -> AppResult<Reader> {
        reader.validate()?;
        let created = self.store.readers_create(reader).await?;
        tracing::info!(reader_id = created.id, "Reader registered");
        Ok(created)
    }

    pub async fn update_reader(&self, id: i32, data: &UpdateReader) -> AppResult<Reader> {
        data.validate()?;
        self.store.readers_update(id, data).await
    }
}
