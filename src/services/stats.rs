//! Statistics service

use std::sync::Arc;

use crate::{error::AppResult, models::LibrarySummary, repository::LibraryStore};

use super::Clock;

#[derive(Clone)]
pub struct StatsService {
    store: Arc<dyn LibraryStore>,
    clock: Clock,
}

impl StatsService {
    pub fn new(store: Arc<dyn LibraryStore>, clock: Clock) -> Self {
        Self { store, clock }
    }

    pub async fn summary(&self) -> AppResult<LibrarySummary> {
        self.store.stats_summary(self.clock.today()).await
    }
}
