//! Business logic services

pub mod catalog;
pub mod ledger;
pub mod loans;
pub mod readers;
pub mod stats;

use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, Offset, Utc};

use crate::{config::LibraryConfig, models::Page, repository::LibraryStore};

/// Source of "today" for loan dates and overdue checks
#[derive(Debug, Clone, Copy)]
pub enum Clock {
    /// Wall clock in the library's local offset
    System(FixedOffset),
    /// Pinned date, for tests and replays
    Fixed(NaiveDate),
}

impl Clock {
    pub fn from_config(config: &LibraryConfig) -> Self {
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).unwrap_or(Utc.fix());
        Clock::System(offset)
    }

    pub fn today(&self) -> NaiveDate {
        match self {
            Clock::System(offset) => Utc::now().with_timezone(offset).date_naive(),
            Clock::Fixed(date) => *date,
        }
    }
}

/// Paging limits shared by the listing services
#[derive(Debug, Clone, Copy)]
pub struct Paging {
    pub default_size: i64,
    pub max_size: i64,
    /// Cap for the quick-search endpoints
    pub search_size: i64,
}

impl Paging {
    pub fn from_config(config: &LibraryConfig) -> Self {
        Self {
            default_size: config.default_page_size,
            max_size: config.max_page_size,
            search_size: config.search_page_size,
        }
    }

    pub fn page(&self, page: Option<i64>, per_page: Option<i64>) -> Page {
        Page::new(page, per_page, self.default_size, self.max_size)
    }
}

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub readers: readers::ReadersService,
    pub ledger: ledger::LedgerService,
    pub loans: loans::LoansService,
    pub stats: stats::StatsService,
    paging: Paging,
    store: Arc<dyn LibraryStore>,
}

impl Services {
    /// Create all services over the given store, reading "today" from the wall clock
    pub fn new(store: Arc<dyn LibraryStore>, config: &LibraryConfig) -> Self {
        Self::with_clock(store, config, Clock::from_config(config))
    }

    pub fn with_clock(store: Arc<dyn LibraryStore>, config: &LibraryConfig, clock: Clock) -> Self {
        let paging = Paging::from_config(config);
        let ledger = ledger::LedgerService::new(store.clone(), clock, config.default_loan_days);

        Self {
            catalog: catalog::CatalogService::new(store.clone(), ledger.clone(), paging),
            readers: readers::ReadersService::new(store.clone(), paging),
            loans: loans::LoansService::new(store.clone(), clock, paging),
            stats: stats::StatsService::new(store.clone(), clock),
            ledger,
            paging,
            store,
        }
    }

    /// Paging limits the listings were built with
    pub fn paging(&self) -> Paging {
        self.paging
    }

    /// Readiness probe against the backing store
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        self.store.ping().await
    }
}
