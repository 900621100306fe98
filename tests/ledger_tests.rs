//! Loan ledger tests against the in-memory store

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use chrono::{Duration, NaiveDate};
use tokio_test::{assert_err, assert_ok};

use acervo_server::{
    config::LibraryConfig,
    error::{AppError, LedgerError},
    models::{
        item::{CreateItem, Item, ItemQuery, UpdateItem},
        loan::{CreateLoan, LoanQuery, LoanReceipt, LoanStatus},
        reader::{CreateReader, Reader},
        Actor,
    },
    repository::{LibraryStore, MemoryStore},
    services::{Clock, Services},
};

const LIBRARIAN: Actor = Actor { id: 7 };

static NEXT_ISBN: AtomicU64 = AtomicU64::new(9_788_535_900_000);

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn services_on(store: &MemoryStore, today: NaiveDate) -> Services {
    services_with(store, today, LibraryConfig::default())
}

fn services_with(store: &MemoryStore, today: NaiveDate, config: LibraryConfig) -> Services {
    let store: Arc<dyn LibraryStore> = Arc::new(store.clone());
    Services::with_clock(store, &config, Clock::Fixed(today))
}

async fn add_item(services: &Services, title: &str, copies: i32) -> Item {
    let isbn = NEXT_ISBN.fetch_add(1, Ordering::Relaxed).to_string();
    let item = CreateItem {
        title: title.to_string(),
        author: "Graciliano Ramos".to_string(),
        publisher: None,
        publication_year: Some(1938),
        isbn,
        genre: None,
        total_copies: copies,
    };
    assert_ok!(services.catalog.create_item(&item).await)
}

async fn add_reader(services: &Services, name: &str) -> Reader {
    let reader = CreateReader {
        name: name.to_string(),
        identifier: format!("CARD-{}", name.to_uppercase().replace(' ', "-")),
        email: None,
        phone: None,
    };
    assert_ok!(services.readers.create_reader(&reader).await)
}

async fn lend(services: &Services, item: &Item, reader: &Reader) -> Result<LoanReceipt, AppError> {
    services
        .ledger
        .create_loan(
            LIBRARIAN,
            &CreateLoan {
                item_id: item.id,
                reader_id: reader.id,
                due_date: None,
                notes: None,
            },
        )
        .await
}

fn ledger_error(err: &AppError) -> &LedgerError {
    err.as_ledger()
        .unwrap_or_else(|| panic!("expected a ledger error, got {err:?}"))
}

#[tokio::test]
async fn test_lending_stops_at_zero_copies() {
    let store = MemoryStore::new();
    let services = services_on(&store, date(2024, 5, 1));
    let item = add_item(&services, "Vidas Secas", 3).await;
    let reader = add_reader(&services, "Ana Souza").await;

    for expected in [2, 1, 0] {
        let receipt = assert_ok!(lend(&services, &item, &reader).await);
        assert_eq!(receipt.item.available_copies, expected);
        assert_eq!(receipt.loan.librarian_id, LIBRARIAN.id);
        assert_eq!(receipt.loan.due_date, date(2024, 5, 15));
    }

    let err = assert_err!(lend(&services, &item, &reader).await);
    assert!(matches!(
        ledger_error(&err),
        LedgerError::NoCopiesAvailable { item_id, .. } if *item_id == item.id
    ));

    let item = assert_ok!(services.catalog.get_item(item.id).await);
    assert_eq!(item.available_copies, 0);
    assert_eq!(item.total_copies, 3);
}

#[tokio::test]
async fn test_return_twice_is_a_soft_no_op() {
    let store = MemoryStore::new();
    let services = services_on(&store, date(2024, 5, 1));
    let item = add_item(&services, "Dom Casmurro", 1).await;
    let reader = add_reader(&services, "Bruno Lima").await;
    let receipt = assert_ok!(lend(&services, &item, &reader).await);

    let returned = assert_ok!(services.ledger.return_loan(LIBRARIAN, receipt.loan.id).await);
    assert_eq!(returned.loan.return_date, Some(date(2024, 5, 1)));
    assert_eq!(returned.loan.returned_by, Some(LIBRARIAN.id));
    assert_eq!(returned.item.available_copies, 1);

    let later = services_on(&store, date(2024, 5, 9));
    let err = assert_err!(later.ledger.return_loan(Actor::new(8), receipt.loan.id).await);
    let ledger = ledger_error(&err);
    assert!(ledger.is_soft());
    assert_eq!(
        *ledger,
        LedgerError::LoanAlreadyClosed {
            loan_id: receipt.loan.id,
            returned_on: date(2024, 5, 1),
        }
    );

    // Nothing moved on the second call
    let item = assert_ok!(services.catalog.get_item(item.id).await);
    assert_eq!(item.available_copies, 1);
    let loan = assert_ok!(services.loans.get_loan(receipt.loan.id).await);
    assert_eq!(loan.return_date, Some(date(2024, 5, 1)));
    assert_eq!(loan.returned_by, Some(LIBRARIAN.id));
}

#[tokio::test]
async fn test_return_unknown_loan_is_not_found() {
    let store = MemoryStore::new();
    let services = services_on(&store, date(2024, 5, 1));

    let err = assert_err!(services.ledger.return_loan(LIBRARIAN, 404).await);
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_reader_with_open_loan_cannot_be_deactivated() {
    let store = MemoryStore::new();
    let services = services_on(&store, date(2024, 5, 1));
    let item = add_item(&services, "Capitães da Areia", 2).await;
    let reader = add_reader(&services, "Carla Dias").await;
    let receipt = assert_ok!(lend(&services, &item, &reader).await);

    let err = assert_err!(services.ledger.deactivate_reader(LIBRARIAN, reader.id).await);
    assert!(matches!(
        ledger_error(&err),
        LedgerError::ReaderHasOpenLoans { open_loans: 1, .. }
    ));
    assert!(assert_ok!(services.readers.get_reader(reader.id).await).active);

    assert_ok!(services.ledger.return_loan(LIBRARIAN, receipt.loan.id).await);
    let reader = assert_ok!(services.ledger.deactivate_reader(LIBRARIAN, reader.id).await);
    assert!(!reader.active);
    assert_eq!(reader.deactivated_by, Some(LIBRARIAN.id));
    assert!(reader.deactivated_at.is_some());

    // Already inactive: unchanged
    let again = assert_ok!(services.ledger.deactivate_reader(Actor::new(99), reader.id).await);
    assert_eq!(again.deactivated_by, Some(LIBRARIAN.id));
}

#[tokio::test]
async fn test_inactive_reader_cannot_borrow_until_reactivated() {
    let store = MemoryStore::new();
    let services = services_on(&store, date(2024, 5, 1));
    let item = add_item(&services, "São Bernardo", 1).await;
    let reader = add_reader(&services, "Diego Alves").await;
    assert_ok!(services.ledger.deactivate_reader(LIBRARIAN, reader.id).await);

    let err = assert_err!(lend(&services, &item, &reader).await);
    assert!(matches!(ledger_error(&err), LedgerError::ReaderInactive { .. }));
    let item_after = assert_ok!(services.catalog.get_item(item.id).await);
    assert_eq!(item_after.available_copies, 1);

    let reader = assert_ok!(services.ledger.reactivate_reader(reader.id).await);
    assert!(reader.active);
    assert_eq!(reader.deactivated_by, None);
    assert_ok!(lend(&services, &item, &reader).await);
}

#[tokio::test]
async fn test_loan_becomes_overdue_after_due_date() {
    let store = MemoryStore::new();
    let lent_on = date(2024, 5, 1);
    let services = services_on(&store, lent_on);
    let item = add_item(&services, "Angústia", 1).await;
    let reader = add_reader(&services, "Elisa Rocha").await;
    let receipt = assert_ok!(lend(&services, &item, &reader).await);
    let due = receipt.loan.due_date;
    assert_eq!(due, lent_on + Duration::days(14));

    let on_due_date = services_on(&store, due);
    assert!(assert_ok!(on_due_date.loans.overdue_loans().await).is_empty());
    let loan = assert_ok!(on_due_date.loans.get_loan(receipt.loan.id).await);
    assert_eq!(loan.status, LoanStatus::Open);

    let day_after = services_on(&store, due + Duration::days(1));
    let overdue = assert_ok!(day_after.loans.overdue_loans().await);
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].status, LoanStatus::Overdue);
    assert!(overdue[0].is_overdue);
    assert_eq!(overdue[0].reader_name, "Elisa Rocha");

    let query = LoanQuery {
        status: Some(LoanStatus::Overdue),
        ..LoanQuery::default()
    };
    let (loans, total) = assert_ok!(day_after.loans.list_loans(&query).await);
    assert_eq!(total, 1);
    assert_eq!(loans[0].id, receipt.loan.id);

    let summary = assert_ok!(day_after.stats.summary().await);
    assert_eq!(summary.open_loans, 1);
    assert_eq!(summary.overdue_loans, 1);
}

#[tokio::test]
async fn test_due_date_before_today_is_rejected() {
    let store = MemoryStore::new();
    let services = services_on(&store, date(2024, 5, 10));
    let item = add_item(&services, "Memórias Póstumas", 1).await;
    let reader = add_reader(&services, "Fábio Nunes").await;

    let request = CreateLoan {
        item_id: item.id,
        reader_id: reader.id,
        due_date: Some(date(2024, 5, 9)),
        notes: None,
    };
    let err = assert_err!(services.ledger.create_loan(LIBRARIAN, &request).await);
    assert!(matches!(err, AppError::Validation(_)));

    let item = assert_ok!(services.catalog.get_item(item.id).await);
    assert_eq!(item.available_copies, 1);
}

#[tokio::test]
async fn test_adjusting_copies_shifts_availability() {
    let store = MemoryStore::new();
    let services = services_on(&store, date(2024, 5, 1));
    let reader = add_reader(&services, "Gabriela Melo").await;

    let small = add_item(&services, "O Cortiço", 2).await;
    let grown = assert_ok!(services.catalog.adjust_copies(small.id, 5).await);
    assert_eq!((grown.total_copies, grown.available_copies), (5, 5));

    let busy = add_item(&services, "Iracema", 5).await;
    let mut receipts = Vec::new();
    for _ in 0..4 {
        receipts.push(assert_ok!(lend(&services, &busy, &reader).await));
    }
    let shrunk = assert_ok!(services.ledger.adjust_copy_count(busy.id, 2).await);
    assert_eq!((shrunk.total_copies, shrunk.available_copies), (2, 0));

    // Returns never push availability above the new total
    for receipt in &receipts {
        assert_ok!(services.ledger.return_loan(LIBRARIAN, receipt.loan.id).await);
    }
    let busy = assert_ok!(services.catalog.get_item(busy.id).await);
    assert_eq!((busy.total_copies, busy.available_copies), (2, 2));
}

#[tokio::test]
async fn test_negative_copy_count_changes_nothing() {
    let store = MemoryStore::new();
    let services = services_on(&store, date(2024, 5, 1));
    let item = add_item(&services, "Macunaíma", 3).await;

    let err = assert_err!(services.ledger.adjust_copy_count(item.id, -1).await);
    assert_eq!(
        *ledger_error(&err),
        LedgerError::NegativeCopyCount {
            item_id: item.id,
            requested: -1,
        }
    );

    let unchanged = assert_ok!(services.catalog.get_item(item.id).await);
    assert_eq!((unchanged.total_copies, unchanged.available_copies), (3, 3));
}

#[tokio::test]
async fn test_update_item_applies_details_and_copies_together() {
    let store = MemoryStore::new();
    let services = services_on(&store, date(2024, 5, 1));
    let reader = add_reader(&services, "Helena Prado").await;
    let item = add_item(&services, "Senhora", 2).await;
    assert_ok!(lend(&services, &item, &reader).await);

    let update = UpdateItem {
        title: Some("Senhora (edição crítica)".to_string()),
        total_copies: Some(4),
        ..UpdateItem::default()
    };
    let updated = assert_ok!(services.catalog.update_item(item.id, &update).await);
    assert_eq!(updated.title, "Senhora (edição crítica)");
    assert_eq!((updated.total_copies, updated.available_copies), (4, 3));
}

#[tokio::test]
async fn test_last_copy_goes_to_exactly_one_borrower() {
    let store = MemoryStore::new();
    let services = services_on(&store, date(2024, 5, 1));
    let item = add_item(&services, "A Hora da Estrela", 1).await;

    let mut handles = Vec::new();
    for n in 0..8 {
        let reader = add_reader(&services, &format!("Reader {n}")).await;
        let services = services.clone();
        let item = item.clone();
        handles.push(tokio::spawn(async move { lend(&services, &item, &reader).await }));
    }

    let mut granted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(err) => assert!(matches!(
                ledger_error(&err),
                LedgerError::NoCopiesAvailable { .. }
            )),
        }
    }
    assert_eq!(granted, 1);

    let item = assert_ok!(services.catalog.get_item(item.id).await);
    assert_eq!(item.available_copies, 0);
    let summary = assert_ok!(services.stats.summary().await);
    assert_eq!(summary.open_loans, 1);
}

#[tokio::test]
async fn test_item_with_loan_history_cannot_be_deleted() {
    let store = MemoryStore::new();
    let services = services_on(&store, date(2024, 5, 1));
    let reader = add_reader(&services, "Igor Santos").await;
    let lent = add_item(&services, "Quincas Borba", 1).await;
    let receipt = assert_ok!(lend(&services, &lent, &reader).await);
    assert_ok!(services.ledger.return_loan(LIBRARIAN, receipt.loan.id).await);

    let err = assert_err!(services.catalog.delete_item(lent.id).await);
    assert!(matches!(err, AppError::BusinessRule(_)));
    assert_ok!(services.catalog.get_item(lent.id).await);

    let unused = add_item(&services, "Lucíola", 1).await;
    assert_ok!(services.catalog.delete_item(unused.id).await);
    let err = assert_err!(services.catalog.get_item(unused.id).await);
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_searches_are_capped_and_ordered() {
    let store = MemoryStore::new();
    let config = LibraryConfig {
        search_page_size: 3,
        ..LibraryConfig::default()
    };
    let services = services_with(&store, date(2024, 5, 1), config);

    for title in ["Vidas Secas", "Dom Casmurro", "capitães da Areia", "A Hora da Estrela"] {
        add_item(&services, title, 1).await;
    }
    add_item(&services, "Angústia", 0).await;

    let titles: Vec<String> = assert_ok!(services.catalog.search_available("").await)
        .into_iter()
        .map(|i| i.title)
        .collect();
    assert_eq!(titles, ["A Hora da Estrela", "capitães da Areia", "Dom Casmurro"]);

    let hits = assert_ok!(services.catalog.search_available("secas").await);
    assert_eq!(hits.len(), 1);

    for name in ["Zeca", "Bia", "Caio", "Ana"] {
        add_reader(&services, name).await;
    }
    let bia = assert_ok!(services.readers.search_active("bia").await);
    assert_ok!(services.ledger.deactivate_reader(LIBRARIAN, bia[0].id).await);

    let names: Vec<String> = assert_ok!(services.readers.search_active("").await)
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, ["Ana", "Caio", "Zeca"]);

    let query = ItemQuery {
        available_only: Some(true),
        ..ItemQuery::default()
    };
    let (_, total) = assert_ok!(services.catalog.list_items(&query).await);
    assert_eq!(total, 4);
}

#[tokio::test]
async fn test_reader_loans_lists_only_open_loans() {
    let store = MemoryStore::new();
    let services = services_on(&store, date(2024, 5, 1));
    let reader = add_reader(&services, "Joana Reis").await;
    let first = add_item(&services, "Til", 1).await;
    let second = add_item(&services, "Ubirajara", 1).await;

    let closed = assert_ok!(lend(&services, &first, &reader).await);
    assert_ok!(lend(&services, &second, &reader).await);
    assert_ok!(services.ledger.return_loan(LIBRARIAN, closed.loan.id).await);

    let open = assert_ok!(services.loans.get_reader_loans(reader.id).await);
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].item_title, "Ubirajara");

    let err = assert_err!(services.loans.get_reader_loans(9999).await);
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_reader_loans_are_not_cut_at_the_page_size() {
    let store = MemoryStore::new();
    let config = LibraryConfig {
        max_page_size: 2,
        ..LibraryConfig::default()
    };
    let services = services_with(&store, date(2024, 5, 1), config);
    let reader = add_reader(&services, "Karina Luz").await;
    let item = add_item(&services, "Os Sertões", 5).await;
    for _ in 0..5 {
        assert_ok!(lend(&services, &item, &reader).await);
    }

    let open = assert_ok!(services.loans.get_reader_loans(reader.id).await);
    assert_eq!(open.len(), 5);
    let mut ids: Vec<i32> = open.iter().map(|l| l.id).collect();
    ids.dedup();
    assert_eq!(ids.len(), 5);
}

#[tokio::test]
async fn test_search_wildcards_match_literally() {
    let store = MemoryStore::new();
    let services = services_on(&store, date(2024, 5, 1));
    add_item(&services, "100% Poesia", 1).await;
    add_item(&services, "1000 Poemas", 1).await;
    add_item(&services, "Contos_Reunidos", 1).await;
    add_item(&services, "Contos Reunidos", 1).await;

    let hits = assert_ok!(services.catalog.search_available("100%").await);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "100% Poesia");

    let hits = assert_ok!(services.catalog.search_available("contos_").await);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Contos_Reunidos");
}
