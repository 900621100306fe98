//! Router tests over the in-memory store

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tower::ServiceExt;

use acervo_server::{
    api::create_router,
    config::{AppConfig, DatabaseConfig, LibraryConfig, LoggingConfig, ServerConfig},
    repository::{LibraryStore, MemoryStore},
    services::{Clock, Services},
    AppState,
};

fn app(store: &MemoryStore, today: NaiveDate) -> Router {
    let config = AppConfig {
        server: ServerConfig::default(),
        database: DatabaseConfig::default(),
        logging: LoggingConfig::default(),
        library: LibraryConfig::default(),
    };
    let store: Arc<dyn LibraryStore> = Arc::new(store.clone());
    let services = Services::with_clock(store, &config.library, Clock::Fixed(today));

    create_router(AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    })
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    actor: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        request = request.header("X-Actor-Id", actor);
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn seed(app: &Router, copies: i32) -> (i64, i64) {
    let (status, item) = send(
        app,
        Method::POST,
        "/api/v1/items",
        Some("1"),
        Some(json!({
            "title": "Grande Sertão: Veredas",
            "author": "João Guimarães Rosa",
            "isbn": "9788520923252",
            "total_copies": copies
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, reader) = send(
        app,
        Method::POST,
        "/api/v1/readers",
        Some("1"),
        Some(json!({ "name": "Ana Souza", "identifier": "CARD-0001" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    (item["id"].as_i64().unwrap(), reader["id"].as_i64().unwrap())
}

#[tokio::test]
async fn test_health_check() {
    let app = app(&MemoryStore::new(), today());

    let (status, body) = send(&app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_mutations_require_an_actor() {
    let app = app(&MemoryStore::new(), today());
    let (item_id, reader_id) = seed(&app, 1).await;
    let loan = json!({ "item_id": item_id, "reader_id": reader_id });

    let (status, body) = send(&app, Method::POST, "/api/v1/loans", None, Some(loan.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 2);

    for bad in ["abc", "0", "-4"] {
        let (status, _) = send(&app, Method::POST, "/api/v1/loans", Some(bad), Some(loan.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // Nothing was lent
    let (_, item) = send(&app, Method::GET, &format!("/api/v1/items/{item_id}"), None, None).await;
    assert_eq!(item["available_copies"], 1);
}

#[tokio::test]
async fn test_loan_and_repeated_return() {
    let app = app(&MemoryStore::new(), today());
    let (item_id, reader_id) = seed(&app, 1).await;
    let loan = json!({ "item_id": item_id, "reader_id": reader_id, "notes": "capa rasgada" });

    let (status, receipt) = send(&app, Method::POST, "/api/v1/loans", Some("3"), Some(loan.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["item"]["available_copies"], 0);
    assert_eq!(receipt["loan"]["librarian_id"], 3);
    assert_eq!(receipt["loan"]["loan_date"], "2024-05-01");
    assert_eq!(receipt["loan"]["due_date"], "2024-05-15");
    let loan_id = receipt["loan"]["id"].as_i64().unwrap();

    let (status, body) = send(&app, Method::POST, "/api/v1/loans", Some("3"), Some(loan)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 7);
    assert_eq!(body["error"], "ItemNotAvailable");

    let uri = format!("/api/v1/loans/{loan_id}/return");
    let (status, body) = send(&app, Method::POST, &uri, Some("3"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "returned");
    assert_eq!(body["loan"]["return_date"], "2024-05-01");
    assert!(body.get("warning").is_none());

    let (status, body) = send(&app, Method::POST, &uri, Some("4"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "already_returned");
    assert_eq!(body["loan"]["returned_by"], 3);
    assert!(body["warning"].as_str().unwrap().contains("already returned"));

    let (_, item) = send(&app, Method::GET, &format!("/api/v1/items/{item_id}"), None, None).await;
    assert_eq!(item["available_copies"], 1);
}

#[tokio::test]
async fn test_return_of_unknown_loan_is_not_found() {
    let app = app(&MemoryStore::new(), today());

    let (status, body) = send(&app, Method::POST, "/api/v1/loans/42/return", Some("1"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 20);
}

#[tokio::test]
async fn test_deactivation_is_refused_while_loans_are_open() {
    let app = app(&MemoryStore::new(), today());
    let (item_id, reader_id) = seed(&app, 2).await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/loans",
        Some("1"),
        Some(json!({ "item_id": item_id, "reader_id": reader_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let uri = format!("/api/v1/readers/{reader_id}/deactivate");
    let (status, body) = send(&app, Method::POST, &uri, Some("1"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 21);

    let (status, loans) = send(&app, Method::GET, &format!("/api/v1/readers/{reader_id}/loans"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loans.as_array().unwrap().len(), 1);
    assert_eq!(loans[0]["status"], "open");
}

#[tokio::test]
async fn test_copy_adjustment_endpoint() {
    let app = app(&MemoryStore::new(), today());
    let (item_id, _) = seed(&app, 2).await;
    let uri = format!("/api/v1/items/{item_id}/copies");

    let (status, item) = send(&app, Method::PUT, &uri, Some("1"), Some(json!({ "total_copies": 5 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["total_copies"], 5);
    assert_eq!(item["available_copies"], 5);

    let (status, body) = send(&app, Method::PUT, &uri, Some("1"), Some(json!({ "total_copies": -1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
async fn test_available_search_and_listing() {
    let app = app(&MemoryStore::new(), today());
    let (item_id, _) = seed(&app, 1).await;

    let (status, hits) = send(&app, Method::GET, "/api/v1/items/available?q=veredas", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hits[0]["id"].as_i64(), Some(item_id));

    let (status, hits) = send(&app, Method::GET, "/api/v1/readers/active?q=ana", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hits.as_array().unwrap().len(), 1);

    let (status, page) = send(&app, Method::GET, "/api/v1/items?page=1&per_page=10", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["per_page"], 10);

    let (status, stats) = send(&app, Method::GET, "/api/v1/stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["items"], 1);
    assert_eq!(stats["active_readers"], 1);
}

#[tokio::test]
async fn test_invalid_item_is_rejected() {
    let app = app(&MemoryStore::new(), today());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/items",
        Some("1"),
        Some(json!({ "title": "", "author": "Anônimo", "isbn": "123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 18);
}

#[tokio::test]
async fn test_listing_far_past_the_last_page_is_empty() {
    let app = app(&MemoryStore::new(), today());
    seed(&app, 1).await;

    for uri in [
        "/api/v1/items?page=9223372036854775807",
        "/api/v1/readers?page=9223372036854775807",
        "/api/v1/loans?page=9223372036854775807",
    ] {
        let (status, page) = send(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(page["items"].as_array().unwrap().len(), 0);
        assert_eq!(page["page"], i64::MAX);
    }
}

#[tokio::test]
async fn test_overlong_genre_is_a_validation_error() {
    let app = app(&MemoryStore::new(), today());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/items",
        Some("1"),
        Some(json!({
            "title": "Sagarana",
            "author": "João Guimarães Rosa",
            "isbn": "9788520923253",
            "genre": "x".repeat(101)
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 18);
}
