//! API handlers for Acervo REST endpoints

pub mod health;
pub mod items;
pub mod loans;
pub mod openapi;
pub mod readers;
pub mod stats;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::AppError,
    models::{item::Item, loan::LoanDetails, reader::Reader, Actor},
    AppState,
};

/// Header naming the librarian performing a mutating request
pub const ACTOR_HEADER: &str = "x-actor-id";

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing X-Actor-Id header".to_string()))?;

        let id: i32 = value
            .trim()
            .parse()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| AppError::Authentication("Invalid X-Actor-Id header".to_string()))?;

        Ok(Actor::new(id))
    }
}

/// Paginated response wrapper
#[derive(Serialize, ToSchema)]
#[aliases(ItemPage = PaginatedResponse<Item>, ReaderPage = PaginatedResponse<Reader>, LoanPage = PaginatedResponse<LoanDetails>)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// Records on this page
    pub items: Vec<T>,
    /// Total number of matching records
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Records per page
    pub per_page: i64,
}

/// Free-text term for the picker searches
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Matched against title, author and ISBN (items) or name and identifier (readers)
    pub q: Option<String>,
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Items (catalog)
        .route("/items", get(items::list_items).post(items::create_item))
        .route("/items/available", get(items::search_available))
        .route(
            "/items/:id",
            get(items::get_item).put(items::update_item).delete(items::delete_item),
        )
        .route("/items/:id/copies", put(items::adjust_copies))
        // Readers
        .route("/readers", get(readers::list_readers).post(readers::create_reader))
        .route("/readers/active", get(readers::search_active))
        .route("/readers/:id", get(readers::get_reader).put(readers::update_reader))
        .route("/readers/:id/deactivate", post(readers::deactivate_reader))
        .route("/readers/:id/reactivate", post(readers::reactivate_reader))
        .route("/readers/:id/loans", get(loans::get_reader_loans))
        // Loans
        .route("/loans", get(loans::list_loans).post(loans::create_loan))
        .route("/loans/overdue", get(loans::overdue_loans))
        .route("/loans/:id", get(loans::get_loan))
        .route("/loans/:id/return", post(loans::return_loan))
        // Statistics
        .route("/stats", get(stats::get_stats))
        .with_state(state);

    // OpenAPI documentation
    let openapi = openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
