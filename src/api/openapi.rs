//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{health, items, loans, readers, stats};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Acervo API",
        version = "0.3.0",
        description = "Library loan ledger REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Items
        items::list_items,
        items::search_available,
        items::get_item,
        items::create_item,
        items::update_item,
        items::adjust_copies,
        items::delete_item,
        // Readers
        readers::list_readers,
        readers::search_active,
        readers::get_reader,
        readers::create_reader,
        readers::update_reader,
        readers::deactivate_reader,
        readers::reactivate_reader,
        // Loans
        loans::list_loans,
        loans::overdue_loans,
        loans::get_loan,
        loans::get_reader_loans,
        loans::create_loan,
        loans::return_loan,
        // Stats
        stats::get_stats,
    ),
    components(
        schemas(
            // Items
            crate::models::item::Item,
            crate::models::item::CreateItem,
            crate::models::item::UpdateItem,
            crate::models::item::AdjustCopies,
            crate::api::ItemPage,
            // Readers
            crate::models::reader::Reader,
            crate::models::reader::CreateReader,
            crate::models::reader::UpdateReader,
            crate::api::ReaderPage,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanStatus,
            crate::models::loan::LoanDetails,
            crate::models::loan::CreateLoan,
            crate::models::loan::LoanReceipt,
            loans::ReturnResponse,
            crate::api::LoanPage,
            // Stats
            crate::models::LibrarySummary,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "items", description = "Catalog items and copy counts"),
        (name = "readers", description = "Reader registry"),
        (name = "loans", description = "Loan ledger"),
        (name = "stats", description = "Statistics")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
