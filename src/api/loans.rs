//! Loan management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::{
        loan::{CreateLoan, LoanDetails, LoanQuery, LoanReceipt},
        Actor,
    },
};

use super::{LoanPage, PaginatedResponse};

/// Return response with loan details
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    /// `returned`, or `already_returned` when the loan was closed before
    pub status: String,
    /// Loan details
    pub loan: LoanDetails,
    /// Set when the request did nothing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// List loans, newest first
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    params(LoanQuery),
    responses(
        (status = 200, description = "Loans", body = LoanPage)
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<PaginatedResponse<LoanDetails>>> {
    let (items, total) = state.services.loans.list_loans(&query).await?;
    let page = state.services.paging().page(query.page, query.per_page);

    Ok(Json(PaginatedResponse {
        items,
        total,
        page: page.page,
        per_page: page.per_page,
    }))
}

/// Open loans past their due date
#[utoipa::path(
    get,
    path = "/loans/overdue",
    tag = "loans",
    responses(
        (status = 200, description = "Overdue loans, oldest due date first", body = Vec<LoanDetails>)
    )
)]
pub async fn overdue_loans(State(state): State<crate::AppState>) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.overdue_loans().await?;
    Ok(Json(loans))
}

/// Get loan details by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.loans.get_loan(id).await?;
    Ok(Json(loan))
}

/// Get open loans for a specific reader
#[utoipa::path(
    get,
    path = "/readers/{id}/loans",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Reader ID")
    ),
    responses(
        (status = 200, description = "Reader's open loans", body = Vec<LoanDetails>),
        (status = 404, description = "Reader not found")
    )
)]
pub async fn get_reader_loans(
    State(state): State<crate::AppState>,
    Path(reader_id): Path<i32>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.get_reader_loans(reader_id).await?;
    Ok(Json(loans))
}

/// Create a new loan (lend one copy of an item)
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    params(
        ("x-actor-id" = i32, Header, description = "Acting librarian")
    ),
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan created", body = LoanReceipt),
        (status = 400, description = "Invalid due date"),
        (status = 401, description = "Missing actor"),
        (status = 404, description = "Reader or item not found"),
        (status = 409, description = "No copies available"),
        (status = 422, description = "Reader inactive")
    )
)]
pub async fn create_loan(
    State(state): State<crate::AppState>,
    actor: Actor,
    Json(request): Json<CreateLoan>,
) -> AppResult<(StatusCode, Json<LoanReceipt>)> {
    let receipt = state.services.ledger.create_loan(actor, &request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Return a borrowed item
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Loan ID"),
        ("x-actor-id" = i32, Header, description = "Acting librarian")
    ),
    responses(
        (status = 200, description = "Item returned, or loan was already closed", body = ReturnResponse),
        (status = 401, description = "Missing actor"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    actor: Actor,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<ReturnResponse>> {
    match state.services.ledger.return_loan(actor, loan_id).await {
        Ok(_) => {
            let loan = state.services.loans.get_loan(loan_id).await?;
            Ok(Json(ReturnResponse {
                status: "returned".to_string(),
                loan,
                warning: None,
            }))
        }
        Err(AppError::Ledger(err)) if err.is_soft() => {
            let loan = state.services.loans.get_loan(loan_id).await?;
            Ok(Json(ReturnResponse {
                status: "already_returned".to_string(),
                loan,
                warning: Some(err.to_string()),
            }))
        }
        Err(err) => Err(err),
    }
}
