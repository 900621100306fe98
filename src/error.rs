//! Error types for Acervo server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// Numeric error codes carried in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchReader = 4,
    NoSuchItem = 5,
    ItemNotAvailable = 7,
    Duplicate = 8,
    NotBorrowable = 12,
    BadValue = 18,
    NoSuchData = 20,
    ReaderHasOpenLoans = 21,
    AlreadyReturned = 22,
}

/// Business-rule rejections raised by the loan ledger.
///
/// Every variant carries the names needed to render a message for the
/// librarian; none of them is a transient fault, so nothing is retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("No copies of '{title}' are available for loan")]
    NoCopiesAvailable { item_id: i32, title: String },

    #[error("Reader '{name}' is inactive and cannot borrow")]
    ReaderInactive { reader_id: i32, name: String },

    #[error("Loan {loan_id} was already returned on {returned_on}")]
    LoanAlreadyClosed { loan_id: i32, returned_on: NaiveDate },

    #[error("Reader '{name}' still has {open_loans} open loan(s)")]
    ReaderHasOpenLoans {
        reader_id: i32,
        name: String,
        open_loans: i64,
    },

    #[error("Copy count {requested} for item {item_id} is negative")]
    NegativeCopyCount { item_id: i32, requested: i32 },
}

impl LedgerError {
    /// Soft outcomes are reported as warnings; the operation was a no-op.
    pub fn is_soft(&self) -> bool {
        matches!(self, LedgerError::LoanAlreadyClosed { .. })
    }

    fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            LedgerError::NoCopiesAvailable { .. } => {
                (StatusCode::CONFLICT, ErrorCode::ItemNotAvailable)
            }
            LedgerError::ReaderInactive { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::NotBorrowable)
            }
            LedgerError::LoanAlreadyClosed { .. } => {
                (StatusCode::CONFLICT, ErrorCode::AlreadyReturned)
            }
            LedgerError::ReaderHasOpenLoans { .. } => {
                (StatusCode::CONFLICT, ErrorCode::ReaderHasOpenLoans)
            }
            LedgerError::NegativeCopyCount { .. } => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue)
            }
        }
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl AppError {
    /// The ledger rejection wrapped by this error, if any
    pub fn as_ledger(&self) -> Option<&LedgerError> {
        match self {
            AppError::Ledger(e) => Some(e),
            _ => None,
        }
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => {
                let code = if msg.starts_with("Reader") {
                    ErrorCode::NoSuchReader
                } else if msg.starts_with("Item") {
                    ErrorCode::NoSuchItem
                } else {
                    ErrorCode::NoSuchData
                };
                (StatusCode::NOT_FOUND, code, msg.clone())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, ErrorCode::Duplicate, msg.clone())
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
            AppError::BusinessRule(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::Failure, msg.clone())
            }
            AppError::Ledger(e) => {
                let (status, code) = e.status_and_code();
                (status, code, e.to_string())
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
