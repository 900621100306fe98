//! Reader registry endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        reader::{CreateReader, Reader, ReaderQuery, UpdateReader},
        Actor,
    },
};

use super::{PaginatedResponse, ReaderPage, SearchQuery};

/// List readers with search and pagination
#[utoipa::path(
    get,
    path = "/readers",
    tag = "readers",
    params(ReaderQuery),
    responses(
        (status = 200, description = "Readers ordered by name", body = ReaderPage)
    )
)]
pub async fn list_readers(
    State(state): State<crate::AppState>,
    Query(query): Query<ReaderQuery>,
) -> AppResult<Json<PaginatedResponse<Reader>>> {
    let (items, total) = state.services.readers.list_readers(&query).await?;
    let page = state.services.paging().page(query.page, query.per_page);

    Ok(Json(PaginatedResponse {
        items,
        total,
        page: page.page,
        per_page: page.per_page,
    }))
}

/// Active readers matching a term
#[utoipa::path(
    get,
    path = "/readers/active",
    tag = "readers",
    params(SearchQuery),
    responses(
        (status = 200, description = "Active readers ordered by name", body = Vec<Reader>)
    )
)]
pub async fn search_active(
    State(state): State<crate::AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<Reader>>> {
    let readers = state
        .services
        .readers
        .search_active(query.q.as_deref().unwrap_or(""))
        .await?;
    Ok(Json(readers))
}

/// Get reader by ID
#[utoipa::path(
    get,
    path = "/readers/{id}",
    tag = "readers",
    params(
        ("id" = i32, Path, description = "Reader ID")
    ),
    responses(
        (status = 200, description = "Reader details", body = Reader),
        (status = 404, description = "Reader not found")
    )
)]
pub async fn get_reader(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Reader>> {
    let reader = state.services.readers.get_reader(id).await?;
    Ok(Json(reader))
}

/// Register a new reader
#[utoipa::path(
    post,
    path = "/readers",
    tag = "readers",
    params(
        ("x-actor-id" = i32, Header, description = "Acting librarian")
    ),
    request_body = CreateReader,
    responses(
        (status = 201, description = "Reader created", body = Reader),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Identifier already registered")
    )
)]
pub async fn create_reader(
    State(state): State<crate::AppState>,
    _actor: Actor,
    Json(reader): Json<CreateReader>,
) -> AppResult<(StatusCode, Json<Reader>)> {
    let created = state.services.readers.create_reader(&reader).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a reader's contact details
#[utoipa::path(
    put,
    path = "/readers/{id}",
    tag = "readers",
    params(
        ("id" = i32, Path, description = "Reader ID"),
        ("x-actor-id" = i32, Header, description = "Acting librarian")
    ),
    request_body = UpdateReader,
    responses(
        (status = 200, description = "Reader updated", body = Reader),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Reader not found"),
        (status = 409, description = "Identifier already registered")
    )
)]
pub async fn update_reader(
    State(state): State<crate::AppState>,
    _actor: Actor,
    Path(id): Path<i32>,
    Json(data): Json<UpdateReader>,
) -> AppResult<Json<Reader>> {
    let updated = state.services.readers.update_reader(id, &data).await?;
    Ok(Json(updated))
}

/// Deactivate a reader with no open loans
#[utoipa::path(
    post,
    path = "/readers/{id}/deactivate",
    tag = "readers",
    params(
        ("id" = i32, Path, description = "Reader ID"),
        ("x-actor-id" = i32, Header, description = "Acting librarian")
    ),
    responses(
        (status = 200, description = "Reader deactivated", body = Reader),
        (status = 401, description = "Missing actor"),
        (status = 404, description = "Reader not found"),
        (status = 409, description = "Reader has open loans")
    )
)]
pub async fn deactivate_reader(
    State(state): State<crate::AppState>,
    actor: Actor,
    Path(id): Path<i32>,
) -> AppResult<Json<Reader>> {
    let reader = state.services.ledger.deactivate_reader(actor, id).await?;
    Ok(Json(reader))
}

/// Reactivate a reader
#[utoipa::path(
    post,
    path = "/readers/{id}/reactivate",
    tag = "readers",
    params(
        ("id" = i32, Path, description = "Reader ID"),
        ("x-actor-id" = i32, Header, description = "Acting librarian")
    ),
    responses(
        (status = 200, description = "Reader active", body = Reader),
        (status = 404, description = "Reader not found")
    )
)]
pub async fn reactivate_reader(
    State(state): State<crate::AppState>,
    actor: Actor,
    Path(id): Path<i32>,
) -> AppResult<Json<Reader>> {
    tracing::debug!(actor = actor.id, reader_id = id, "Reactivating reader");

    let reader = state.services.ledger.reactivate_reader(id).await?;
    Ok(Json(reader))
}
