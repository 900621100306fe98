//! Item (catalog) endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        item::{AdjustCopies, CreateItem, Item, ItemQuery, UpdateItem},
        Actor,
    },
};

use super::{ItemPage, PaginatedResponse, SearchQuery};

/// List items with search and pagination
#[utoipa::path(
    get,
    path = "/items",
    tag = "items",
    params(ItemQuery),
    responses(
        (status = 200, description = "Items ordered by title", body = ItemPage)
    )
)]
pub async fn list_items(
    State(state): State<crate::AppState>,
    Query(query): Query<ItemQuery>,
) -> AppResult<Json<PaginatedResponse<Item>>> {
    let (items, total) = state.services.catalog.list_items(&query).await?;
    let page = state.services.paging().page(query.page, query.per_page);

    Ok(Json(PaginatedResponse {
        items,
        total,
        page: page.page,
        per_page: page.per_page,
    }))
}

/// Items with copies on the shelf matching a term
#[utoipa::path(
    get,
    path = "/items/available",
    tag = "items",
    params(SearchQuery),
    responses(
        (status = 200, description = "Lendable items ordered by title", body = Vec<Item>)
    )
)]
pub async fn search_available(
    State(state): State<crate::AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<Item>>> {
    let items = state
        .services
        .catalog
        .search_available(query.q.as_deref().unwrap_or(""))
        .await?;
    Ok(Json(items))
}

/// Get item details by ID
#[utoipa::path(
    get,
    path = "/items/{id}",
    tag = "items",
    params(
        ("id" = i32, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item details", body = Item),
        (status = 404, description = "Item not found")
    )
)]
pub async fn get_item(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Item>> {
    let item = state.services.catalog.get_item(id).await?;
    Ok(Json(item))
}

/// Catalogue a new item
#[utoipa::path(
    post,
    path = "/items",
    tag = "items",
    params(
        ("x-actor-id" = i32, Header, description = "Acting librarian")
    ),
    request_body = CreateItem,
    responses(
        (status = 201, description = "Item created", body = Item),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "ISBN already catalogued")
    )
)]
pub async fn create_item(
    State(state): State<crate::AppState>,
    actor: Actor,
    Json(item): Json<CreateItem>,
) -> AppResult<(StatusCode, Json<Item>)> {
    tracing::debug!(actor = actor.id, isbn = %item.isbn, "Creating item");

    let created = state.services.catalog.create_item(&item).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update an existing item
#[utoipa::path(
    put,
    path = "/items/{id}",
    tag = "items",
    params(
        ("id" = i32, Path, description = "Item ID"),
        ("x-actor-id" = i32, Header, description = "Acting librarian")
    ),
    request_body = UpdateItem,
    responses(
        (status = 200, description = "Item updated", body = Item),
        (status = 400, description = "Invalid input or negative copy count"),
        (status = 404, description = "Item not found"),
        (status = 409, description = "ISBN already catalogued")
    )
)]
pub async fn update_item(
    State(state): State<crate::AppState>,
    _actor: Actor,
    Path(id): Path<i32>,
    Json(data): Json<UpdateItem>,
) -> AppResult<Json<Item>> {
    let updated = state.services.catalog.update_item(id, &data).await?;
    Ok(Json(updated))
}

/// Set the number of copies an item holds
#[utoipa::path(
    put,
    path = "/items/{id}/copies",
    tag = "items",
    params(
        ("id" = i32, Path, description = "Item ID"),
        ("x-actor-id" = i32, Header, description = "Acting librarian")
    ),
    request_body = AdjustCopies,
    responses(
        (status = 200, description = "Counters after the adjustment", body = Item),
        (status = 400, description = "Negative copy count"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn adjust_copies(
    State(state): State<crate::AppState>,
    _actor: Actor,
    Path(id): Path<i32>,
    Json(request): Json<AdjustCopies>,
) -> AppResult<Json<Item>> {
    let item = state
        .services
        .catalog
        .adjust_copies(id, request.total_copies)
        .await?;
    Ok(Json(item))
}

/// Delete an item that was never lent
#[utoipa::path(
    delete,
    path = "/items/{id}",
    tag = "items",
    params(
        ("id" = i32, Path, description = "Item ID"),
        ("x-actor-id" = i32, Header, description = "Acting librarian")
    ),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 404, description = "Item not found"),
        (status = 422, description = "Item has loan history")
    )
)]
pub async fn delete_item(
    State(state): State<crate::AppState>,
    _actor: Actor,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_item(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
