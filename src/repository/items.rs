//! Catalog items on PostgreSQL

use chrono::Utc;
use sqlx::PgConnection;

use super::{conflict_on_duplicate, like_pattern, Repository};
use crate::{
    error::{AppError, AppResult},
    models::{
        item::{CreateItem, Item, ItemQuery, UpdateItem},
        Page,
    },
};

impl Repository {
    /// Get item by ID
    pub async fn items_get_by_id(&self, id: i32) -> AppResult<Item> {
        sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", id)))
    }

    /// Search items with pagination, ordered by title
    pub async fn items_search(&self, query: &ItemQuery, page: Page) -> AppResult<(Vec<Item>, i64)> {
        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(term) = query.search.as_deref().filter(|t| !t.trim().is_empty()) {
            params.push(like_pattern(term));
            let idx = params.len();
            conditions.push(format!(
                "(LOWER(title) LIKE ${idx} ESCAPE '\\' OR LOWER(author) LIKE ${idx} ESCAPE '\\' OR LOWER(isbn) LIKE ${idx} ESCAPE '\\')"
            ));
        }

        if query.available_only.unwrap_or(false) {
            conditions.push("available_copies > 0".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_query = format!("SELECT COUNT(*) FROM items {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "SELECT * FROM items {} ORDER BY LOWER(title), id LIMIT {} OFFSET {}",
            where_clause,
            page.per_page,
            page.offset()
        );
        let mut builder = sqlx::query_as::<_, Item>(&select_query);
        for param in &params {
            builder = builder.bind(param);
        }
        let items = builder.fetch_all(&self.pool).await?;

        Ok((items, total))
    }

    /// Items with at least one copy on the shelf matching a term
    pub async fn items_available_matching(&self, term: &str, limit: i64) -> AppResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT * FROM items
            WHERE available_copies > 0
              AND (LOWER(title) LIKE $1 ESCAPE '\' OR LOWER(author) LIKE $1 ESCAPE '\' OR LOWER(isbn) LIKE $1 ESCAPE '\')
            ORDER BY LOWER(title), id
            LIMIT $2
            "#,
        )
        .bind(like_pattern(term))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Check if an ISBN is already catalogued
    pub async fn items_isbn_exists(&self, isbn: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM items WHERE isbn = $1)")
            .bind(isbn)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Create an item with every copy on the shelf
    pub async fn items_insert(&self, item: &CreateItem) -> AppResult<Item> {
        if self.items_isbn_exists(&item.isbn).await? {
            return Err(AppError::Conflict(format!("ISBN {} is already catalogued", item.isbn)));
        }

        let now = Utc::now();
        let created = sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (title, author, publisher, publication_year, isbn, genre,
                               total_copies, available_copies, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8, $8)
            RETURNING *
            "#,
        )
        .bind(&item.title)
        .bind(&item.author)
        .bind(&item.publisher)
        .bind(item.publication_year)
        .bind(&item.isbn)
        .bind(&item.genre)
        .bind(item.total_copies)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_on_duplicate(format!("ISBN {} is already catalogued", item.isbn)))?;
        Ok(created)
    }
}

pub(super) async fn lock_item(conn: &mut PgConnection, id: i32) -> AppResult<Item> {
    sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Item {} not found", id)))
}

pub(super) async fn save_copies(conn: &mut PgConnection, item: &Item) -> AppResult<Item> {
    let saved = sqlx::query_as::<_, Item>(
        r#"
        UPDATE items SET total_copies = $1, available_copies = $2, updated_at = $3
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(item.total_copies)
    .bind(item.available_copies)
    .bind(Utc::now())
    .bind(item.id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Item {} not found", item.id)))?;
    Ok(saved)
}

pub(super) async fn update_details(conn: &mut PgConnection, id: i32, data: &UpdateItem) -> AppResult<Item> {
    if let Some(ref isbn) = data.isbn {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM items WHERE isbn = $1 AND id != $2)",
        )
        .bind(isbn)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
        if taken {
            return Err(AppError::Conflict(format!("ISBN {} is already catalogued", isbn)));
        }
    }

    let mut sets = vec!["updated_at = $1".to_string()];
    let mut idx = 2;

    macro_rules! add_field {
        ($field:expr, $name:expr) => {
            if $field.is_some() {
                sets.push(format!("{} = ${}", $name, idx));
                idx += 1;
            }
        };
    }

    add_field!(data.title, "title");
    add_field!(data.author, "author");
    add_field!(data.publisher, "publisher");
    add_field!(data.publication_year, "publication_year");
    add_field!(data.isbn, "isbn");
    add_field!(data.genre, "genre");

    let query = format!("UPDATE items SET {} WHERE id = ${} RETURNING *", sets.join(", "), idx);

    let mut builder = sqlx::query_as::<_, Item>(&query).bind(Utc::now());

    macro_rules! bind_field {
        ($field:expr) => {
            if let Some(ref val) = $field {
                builder = builder.bind(val);
            }
        };
    }

    bind_field!(data.title);
    bind_field!(data.author);
    bind_field!(data.publisher);
    bind_field!(data.publication_year);
    bind_field!(data.isbn);
    bind_field!(data.genre);

    builder
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(conflict_on_duplicate(format!(
            "ISBN {} is already catalogued",
            data.isbn.as_deref().unwrap_or_default()
        )))?
        .ok_or_else(|| AppError::NotFound(format!("Item {} not found", id)))
}

pub(super) async fn delete(conn: &mut PgConnection, id: i32) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM items WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Item {} not found", id)));
    }
    Ok(())
}
