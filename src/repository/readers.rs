//! Reader registry on PostgreSQL

use chrono::Utc;
use sqlx::PgConnection;

use super::{conflict_on_duplicate, like_pattern, Repository};
use crate::{
    error::{AppError, AppResult},
    models::{
        reader::{CreateReader, Reader, ReaderQuery, UpdateReader},
        Page,
    },
};

impl Repository {
    /// Get reader by ID
    pub async fn readers_get_by_id(&self, id: i32) -> AppResult<Reader> {
        sqlx::query_as::<_, Reader>("SELECT * FROM readers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reader {} not found", id)))
    }

    /// Check if an external identifier is already registered
    pub async fn readers_identifier_exists(&self, identifier: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM readers WHERE LOWER(identifier) = LOWER($1) AND id != $2)",
        )
        .bind(identifier)
        .bind(exclude_id.unwrap_or(0))
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Search readers with pagination, ordered by name
    pub async fn readers_search(&self, query: &ReaderQuery, page: Page) -> AppResult<(Vec<Reader>, i64)> {
        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(term) = query.search.as_deref().filter(|t| !t.trim().is_empty()) {
            params.push(like_pattern(term));
            let idx = params.len();
            conditions.push(format!("(LOWER(name) LIKE ${idx} ESCAPE '\\' OR LOWER(identifier) LIKE ${idx} ESCAPE '\\')"));
        }

        match query.active {
            Some(true) => conditions.push("active".to_string()),
            Some(false) => conditions.push("NOT active".to_string()),
            None => {}
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_query = format!("SELECT COUNT(*) FROM readers {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "SELECT * FROM readers {} ORDER BY LOWER(name), id LIMIT {} OFFSET {}",
            where_clause,
            page.per_page,
            page.offset()
        );
        let mut builder = sqlx::query_as::<_, Reader>(&select_query);
        for param in &params {
            builder = builder.bind(param);
        }
        let readers = builder.fetch_all(&self.pool).await?;

        Ok((readers, total))
    }

    /// Active readers matching a term
    pub async fn readers_active_matching(&self, term: &str, limit: i64) -> AppResult<Vec<Reader>> {
        let readers = sqlx::query_as::<_, Reader>(
            r#"
            SELECT * FROM readers
            WHERE active AND (LOWER(name) LIKE $1 ESCAPE '\' OR LOWER(identifier) LIKE $1 ESCAPE '\')
            ORDER BY LOWER(name), id
            LIMIT $2
            "#,
        )
        .bind(like_pattern(term))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(readers)
    }

    /// Register a new, active reader
    pub async fn readers_insert(&self, reader: &CreateReader) -> AppResult<Reader> {
        if self.readers_identifier_exists(&reader.identifier, None).await? {
            return Err(AppError::Conflict(format!(
                "Identifier {} is already registered",
                reader.identifier
            )));
        }

        let now = Utc::now();
        let created = sqlx::query_as::<_, Reader>(
            r#"
            INSERT INTO readers (name, identifier, email, phone, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, TRUE, $5, $5)
            RETURNING *
            "#,
        )
        .bind(&reader.name)
        .bind(&reader.identifier)
        .bind(&reader.email)
        .bind(&reader.phone)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_on_duplicate(format!(
            "Identifier {} is already registered",
            reader.identifier
        )))?;
        Ok(created)
    }

    /// Update contact details of a reader
    pub async fn readers_update_reader(&self, id: i32, data: &UpdateReader) -> AppResult<Reader> {
        if let Some(ref identifier) = data.identifier {
            if self.readers_identifier_exists(identifier, Some(id)).await? {
                return Err(AppError::Conflict(format!("Identifier {} is already registered", identifier)));
            }
        }

        let reader = sqlx::query_as::<_, Reader>(
            r#"
            UPDATE readers SET
                name = COALESCE($1, name),
                identifier = COALESCE($2, identifier),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                updated_at = $5
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.identifier)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conflict_on_duplicate(format!(
            "Identifier {} is already registered",
            data.identifier.as_deref().unwrap_or_default()
        )))?
        .ok_or_else(|| AppError::NotFound(format!("Reader {} not found", id)))?;
        Ok(reader)
    }
}

/// `lock` is either `FOR SHARE` or `FOR UPDATE`
pub(super) async fn lock_reader(conn: &mut PgConnection, id: i32, lock: &str) -> AppResult<Reader> {
    let query = format!("SELECT * FROM readers WHERE id = $1 {}", lock);
    sqlx::query_as::<_, Reader>(&query)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Reader {} not found", id)))
}

pub(super) async fn set_active(
    conn: &mut PgConnection,
    id: i32,
    active: bool,
    actor: Option<i32>,
) -> AppResult<Reader> {
    let now = Utc::now();
    let reader = sqlx::query_as::<_, Reader>(
        r#"
        UPDATE readers SET
            active = $1,
            deactivated_at = CASE WHEN $1 THEN NULL ELSE $2 END,
            deactivated_by = CASE WHEN $1 THEN NULL ELSE $3 END,
            updated_at = $2
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(active)
    .bind(now)
    .bind(actor)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Reader {} not found", id)))?;
    Ok(reader)
}
