//! Loans on PostgreSQL

use chrono::NaiveDate;
use sqlx::PgConnection;

use super::Repository;
use crate::{
    error::{AppError, AppResult},
    models::{
        loan::{Loan, LoanDetailsRow, LoanQuery, LoanStatus, NewLoan},
        Page,
    },
};

const DETAILS_SELECT: &str = r#"
    SELECT l.id, l.item_id, l.reader_id, l.librarian_id, l.loan_date, l.due_date,
           l.return_date, l.returned_by, l.notes,
           i.title AS item_title, i.author AS item_author,
           r.name AS reader_name, r.identifier AS reader_identifier
    FROM loans l
    JOIN items i ON i.id = l.item_id
    JOIN readers r ON r.id = l.reader_id
"#;

impl Repository {
    /// Get loan with item and reader names
    pub async fn loans_get_details(&self, id: i32) -> AppResult<LoanDetailsRow> {
        let query = format!("{} WHERE l.id = $1", DETAILS_SELECT);
        sqlx::query_as::<_, LoanDetailsRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", id)))
    }

    /// List loans, newest first
    pub async fn loans_search(
        &self,
        query: &LoanQuery,
        today: NaiveDate,
        page: Page,
    ) -> AppResult<(Vec<LoanDetailsRow>, i64)> {
        let mut conditions = Vec::new();
        let mut binds_today = false;

        if let Some(reader_id) = query.reader_id {
            conditions.push(format!("l.reader_id = {}", reader_id));
        }
        if let Some(item_id) = query.item_id {
            conditions.push(format!("l.item_id = {}", item_id));
        }
        match query.status {
            Some(LoanStatus::Open) => conditions.push("l.return_date IS NULL".to_string()),
            Some(LoanStatus::Overdue) => {
                conditions.push("l.return_date IS NULL AND l.due_date < $1".to_string());
                binds_today = true;
            }
            Some(LoanStatus::Returned) => conditions.push("l.return_date IS NOT NULL".to_string()),
            None => {}
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_query = format!("SELECT COUNT(*) FROM loans l {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        if binds_today {
            count_builder = count_builder.bind(today);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "{} {} ORDER BY l.loan_date DESC, l.id DESC LIMIT {} OFFSET {}",
            DETAILS_SELECT,
            where_clause,
            page.per_page,
            page.offset()
        );
        let mut builder = sqlx::query_as::<_, LoanDetailsRow>(&select_query);
        if binds_today {
            builder = builder.bind(today);
        }
        let loans = builder.fetch_all(&self.pool).await?;

        Ok((loans, total))
    }

    /// Open loans past their due date
    pub async fn loans_overdue_on(&self, today: NaiveDate) -> AppResult<Vec<LoanDetailsRow>> {
        let query = format!(
            "{} WHERE l.return_date IS NULL AND l.due_date < $1 ORDER BY l.due_date, l.id",
            DETAILS_SELECT
        );
        let loans = sqlx::query_as::<_, LoanDetailsRow>(&query)
            .bind(today)
            .fetch_all(&self.pool)
            .await?;
        Ok(loans)
    }
}

pub(super) async fn lock_loan(conn: &mut PgConnection, id: i32) -> AppResult<Loan> {
    sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", id)))
}

pub(super) async fn insert(conn: &mut PgConnection, loan: &NewLoan) -> AppResult<Loan> {
    let created = sqlx::query_as::<_, Loan>(
        r#"
        INSERT INTO loans (item_id, reader_id, librarian_id, loan_date, due_date, notes)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(loan.item_id)
    .bind(loan.reader_id)
    .bind(loan.librarian_id)
    .bind(loan.loan_date)
    .bind(loan.due_date)
    .bind(&loan.notes)
    .fetch_one(&mut *conn)
    .await?;
    Ok(created)
}

/// Set the return date once; a closed loan is never touched again
pub(super) async fn close(conn: &mut PgConnection, id: i32, returned_on: NaiveDate, actor: i32) -> AppResult<Loan> {
    sqlx::query_as::<_, Loan>(
        r#"
        UPDATE loans SET return_date = $1, returned_by = $2
        WHERE id = $3 AND return_date IS NULL
        RETURNING *
        "#,
    )
    .bind(returned_on)
    .bind(actor)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::Internal(format!("Loan {} was not open when closing", id)))
}
