//! Result row queries
//!
//! One immutable row per graded session.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use proctor_common::models::ResultRow;

use crate::Result;

pub async fn get_by_session(pool: &SqlitePool, session_id: Uuid) -> Result<Option<ResultRow>> {
    let result = sqlx::query_as::<_, ResultRow>("SELECT * FROM results WHERE session_id = ?")
        .bind(session_id.to_string())
        .fetch_optional(pool)
        .await?;
    Ok(result)
}

pub async fn insert(
    pool: &SqlitePool,
    session_id: Uuid,
    total_score: f64,
    percentage: f64,
    integrity_score: f64,
    violations_summary: &str,
) -> Result<ResultRow> {
    let row = ResultRow {
        id: Uuid::new_v4().to_string(),
        session_id: session_id.to_string(),
        total_score,
        percentage,
        integrity_score,
        violations_summary: violations_summary.to_string(),
        generated_at: Utc::now(),
    };
    sqlx::query(
        r#"
        INSERT INTO results (id, session_id, total_score, percentage, integrity_score, violations_summary, generated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.id)
    .bind(&row.session_id)
    .bind(row.total_score)
    .bind(row.percentage)
    .bind(row.integrity_score)
    .bind(&row.violations_summary)
    .bind(row.generated_at)
    .execute(pool)
    .await?;
    Ok(row)
}
