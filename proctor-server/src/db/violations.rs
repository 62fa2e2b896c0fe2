//! Violation log queries
//!
//! The log is append-only; inserts happen inside the ledger's
//! transaction, so only reads live here.

use std::collections::HashMap;

use sqlx::SqlitePool;
use uuid::Uuid;

use proctor_common::models::ViolationRecord;

use crate::Result;

/// Ordered violation history for a session (oldest first)
pub async fn list_for_session(
    pool: &SqlitePool,
    session_id: Uuid,
) -> Result<Vec<ViolationRecord>> {
    let records = sqlx::query_as::<_, ViolationRecord>(
        "SELECT * FROM violations WHERE session_id = ? ORDER BY created_at ASC, id ASC",
    )
    .bind(session_id.to_string())
    .fetch_all(pool)
    .await?;
    Ok(records)
}

/// Violation counts grouped by type
pub async fn counts_by_type(
    pool: &SqlitePool,
    session_id: Uuid,
) -> Result<HashMap<String, i64>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT violation_type, COUNT(*) FROM violations WHERE session_id = ? GROUP BY violation_type",
    )
    .bind(session_id.to_string())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}
