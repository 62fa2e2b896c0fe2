//! Response row queries
//!
//! One row per (session, question); submission uses upsert semantics
//! so a resubmission before finish updates the row in place.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use proctor_common::models::ResponseRow;

use crate::Result;

pub async fn get(
    pool: &SqlitePool,
    session_id: Uuid,
    question_id: Uuid,
) -> Result<Option<ResponseRow>> {
    let response = sqlx::query_as::<_, ResponseRow>(
        "SELECT * FROM responses WHERE session_id = ? AND question_id = ?",
    )
    .bind(session_id.to_string())
    .bind(question_id.to_string())
    .fetch_optional(pool)
    .await?;
    Ok(response)
}

pub async fn list_for_session(pool: &SqlitePool, session_id: Uuid) -> Result<Vec<ResponseRow>> {
    let responses =
        sqlx::query_as::<_, ResponseRow>("SELECT * FROM responses WHERE session_id = ?")
            .bind(session_id.to_string())
            .fetch_all(pool)
            .await?;
    Ok(responses)
}

/// Most recent submission time in the session, used as the start
/// anchor when a new question is first answered
pub async fn last_submitted_at(
    pool: &SqlitePool,
    session_id: Uuid,
) -> Result<Option<DateTime<Utc>>> {
    let row: Option<(Option<DateTime<Utc>>,)> = sqlx::query_as(
        "SELECT submitted_at FROM responses WHERE session_id = ? ORDER BY submitted_at DESC LIMIT 1",
    )
    .bind(session_id.to_string())
    .fetch_optional(pool)
    .await?;
    Ok(row.and_then(|r| r.0))
}

pub async fn insert(
    pool: &SqlitePool,
    session_id: Uuid,
    question_id: Uuid,
    answer: &str,
    started_at: DateTime<Utc>,
    submitted_at: DateTime<Utc>,
) -> Result<()> {
    let time_spent = (submitted_at - started_at).num_seconds().max(0);
    sqlx::query(
        r#"
        INSERT INTO responses (id, session_id, question_id, answer, started_at, submitted_at, time_spent_seconds)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(session_id.to_string())
    .bind(question_id.to_string())
    .bind(answer)
    .bind(started_at)
    .bind(submitted_at)
    .bind(time_spent)
    .execute(pool)
    .await?;
    Ok(())
}

/// Resubmission before finish: replace the answer and accumulate time
pub async fn update_answer(
    pool: &SqlitePool,
    response: &ResponseRow,
    answer: &str,
    submitted_at: DateTime<Utc>,
) -> Result<()> {
    let additional = response
        .submitted_at
        .map(|prev| (submitted_at - prev).num_seconds().max(0))
        .unwrap_or(0);
    let time_spent = response.time_spent_seconds.unwrap_or(0) + additional;
    sqlx::query(
        "UPDATE responses SET answer = ?, submitted_at = ?, time_spent_seconds = ? WHERE id = ?",
    )
    .bind(answer)
    .bind(submitted_at)
    .bind(time_spent)
    .bind(&response.id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Write a grading outcome back onto the response
pub async fn set_score(
    pool: &SqlitePool,
    response_id: &str,
    score: f64,
    breakdown: Option<&str>,
    graded_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE responses SET score = ?, grading_breakdown = ?, graded_at = ? WHERE id = ?",
    )
    .bind(score)
    .bind(breakdown)
    .bind(graded_at)
    .bind(response_id)
    .execute(pool)
    .await?;
    Ok(())
}
