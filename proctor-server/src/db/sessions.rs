//! Session row queries

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use proctor_common::models::{session_status, Session};

use crate::Result;

pub async fn get(pool: &SqlitePool, session_id: Uuid) -> Result<Option<Session>> {
    let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?")
        .bind(session_id.to_string())
        .fetch_optional(pool)
        .await?;
    Ok(session)
}

/// Any existing attempt by this student at this exam
pub async fn find_for_student_exam(
    pool: &SqlitePool,
    student_id: &str,
    exam_id: Uuid,
) -> Result<Option<Session>> {
    let session = sqlx::query_as::<_, Session>(
        "SELECT * FROM sessions WHERE student_id = ? AND exam_id = ?",
    )
    .bind(student_id)
    .bind(exam_id.to_string())
    .fetch_optional(pool)
    .await?;
    Ok(session)
}

/// Create a fresh active session with a full integrity score
pub async fn create(pool: &SqlitePool, student_id: &str, exam_id: Uuid) -> Result<Session> {
    let session = Session {
        id: Uuid::new_v4().to_string(),
        student_id: student_id.to_string(),
        exam_id: exam_id.to_string(),
        status: session_status::ACTIVE.to_string(),
        integrity_score: 100.0,
        started_at: Utc::now(),
        finished_at: None,
    };
    sqlx::query(
        r#"
        INSERT INTO sessions (id, student_id, exam_id, status, integrity_score, started_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&session.id)
    .bind(&session.student_id)
    .bind(&session.exam_id)
    .bind(&session.status)
    .bind(session.integrity_score)
    .bind(session.started_at)
    .execute(pool)
    .await?;
    Ok(session)
}

/// Transition `active` → `completed`. Returns false when the session
/// was not active (double finish).
pub async fn finish(pool: &SqlitePool, session_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE sessions SET status = ?, finished_at = ? WHERE id = ? AND status = ?",
    )
    .bind(session_status::COMPLETED)
    .bind(Utc::now())
    .bind(session_id.to_string())
    .bind(session_status::ACTIVE)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Claim the `completed` → `graded` transition for a grading run.
///
/// The conditional UPDATE makes the transition single-writer: at most
/// one concurrent run observes a row change.
pub async fn claim_for_grading(pool: &SqlitePool, session_id: Uuid) -> Result<bool> {
    let result = sqlx::query("UPDATE sessions SET status = ? WHERE id = ? AND status = ?")
        .bind(session_status::GRADED)
        .bind(session_id.to_string())
        .bind(session_status::COMPLETED)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}
