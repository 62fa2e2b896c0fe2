//! Exam and question queries (read-only for the engines)

use sqlx::SqlitePool;
use uuid::Uuid;

use proctor_common::models::{Exam, Question};

use crate::Result;

pub async fn get(pool: &SqlitePool, exam_id: Uuid) -> Result<Option<Exam>> {
    let exam = sqlx::query_as::<_, Exam>("SELECT * FROM exams WHERE id = ?")
        .bind(exam_id.to_string())
        .fetch_optional(pool)
        .await?;
    Ok(exam)
}

pub async fn list_questions(pool: &SqlitePool, exam_id: &str) -> Result<Vec<Question>> {
    let questions = sqlx::query_as::<_, Question>(
        "SELECT * FROM questions WHERE exam_id = ? ORDER BY order_index ASC",
    )
    .bind(exam_id)
    .fetch_all(pool)
    .await?;
    Ok(questions)
}

pub async fn get_question(pool: &SqlitePool, question_id: Uuid) -> Result<Option<Question>> {
    let question = sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE id = ?")
        .bind(question_id.to_string())
        .fetch_optional(pool)
        .await?;
    Ok(question)
}

/// Sum of marks over the exam's questions
pub async fn total_marks(pool: &SqlitePool, exam_id: &str) -> Result<f64> {
    let total: (Option<f64>,) =
        sqlx::query_as("SELECT SUM(marks) FROM questions WHERE exam_id = ?")
            .bind(exam_id)
            .fetch_one(pool)
            .await?;
    Ok(total.0.unwrap_or(0.0))
}
