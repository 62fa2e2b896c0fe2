//! Database models
//!
//! Row structs for the proctoring schema. Ids are stored as TEXT
//! (hyphenated UUID strings); JSON-valued columns are stored as TEXT
//! and parsed at the call site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session lifecycle states: `active` → `completed` → `graded`
pub mod session_status {
    pub const ACTIVE: &str = "active";
    pub const COMPLETED: &str = "completed";
    pub const GRADED: &str = "graded";
}

/// User roles recognized by the authorization checks
pub mod role {
    pub const STUDENT: &str = "student";
    pub const PROFESSOR: &str = "professor";
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Exam {
    pub id: String,
    pub professor_id: String,
    pub title: String,
    pub duration_minutes: i64,
    /// Fraction of marks deducted for a wrong MCQ answer (0.0 disables)
    pub negative_marking: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Question {
    pub id: String,
    pub exam_id: String,
    pub text: String,
    /// One of `mcq`, `subjective`, `code`
    pub qtype: String,
    /// JSON array of answer options (mcq only)
    pub options: Option<String>,
    pub correct_answer: String,
    /// JSON array of rubric keywords (subjective only)
    pub keywords: Option<String>,
    pub marks: f64,
    pub order_index: i64,
    pub code_language: Option<String>,
    /// JSON array of `{input, expected_output}` objects (code only)
    pub test_cases: Option<String>,
}

/// One exam attempt by one student
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: String,
    pub student_id: String,
    pub exam_id: String,
    pub status: String,
    /// Live trust score in [0, 100], monotonically non-increasing
    pub integrity_score: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// One detected proctoring incident. Append-only: never updated or
/// deleted after insert.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ViolationRecord {
    pub id: String,
    pub session_id: String,
    pub violation_type: String,
    pub confidence: f64,
    /// JSON object with channel-specific detail
    pub metadata: String,
    pub created_at: DateTime<Utc>,
}

/// One answer to one question within a session
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ResponseRow {
    pub id: String,
    pub session_id: String,
    pub question_id: String,
    pub answer: Option<String>,
    pub score: Option<f64>,
    /// JSON component breakdown written by the grader
    /// (subjective/code only)
    pub grading_breakdown: Option<String>,
    pub graded_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub time_spent_seconds: Option<i64>,
}

/// Terminal, immutable summary of a graded session
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ResultRow {
    pub id: String,
    pub session_id: String,
    pub total_score: f64,
    pub percentage: f64,
    /// Integrity score copied at grading time, not live-linked
    pub integrity_score: f64,
    /// JSON object mapping violation_type → count
    pub violations_summary: String,
    pub generated_at: DateTime<Utc>,
}
