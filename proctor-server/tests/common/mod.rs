//! Shared test fixtures: temp database, seeded exam, router builder

// Not every test binary uses every fixture
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

use proctor_common::db::init_database;
use proctor_server::api;
use proctor_server::grading::judge::DisabledJudge;
use proctor_server::grading::scorers::TokenOverlapSimilarity;
use proctor_server::signal::{Detection, DisabledDetector, ObjectDetector};
use proctor_server::state::AppContext;

pub const STUDENT_TOKEN: &str = "token-student-1";
pub const OTHER_STUDENT_TOKEN: &str = "token-student-2";
pub const PROFESSOR_TOKEN: &str = "token-professor";

pub struct TestEnv {
    pub ctx: AppContext,
    pub app: axum::Router,
    pub student_id: String,
    pub other_student_id: String,
    pub professor_id: String,
    pub exam_id: String,
    pub mcq_id: String,
    pub subjective_id: String,
    pub code_id: String,
    // Keeps the database file alive for the test's duration
    _dir: TempDir,
}

/// Detector double returning a fixed detection list for every frame
pub struct StubDetector(pub Vec<Detection>);

impl ObjectDetector for StubDetector {
    fn detect(&self, _image: &[u8]) -> proctor_server::Result<Vec<Detection>> {
        Ok(self.0.clone())
    }
}

pub async fn setup() -> TestEnv {
    setup_with_detector(Arc::new(DisabledDetector)).await
}

pub async fn setup_with_detector(detector: Arc<dyn ObjectDetector>) -> TestEnv {
    let dir = TempDir::new().expect("tempdir");
    let db = init_database(&dir.path().join("proctor-test.db"))
        .await
        .expect("database init");

    let student_id = seed_user(&db, "student@test.example", "Student One", "student").await;
    let other_student_id =
        seed_user(&db, "student2@test.example", "Student Two", "student").await;
    let professor_id = seed_user(&db, "prof@test.example", "Professor", "professor").await;
    seed_token(&db, STUDENT_TOKEN, &student_id, "student").await;
    seed_token(&db, OTHER_STUDENT_TOKEN, &other_student_id, "student").await;
    seed_token(&db, PROFESSOR_TOKEN, &professor_id, "professor").await;

    let exam_id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO exams (id, professor_id, title, duration_minutes, negative_marking, is_active)
        VALUES (?, ?, 'Biology Midterm', 60, 0.25, 1)
        "#,
    )
    .bind(&exam_id)
    .bind(&professor_id)
    .execute(&db)
    .await
    .expect("seed exam");

    let mcq_id = seed_question(
        &db,
        &exam_id,
        "mcq",
        "Capital of France?",
        "Paris",
        5.0,
        0,
        json!({ "options": ["Paris", "London", "Berlin"] }),
    )
    .await;
    let subjective_id = seed_question(
        &db,
        &exam_id,
        "subjective",
        "Describe the cell membrane.",
        "the cell membrane controls transport",
        10.0,
        1,
        json!({ "keywords": ["cell", "membrane"] }),
    )
    .await;
    let code_id = seed_question(
        &db,
        &exam_id,
        "code",
        "Echo the input.",
        "",
        10.0,
        2,
        json!({
            "code_language": "python",
            "test_cases": [{ "input": "hi", "expected_output": "hi" }],
        }),
    )
    .await;

    let ctx = AppContext::new(
        db,
        detector,
        Arc::new(TokenOverlapSimilarity),
        Arc::new(DisabledJudge),
    );
    let app = api::create_router(ctx.clone());

    TestEnv {
        ctx,
        app,
        student_id,
        other_student_id,
        professor_id,
        exam_id,
        mcq_id,
        subjective_id,
        code_id,
        _dir: dir,
    }
}

async fn seed_user(db: &SqlitePool, email: &str, name: &str, role: &str) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO users (id, email, full_name, role) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(email)
        .bind(name)
        .bind(role)
        .execute(db)
        .await
        .expect("seed user");
    id
}

async fn seed_token(db: &SqlitePool, token: &str, user_id: &str, role: &str) {
    sqlx::query("INSERT INTO auth_tokens (token, user_id, role) VALUES (?, ?, ?)")
        .bind(token)
        .bind(user_id)
        .bind(role)
        .execute(db)
        .await
        .expect("seed token");
}

#[allow(clippy::too_many_arguments)]
async fn seed_question(
    db: &SqlitePool,
    exam_id: &str,
    qtype: &str,
    text: &str,
    correct_answer: &str,
    marks: f64,
    order_index: i64,
    extra: Value,
) -> String {
    let id = Uuid::new_v4().to_string();
    let options = extra.get("options").map(|v| v.to_string());
    let keywords = extra.get("keywords").map(|v| v.to_string());
    let test_cases = extra.get("test_cases").map(|v| v.to_string());
    let code_language = extra
        .get("code_language")
        .and_then(|v| v.as_str())
        .map(String::from);
    sqlx::query(
        r#"
        INSERT INTO questions
            (id, exam_id, text, qtype, options, correct_answer, keywords, marks, order_index, code_language, test_cases)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(exam_id)
    .bind(text)
    .bind(qtype)
    .bind(options)
    .bind(correct_answer)
    .bind(keywords)
    .bind(marks)
    .bind(order_index)
    .bind(code_language)
    .bind(test_cases)
    .execute(db)
    .await
    .expect("seed question");
    id
}

/// Build a JSON request with a bearer token
pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse JSON")
}
