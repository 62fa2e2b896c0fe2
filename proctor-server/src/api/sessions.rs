//! Session lifecycle handlers: start, answer, finish

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use proctor_common::events::ProctorEvent;
use proctor_common::models::{role, session_status, Session};

use crate::api::auth::Identity;
use crate::state::AppContext;
use crate::{db, grading, Error, Result};

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub exam_id: String,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub exam_id: String,
    pub duration_minutes: i64,
    pub integrity_score: f64,
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| Error::BadRequest(format!("malformed {what} id: {raw}")))
}

/// Load a session and verify the caller may act on it.
///
/// Students reach only their own sessions; professors reach any.
async fn load_authorized(
    ctx: &AppContext,
    session_id: Uuid,
    identity: &Identity,
) -> Result<Session> {
    let session = db::sessions::get(&ctx.db, session_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Session not found: {session_id}")))?;
    if !identity.is_professor() && identity.user_id != session.student_id {
        return Err(Error::Forbidden("not your session".to_string()));
    }
    Ok(session)
}

/// POST /api/v1/sessions/start
pub async fn start_session(
    State(ctx): State<AppContext>,
    identity: Identity,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<StartSessionResponse>> {
    identity.require_role(role::STUDENT)?;
    let exam_id = parse_id(&request.exam_id, "exam")?;

    let exam = db::exams::get(&ctx.db, exam_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Exam not found: {exam_id}")))?;
    if !exam.is_active {
        return Err(Error::Conflict("exam is not open for attempts".to_string()));
    }

    // One attempt per (student, exam), whatever state it reached
    if db::sessions::find_for_student_exam(&ctx.db, &identity.user_id, exam_id)
        .await?
        .is_some()
    {
        return Err(Error::Conflict(
            "exam already attempted by this student".to_string(),
        ));
    }

    let session = db::sessions::create(&ctx.db, &identity.user_id, exam_id).await?;
    info!(
        session_id = %session.id,
        exam_id = %exam_id,
        student_id = %identity.user_id,
        "session started"
    );

    Ok(Json(StartSessionResponse {
        session_id: session.id,
        exam_id: session.exam_id,
        duration_minutes: exam.duration_minutes,
        integrity_score: session.integrity_score,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_id: String,
    pub answer: String,
}

/// POST /api/v1/sessions/{session_id}/answers
///
/// Upsert: the first submission for a question creates its response
/// row, a resubmission before finish replaces the answer in place.
pub async fn submit_answer(
    State(ctx): State<AppContext>,
    Path(session_id): Path<String>,
    identity: Identity,
    Json(request): Json<SubmitAnswerRequest>,
) -> Result<Json<Value>> {
    identity.require_role(role::STUDENT)?;
    let session_id = parse_id(&session_id, "session")?;
    let question_id = parse_id(&request.question_id, "question")?;

    let session = load_authorized(&ctx, session_id, &identity).await?;
    if session.status != session_status::ACTIVE {
        return Err(Error::Conflict(
            "answers accepted only while the session is active".to_string(),
        ));
    }

    let question = db::exams::get_question(&ctx.db, question_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Question not found: {question_id}")))?;
    if question.exam_id != session.exam_id {
        return Err(Error::BadRequest(
            "question does not belong to this session's exam".to_string(),
        ));
    }

    let now = Utc::now();
    match db::responses::get(&ctx.db, session_id, question_id).await? {
        Some(existing) => {
            db::responses::update_answer(&ctx.db, &existing, &request.answer, now).await?;
        }
        None => {
            // Time attribution: a question's clock starts when the
            // previous answer landed, or at session start for the first
            let started_at = db::responses::last_submitted_at(&ctx.db, session_id)
                .await?
                .unwrap_or(session.started_at);
            db::responses::insert(&ctx.db, session_id, question_id, &request.answer, started_at, now)
                .await?;
        }
    }

    Ok(Json(json!({ "status": "saved" })))
}

/// POST /api/v1/sessions/{session_id}/finish
///
/// Transitions `active` → `completed` and schedules a detached grading
/// run; the response never carries scores.
pub async fn finish_session(
    State(ctx): State<AppContext>,
    Path(session_id): Path<String>,
    identity: Identity,
) -> Result<Json<Value>> {
    identity.require_role(role::STUDENT)?;
    let session_id = parse_id(&session_id, "session")?;
    load_authorized(&ctx, session_id, &identity).await?;

    if !db::sessions::finish(&ctx.db, session_id).await? {
        return Err(Error::Conflict("session already finished".to_string()));
    }

    info!(session_id = %session_id, "session finished, grading scheduled");
    ctx.bus.emit_lossy(ProctorEvent::SessionFinished {
        session_id,
        timestamp: Utc::now(),
    });
    grading::spawn(ctx.clone(), session_id);

    Ok(Json(json!({ "status": "completed", "grading": "scheduled" })))
}
