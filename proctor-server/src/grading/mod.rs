//! Grading orchestrator
//!
//! Runs once per session, detached from the finish request: loads
//! every response, dispatches each to the scorer for its question
//! type, persists per-response scores, and writes the immutable
//! result row. The `completed` → `graded` transition is claimed with a
//! conditional UPDATE so two runs can never race on one session.

pub mod judge;
pub mod scorers;

use std::collections::HashMap;

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use proctor_common::events::ProctorEvent;
use proctor_common::models::{Question, ResultRow};

use crate::db;
use crate::state::AppContext;
use crate::{Error, Result};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Schedule a detached grading run for a finished session.
///
/// The finish request only learns that grading was scheduled; scores
/// are never returned synchronously.
pub fn spawn(ctx: AppContext, session_id: Uuid) {
    tokio::spawn(async move {
        match grade_session(&ctx, session_id).await {
            Ok(Some(result)) => {
                info!(
                    session_id = %session_id,
                    total_score = result.total_score,
                    "grading completed"
                );
            }
            Ok(None) => {
                // Another run claimed the session first
                info!(session_id = %session_id, "grading skipped, session not claimable");
            }
            Err(err) => {
                error!(session_id = %session_id, "background grading failed: {err}");
            }
        }
    });
}

/// Grade one session end to end.
///
/// Returns `Ok(None)` when the session could not be claimed (not
/// `completed`, or another run owns it).
pub async fn grade_session(ctx: &AppContext, session_id: Uuid) -> Result<Option<ResultRow>> {
    if !db::sessions::claim_for_grading(&ctx.db, session_id).await? {
        return Ok(None);
    }

    let session = db::sessions::get(&ctx.db, session_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Session not found: {session_id}")))?;

    let exam_id = Uuid::parse_str(&session.exam_id)
        .map_err(|_| Error::Internal(format!("malformed exam id on session {session_id}")))?;
    let exam = db::exams::get(&ctx.db, exam_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Exam not found: {exam_id}")))?;

    let questions: HashMap<String, Question> = db::exams::list_questions(&ctx.db, &session.exam_id)
        .await?
        .into_iter()
        .map(|q| (q.id.clone(), q))
        .collect();

    let responses = db::responses::list_for_session(&ctx.db, session_id).await?;

    let mut total_score = 0.0;
    for response in &responses {
        let question = match questions.get(&response.question_id) {
            Some(q) => q,
            None => {
                warn!(
                    response_id = %response.id,
                    question_id = %response.question_id,
                    "response references unknown question, skipped"
                );
                continue;
            }
        };

        let (score, breakdown) =
            score_response(ctx, question, response.answer.as_deref(), &exam).await;
        db::responses::set_score(&ctx.db, &response.id, score, breakdown.as_deref(), Utc::now())
            .await?;
        total_score += score;
    }
    let total_score = round2(total_score);

    let total_marks = db::exams::total_marks(&ctx.db, &session.exam_id).await?;
    let percentage = if total_marks > 0.0 {
        round2(total_score / total_marks * 100.0)
    } else {
        0.0
    };

    // Snapshot: the integrity score and violation counts are frozen
    // into the result; reporting never reads the session again.
    let summary = db::violations::counts_by_type(&ctx.db, session_id).await?;
    let result = db::results::insert(
        &ctx.db,
        session_id,
        total_score,
        percentage,
        session.integrity_score,
        &json!(summary).to_string(),
    )
    .await?;

    // No further violations can apply; free the session's ledger lock
    ctx.ledger.locks().release(session_id);

    ctx.bus.emit_lossy(ProctorEvent::GradingCompleted {
        session_id,
        total_score,
        timestamp: Utc::now(),
    });

    Ok(Some(result))
}

/// Dispatch one response to the scorer for its question type.
///
/// Returns the score plus a serialized component breakdown for the
/// rubric-based question types, persisted onto the response for
/// professor review. An unanswered question is a valid terminal state
/// and scores 0; a malformed rubric (bad keywords/test-case JSON)
/// degrades to the empty set rather than aborting the run.
async fn score_response(
    ctx: &AppContext,
    question: &Question,
    answer: Option<&str>,
    exam: &proctor_common::models::Exam,
) -> (f64, Option<String>) {
    match question.qtype.as_str() {
        "mcq" => {
            let score = scorers::score_mcq(
                answer,
                &question.correct_answer,
                question.marks,
                exam.negative_marking,
            );
            (score, None)
        }
        "subjective" => {
            let answer = answer.unwrap_or("");
            if answer.trim().is_empty() {
                return (0.0, None);
            }
            let keywords: Vec<String> = question
                .keywords
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or_default();
            let breakdown = scorers::score_subjective(
                answer,
                &question.correct_answer,
                &keywords,
                question.marks,
                ctx.similarity.as_ref(),
            );
            (breakdown.score, serde_json::to_string(&breakdown).ok())
        }
        "code" => {
            let answer = answer.unwrap_or("");
            let test_cases: Vec<scorers::TestCase> = question
                .test_cases
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or_default();
            let language = question.code_language.as_deref().unwrap_or("");
            if language.is_empty() || test_cases.is_empty() {
                return (0.0, None);
            }
            let breakdown = scorers::score_code(
                answer,
                language,
                &test_cases,
                question.marks,
                ctx.judge.as_ref(),
            )
            .await;
            (breakdown.score, serde_json::to_string(&breakdown).ok())
        }
        other => {
            warn!(
                question_id = %question.id,
                qtype = %other,
                "unknown question type, scored 0"
            );
            (0.0, None)
        }
    }
}
