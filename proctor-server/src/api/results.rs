//! Result reporting handler

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use proctor_common::models::session_status;

use crate::api::auth::Identity;
use crate::ledger::metadata_value;
use crate::state::AppContext;
use crate::{db, grading, Error, Result};

/// GET /api/v1/sessions/{session_id}/result
///
/// Serves the immutable result snapshot. A `completed` session whose
/// background grading has not landed yet is graded on demand here, so
/// the report is never blocked on the detached task.
pub async fn get_session_result(
    State(ctx): State<AppContext>,
    Path(session_id): Path<String>,
    identity: Identity,
) -> Result<Json<Value>> {
    let session_id = Uuid::parse_str(&session_id)
        .map_err(|_| Error::BadRequest(format!("malformed session id: {session_id}")))?;

    let session = db::sessions::get(&ctx.db, session_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Session not found: {session_id}")))?;
    if !identity.is_professor() && identity.user_id != session.student_id {
        return Err(Error::Forbidden("not your session".to_string()));
    }

    let mut result = db::results::get_by_session(&ctx.db, session_id).await?;
    if result.is_none() && session.status == session_status::COMPLETED {
        info!(session_id = %session_id, "grading on demand for result request");
        result = grading::grade_session(&ctx, session_id).await?;
        if result.is_none() {
            // A concurrent run claimed it; its row may already exist
            result = db::results::get_by_session(&ctx.db, session_id).await?;
        }
    }

    let result = result.ok_or_else(|| {
        Error::NotFound(format!("Result not available for session {session_id}"))
    })?;

    let responses = db::responses::list_for_session(&ctx.db, session_id).await?;
    let breakdown: Vec<Value> = responses
        .iter()
        .map(|response| {
            let grading_breakdown = response
                .grading_breakdown
                .as_deref()
                .map(metadata_value)
                .unwrap_or(Value::Null);
            let needs_review = grading_breakdown
                .get("needs_review")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            json!({
                "question_id": response.question_id,
                "answer": response.answer,
                "score": response.score,
                "time_spent_seconds": response.time_spent_seconds,
                "grading_breakdown": grading_breakdown,
                "needs_review": needs_review,
            })
        })
        .collect();

    Ok(Json(json!({
        "session_id": result.session_id,
        "total_score": result.total_score,
        "percentage": result.percentage,
        "integrity_score": result.integrity_score,
        "violations_summary": metadata_value(&result.violations_summary),
        "generated_at": result.generated_at,
        "responses": breakdown,
    })))
}
