//! Proctoring channel handlers
//!
//! One endpoint per sensing modality (frame, audio, raf, generic
//! violation) plus the integrity read. Every write response carries the
//! session's current integrity score; an `ignored` flag tells the
//! client its signal arrived after the session stopped being active.

use axum::extract::{Path, State};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use proctor_common::models::Session;

use crate::api::auth::Identity;
use crate::ledger::{metadata_value, LedgerOutcome};
use crate::signal;
use crate::state::AppContext;
use crate::{db, Error, Result};

fn parse_session_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| Error::BadRequest(format!("malformed session id: {raw}")))
}

/// Proctoring signals are accepted from the session's own student or
/// from a professor (manual flagging).
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

#[derive(Debug, Deserialize)]
pub struct FrameRequest {
    pub session_id: String,
    /// Camera frame, base64, optionally a `data:image/...;base64,` URL
    pub frame_base64: String,
}

/// POST /api/v1/proctoring/frame
///
/// An undecodable frame or a detector failure is a client-side quality
/// problem, not a violation and not a server error: the response
/// reports `decode_error` with zero violations and no penalty.
pub async fn process_frame(
    State(ctx): State<AppContext>,
    identity: Identity,
    Json(request): Json<FrameRequest>,
) -> Result<Json<Value>> {
    let session_id = parse_session_id(&request.session_id)?;
    let session = load_authorized(&ctx, session_id, &identity).await?;

    let encoded = request
        .frame_base64
        .rsplit_once(',')
        .map(|(_, data)| data)
        .unwrap_or(&request.frame_base64);
    let image = match BASE64.decode(encoded.trim()) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(session_id = %session_id, "frame decode failed: {err}");
            return Ok(Json(json!({
                "violations": [],
                "integrity_score": session.integrity_score,
                "decode_error": true,
            })));
        }
    };

    let detections = match ctx.detector.detect(&image) {
        Ok(detections) => detections,
        Err(err) => {
            warn!(session_id = %session_id, "object detection failed: {err}");
            return Ok(Json(json!({
                "violations": [],
                "integrity_score": session.integrity_score,
                "decode_error": true,
            })));
        }
    };

    let mut integrity_score = session.integrity_score;
    let mut ignored = false;
    let mut names = Vec::new();
    for violation in signal::normalize_frame(&detections) {
        let outcome = ctx.ledger.record(session_id, &violation).await?;
        integrity_score = outcome.integrity_score();
        ignored = ignored || outcome.is_ignored();
        names.push(violation.violation_type);
    }

    Ok(Json(json!({
        "violations": names,
        "integrity_score": integrity_score,
        "decode_error": false,
        "ignored": ignored,
    })))
}

#[derive(Debug, Deserialize)]
pub struct AudioRequest {
    pub session_id: String,
    pub voice_energy: f64,
    #[serde(default)]
    pub keywords_detected: Vec<String>,
}

/// POST /api/v1/proctoring/audio
pub async fn process_audio(
    State(ctx): State<AppContext>,
    identity: Identity,
    Json(request): Json<AudioRequest>,
) -> Result<Json<Value>> {
    let session_id = parse_session_id(&request.session_id)?;
    let session = load_authorized(&ctx, session_id, &identity).await?;

    match signal::normalize_audio(request.voice_energy, &request.keywords_detected) {
        Some(violation) => {
            let outcome = ctx.ledger.record(session_id, &violation).await?;
            Ok(Json(json!({
                "violation": true,
                "integrity_score": outcome.integrity_score(),
                "ignored": outcome.is_ignored(),
            })))
        }
        None => Ok(Json(json!({
            "violation": false,
            "integrity_score": session.integrity_score,
            "ignored": false,
        }))),
    }
}

#[derive(Debug, Deserialize)]
pub struct RafRequest {
    pub session_id: String,
    pub delta_ms: f64,
}

/// POST /api/v1/proctoring/raf
pub async fn process_raf(
    State(ctx): State<AppContext>,
    identity: Identity,
    Json(request): Json<RafRequest>,
) -> Result<Json<Value>> {
    let session_id = parse_session_id(&request.session_id)?;
    let session = load_authorized(&ctx, session_id, &identity).await?;

    match signal::normalize_raf(request.delta_ms) {
        Some(violation) => {
            let outcome = ctx.ledger.record(session_id, &violation).await?;
            Ok(Json(json!({
                "violation": true,
                "integrity_score": outcome.integrity_score(),
                "ignored": outcome.is_ignored(),
            })))
        }
        None => Ok(Json(json!({
            "violation": false,
            "integrity_score": session.integrity_score,
            "ignored": false,
        }))),
    }
}

#[derive(Debug, Deserialize)]
pub struct GenericViolationRequest {
    pub session_id: String,
    pub violation_type: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub metadata: Value,
}

/// POST /api/v1/proctoring/violation
///
/// Already-labeled signal from the client (tab switch, copy/paste,
/// gaze tracking, ...). Passed through the normalizer verbatim.
pub async fn process_violation(
    State(ctx): State<AppContext>,
    identity: Identity,
    Json(request): Json<GenericViolationRequest>,
) -> Result<Json<Value>> {
    let session_id = parse_session_id(&request.session_id)?;
    load_authorized(&ctx, session_id, &identity).await?;

    let violation = signal::normalize_generic(
        &request.violation_type,
        request.confidence,
        request.metadata,
    )?;
    let outcome = ctx.ledger.record(session_id, &violation).await?;

    let mut body = json!({
        "violation_type": violation.violation_type,
        "integrity_score": outcome.integrity_score(),
        "ignored": outcome.is_ignored(),
    });
    if let LedgerOutcome::Ignored { reason, .. } = outcome {
        body["reason"] = json!(reason);
    }
    Ok(Json(body))
}

/// GET /api/v1/sessions/{session_id}/integrity
///
/// Current score plus the full ordered violation history.
pub async fn get_integrity(
    State(ctx): State<AppContext>,
    Path(session_id): Path<String>,
    identity: Identity,
) -> Result<Json<Value>> {
    let session_id = parse_session_id(&session_id)?;
    let (integrity_score, history) = ctx.ledger.integrity(session_id, &identity).await?;

    let violations: Vec<Value> = history
        .iter()
        .map(|v| {
            json!({
                "violation_type": v.violation_type,
                "confidence": v.confidence,
                "metadata": metadata_value(&v.metadata),
                "created_at": v.created_at,
            })
        })
        .collect();

    Ok(Json(json!({
        "session_id": session_id.to_string(),
        "integrity_score": integrity_score,
        "violation_count": violations.len(),
        "violations": violations,
    })))
}
