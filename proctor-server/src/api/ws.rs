//! Per-session WebSocket channel
//!
//! Low-latency ingestion path for already-labeled violations. The
//! bearer token rides a query parameter (browsers cannot set headers on
//! WebSocket requests) and is validated before the upgrade completes;
//! a bad token never gets a socket. Each inbound violation is answered
//! with the updated integrity score on the same socket, and a
//! malformed message yields an error frame without closing it.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::auth;
use crate::ledger::LedgerOutcome;
use crate::signal;
use crate::state::AppContext;
use crate::{db, Error, Result};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// GET /ws/sessions/{session_id}
pub async fn session_channel(
    State(ctx): State<AppContext>,
    Path(session_id): Path<String>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    let token = query
        .token
        .ok_or_else(|| Error::Unauthorized("token query parameter required".to_string()))?;
    let identity = auth::authenticate(&ctx.db, &token).await?;

    let session_id = Uuid::parse_str(&session_id)
        .map_err(|_| Error::BadRequest(format!("malformed session id: {session_id}")))?;
    let session = db::sessions::get(&ctx.db, session_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Session not found: {session_id}")))?;
    if !identity.is_professor() && identity.user_id != session.student_id {
        return Err(Error::Forbidden("not your session".to_string()));
    }

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, ctx, session_id)))
}

async fn handle_socket(mut socket: WebSocket, ctx: AppContext, session_id: Uuid) {
    debug!(session_id = %session_id, "websocket connected");
    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(m) => m,
            Err(err) => {
                debug!(session_id = %session_id, "websocket receive error: {err}");
                break;
            }
        };
        match message {
            Message::Text(text) => {
                let reply = handle_message(&ctx, session_id, &text).await;
                if socket.send(Message::Text(reply.to_string())).await.is_err() {
                    break;
                }
            }
            Message::Ping(payload) => {
                if socket.send(Message::Pong(payload)).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    debug!(session_id = %session_id, "websocket closed");
}

/// Process one inbound frame; always produces a reply frame.
pub async fn handle_message(ctx: &AppContext, session_id: Uuid, text: &str) -> Value {
    let payload: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return json!({ "error": "invalid_json" }),
    };

    match payload.get("type").and_then(|v| v.as_str()) {
        Some("violation") => {}
        Some(other) => return json!({ "error": "unsupported_type", "type": other }),
        None => return json!({ "error": "missing_type" }),
    }

    let violation_type = payload
        .get("violation_type")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let confidence = payload
        .get("confidence")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    let metadata = payload.get("metadata").cloned().unwrap_or(Value::Null);

    let violation = match signal::normalize_generic(violation_type, confidence, metadata) {
        Ok(v) => v,
        Err(_) => return json!({ "error": "missing_violation_type" }),
    };

    match ctx.ledger.record(session_id, &violation).await {
        Ok(LedgerOutcome::Applied { integrity_score }) => json!({
            "violation_type": violation.violation_type,
            "integrity_score": integrity_score,
            "ignored": false,
        }),
        Ok(LedgerOutcome::Ignored {
            reason,
            integrity_score,
        }) => json!({
            "violation_type": violation.violation_type,
            "integrity_score": integrity_score,
            "ignored": true,
            "reason": reason,
        }),
        Err(Error::NotFound(_)) => json!({ "error": "session_not_found" }),
        Err(err) => {
            warn!(session_id = %session_id, "websocket violation failed: {err}");
            json!({ "error": "internal" })
        }
    }
}
