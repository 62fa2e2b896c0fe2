//! Integrity ledger
//!
//! Append-only violation log plus a derived live score per session.
//! The log is the source of truth for audit and reporting; the score
//! column is an incrementally maintained cache of replaying it. Every
//! accepted violation appends a log row and updates the score in one
//! transaction, inside a per-session critical section, so two
//! concurrent violations can never both read the pre-penalty score.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use proctor_common::events::{EventBus, ProctorEvent};
use proctor_common::models::{session_status, ViolationRecord};

use crate::api::auth::Identity;
use crate::signal::NormalizedViolation;
use crate::{Error, Result};

/// Fallback weight for violation types not in the table. Unrecognized
/// types are penalized lightly rather than silently dropped.
pub const DEFAULT_WEIGHT: f64 = 0.05;

/// Per-type penalty weight (design constants, tunable)
pub fn weight(violation_type: &str) -> f64 {
    match violation_type {
        "screen_share_detected" => 0.40,
        "speech_cheating" => 0.35,
        "phone_detected" => 0.30,
        "gaze_away" => 0.25,
        "raf_tab_switch" => 0.20,
        "tab_switch" => 0.20,
        "speech_detected" => 0.15,
        "window_resize" => 0.15,
        "multiple_monitors" => 0.15,
        "multiple_faces" => 0.10,
        "no_mouse" => 0.10,
        "copy_paste" => 0.10,
        "screenshot_attempt" => 0.10,
        _ => DEFAULT_WEIGHT,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Apply one violation's penalty to a score.
///
/// `penalty = weight(type) × confidence × 100`, clamped so the score
/// stays within [0, 100] and never increases.
pub fn apply_penalty(score: f64, violation_type: &str, confidence: f64) -> f64 {
    let penalty = weight(violation_type) * confidence.clamp(0.0, 1.0) * 100.0;
    round2((score - penalty).max(0.0))
}

/// Replay a violation history from a fresh score of 100.
///
/// Consistency oracle for the cached `integrity_score` column.
pub fn replay_score(history: &[ViolationRecord]) -> f64 {
    history.iter().fold(100.0, |score, v| {
        apply_penalty(score, &v.violation_type, v.confidence)
    })
}

/// Outcome of recording a violation against a session
#[derive(Debug, Clone)]
pub enum LedgerOutcome {
    /// Penalty applied; carries the updated score
    Applied { integrity_score: f64 },
    /// Session is not active: event ignored, no mutation
    Ignored {
        reason: &'static str,
        integrity_score: f64,
    },
}

impl LedgerOutcome {
    pub fn integrity_score(&self) -> f64 {
        match self {
            LedgerOutcome::Applied { integrity_score } => *integrity_score,
            LedgerOutcome::Ignored {
                integrity_score, ..
            } => *integrity_score,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, LedgerOutcome::Ignored { .. })
    }
}

/// Per-session serialization of the read-penalize-write-append path.
///
/// Violations across different sessions proceed fully in parallel;
/// the registry lock is only held long enough to fetch or insert the
/// session's own mutex.
#[derive(Clone, Default)]
pub struct SessionLocks {
    inner: Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn for_session(&self, session_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().expect("session lock registry poisoned");
        map.entry(session_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop a session's lock entry once it can no longer accept
    /// violations (called after grading claims the session).
    pub fn release(&self, session_id: Uuid) {
        let mut map = self.inner.lock().expect("session lock registry poisoned");
        map.remove(&session_id);
    }
}

/// The integrity scoring engine
pub struct IntegrityLedger {
    db: SqlitePool,
    locks: SessionLocks,
    bus: Arc<EventBus>,
}

impl IntegrityLedger {
    pub fn new(db: SqlitePool, locks: SessionLocks, bus: Arc<EventBus>) -> Self {
        Self { db, locks, bus }
    }

    /// Record one normalized violation against a session.
    ///
    /// Accepted violations append to the log and decrement the live
    /// score atomically; events for sessions that are no longer
    /// `active` are ignored with an explicit signal rather than
    /// mutating a result that may already be graded.
    pub async fn record(
        &self,
        session_id: Uuid,
        violation: &NormalizedViolation,
    ) -> Result<LedgerOutcome> {
        let lock = self.locks.for_session(session_id);
        let _guard = lock.lock().await;

        let mut tx = self.db.begin().await?;

        let row: Option<(String, f64)> =
            sqlx::query_as("SELECT status, integrity_score FROM sessions WHERE id = ?")
                .bind(session_id.to_string())
                .fetch_optional(&mut *tx)
                .await?;

        let (status, current) = match row {
            Some(row) => row,
            None => return Err(Error::NotFound(format!("Session not found: {session_id}"))),
        };

        if status != session_status::ACTIVE {
            debug!(
                session_id = %session_id,
                status = %status,
                "ignoring violation for non-active session"
            );
            return Ok(LedgerOutcome::Ignored {
                reason: "session_not_active",
                integrity_score: current,
            });
        }

        let updated = apply_penalty(current, &violation.violation_type, violation.confidence);
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO violations (id, session_id, violation_type, confidence, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(session_id.to_string())
        .bind(&violation.violation_type)
        .bind(violation.confidence)
        .bind(violation.metadata.to_string())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE sessions SET integrity_score = ? WHERE id = ?")
            .bind(updated)
            .bind(session_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            session_id = %session_id,
            violation_type = %violation.violation_type,
            confidence = violation.confidence,
            integrity_score = updated,
            "violation recorded"
        );

        self.bus.emit_lossy(ProctorEvent::ViolationRecorded {
            session_id,
            violation_type: violation.violation_type.clone(),
            confidence: violation.confidence,
            integrity_score: updated,
            timestamp: now,
        });

        Ok(LedgerOutcome::Applied {
            integrity_score: updated,
        })
    }

    /// Current score and ordered violation history for a session.
    ///
    /// Readable by the owning student or any professor.
    pub async fn integrity(
        &self,
        session_id: Uuid,
        identity: &Identity,
    ) -> Result<(f64, Vec<ViolationRecord>)> {
        let session = crate::db::sessions::get(&self.db, session_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Session not found: {session_id}")))?;

        if !identity.is_professor() && identity.user_id != session.student_id {
            return Err(Error::Forbidden(
                "integrity readable only by the session owner or a professor".to_string(),
            ));
        }

        let history = crate::db::violations::list_for_session(&self.db, session_id).await?;
        Ok((session.integrity_score, history))
    }

    /// Violation counts grouped by type, for the result snapshot
    pub async fn summary(&self, session_id: Uuid) -> Result<HashMap<String, i64>> {
        crate::db::violations::counts_by_type(&self.db, session_id).await
    }

    pub fn locks(&self) -> &SessionLocks {
        &self.locks
    }
}

/// Parse a stored metadata column back into JSON for API responses
pub fn metadata_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or(Value::Null)
}
