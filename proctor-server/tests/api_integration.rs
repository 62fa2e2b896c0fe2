//! Integration tests for the HTTP API surface
//!
//! Covers authentication, session lifecycle transitions, proctoring
//! channel normalization, and the integrity read, end to end through
//! the router.

mod common;

use axum::http::StatusCode;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

use common::{
    extract_json, request, setup, setup_with_detector, StubDetector, OTHER_STUDENT_TOKEN,
    PROFESSOR_TOKEN, STUDENT_TOKEN,
};
use proctor_server::signal::Detection;

/// Start a session over HTTP and return its id
async fn start_session(env: &common::TestEnv) -> String {
    let response = env
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/sessions/start",
            Some(STUDENT_TOKEN),
            Some(json!({ "exam_id": env.exam_id })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["integrity_score"], 100.0);
    assert_eq!(body["duration_minutes"], 60);
    body["session_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let env = setup().await;
    let response = env
        .app
        .clone()
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "proctor-server");
}

#[tokio::test]
async fn test_missing_and_invalid_tokens_rejected() {
    let env = setup().await;

    let response = env
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/sessions/start",
            None,
            Some(json!({ "exam_id": env.exam_id })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = env
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/sessions/start",
            Some("no-such-token"),
            Some(json!({ "exam_id": env.exam_id })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_professor_cannot_start_session() {
    let env = setup().await;
    let response = env
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/sessions/start",
            Some(PROFESSOR_TOKEN),
            Some(json!({ "exam_id": env.exam_id })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_duplicate_session_start_conflicts() {
    let env = setup().await;
    start_session(&env).await;

    let response = env
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/sessions/start",
            Some(STUDENT_TOKEN),
            Some(json!({ "exam_id": env.exam_id })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_answer_submission_and_resubmission() {
    let env = setup().await;
    let session_id = start_session(&env).await;

    let uri = format!("/api/v1/sessions/{session_id}/answers");
    let response = env
        .app
        .clone()
        .oneshot(request(
            "POST",
            &uri,
            Some(STUDENT_TOKEN),
            Some(json!({ "question_id": env.mcq_id, "answer": "London" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Resubmission replaces the answer in place
    let response = env
        .app
        .clone()
        .oneshot(request(
            "POST",
            &uri,
            Some(STUDENT_TOKEN),
            Some(json!({ "question_id": env.mcq_id, "answer": "Paris" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let row: (String,) =
        sqlx::query_as("SELECT answer FROM responses WHERE session_id = ? AND question_id = ?")
            .bind(&session_id)
            .bind(&env.mcq_id)
            .fetch_one(&env.ctx.db)
            .await
            .unwrap();
    assert_eq!(row.0, "Paris");
}

#[tokio::test]
async fn test_answer_to_unknown_question_not_found() {
    let env = setup().await;
    let session_id = start_session(&env).await;

    let response = env
        .app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/v1/sessions/{session_id}/answers"),
            Some(STUDENT_TOKEN),
            Some(json!({
                "question_id": uuid::Uuid::new_v4().to_string(),
                "answer": "x",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_finish_is_single_shot_and_blocks_answers() {
    let env = setup().await;
    let session_id = start_session(&env).await;

    let finish_uri = format!("/api/v1/sessions/{session_id}/finish");
    let response = env
        .app
        .clone()
        .oneshot(request("POST", &finish_uri, Some(STUDENT_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["grading"], "scheduled");

    // Double finish
    let response = env
        .app
        .clone()
        .oneshot(request("POST", &finish_uri, Some(STUDENT_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Answers after finish
    let response = env
        .app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/v1/sessions/{session_id}/answers"),
            Some(STUDENT_TOKEN),
            Some(json!({ "question_id": env.mcq_id, "answer": "Paris" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_other_student_cannot_touch_session() {
    let env = setup().await;
    let session_id = start_session(&env).await;

    let response = env
        .app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/v1/sessions/{session_id}/finish"),
            Some(OTHER_STUDENT_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = env
        .app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/api/v1/sessions/{session_id}/integrity"),
            Some(OTHER_STUDENT_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_generic_violation_applies_penalty() {
    let env = setup().await;
    let session_id = start_session(&env).await;

    let response = env
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/proctoring/violation",
            Some(STUDENT_TOKEN),
            Some(json!({
                "session_id": session_id,
                "violation_type": "tab_switch",
                "confidence": 1.0,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    // tab_switch at 1.0 costs 20.0
    assert_eq!(body["integrity_score"], 80.0);
    assert_eq!(body["ignored"], false);
}

#[tokio::test]
async fn test_generic_violation_requires_type() {
    let env = setup().await;
    let session_id = start_session(&env).await;

    let response = env
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/proctoring/violation",
            Some(STUDENT_TOKEN),
            Some(json!({
                "session_id": session_id,
                "violation_type": "",
                "confidence": 1.0,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_frame_decode_error_is_not_a_violation() {
    let env = setup().await;
    let session_id = start_session(&env).await;

    let response = env
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/proctoring/frame",
            Some(STUDENT_TOKEN),
            Some(json!({ "session_id": session_id, "frame_base64": "!!not-base64!!" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["decode_error"], true);
    assert_eq!(body["integrity_score"], 100.0);
    assert!(body["violations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_frame_detection_penalizes_at_raw_confidence() {
    let env = setup_with_detector(Arc::new(StubDetector(vec![
        Detection {
            label: "cell phone".to_string(),
            confidence: 0.9,
        },
        Detection {
            label: "person".to_string(),
            confidence: 0.99,
        },
    ])))
    .await;
    let session_id = start_session(&env).await;

    let frame = format!("data:image/jpeg;base64,{}", BASE64.encode([0u8; 16]));
    let response = env
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/proctoring/frame",
            Some(STUDENT_TOKEN),
            Some(json!({ "session_id": session_id, "frame_base64": frame })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["decode_error"], false);
    assert_eq!(body["violations"], json!(["phone_detected"]));
    // 100 - 0.30 * 0.9 * 100
    assert_eq!(body["integrity_score"], 73.0);
}

#[tokio::test]
async fn test_audio_threshold_boundaries() {
    let env = setup().await;
    let session_id = start_session(&env).await;

    // Exactly at the threshold: quiet
    let response = env
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/proctoring/audio",
            Some(STUDENT_TOKEN),
            Some(json!({ "session_id": session_id, "voice_energy": 60.0 })),
        ))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["violation"], false);
    assert_eq!(body["integrity_score"], 100.0);

    // Above: speech_detected at 0.8 costs 12.0
    let response = env
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/proctoring/audio",
            Some(STUDENT_TOKEN),
            Some(json!({ "session_id": session_id, "voice_energy": 75.5 })),
        ))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["violation"], true);
    assert_eq!(body["integrity_score"], 88.0);
}

#[tokio::test]
async fn test_raf_starvation_detected() {
    let env = setup().await;
    let session_id = start_session(&env).await;

    let response = env
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/proctoring/raf",
            Some(STUDENT_TOKEN),
            Some(json!({ "session_id": session_id, "delta_ms": 1200.0 })),
        ))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["violation"], true);
    // raf_tab_switch at 0.95 costs 19.0
    assert_eq!(body["integrity_score"], 81.0);
}

#[tokio::test]
async fn test_integrity_read_returns_ordered_history() {
    let env = setup().await;
    let session_id = start_session(&env).await;

    for violation_type in ["tab_switch", "copy_paste"] {
        let response = env
            .app
            .clone()
            .oneshot(request(
                "POST",
                "/api/v1/proctoring/violation",
                Some(STUDENT_TOKEN),
                Some(json!({
                    "session_id": session_id,
                    "violation_type": violation_type,
                    "confidence": 1.0,
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Professor can read any session's integrity
    let response = env
        .app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/api/v1/sessions/{session_id}/integrity"),
            Some(PROFESSOR_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["violation_count"], 2);
    assert_eq!(body["integrity_score"], 70.0);
    let violations = body["violations"].as_array().unwrap();
    assert_eq!(violations[0]["violation_type"], "tab_switch");
    assert_eq!(violations[1]["violation_type"], "copy_paste");
}

#[tokio::test]
async fn test_violation_after_finish_ignored_with_signal() {
    let env = setup().await;
    let session_id = start_session(&env).await;

    let response = env
        .app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/v1/sessions/{session_id}/finish"),
            Some(STUDENT_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = env
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/proctoring/violation",
            Some(STUDENT_TOKEN),
            Some(json!({
                "session_id": session_id,
                "violation_type": "tab_switch",
                "confidence": 1.0,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["ignored"], true);
    assert_eq!(body["reason"], "session_not_active");
    // Score unchanged: the late event never landed in the ledger
    assert_eq!(body["integrity_score"], 100.0);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM violations WHERE session_id = ?")
        .bind(&session_id)
        .fetch_one(&env.ctx.db)
        .await
        .unwrap();
    assert_eq!(count.0, 0);
}

#[tokio::test]
async fn test_malformed_session_id_is_bad_request() {
    let env = setup().await;
    let response = env
        .app
        .clone()
        .oneshot(request(
            "GET",
            "/api/v1/sessions/not-a-uuid/integrity",
            Some(STUDENT_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_violation_emits_monitor_event() {
    let env = setup().await;
    let session_id = start_session(&env).await;
    let mut rx = env.ctx.bus.subscribe();

    let response = env
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/proctoring/violation",
            Some(STUDENT_TOKEN),
            Some(json!({
                "session_id": session_id,
                "violation_type": "gaze_away",
                "confidence": 0.7,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    match rx.recv().await.unwrap() {
        proctor_common::events::ProctorEvent::ViolationRecorded {
            session_id: event_session,
            violation_type,
            integrity_score,
            ..
        } => {
            assert_eq!(event_session.to_string(), session_id);
            assert_eq!(violation_type, "gaze_away");
            // gaze_away at 0.7 costs 17.5
            assert_eq!(integrity_score, 82.5);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_websocket_upgrade_requires_token() {
    let env = setup().await;
    let session_id = start_session(&env).await;

    let req = axum::http::Request::builder()
        .method("GET")
        .uri(format!("/ws/sessions/{session_id}"))
        .header("Host", "localhost")
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Sec-WebSocket-Version", "13")
        .header("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ==")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = env.app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_monitor_stream_is_professor_only() {
    let env = setup().await;
    let response = env
        .app
        .clone()
        .oneshot(request(
            "GET",
            "/api/v1/proctoring/events",
            Some(STUDENT_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
