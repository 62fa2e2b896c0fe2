//! Concurrency tests for the integrity ledger
//!
//! The invariant under test: concurrent violations against one session
//! must both land, i.e. the final score reflects every accepted
//! penalty, never a lost update from two writers reading the same
//! pre-penalty score.

mod common;

use serde_json::json;

use common::setup;
use proctor_server::db;
use proctor_server::ledger::replay_score;
use proctor_server::signal::NormalizedViolation;

#[tokio::test]
async fn test_concurrent_violations_no_lost_update() {
    let env = setup().await;
    let exam_id = uuid::Uuid::parse_str(&env.exam_id).unwrap();
    let session = db::sessions::create(&env.ctx.db, &env.student_id, exam_id)
        .await
        .unwrap();
    let session_id = uuid::Uuid::parse_str(&session.id).unwrap();

    let a = {
        let ledger = env.ctx.ledger.clone();
        tokio::spawn(async move {
            ledger
                .record(
                    session_id,
                    &NormalizedViolation::new("tab_switch", 1.0, json!({})),
                )
                .await
        })
    };
    let b = {
        let ledger = env.ctx.ledger.clone();
        tokio::spawn(async move {
            ledger
                .record(
                    session_id,
                    &NormalizedViolation::new("copy_paste", 1.0, json!({})),
                )
                .await
        })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    // -20 for tab_switch, -10 for copy_paste, in either order
    let refreshed = db::sessions::get(&env.ctx.db, session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.integrity_score, 70.0);

    let history = db::violations::list_for_session(&env.ctx.db, session_id)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(replay_score(&history), refreshed.integrity_score);
}

#[tokio::test]
async fn test_many_concurrent_violations_all_land() {
    let env = setup().await;
    let exam_id = uuid::Uuid::parse_str(&env.exam_id).unwrap();
    let session = db::sessions::create(&env.ctx.db, &env.student_id, exam_id)
        .await
        .unwrap();
    let session_id = uuid::Uuid::parse_str(&session.id).unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let ledger = env.ctx.ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .record(
                    session_id,
                    // gaze_away at 0.2 costs exactly 5.0
                    &NormalizedViolation::new("gaze_away", 0.2, json!({})),
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let refreshed = db::sessions::get(&env.ctx.db, session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.integrity_score, 50.0);

    let history = db::violations::list_for_session(&env.ctx.db, session_id)
        .await
        .unwrap();
    assert_eq!(history.len(), 10);
    assert_eq!(replay_score(&history), 50.0);
}

#[tokio::test]
async fn test_violations_on_distinct_sessions_are_independent() {
    let env = setup().await;
    let exam_id = uuid::Uuid::parse_str(&env.exam_id).unwrap();
    let s1 = db::sessions::create(&env.ctx.db, &env.student_id, exam_id)
        .await
        .unwrap();
    let s2 = db::sessions::create(&env.ctx.db, &env.other_student_id, exam_id)
        .await
        .unwrap();
    let id1 = uuid::Uuid::parse_str(&s1.id).unwrap();
    let id2 = uuid::Uuid::parse_str(&s2.id).unwrap();

    env.ctx
        .ledger
        .record(id1, &NormalizedViolation::new("phone_detected", 0.9, json!({})))
        .await
        .unwrap();

    let untouched = db::sessions::get(&env.ctx.db, id2).await.unwrap().unwrap();
    assert_eq!(untouched.integrity_score, 100.0);

    let penalized = db::sessions::get(&env.ctx.db, id1).await.unwrap().unwrap();
    assert_eq!(penalized.integrity_score, 73.0);
}
