//! Shared application state
//!
//! One `AppContext` is built at startup and cloned into every handler.
//! Cloning is cheap: the pool and capability objects are all
//! reference-counted.

use std::sync::Arc;

use sqlx::SqlitePool;

use proctor_common::events::EventBus;

use crate::grading::judge::CodeJudge;
use crate::grading::scorers::SimilarityScorer;
use crate::ledger::{IntegrityLedger, SessionLocks};
use crate::signal::ObjectDetector;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub db: SqlitePool,
    pub bus: Arc<EventBus>,
    pub ledger: Arc<IntegrityLedger>,
    /// Pluggable image-object detector for the frame channel
    pub detector: Arc<dyn ObjectDetector>,
    /// Pluggable text-similarity measure for subjective grading
    pub similarity: Arc<dyn SimilarityScorer>,
    /// Pluggable external code-execution judge
    pub judge: Arc<dyn CodeJudge>,
}

impl AppContext {
    pub fn new(
        db: SqlitePool,
        detector: Arc<dyn ObjectDetector>,
        similarity: Arc<dyn SimilarityScorer>,
        judge: Arc<dyn CodeJudge>,
    ) -> Self {
        let bus = Arc::new(EventBus::new(256));
        let ledger = Arc::new(IntegrityLedger::new(
            db.clone(),
            SessionLocks::new(),
            bus.clone(),
        ));
        Self {
            db,
            bus,
            ledger,
            detector,
            similarity,
            judge,
        }
    }
}
