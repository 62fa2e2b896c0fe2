//! Signal normalizer
//!
//! Converts each proctoring channel's raw payload (camera frame, audio
//! energy, rendering-loop starvation delta, or free-form violation)
//! into the canonical `(violation_type, confidence, metadata)` tuple
//! consumed by the integrity ledger. Each sensing modality has its own
//! confidence semantics: detector scores are continuous, threshold
//! crossings carry a fixed confidence, and generic signals arrive
//! already labeled.

use serde_json::{json, Value};

use crate::Result;

/// Voice energy above this (0-100 scale) counts as speech
pub const AUDIO_ENERGY_THRESHOLD: f64 = 60.0;

/// Rendering-loop starvation above this many milliseconds counts as a
/// tab/window switch
pub const RAF_DELTA_THRESHOLD_MS: f64 = 500.0;

const SPEECH_CONFIDENCE: f64 = 0.8;
const RAF_CONFIDENCE: f64 = 0.95;

// Person-count is a discrete signal, not a probabilistic one, so the
// confidence is fixed rather than taken from the detector score.
const MULTIPLE_FACES_CONFIDENCE: f64 = 0.85;

/// Camera-frame object labels that indicate prohibited material
const RESTRICTED_LABELS: &[&str] = &["cell phone", "book"];

/// Canonical violation tuple, modality-agnostic
#[derive(Debug, Clone)]
pub struct NormalizedViolation {
    pub violation_type: String,
    pub confidence: f64,
    pub metadata: Value,
}

impl NormalizedViolation {
    pub fn new(violation_type: impl Into<String>, confidence: f64, metadata: Value) -> Self {
        Self {
            violation_type: violation_type.into(),
            confidence: confidence.clamp(0.0, 1.0),
            metadata,
        }
    }
}

/// One labeled detection from the object detector
#[derive(Debug, Clone)]
pub struct Detection {
    pub label: String,
    pub confidence: f64,
}

/// Pluggable image-object detector
///
/// The concrete model is an external collaborator; anything returning
/// labeled detections with confidences fits behind this seam.
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, image: &[u8]) -> Result<Vec<Detection>>;
}

/// Detector stub used when no model is wired in: reports nothing
pub struct DisabledDetector;

impl ObjectDetector for DisabledDetector {
    fn detect(&self, _image: &[u8]) -> Result<Vec<Detection>> {
        Ok(Vec::new())
    }
}

/// Normalize a camera-frame detection pass.
///
/// Restricted-object labels map to a `phone_detected` violation, one
/// per detection type, at the maximum raw confidence seen for that
/// type. A person count above one yields `multiple_faces` at a fixed
/// confidence.
pub fn normalize_frame(detections: &[Detection]) -> Vec<NormalizedViolation> {
    let mut violations = Vec::new();

    let labels: Vec<&str> = detections.iter().map(|d| d.label.as_str()).collect();

    let restricted_confidence = detections
        .iter()
        .filter(|d| RESTRICTED_LABELS.contains(&d.label.as_str()))
        .map(|d| d.confidence)
        .fold(f64::NEG_INFINITY, f64::max);
    if restricted_confidence.is_finite() {
        violations.push(NormalizedViolation::new(
            "phone_detected",
            restricted_confidence,
            json!({ "labels": labels }),
        ));
    }

    let person_count = detections.iter().filter(|d| d.label == "person").count();
    if person_count > 1 {
        violations.push(NormalizedViolation::new(
            "multiple_faces",
            MULTIPLE_FACES_CONFIDENCE,
            json!({ "person_count": person_count }),
        ));
    }

    violations
}

/// Normalize an audio-energy sample.
///
/// `voice_energy` is on an externally defined 0-100 scale; values
/// strictly above 60 yield `speech_detected` at confidence 0.8. Any
/// keywords the client flagged travel along in the metadata.
pub fn normalize_audio(voice_energy: f64, keywords: &[String]) -> Option<NormalizedViolation> {
    if voice_energy > AUDIO_ENERGY_THRESHOLD {
        Some(NormalizedViolation::new(
            "speech_detected",
            SPEECH_CONFIDENCE,
            json!({ "voice_energy": voice_energy, "keywords": keywords }),
        ))
    } else {
        None
    }
}

/// Normalize a rendering-loop starvation report.
///
/// `delta_ms` is how long the client's requestAnimationFrame loop was
/// starved, a proxy for a tab or window switch. Deltas strictly above
/// 500ms yield `raf_tab_switch` at confidence 0.95.
pub fn normalize_raf(delta_ms: f64) -> Option<NormalizedViolation> {
    if delta_ms > RAF_DELTA_THRESHOLD_MS {
        Some(NormalizedViolation::new(
            "raf_tab_switch",
            RAF_CONFIDENCE,
            json!({ "delta_ms": delta_ms }),
        ))
    } else {
        None
    }
}

/// Normalize an already-labeled generic signal.
///
/// Passes the triple through verbatim (confidence clamped to [0,1]),
/// which keeps the ingestion contract open for future violation kinds.
pub fn normalize_generic(
    violation_type: &str,
    confidence: f64,
    metadata: Value,
) -> Result<NormalizedViolation> {
    if violation_type.is_empty() {
        return Err(crate::Error::BadRequest(
            "violation_type required".to_string(),
        ));
    }
    Ok(NormalizedViolation::new(violation_type, confidence, metadata))
}
