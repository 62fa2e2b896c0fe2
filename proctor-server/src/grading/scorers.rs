//! Question scorers
//!
//! Stateless functions mapping a (question, answer) pair to a numeric
//! score under a question-type-specific algorithm. The semantic
//! comparator and the code judge sit behind narrow traits so models
//! and sandboxes can be swapped without touching the orchestrator.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::grading::judge::CodeJudge;
use crate::Result;

/// Component weights for the subjective rubric
const SEMANTIC_WEIGHT: f64 = 0.60;
const KEYWORD_WEIGHT: f64 = 0.25;
const STRUCTURE_WEIGHT: f64 = 0.15;

/// Semantic scores below this flag the response for manual review
const NEEDS_REVIEW_THRESHOLD: f64 = 0.45;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Pluggable text-similarity measure in [0, 1]
///
/// Production deployments plug an embedding comparator in here; the
/// built-in default is a token-overlap measure so grading works
/// without an external model.
pub trait SimilarityScorer: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> Result<f64>;
}

/// Jaccard overlap of lowercased word sets
pub struct TokenOverlapSimilarity;

impl SimilarityScorer for TokenOverlapSimilarity {
    fn similarity(&self, a: &str, b: &str) -> Result<f64> {
        let set_a: std::collections::HashSet<String> =
            a.to_lowercase().split_whitespace().map(String::from).collect();
        let set_b: std::collections::HashSet<String> =
            b.to_lowercase().split_whitespace().map(String::from).collect();
        if set_a.is_empty() && set_b.is_empty() {
            return Ok(1.0);
        }
        let intersection = set_a.intersection(&set_b).count() as f64;
        let union = set_a.union(&set_b).count() as f64;
        if union == 0.0 {
            Ok(0.0)
        } else {
            Ok(intersection / union)
        }
    }
}

/// Score an objective (MCQ) answer.
///
/// Case-insensitive exact match on the trimmed strings. Empty or
/// missing answers score 0. A mismatch costs
/// `marks × negative_fraction` (zero when negative marking is off).
pub fn score_mcq(
    answer: Option<&str>,
    correct_answer: &str,
    marks: f64,
    negative_fraction: f64,
) -> f64 {
    let answer = match answer {
        Some(a) if !a.trim().is_empty() => a,
        _ => return 0.0,
    };
    if answer.trim().to_lowercase() == correct_answer.trim().to_lowercase() {
        marks
    } else {
        -(marks * negative_fraction)
    }
}

/// Component breakdown of a subjective score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectiveBreakdown {
    pub score: f64,
    pub semantic: f64,
    pub keyword: f64,
    pub structure: f64,
    pub needs_review: bool,
}

/// Score a subjective answer against the reference rubric.
///
/// `score = marks × (0.60·semantic + 0.25·keyword + 0.15·structure)`,
/// clamped to [0, marks]. All components and the final score are
/// rounded to 3 decimals so reports reproduce bit-for-bit.
pub fn score_subjective(
    answer: &str,
    reference: &str,
    keywords: &[String],
    marks: f64,
    similarity: &dyn SimilarityScorer,
) -> SubjectiveBreakdown {
    // A comparator failure fails only this component, never the pass
    let semantic = match similarity.similarity(answer, reference) {
        Ok(value) => round3(value.clamp(0.0, 1.0)),
        Err(err) => {
            warn!("similarity scorer failed, semantic component scored 0: {err}");
            0.0
        }
    };

    // Neutral default for an unconstrained rubric
    let keyword = if keywords.is_empty() {
        1.0
    } else {
        let answer_lower = answer.to_lowercase();
        let found = keywords
            .iter()
            .filter(|k| answer_lower.contains(&k.to_lowercase()))
            .count() as f64;
        round3(found / keywords.len() as f64)
    };

    let word_diff = (answer.split_whitespace().count() as f64
        - reference.split_whitespace().count() as f64)
        .abs();
    let structure = round3((1.0 - word_diff / 100.0).max(0.0));

    let raw = marks
        * (SEMANTIC_WEIGHT * semantic + KEYWORD_WEIGHT * keyword + STRUCTURE_WEIGHT * structure);
    let score = round3(raw.clamp(0.0, marks));

    SubjectiveBreakdown {
        score,
        semantic,
        keyword,
        structure,
        needs_review: semantic < NEEDS_REVIEW_THRESHOLD,
    }
}

/// One test case for a code question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default, alias = "stdin")]
    pub input: String,
    #[serde(default)]
    pub expected_output: String,
}

/// Per-case outcome of a code grading pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub input: String,
    pub expected: String,
    pub got: String,
    pub passed: bool,
    pub stderr: String,
}

/// Aggregated outcome of a code grading pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeBreakdown {
    pub score: f64,
    pub passed: usize,
    pub total: usize,
    pub results: Vec<CaseOutcome>,
}

/// Score a code answer by running each test case through the judge.
///
/// Trimmed stdout is compared to the trimmed expected output. A judge
/// timeout or transport failure counts that one case as failed and
/// the pass continues. `score = marks × passed/total`.
pub async fn score_code(
    code: &str,
    language: &str,
    test_cases: &[TestCase],
    marks: f64,
    judge: &dyn CodeJudge,
) -> CodeBreakdown {
    if test_cases.is_empty() || code.trim().is_empty() {
        return CodeBreakdown {
            score: 0.0,
            passed: 0,
            total: test_cases.len(),
            results: Vec::new(),
        };
    }

    let total = test_cases.len();
    let mut passed = 0;
    let mut results = Vec::with_capacity(total);

    for case in test_cases {
        let expected = case.expected_output.trim().to_string();
        let (got, stderr) = match judge.execute(code, language, &case.input).await {
            Ok(run) => (run.stdout.trim().to_string(), run.stderr),
            Err(err) => {
                warn!("code judge failed, counting test case as failed: {err}");
                (String::new(), err.to_string())
            }
        };
        let ok = got == expected;
        if ok {
            passed += 1;
        }
        results.push(CaseOutcome {
            input: case.input.clone(),
            expected,
            got,
            passed: ok,
            stderr: stderr.chars().take(200).collect(),
        });
    }

    CodeBreakdown {
        score: round2(marks * passed as f64 / total as f64),
        passed,
        total,
        results,
    }
}
