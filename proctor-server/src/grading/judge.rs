//! External code-execution judge client
//!
//! The judge itself is an out-of-scope collaborator reachable over
//! HTTP (Judge0-compatible wire format). Every call site treats a
//! judge failure as a recoverable, per-test-case outcome.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use std::time::Duration;

use crate::{Error, Result};

/// Outcome of one judged execution
#[derive(Debug, Clone)]
pub struct JudgeRun {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
}

/// Pluggable code-execution judge
#[async_trait]
pub trait CodeJudge: Send + Sync {
    async fn execute(&self, code: &str, language: &str, stdin: &str) -> Result<JudgeRun>;
}

/// Judge stub used when no judge is configured: every execution fails,
/// so code questions score 0 without aborting grading
pub struct DisabledJudge;

#[async_trait]
impl CodeJudge for DisabledJudge {
    async fn execute(&self, _code: &str, _language: &str, _stdin: &str) -> Result<JudgeRun> {
        Err(Error::Internal("code judge not configured".to_string()))
    }
}

/// Judge0-compatible language ids
fn resolve_language(language: &str) -> Result<i64> {
    let id = match language.trim().to_lowercase().as_str() {
        "python" | "python3" => 71,
        "javascript" | "js" => 63,
        "typescript" => 74,
        "java" => 62,
        "c" => 50,
        "c++" | "cpp" => 54,
        "go" => 60,
        "rust" => 73,
        "ruby" => 72,
        other => {
            return Err(Error::BadRequest(format!("Unsupported language: {other}")));
        }
    };
    Ok(id)
}

/// HTTP judge client (Judge0-compatible submissions endpoint)
pub struct HttpCodeJudge {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpCodeJudge {
    pub fn new(base_url: String, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Internal(format!("judge client build failed: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

fn decode_field(value: Option<&serde_json::Value>) -> String {
    let raw = match value.and_then(|v| v.as_str()) {
        Some(s) if !s.is_empty() => s,
        _ => return String::new(),
    };
    match BASE64.decode(raw.trim()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => raw.to_string(),
    }
}

#[async_trait]
impl CodeJudge for HttpCodeJudge {
    async fn execute(&self, code: &str, language: &str, stdin: &str) -> Result<JudgeRun> {
        let language_id = resolve_language(language)?;
        let body = json!({
            "source_code": BASE64.encode(code),
            "language_id": language_id,
            "stdin": if stdin.is_empty() { String::new() } else { BASE64.encode(stdin) },
        });

        let url = format!(
            "{}/submissions?base64_encoded=true&wait=true&fields=*",
            self.base_url
        );
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Internal(format!("judge request failed: {e}")))?;
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("judge response invalid: {e}")))?;

        let stdout = decode_field(payload.get("stdout"));
        let mut stderr = decode_field(payload.get("stderr"));
        if stderr.is_empty() {
            stderr = decode_field(payload.get("compile_output"));
        }
        // status ids: 3 = Accepted, 4 = Wrong Answer; anything else is
        // an execution error worth surfacing
        let status_id = payload
            .get("status")
            .and_then(|s| s.get("id"))
            .and_then(|v| v.as_i64())
            .unwrap_or(3);
        if status_id != 3 && status_id != 4 && stderr.is_empty() {
            stderr = payload
                .get("status")
                .and_then(|s| s.get("description"))
                .and_then(|v| v.as_str())
                .unwrap_or("Runtime error")
                .to_string();
        }
        let exit_code = payload
            .get("exit_code")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        Ok(JudgeRun {
            stdout,
            stderr,
            exit_code,
        })
    }
}
