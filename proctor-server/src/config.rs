//! Service configuration
//!
//! Assembled from command-line arguments with environment fallbacks
//! (see `Args` in main.rs).

use std::path::PathBuf;

/// Runtime configuration for the proctoring service
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server listens on
    pub port: u16,

    /// Path to the SQLite database file
    pub db_path: PathBuf,

    /// Base URL of the external code-execution judge (None disables
    /// code grading; code questions then score 0)
    pub judge_url: Option<String>,

    /// API key sent to the code-execution judge
    pub judge_key: Option<String>,
}
