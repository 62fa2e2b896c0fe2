//! Exam proctoring and grading service
//!
//! Runs an online exam session under multi-signal integrity
//! surveillance and grades submitted answers automatically. The two
//! runtime engines are the integrity ledger (per-session trust score
//! under concurrent writers) and the grading orchestrator (detached
//! per-session scoring pass).

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod grading;
pub mod ledger;
pub mod signal;
pub mod state;

pub use error::{Error, Result};
