//! # Proctor Common Library
//!
//! Shared code for the exam proctoring services including:
//! - Database models and schema initialization
//! - Event types (ProctorEvent enum) and the EventBus
//! - Common error types

pub mod db;
pub mod error;
pub mod events;
pub mod models;

pub use error::{Error, Result};
