//! Shared error type
//!
//! The shared crate only touches the database and the filesystem, so
//! those are the only failure sources it reports. The server crate
//! layers its own HTTP-facing taxonomy on top.

use thiserror::Error;

/// Result alias for the shared crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Creating the database file or its parent directory failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
