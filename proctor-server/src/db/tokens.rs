//! Bearer-token lookups
//!
//! Token issuance and expiry are owned by the external auth service;
//! this module only consults its published validity table.

use sqlx::SqlitePool;

use crate::Result;

/// Resolve a bearer token to `(user_id, role)`, or None if invalid
pub async fn lookup(pool: &SqlitePool, token: &str) -> Result<Option<(String, String)>> {
    let row: Option<(String, String)> =
        sqlx::query_as("SELECT user_id, role FROM auth_tokens WHERE token = ?")
            .bind(token)
            .fetch_optional(pool)
            .await?;
    Ok(row)
}
