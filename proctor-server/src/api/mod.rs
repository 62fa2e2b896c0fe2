//! HTTP/WebSocket/SSE API

pub mod auth;
pub mod proctoring;
pub mod results;
pub mod server;
pub mod sessions;
pub mod sse;
pub mod ws;

pub use server::create_router;
