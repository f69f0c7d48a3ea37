//! # MeetSync API
//!
//! The HTTP shell: axum routes for the OAuth flow, sync trigger, status
//! query, and connection management, wired over the core services through
//! [`AppContext`].

pub mod context;
pub mod error;
pub mod extract;
pub mod routes;

pub use context::AppContext;
pub use error::ApiError;
