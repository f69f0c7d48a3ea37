//! # MeetSync Common
//!
//! Foundation utilities shared across the workspace.
//!
//! This crate contains:
//! - The signed OAuth state token codec
//! - Input validation helpers
//!
//! ## Architecture
//! - No dependencies on other MeetSync crates
//! - Pure functions and small types only; no I/O

pub mod auth;
pub mod validation;

pub use auth::state::{StateCodec, StateCodecError, StatePayload};
pub use validation::sanitize_return_path;
