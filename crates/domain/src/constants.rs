//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Token lifecycle
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;
pub const STATE_MAX_AGE_MINUTES: i64 = 20;
pub const STATE_VERSION: u8 = 1;

// Sync engine
pub const PULL_WINDOW_PAST_DAYS: i64 = 60;
pub const PULL_WINDOW_FUTURE_DAYS: i64 = 365;
pub const SYNC_ERROR_MAX_LEN: usize = 500;

// Connections
pub const DEFAULT_CALENDAR_ID: &str = "primary";

// Redirect handling
pub const FALLBACK_RETURN_PATH: &str = "/";
pub const REDIRECT_REASON_MAX_LEN: usize = 120;
