//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::calendar::ProviderKind;

/// Main error type for MeetSync
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum MeetSyncError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    /// OAuth state token unparseable, tampered with, or expired.
    #[error("Invalid OAuth state: {0}")]
    InvalidState(String),

    /// The provider reported an OAuth error at the callback.
    #[error("Provider OAuth error: {0}")]
    ProviderOAuth(String),

    /// Non-success response from a provider's token endpoint during code
    /// exchange.
    #[error("Token exchange failed for {provider}: {message}")]
    TokenExchange { provider: ProviderKind, message: String },

    /// Non-success response from a provider's token endpoint during refresh.
    #[error("Token refresh failed for {provider}: {message}")]
    TokenRefresh { provider: ProviderKind, message: String },

    /// A single remote event create/update call failed.
    #[error("Remote sync failed for {provider} event '{title}': {message}")]
    RemoteSync { provider: ProviderKind, title: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for MeetSync operations
pub type Result<T> = std::result::Result<T, MeetSyncError>;
