//! Application configuration structures
//!
//! Typed configuration consumed by the infra loader (environment first, TOML
//! file fallback) and threaded through the application context.

use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// SQLite database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "meetsync.db".to_string(), pool_size: 5 }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the axum server binds to.
    pub bind_addr: String,
    /// Base URL of the application UI; callback redirects land under it.
    pub app_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            app_base_url: "http://localhost:3000".to_string(),
        }
    }
}

/// OAuth configuration shared by both providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// The redirect URI registered with both providers.
    pub redirect_uri: String,
    /// Server-held secret used to sign OAuth state tokens.
    pub state_secret: String,
    pub google: ProviderCredentials,
    pub outlook: ProviderCredentials,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            redirect_uri: "http://localhost:8080/api/calendar/callback".to_string(),
            state_secret: String::new(),
            google: ProviderCredentials::default(),
            outlook: ProviderCredentials::default(),
        }
    }
}

/// OAuth client credentials for one provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// API authentication configuration.
///
/// Authentication itself is an external collaborator; this only configures
/// the bearer-token resolver seam used to map credentials to user ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub tokens: Vec<ApiToken>,
}

/// One bearer token → user id mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiToken {
    pub token: String,
    pub user_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
            oauth: OAuthConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}
