//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from a TOML file
//!
//! ## Environment Variables
//! - `MEETSYNC_DB_PATH`: Database file path (default `meetsync.db`)
//! - `MEETSYNC_DB_POOL_SIZE`: Connection pool size (default 5)
//! - `MEETSYNC_BIND_ADDR`: HTTP bind address (default `127.0.0.1:8080`)
//! - `MEETSYNC_APP_BASE_URL`: Base URL of the application UI
//! - `MEETSYNC_OAUTH_REDIRECT_URI`: Redirect URI registered with providers
//! - `MEETSYNC_STATE_SECRET`: Secret used to sign OAuth state tokens
//! - `MEETSYNC_GOOGLE_CLIENT_ID` / `MEETSYNC_GOOGLE_CLIENT_SECRET`
//! - `MEETSYNC_OUTLOOK_CLIENT_ID` / `MEETSYNC_OUTLOOK_CLIENT_SECRET`
//! - `MEETSYNC_API_TOKENS`: comma-separated `token:user_id` pairs
//!
//! ## File Locations
//! The loader probes `./meetsync.toml` then `./config.toml`.

use std::path::{Path, PathBuf};

use meetsync_domain::{
    ApiToken, AuthConfig, Config, DatabaseConfig, MeetSyncError, OAuthConfig, ProviderCredentials,
    Result, ServerConfig,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `MeetSyncError::Config` if required variables are missing or have
/// invalid values.
pub fn load_from_env() -> Result<Config> {
    let database = DatabaseConfig {
        path: env_or("MEETSYNC_DB_PATH", "meetsync.db"),
        pool_size: env_parsed("MEETSYNC_DB_POOL_SIZE", 5)?,
    };

    let server = ServerConfig {
        bind_addr: env_or("MEETSYNC_BIND_ADDR", "127.0.0.1:8080"),
        app_base_url: env_var("MEETSYNC_APP_BASE_URL")?,
    };

    let oauth = OAuthConfig {
        redirect_uri: env_var("MEETSYNC_OAUTH_REDIRECT_URI")?,
        state_secret: env_var("MEETSYNC_STATE_SECRET")?,
        google: ProviderCredentials {
            client_id: env_var("MEETSYNC_GOOGLE_CLIENT_ID")?,
            client_secret: env_var("MEETSYNC_GOOGLE_CLIENT_SECRET")?,
        },
        outlook: ProviderCredentials {
            client_id: env_var("MEETSYNC_OUTLOOK_CLIENT_ID")?,
            client_secret: env_var("MEETSYNC_OUTLOOK_CLIENT_SECRET")?,
        },
    };

    let auth = AuthConfig {
        tokens: match std::env::var("MEETSYNC_API_TOKENS") {
            Ok(raw) => parse_api_tokens(&raw)?,
            Err(_) => Vec::new(),
        },
    };

    Ok(Config { database, server, oauth, auth })
}

/// Load configuration from a TOML file, probing default locations when no
/// path is given.
pub fn load_from_file(path: Option<&Path>) -> Result<Config> {
    let candidate = match path {
        Some(path) => path.to_path_buf(),
        None => probe_default_paths().ok_or_else(|| {
            MeetSyncError::Config(
                "no configuration found in environment or config files".to_string(),
            )
        })?,
    };

    let contents = std::fs::read_to_string(&candidate).map_err(|e| {
        MeetSyncError::Config(format!("failed to read {}: {e}", candidate.display()))
    })?;

    let config: Config = toml::from_str(&contents).map_err(|e| {
        MeetSyncError::Config(format!("invalid config file {}: {e}", candidate.display()))
    })?;

    tracing::info!(path = %candidate.display(), "configuration loaded from file");

    Ok(config)
}

/// Parse `token:user_id` pairs from a comma-separated list.
fn parse_api_tokens(raw: &str) -> Result<Vec<ApiToken>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once(':')
                .filter(|(token, user_id)| !token.is_empty() && !user_id.is_empty())
                .map(|(token, user_id)| ApiToken {
                    token: token.to_string(),
                    user_id: user_id.to_string(),
                })
                .ok_or_else(|| {
                    MeetSyncError::Config(format!(
                        "invalid API token entry (expected token:user_id): {entry}"
                    ))
                })
        })
        .collect()
}

fn probe_default_paths() -> Option<PathBuf> {
    ["meetsync.toml", "config.toml"]
        .iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.exists())
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| MeetSyncError::Config(format!("missing environment variable: {name}")))
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parsed(name: &str, default: u32) -> Result<u32> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u32>()
            .map_err(|e| MeetSyncError::Config(format!("invalid value for {name}: {e}"))),
        Err(_) => Ok(default),
    }
}
