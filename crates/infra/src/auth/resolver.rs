//! Static bearer-token user resolver.
//!
//! Authentication belongs to an external collaborator; this adapter is the
//! minimal seam that maps configured bearer tokens to user ids so the HTTP
//! layer can attribute requests.

use std::collections::HashMap;

use async_trait::async_trait;
use meetsync_core::UserResolver;
use meetsync_domain::{ApiToken, Result};

/// Resolver over a fixed token → user-id table from configuration.
pub struct StaticTokenResolver {
    tokens: HashMap<String, String>,
}

impl StaticTokenResolver {
    /// Build a resolver from configured token mappings.
    pub fn new(tokens: &[ApiToken]) -> Self {
        Self {
            tokens: tokens
                .iter()
                .map(|entry| (entry.token.clone(), entry.user_id.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl UserResolver for StaticTokenResolver {
    async fn resolve(&self, bearer_token: &str) -> Result<Option<String>> {
        Ok(self.tokens.get(bearer_token).cloned())
    }
}
