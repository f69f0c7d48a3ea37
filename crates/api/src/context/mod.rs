//! Application context
//!
//! Wires configuration, the database, repositories, provider adapters, and
//! the core services into one shared state handle.

use std::sync::Arc;

use meetsync_common::auth::state::StateCodec;
use meetsync_core::{
    ConnectionRepository, LocalEventRepository, OAuthFlowController, ProviderMap, SyncEngine,
    UserResolver,
};
use meetsync_domain::{Config, Result};
use meetsync_infra::{
    build_providers, Database, SqliteConnectionRepository, SqliteLocalEventRepository,
    StaticTokenResolver,
};

/// Shared application state for the HTTP layer.
pub struct AppContext {
    pub config: Config,
    pub connections: Arc<dyn ConnectionRepository>,
    pub events: Arc<dyn LocalEventRepository>,
    pub resolver: Arc<dyn UserResolver>,
    pub flow: Arc<OAuthFlowController>,
    pub sync: Arc<SyncEngine>,
}

impl AppContext {
    /// Build the context with the real provider adapters.
    pub fn new(config: Config) -> Result<Self> {
        let providers = build_providers(&config.oauth);
        Self::with_providers(config, providers)
    }

    /// Build the context with caller-supplied provider adapters.
    ///
    /// Tests use this to aim the adapters at mock servers.
    pub fn with_providers(config: Config, providers: ProviderMap) -> Result<Self> {
        let database = Database::open(&config.database)?;

        let connections: Arc<dyn ConnectionRepository> =
            Arc::new(SqliteConnectionRepository::new(database.clone()));
        let events: Arc<dyn LocalEventRepository> =
            Arc::new(SqliteLocalEventRepository::new(database));
        let resolver: Arc<dyn UserResolver> =
            Arc::new(StaticTokenResolver::new(&config.auth.tokens));

        let codec = StateCodec::new(&config.oauth.state_secret);
        let flow = Arc::new(OAuthFlowController::new(
            codec,
            Arc::clone(&connections),
            providers.clone(),
        ));
        let sync =
            Arc::new(SyncEngine::new(Arc::clone(&connections), Arc::clone(&events), providers));

        Ok(Self { config, connections, events, resolver, flow, sync })
    }
}
