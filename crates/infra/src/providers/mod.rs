//! Calendar provider adapters
//!
//! Google and Outlook implementations of the uniform
//! [`meetsync_core::CalendarProvider`] contract. Construction goes through
//! [`build_providers`] so callers select adapters by lookup and never branch
//! on provider identity.

use std::sync::Arc;
use std::time::Duration;

use meetsync_core::ProviderMap;
use meetsync_domain::{OAuthConfig, ProviderKind};
use reqwest::Client;

mod google;
mod outlook;

pub use google::GoogleCalendarProvider;
pub use outlook::OutlookCalendarProvider;

const HTTP_TIMEOUT_SECS: u64 = 30;

/// HTTP client shared by the adapters, with a per-call timeout so a hanging
/// provider cannot stall a sync run indefinitely.
pub(crate) fn http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Build the adapter map for all supported providers.
pub fn build_providers(config: &OAuthConfig) -> ProviderMap {
    let mut providers = ProviderMap::new();
    providers.insert(
        ProviderKind::Google,
        Arc::new(GoogleCalendarProvider::new(&config.google, &config.redirect_uri)),
    );
    providers.insert(
        ProviderKind::Outlook,
        Arc::new(OutlookCalendarProvider::new(&config.outlook, &config.redirect_uri)),
    );
    providers
}
