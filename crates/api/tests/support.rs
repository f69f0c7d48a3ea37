//! Shared test helpers for `meetsync-api` integration tests.
//!
//! Builds an application context against a temporary database and provider
//! adapters aimed at wiremock servers, and drives the router in-process.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use meetsync_api::{routes, AppContext};
use meetsync_core::ProviderMap;
use meetsync_domain::{
    ApiToken, AuthConfig, Config, Connection, DatabaseConfig, EventSource, LocalEvent,
    OAuthConfig, ProviderCredentials, ProviderKind, ServerConfig, SyncState,
};
use meetsync_infra::{GoogleCalendarProvider, OutlookCalendarProvider};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::MockServer;

pub const TEST_TOKEN: &str = "test-token";
pub const TEST_USER: &str = "user-1";
pub const STATE_SECRET: &str = "api-test-state-secret";
pub const APP_BASE_URL: &str = "https://app.example";

pub struct TestApp {
    pub ctx: Arc<AppContext>,
    pub router: Router,
    pub google: MockServer,
    pub outlook: MockServer,
    _temp: TempDir,
}

/// Build a full application wired to mock provider servers.
pub async fn spawn_app() -> TestApp {
    let google = MockServer::start().await;
    let outlook = MockServer::start().await;
    let temp = TempDir::new().expect("temp dir");

    let config = Config {
        database: DatabaseConfig {
            path: temp.path().join("meetsync.db").to_string_lossy().to_string(),
            pool_size: 2,
        },
        server: ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            app_base_url: APP_BASE_URL.to_string(),
        },
        oauth: OAuthConfig {
            redirect_uri: format!("{APP_BASE_URL}/api/calendar/callback"),
            state_secret: STATE_SECRET.to_string(),
            google: ProviderCredentials {
                client_id: "google-client-id".to_string(),
                client_secret: "google-client-secret".to_string(),
            },
            outlook: ProviderCredentials {
                client_id: "outlook-client-id".to_string(),
                client_secret: "outlook-client-secret".to_string(),
            },
        },
        auth: AuthConfig {
            tokens: vec![ApiToken {
                token: TEST_TOKEN.to_string(),
                user_id: TEST_USER.to_string(),
            }],
        },
    };

    let mut providers = ProviderMap::new();
    providers.insert(
        ProviderKind::Google,
        Arc::new(
            GoogleCalendarProvider::new(&config.oauth.google, &config.oauth.redirect_uri)
                .with_endpoints(
                    format!("{}/token", google.uri()),
                    google.uri(),
                    format!("{}/userinfo", google.uri()),
                ),
        ),
    );
    providers.insert(
        ProviderKind::Outlook,
        Arc::new(
            OutlookCalendarProvider::new(&config.oauth.outlook, &config.oauth.redirect_uri)
                .with_endpoints(format!("{}/token", outlook.uri()), outlook.uri()),
        ),
    );

    let ctx = Arc::new(AppContext::with_providers(config, providers).expect("context"));
    let router = routes::router(Arc::clone(&ctx));

    TestApp { ctx, router, google, outlook, _temp: temp }
}

/// Drive one request through the router.
pub async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, HeaderMap, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);

    (status, headers, value)
}

/// Store a valid connection for the test user.
pub async fn seed_connection(app: &TestApp, provider: ProviderKind) {
    app.ctx
        .connections
        .upsert(Connection {
            user_id: TEST_USER.to_string(),
            provider,
            provider_account_email: Some(format!("account@{provider}.example")),
            provider_calendar_id: "primary".to_string(),
            access_token: "valid-access-token".to_string(),
            refresh_token: Some("stored-refresh-token".to_string()),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            updated_at: Utc::now(),
        })
        .await
        .expect("seed connection");
}

/// Store a pending local event for the test user.
pub async fn seed_local_event(app: &TestApp, id: &str, title: &str) {
    let starts_at = Utc::now() + Duration::days(1);
    app.ctx
        .events
        .insert(LocalEvent {
            id: id.to_string(),
            user_id: TEST_USER.to_string(),
            title: title.to_string(),
            description: Some("meet at the usual spot".to_string()),
            location: Some("Cafe Central".to_string()),
            starts_at,
            ends_at: starts_at + Duration::hours(1),
            source: EventSource::Local,
            source_event_id: None,
            provider_event_ids: BTreeMap::new(),
            sync_state: SyncState::Pending,
            sync_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .await
        .expect("seed event");
}
