//! Partage: access control and request admission for the project-sharing API.
//!
//! Every request passes the admission controller, then (on protected routes)
//! the bearer-token gate, then its handler. The crate is a library so the
//! binary and the integration tests in `tests/` build the same router.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod store;

use auth::{CredentialService, TokenService};
use middleware::metrics::Metrics;
use middleware::rate_limit::AdmissionController;
use store::Store;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub db: Arc<dyn Store>,
    pub credentials: CredentialService,
    pub tokens: TokenService,
    pub limiter: AdmissionController,
    pub metrics: Metrics,
    pub config: config::Config,
}

impl AppState {
    /// Build the signing key, hasher and limiter from configuration. Called
    /// once at startup; nothing here is looked up globally afterwards.
    pub fn new(config: config::Config, db: Arc<dyn Store>) -> anyhow::Result<Self> {
        let credentials = CredentialService::new(
            config.argon2_memory_kib,
            config.argon2_iterations,
            config.argon2_parallelism,
        )?;
        let tokens = TokenService::new(&config.jwt_secret, config.token_ttl());
        let limiter = AdmissionController::new(config.rate_limit, config.rate_limit_window());
        let metrics = Metrics::new()?;

        Ok(Self {
            db,
            credentials,
            tokens,
            limiter,
            metrics,
            config,
        })
    }
}

/// The complete application: routes, authentication, admission control and
/// response middleware.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.dashboard_origin);

    api::api_router(state.clone())
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors)
        // Outside CORS so preflight requests are admitted like any other.
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::rate_limit::admit,
        ))
        .layer(axum::middleware::from_fn(middleware::headers::request_id))
        .layer(axum::middleware::from_fn(middleware::headers::security_headers))
}

fn cors_layer(dashboard_origin: &str) -> CorsLayer {
    let dashboard_origin = dashboard_origin.to_string();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            origin_str == dashboard_origin
                || origin_str.starts_with("http://localhost:")
                || origin_str.starts_with("http://127.0.0.1:")
        }))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
            HeaderName::from_static("x-request-id"),
        ])
        .allow_credentials(true)
}
