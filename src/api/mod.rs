use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::middleware::auth::authenticate;
use crate::AppState;

pub mod handlers;

/// Build the HTTP router. Routes under `/projects` require a bearer token;
/// admission control is layered over the whole router by the caller.
pub fn api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/projects/:id/like", put(handlers::toggle_like))
        .route("/projects/:id/likes", get(handlers::project_likes))
        .route_layer(middleware::from_fn_with_state(state, authenticate));

    Router::new()
        .route("/status", get(handlers::status))
        .route("/readyz", get(handlers::readiness))
        .route("/metrics", get(handlers::metrics))
        .route("/users/register", post(handlers::register))
        .route("/users/login", post(handlers::login))
        .merge(protected)
        .fallback(fallback_404)
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}
