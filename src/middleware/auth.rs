//! Bearer-token authentication gate.
//!
//! Runs before every protected route. On success the resolved identity is
//! stored in the request extensions as a typed [`CallerIdentity`], which
//! handlers take as an extractor instead of re-parsing the token.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::errors::AppError;
use crate::models::user::UserId;
use crate::AppState;

/// Identity of the authenticated caller, attached by [`authenticate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: UserId,
}

/// Extract the token from `Authorization: Bearer <token>`.
/// The scheme is case-insensitive; the token must be a single non-empty word.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get("authorization")?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token)
}

/// Middleware: verify the bearer token and attach the caller identity.
/// Rejects with 401 without invoking the handler when anything is off.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = match bearer_token(req.headers()) {
        Some(t) => t,
        None => {
            state.metrics.auth_failure("missing");
            tracing::debug!("missing or malformed Authorization header");
            return Err(AppError::unauthorized("Missing or malformed Authorization header."));
        }
    };

    let user_id = state.tokens.verify(token).map_err(|e| {
        state.metrics.auth_failure(e.reason());
        tracing::debug!(reason = e.reason(), "bearer token rejected");
        AppError::unauthorized(format!("Unauthorized: {}.", e))
    })?;

    req.extensions_mut().insert(CallerIdentity { user_id });
    Ok(next.run(req).await)
}

impl CallerIdentity {
    /// Read the identity the gate attached. `None` means the gate did not run.
    pub fn from_parts(parts: &Parts) -> Option<Self> {
        parts.extensions.get::<CallerIdentity>().copied()
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        CallerIdentity::from_parts(parts).ok_or_else(|| {
            // A route reachable without the gate is a wiring bug, not a client error.
            AppError::Internal(anyhow::anyhow!(
                "CallerIdentity requested on {} which is not behind the authentication gate",
                parts.uri.path()
            ))
        })
    }
}
