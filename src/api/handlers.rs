use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::auth::validate_secret_strength;
use crate::errors::AppError;
use crate::middleware::auth::CallerIdentity;
use crate::models::like::{ProjectId, ToggleOutcome};
use crate::models::user::Credentials;
use crate::store::normalize_email;
use crate::AppState;

const INVALID_DATA: &str = "Invalid data.";
const INVALID_LOGIN: &str = "Invalid email or password.";

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Serialize)]
pub struct ToggleResponse {
    pub message: &'static str,
    pub state: &'static str,
}

#[derive(Serialize)]
pub struct ProjectLikesResponse {
    pub project_id: ProjectId,
    pub likes: usize,
    pub liked_by_caller: bool,
}

fn bind<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(v)| v).map_err(|e| {
        tracing::debug!("rejected request body: {}", e);
        AppError::validation(INVALID_DATA)
    })
}

fn project_id(path: Result<Path<ProjectId>, PathRejection>) -> Result<ProjectId, AppError> {
    path.map(|Path(id)| id)
        .map_err(|_| AppError::validation("Invalid ID."))
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /status
pub async fn status() -> Json<Value> {
    Json(json!({ "message": "OK" }))
}

/// GET /readyz: fails when the store is unreachable
pub async fn readiness(State(state): State<Arc<AppState>>) -> Result<&'static str, AppError> {
    state.db.ping().await?;
    Ok("ok")
}

/// GET /metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.encode(),
    )
}

/// POST /users/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let creds = bind(payload)?;
    let email = normalize_email(&creds.email);
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation(INVALID_DATA));
    }

    if state.db.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::validation("Email already used."));
    }

    validate_secret_strength(&creds.password).map_err(|weak| AppError::validation(weak.to_string()))?;

    let hash = state
        .credentials
        .hash(creds.password)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("unable to hash password: {}", e)))?;

    // A concurrent registration may have claimed the email since the check above.
    let user_id = state
        .db
        .create_user(&email, &hash)
        .await?
        .ok_or_else(|| AppError::validation("Email already used."))?;

    tracing::info!(user_id = %user_id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User created successfully." })),
    ))
}

/// POST /users/login: same answer for unknown email and wrong password
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let creds = bind(payload)?;
    let email = normalize_email(&creds.email);

    let user = match state.db.find_user_by_email(&email).await? {
        Some(u) => u,
        None => {
            // Pay the same Argon2 cost as a wrong password for a real account.
            state
                .credentials
                .verify_decoy(creds.password)
                .await
                .map_err(|e| AppError::Internal(anyhow::anyhow!("unable to verify password: {}", e)))?;
            tracing::debug!("login for unknown email");
            return Err(AppError::validation(INVALID_LOGIN));
        }
    };

    let valid = state
        .credentials
        .verify(creds.password, user.password_hash)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("unable to verify password: {}", e)))?;
    if !valid {
        tracing::debug!(user_id = %user.id, "login with wrong password");
        return Err(AppError::validation(INVALID_LOGIN));
    }

    let token = state
        .tokens
        .issue_default(user.id)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("unable to generate token: {}", e)))?;

    tracing::info!(user_id = %user.id, "token issued");
    Ok(Json(TokenResponse { token }))
}

/// PUT /projects/:id/like: like the project, or unlike it if already liked
pub async fn toggle_like(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    path: Result<Path<ProjectId>, PathRejection>,
) -> Result<Json<ToggleResponse>, AppError> {
    let project = project_id(path)?;

    match state.db.toggle_like(project, caller.user_id).await? {
        ToggleOutcome::Toggled(like) => {
            state.metrics.like_toggled(like.as_str());
            tracing::info!(project, user_id = %caller.user_id, state = like.as_str(), "like toggled");
            Ok(Json(ToggleResponse {
                message: like.message(),
                state: like.as_str(),
            }))
        }
        ToggleOutcome::ProjectNotFound => Err(AppError::not_found("Project not found.")),
        ToggleOutcome::UserNotFound => Err(AppError::not_found("User not found.")),
    }
}

/// GET /projects/:id/likes
pub async fn project_likes(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    path: Result<Path<ProjectId>, PathRejection>,
) -> Result<Json<ProjectLikesResponse>, AppError> {
    let project = project_id(path)?;

    let likers = state
        .db
        .project_likes(project)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found."))?;

    Ok(Json(ProjectLikesResponse {
        project_id: project,
        likes: likers.len(),
        liked_by_caller: likers.contains(&caller.user_id),
    }))
}
