use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::ORIGIN, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::{error::AppError, models::user::UserProfile, state::AppState};

pub const SERVICE_NAME: &str = "Kerala Travel Tracker API";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/auth/signup", post(signup))
        .route("/auth/reset-password", post(reset_password))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "service": SERVICE_NAME,
    }))
}

#[derive(Deserialize)]
struct SignupRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    name: String,
}

async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(form) = payload?;
    let email = form.email.trim();
    let name = form.name.trim();
    if email.is_empty() || form.password.is_empty() || name.is_empty() {
        return Err(AppError::BadRequest(
            "Email, password, and name are required".into(),
        ));
    }

    let created = state
        .identity
        .create_user(email, &form.password, name)
        .await?;
    let profile = UserProfile::new(&created.id, &created.email, name);
    state.profiles.create(&profile).await?;
    info!(user_id = %created.id, "user registered");

    let mut body = json!({
        "message": "User registered successfully",
        "user": {
            "id": created.id,
            "email": created.email,
            "name": name,
            "created_at": created.created_at,
        },
    });
    if let Some(token) = created.access_token {
        body["session"] = json!({ "access_token": token });
    }
    Ok(Json(body))
}

#[derive(Deserialize)]
struct ResetPasswordRequest {
    #[serde(default)]
    email: String,
}

async fn reset_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(form) = payload?;
    let email = form.email.trim();
    if email.is_empty() {
        return Err(AppError::BadRequest("Email is required".into()));
    }

    let redirect_to = headers
        .get(ORIGIN)
        .and_then(|origin| origin.to_str().ok())
        .map(|origin| format!("{}/reset-password", origin.trim_end_matches('/')));
    state
        .identity
        .send_password_reset(email, redirect_to.as_deref())
        .await?;

    Ok(Json(json!({ "message": "Password reset email sent successfully" })))
}
