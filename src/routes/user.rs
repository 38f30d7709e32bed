use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use crate::{
    auth::CurrentUser,
    error::AppError,
    models::{export::DataExport, user::ProfileUpdate},
    services::profiles::PROFILE_NOT_FOUND,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile).put(update_profile))
        .route("/export", get(export))
}

async fn profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, AppError> {
    let profile = state
        .profiles
        .get(&user.id)
        .await?
        .ok_or(AppError::NotFound(PROFILE_NOT_FOUND))?;
    Ok(Json(json!({ "user": profile })))
}

async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(update) = payload?;
    let profile = state.profiles.update(&user.id, update).await?;
    Ok(Json(json!({
        "message": "Profile updated successfully",
        "user": profile,
    })))
}

async fn export(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let profile = state
        .profiles
        .get(&user.id)
        .await?
        .ok_or(AppError::NotFound(PROFILE_NOT_FOUND))?;
    let trips = state.trips.list_trips(&user.id).await?;
    let export = DataExport::new(profile, trips, Utc::now());
    info!(user_id = %user.id, trips = export.trips.len(), "data exported");

    let disposition = format!("attachment; filename=\"{}\"", export.file_name());
    Ok(([(header::CONTENT_DISPOSITION, disposition)], Json(export)))
}
