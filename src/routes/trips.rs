use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{delete, get},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    auth::CurrentUser,
    error::AppError,
    models::trip::{TripDetails, TripInsights, TripRecord},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips", get(list_trips).post(save_trip))
        .route("/trips/insights", get(insights))
        .route("/trips/:trip_id", delete(delete_trip))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SavedTrip {
    pub message: String,
    pub trip: TripRecord,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TripList {
    pub trips: Vec<TripRecord>,
    pub total: usize,
}

async fn save_trip(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<TripDetails>, JsonRejection>,
) -> Result<Json<SavedTrip>, AppError> {
    let Json(details) = payload?;
    let trip = state.trips.save_trip(&user.id, details).await?;
    Ok(Json(SavedTrip {
        message: "Trip saved successfully".into(),
        trip,
    }))
}

async fn list_trips(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<TripList>, AppError> {
    let trips = state.trips.list_trips(&user.id).await?;
    Ok(Json(TripList {
        total: trips.len(),
        trips,
    }))
}

async fn insights(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<TripInsights>, AppError> {
    let today = Utc::now().date_naive();
    Ok(Json(state.trips.insights(&user.id, today).await?))
}

async fn delete_trip(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.trips.delete_trip(&user.id, &trip_id).await?;
    Ok(Json(json!({ "message": "Trip deleted successfully" })))
}
