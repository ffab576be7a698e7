//! Real-time weather handler

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::{AppState, AppError, AppResult};
use crate::weather::RealtimeWeather;

#[derive(Debug, Deserialize)]
pub struct RealtimeQuery {
    pub lat: f64,
    pub lon: f64,
    pub location: Option<String>,
}

/// GET /weather/realtime
pub async fn current(
    State(state): State<AppState>,
    Query(query): Query<RealtimeQuery>,
) -> AppResult<Json<RealtimeWeather>> {
    if !(-90.0..=90.0).contains(&query.lat) || !(-180.0..=180.0).contains(&query.lon) {
        return Err(AppError::ValidationError("Coordinates out of range".to_string()));
    }
    let location = query.location.as_deref().unwrap_or("Unknown Location");

    let reading = state.realtime.current(query.lat, query.lon, location).await?;
    Ok(Json(reading))
}
