//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: i64,
    model_ready: bool,
    location_models_loaded: usize,
}

/// GET /
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "Farmer Assistant Weather Forecast API",
        "version": env!("CARGO_PKG_VERSION"),
        "location_models_loaded": state.forecast.model_count(),
        "endpoints": {
            "health": "GET /health",
            "location_info": "GET /info/location",
            "model_info": "GET /info/model",
            "available_models": "GET /info/available-models",
            "next_month": "POST /predict/next-month",
            "specific_date": "GET /predict/specific-date/{date}",
            "realtime": "GET /weather/realtime?lat=&lon=&location=",
            "register": "POST /auth/register",
            "login": "POST /auth/login",
            "profile": "GET /profile",
        }
    }))
}

/// GET /health
pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let models = state.forecast.model_count();
    Json(HealthResponse {
        status: if models > 0 { "healthy" } else { "degraded" },
        service: "farmer-weather",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        model_ready: models > 0,
        location_models_loaded: models,
    })
}
