//! Location and model info handlers

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::AppState;
use crate::forecast::inference::inference_stats;
use crate::forecast::locations::{self, Hobli, HOBLIS};
use crate::forecast::{FEATURE_COUNT, SEQUENCE_LENGTH};

#[derive(Debug, Serialize)]
pub struct LocationInfo {
    pub district: &'static str,
    pub taluks: Vec<&'static str>,
    pub hoblis: &'static [Hobli],
    pub available_models: Vec<String>,
    pub data_source: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelEntry {
    pub slug: String,
    pub name: String,
    pub model_loaded: bool,
}

#[derive(Debug, Serialize)]
pub struct AvailableModels {
    pub status: &'static str,
    pub total_models: usize,
    pub models: Vec<ModelEntry>,
}

/// GET /info/location
pub async fn location(State(state): State<AppState>) -> Json<LocationInfo> {
    Json(LocationInfo {
        district: "Bangalore Rural",
        taluks: locations::taluks(),
        hoblis: &HOBLIS,
        available_models: state
            .forecast
            .registry()
            .slugs()
            .into_iter()
            .map(str::to_string)
            .collect(),
        data_source: "Open-Meteo Historical Weather API",
    })
}

/// GET /info/model
pub async fn model(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "model_type": "LSTM (Long Short-Term Memory)",
        "architecture": {
            "layers": [
                {"type": "LSTM", "units": 64, "return_sequences": true},
                {"type": "LSTM", "units": 64, "return_sequences": true},
                {"type": "LSTM", "units": 32, "return_sequences": false},
                {"type": "Dense", "units": SEQUENCE_LENGTH * FEATURE_COUNT},
                {"type": "Reshape", "shape": [SEQUENCE_LENGTH, FEATURE_COUNT]}
            ],
            "input_shape": [SEQUENCE_LENGTH, FEATURE_COUNT],
            "output_shape": [SEQUENCE_LENGTH, FEATURE_COUNT]
        },
        "features": ["temp_max", "temp_min", "rainfall"],
        "sequence_length": SEQUENCE_LENGTH,
        "forecast_horizon_days": SEQUENCE_LENGTH,
        "runtime": "ONNX Runtime",
        "location_models_loaded": state.forecast.model_count(),
        "inference": inference_stats(),
    }))
}

/// GET /info/available-models
pub async fn available_models(State(state): State<AppState>) -> Json<AvailableModels> {
    let registry = state.forecast.registry();
    let models: Vec<ModelEntry> = registry
        .slugs()
        .into_iter()
        .map(|slug| ModelEntry {
            slug: slug.to_string(),
            name: locations::display_name(slug),
            model_loaded: true,
        })
        .collect();

    Json(AvailableModels {
        status: if models.is_empty() { "no_models_loaded" } else { "success" },
        total_models: models.len(),
        models,
    })
}
