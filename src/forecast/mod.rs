//! Forecast Module - per-location LSTM forecasting
//!
//! Model selection, normalization and inference are kept apart from the
//! statistics layer so either side can change on its own.

pub mod inference;
pub mod locations;
pub mod registry;
pub mod scaler;
pub mod service;
pub mod summary;

use chrono::NaiveDate;
use serde::Serialize;

pub use inference::InferenceError;
pub use registry::ModelRegistry;
pub use service::ForecastService;
pub use summary::{ForecastAlerts, ForecastSummary};

use crate::weather::HistoryError;

/// Features per day: temp_max, temp_min, rainfall
pub const FEATURE_COUNT: usize = 3;

/// Days of history fed to the model, and days forecast
pub const SEQUENCE_LENGTH: usize = 30;

/// One forecast day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub temp_max: f64,
    pub temp_min: f64,
    pub rainfall: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("No models available and location '{0}' not found")]
    NoModels(String),

    #[error("Insufficient historical data. Need at least {needed} days of data, have {available}.")]
    InsufficientData { needed: usize, available: usize },

    #[error("No prediction available for date {0}")]
    DateOutOfRange(String),

    #[error("Historical weather data unavailable: {0}")]
    History(#[from] HistoryError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("forecast task failed: {0}")]
    Task(String),
}
