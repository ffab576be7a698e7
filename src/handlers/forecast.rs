//! Forecast handlers

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{AppState, AppError, AppResult};
use crate::forecast::{DailyForecast, ForecastAlerts, ForecastSummary};
use crate::weather::Coordinates;

pub const DEFAULT_LATITUDE: f64 = 13.2256;
pub const DEFAULT_LONGITUDE: f64 = 77.5750;
pub const DEFAULT_LOCATION: &str = "Bangalore Rural";

/// Request location; every field falls back to Bangalore Rural
#[derive(Debug, Default, Deserialize)]
pub struct LocationQuery {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location: Option<String>,
}

impl LocationQuery {
    /// Parse a request body; only an empty body means "use the defaults"
    fn from_body(body: &[u8]) -> AppResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| AppError::ValidationError(format!("Invalid request body: {}", e)))
    }

    fn resolve(self) -> AppResult<(String, Coordinates)> {
        let coordinates = Coordinates {
            latitude: self.latitude.unwrap_or(DEFAULT_LATITUDE),
            longitude: self.longitude.unwrap_or(DEFAULT_LONGITUDE),
        };
        if !(-90.0..=90.0).contains(&coordinates.latitude)
            || !(-180.0..=180.0).contains(&coordinates.longitude)
        {
            return Err(AppError::ValidationError("Coordinates out of range".to_string()));
        }

        let location = self
            .location
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());
        Ok((location, coordinates))
    }
}

#[derive(Debug, Serialize)]
pub struct ForecastData {
    pub predictions: Vec<DailyForecast>,
    pub summary: Option<ForecastSummary>,
    pub alerts: ForecastAlerts,
    pub location: String,
    pub coordinates: Coordinates,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub data: T,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            data,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DateForecast {
    #[serde(flatten)]
    pub forecast: DailyForecast,
    pub location: String,
    pub coordinates: Coordinates,
}

/// POST /predict/next-month
pub async fn next_month(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<ApiResponse<ForecastData>>> {
    let (location, coordinates) = LocationQuery::from_body(&body)?.resolve()?;

    let report = state
        .forecast
        .forecast_next_month(&location, Some((coordinates.latitude, coordinates.longitude)))
        .await?;

    Ok(Json(ApiResponse::success(ForecastData {
        predictions: report.predictions,
        summary: report.summary,
        alerts: report.alerts,
        location,
        coordinates,
        model: report.model,
    })))
}

/// GET /predict/specific-date/:date
pub async fn specific_date(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Query(query): Query<LocationQuery>,
) -> AppResult<Json<ApiResponse<DateForecast>>> {
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| AppError::ValidationError("Invalid date format. Use YYYY-MM-DD".to_string()))?;
    let (location, coordinates) = query.resolve()?;

    let forecast = state
        .forecast
        .forecast_for_date(date, &location, Some((coordinates.latitude, coordinates.longitude)))
        .await?;

    Ok(Json(ApiResponse::success(DateForecast {
        forecast,
        location,
        coordinates,
    })))
}
