//! Forecast statistics and farmer alerts
//!
//! Rain/dry classification uses an adaptive threshold: models trained on dry
//! seasons emit tiny rainfall values, and a fixed 5mm cut would call every
//! day dry.

use chrono::NaiveDate;
use serde::Serialize;

use super::DailyForecast;

/// Hot day cut-off (°C, on temp_max)
pub const HIGH_TEMPERATURE_C: f64 = 40.0;

/// Heavy rain cut-off (mm/day)
pub const HEAVY_RAINFALL_MM: f64 = 50.0;

/// Cold night cut-off (°C, on temp_min)
pub const FROST_TEMPERATURE_C: f64 = 10.0;

/// A dry streak longer than this raises a drought alert
pub const DROUGHT_STREAK_DAYS: usize = 15;

/// Rain threshold scaled to the forecast's peak rainfall
pub fn rain_threshold(rainfall: &[f64]) -> f64 {
    let max = rainfall
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    let max = if max.is_finite() { max } else { 0.0 };

    if max < 1.0 {
        0.5
    } else if max < 5.0 {
        1.0
    } else {
        5.0
    }
}

/// Longest run of consecutive days with rain below `threshold`
pub fn longest_dry_streak(rainfall: &[f64], threshold: f64) -> usize {
    let mut streak = 0;
    let mut longest = 0;
    for &rain in rainfall {
        if rain < threshold {
            streak += 1;
            longest = longest.max(streak);
        } else {
            streak = 0;
        }
    }
    longest
}

fn finite(values: impl Iterator<Item = f64>) -> Vec<f64> {
    values.filter(|v| v.is_finite()).collect()
}

fn or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    or_zero(values.iter().sum::<f64>() / values.len() as f64)
}

fn max(values: &[f64]) -> f64 {
    or_zero(values.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

fn min(values: &[f64]) -> f64 {
    or_zero(values.iter().copied().fold(f64::INFINITY, f64::min))
}

// ============================================================================
// SUMMARY
// ============================================================================

/// Aggregate view of a forecast
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSummary {
    pub avg_max_temp: f64,
    pub avg_min_temp: f64,
    pub max_temperature: f64,
    pub min_temperature: f64,
    pub total_rainfall: f64,
    pub avg_daily_rainfall: f64,
    pub rainy_days: usize,
    pub dry_days: usize,
    pub rain_threshold: f64,
}

/// Summary statistics; `None` for an empty forecast.
///
/// Non-finite model outputs are skipped, and a statistic with nothing left
/// to aggregate reports 0.
pub fn summarize(predictions: &[DailyForecast]) -> Option<ForecastSummary> {
    if predictions.is_empty() {
        return None;
    }

    let temp_max = finite(predictions.iter().map(|p| p.temp_max));
    let temp_min = finite(predictions.iter().map(|p| p.temp_min));
    let rain_all: Vec<f64> = predictions.iter().map(|p| p.rainfall).collect();
    let rain = finite(rain_all.iter().copied());

    let threshold = rain_threshold(&rain_all);
    let rainy_days = rain_all.iter().filter(|r| **r > threshold).count();
    let dry_days = rain_all.iter().filter(|r| **r <= threshold).count();

    Some(ForecastSummary {
        avg_max_temp: mean(&temp_max),
        avg_min_temp: mean(&temp_min),
        max_temperature: max(&temp_max),
        min_temperature: min(&temp_min),
        total_rainfall: or_zero(rain.iter().sum()),
        avg_daily_rainfall: mean(&rain),
        rainy_days,
        dry_days,
        rain_threshold: threshold,
    })
}

// ============================================================================
// ALERTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HighTemperature,
    HeavyRainfall,
    DroughtRisk,
    FrostRisk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertDetail {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub date: Option<NaiveDate>,
}

/// Alert counts plus one detail entry per triggered alert type
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ForecastAlerts {
    pub high_temperature: usize,
    pub heavy_rainfall: usize,
    pub drought_risk: u8,
    pub frost_risk: usize,
    pub max_dry_streak: usize,
    pub details: Vec<AlertDetail>,
}

/// Day holding the extreme of `key`; `better(a, b)` is true when a beats b
fn extreme_day(
    predictions: &[DailyForecast],
    key: impl Fn(&DailyForecast) -> f64,
    better: impl Fn(f64, f64) -> bool,
) -> Option<(NaiveDate, f64)> {
    predictions
        .iter()
        .filter(|p| key(p).is_finite())
        .fold(None, |best, p| match best {
            Some((_, v)) if !better(key(p), v) => best,
            _ => Some((p.date, key(p))),
        })
}

pub fn alerts(predictions: &[DailyForecast]) -> ForecastAlerts {
    let mut alerts = ForecastAlerts::default();
    if predictions.is_empty() {
        return alerts;
    }

    alerts.high_temperature = predictions.iter().filter(|p| p.temp_max > HIGH_TEMPERATURE_C).count();
    alerts.heavy_rainfall = predictions.iter().filter(|p| p.rainfall > HEAVY_RAINFALL_MM).count();
    alerts.frost_risk = predictions.iter().filter(|p| p.temp_min < FROST_TEMPERATURE_C).count();

    let rainfall: Vec<f64> = predictions.iter().map(|p| p.rainfall).collect();
    let threshold = rain_threshold(&rainfall);
    alerts.max_dry_streak = longest_dry_streak(&rainfall, threshold);
    if alerts.max_dry_streak > DROUGHT_STREAK_DAYS {
        alerts.drought_risk = 1;
    }

    if alerts.high_temperature > 0 {
        if let Some((date, peak)) = extreme_day(predictions, |p| p.temp_max, |a, b| a > b) {
            alerts.details.push(AlertDetail {
                kind: AlertKind::HighTemperature,
                severity: AlertSeverity::Warning,
                message: format!("High temperatures expected (up to {:.1}°C). Ensure adequate irrigation.", peak),
                date: Some(date),
            });
        }
    }

    if alerts.heavy_rainfall > 0 {
        if let Some((date, peak)) = extreme_day(predictions, |p| p.rainfall, |a, b| a > b) {
            alerts.details.push(AlertDetail {
                kind: AlertKind::HeavyRainfall,
                severity: AlertSeverity::Warning,
                message: format!("Heavy rainfall expected (up to {:.1}mm). Ensure proper drainage.", peak),
                date: Some(date),
            });
        }
    }

    if alerts.drought_risk > 0 {
        alerts.details.push(AlertDetail {
            kind: AlertKind::DroughtRisk,
            severity: AlertSeverity::Info,
            message: format!(
                "Low rainfall expected ({} consecutive dry days). Plan irrigation accordingly.",
                alerts.max_dry_streak
            ),
            date: None,
        });
    }

    if alerts.frost_risk > 0 {
        if let Some((date, low)) = extreme_day(predictions, |p| p.temp_min, |a, b| a < b) {
            alerts.details.push(AlertDetail {
                kind: AlertKind::FrostRisk,
                severity: AlertSeverity::Warning,
                message: format!("Low temperatures expected (down to {:.1}°C). Frost risk possible.", low),
                date: Some(date),
            });
        }
    }

    alerts
}
