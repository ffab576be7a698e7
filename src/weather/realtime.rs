//! Real-time conditions from the Open-Meteo current-weather API
//!
//! The last good reading per coordinate pair is kept so a slow or
//! unreachable upstream can still be answered while the reading is fresh.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::Coordinates;
use crate::config::Config;

const CURRENT_VARIABLES: &str =
    "temperature_2m,relative_humidity_2m,weather_code,wind_speed_10m,precipitation";

#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("Real-time weather service timed out. Using fallback to forecast.")]
    Timeout,

    #[error("Real-time weather service unavailable. Using fallback to forecast.")]
    Unavailable(String),

    #[error("Real-time weather service error: {0}")]
    Upstream(String),
}

impl From<reqwest::Error> for RealtimeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RealtimeError::Timeout
        } else if err.is_connect() {
            RealtimeError::Unavailable(err.to_string())
        } else {
            RealtimeError::Upstream(err.to_string())
        }
    }
}

/// Farmer-facing severity of current conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Low,
    Medium,
    High,
}

/// Current conditions returned to the app
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeWeather {
    pub temp: f64,
    pub humidity: i64,
    pub wind_speed: f64,
    pub rainfall: f64,
    pub condition: String,
    pub realtime_rain_1h: f64,
    pub alert_level: AlertLevel,
    pub alert_message: String,
    pub location: String,
    pub coordinates: Coordinates,
    pub timestamp: DateTime<Utc>,
    pub cached: bool,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    #[serde(default)]
    current: CurrentBlock,
}

#[derive(Debug, Default, Deserialize)]
struct CurrentBlock {
    #[serde(default)]
    temperature_2m: f64,
    #[serde(default)]
    relative_humidity_2m: f64,
    #[serde(default)]
    weather_code: i32,
    #[serde(default)]
    wind_speed_10m: f64,
    #[serde(default)]
    precipitation: f64,
}

/// Condition text for a WMO weather code
pub fn condition_for_code(code: i32) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Foggy",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        61 => "Slight rain",
        71 => "Slight snow",
        80 => "Moderate rain",
        85 => "Moderate rain and snow",
        95 => "Thunderstorm",
        _ => "Unknown",
    }
}

/// First matching rule wins; wind outranks rain, humidity and heat
pub fn assess(temp: f64, humidity: i64, wind_speed: f64, rainfall: f64, condition: &str) -> (AlertLevel, String) {
    if wind_speed >= 10.0 {
        (AlertLevel::High, format!("High wind speed: {:.1} m/s. Secure outdoor equipment.", wind_speed))
    } else if wind_speed >= 5.0 {
        (AlertLevel::Medium, format!("Moderate wind: {:.1} m/s", wind_speed))
    } else if rainfall > 0.0 {
        (AlertLevel::Medium, format!("Rain detected: {:.1}mm", rainfall))
    } else if humidity > 80 {
        (AlertLevel::Medium, format!("High humidity: {}%. Watch for fungal diseases.", humidity))
    } else if temp > 35.0 {
        (AlertLevel::Medium, format!("High temperature: {:.1}°C. Ensure irrigation.", temp))
    } else {
        (AlertLevel::Low, format!("Current conditions: {}", condition))
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

type CacheKey = (i64, i64);

/// Upper bound on distinct coordinate pairs held in the fallback cache
const MAX_CACHED_LOCATIONS: usize = 1024;

fn cache_key(lat: f64, lon: f64) -> CacheKey {
    ((lat * 100.0).round() as i64, (lon * 100.0).round() as i64)
}

#[derive(Debug, Clone)]
struct CachedReading {
    reading: RealtimeWeather,
    stored_at: Instant,
}

/// Client for the current-weather endpoint
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    client: reqwest::Client,
    api_url: String,
    cache: Arc<RwLock<HashMap<CacheKey, CachedReading>>>,
    cache_ttl: Duration,
}

impl RealtimeClient {
    pub fn new(api_url: impl Into<String>, timeout: Duration, cache_ttl: Duration) -> Result<Self, RealtimeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RealtimeError::Upstream(e.to_string()))?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_ttl,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, RealtimeError> {
        Self::new(
            config.realtime_api_url.clone(),
            Duration::from_secs(config.realtime_timeout_secs),
            Duration::from_secs(config.realtime_cache_ttl_secs),
        )
    }

    /// Current conditions, or a fresh cached reading if the upstream fails
    pub async fn current(&self, lat: f64, lon: f64, location: &str) -> Result<RealtimeWeather, RealtimeError> {
        let start_time = Instant::now();
        tracing::info!("Fetching real-time weather for {} ({}, {})", location, lat, lon);

        match self.fetch(lat, lon, location).await {
            Ok(reading) => {
                self.store(lat, lon, &reading);
                tracing::info!(
                    "Real-time weather fetched in {:.2}s for {}: {}°C, {}% RH",
                    start_time.elapsed().as_secs_f32(), location, reading.temp, reading.humidity
                );
                Ok(reading)
            }
            Err(e) => {
                tracing::warn!(
                    "Real-time weather failed after {:.2}s for {}: {}",
                    start_time.elapsed().as_secs_f32(), location, e
                );

                match self.cached(lat, lon) {
                    Some(mut reading) => {
                        tracing::info!("Serving cached real-time reading for {}", location);
                        reading.location = location.to_string();
                        reading.cached = true;
                        Ok(reading)
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Insert a reading, dropping expired entries and the oldest beyond the cap
    fn store(&self, lat: f64, lon: f64, reading: &RealtimeWeather) {
        let mut cache = self.cache.write();
        cache.retain(|_, c| c.stored_at.elapsed() <= self.cache_ttl);

        let key = cache_key(lat, lon);
        if !cache.contains_key(&key) && cache.len() >= MAX_CACHED_LOCATIONS {
            let oldest = cache.iter()
                .min_by_key(|(_, c)| c.stored_at)
                .map(|(k, _)| *k);
            if let Some(oldest) = oldest {
                cache.remove(&oldest);
            }
        }

        cache.insert(key, CachedReading { reading: reading.clone(), stored_at: Instant::now() });
    }

    fn cached(&self, lat: f64, lon: f64) -> Option<RealtimeWeather> {
        let cache = self.cache.read();
        cache.get(&cache_key(lat, lon))
            .filter(|c| c.stored_at.elapsed() <= self.cache_ttl)
            .map(|c| c.reading.clone())
    }

    async fn fetch(&self, lat: f64, lon: f64, location: &str) -> Result<RealtimeWeather, RealtimeError> {
        let response = self.client
            .get(&self.api_url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("current", CURRENT_VARIABLES.to_string()),
                ("temperature_unit", "celsius".to_string()),
                ("wind_speed_unit", "ms".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RealtimeError::Upstream(format!("upstream returned {}", status)));
        }

        let payload: CurrentResponse = response.json().await?;
        let current = payload.current;

        let condition = condition_for_code(current.weather_code);
        let humidity = current.relative_humidity_2m as i64;
        let (alert_level, alert_message) = assess(
            current.temperature_2m,
            humidity,
            current.wind_speed_10m,
            current.precipitation,
            condition,
        );

        Ok(RealtimeWeather {
            temp: round1(current.temperature_2m),
            humidity,
            wind_speed: round1(current.wind_speed_10m),
            rainfall: round1(current.precipitation),
            condition: condition.to_string(),
            realtime_rain_1h: round1(current.precipitation),
            alert_level,
            alert_message,
            location: location.to_string(),
            coordinates: Coordinates { latitude: lat, longitude: lon },
            timestamp: Utc::now(),
            cached: false,
        })
    }
}
