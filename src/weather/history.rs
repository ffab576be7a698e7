//! Historical daily observations
//!
//! The forecast window comes from a local JSON cache of the Open-Meteo
//! archive. The cache is refreshed from the archive when it is missing or
//! holds less than a year of data.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Records needed before the local cache is trusted
pub const MIN_CACHED_RECORDS: usize = 365;

/// One observed day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyObservation {
    pub date: NaiveDate,
    pub temp_max: f64,
    pub temp_min: f64,
    pub rainfall: f64,
}

/// Observations sorted by date with no duplicate days
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherHistory {
    records: Vec<DailyObservation>,
}

impl WeatherHistory {
    pub fn new(mut records: Vec<DailyObservation>) -> Self {
        records.sort_by_key(|r| r.date);
        records.dedup_by_key(|r| r.date);
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[cfg(test)]
    pub fn records(&self) -> &[DailyObservation] {
        &self.records
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }

    /// The most recent `n` days, or fewer if the history is shorter
    pub fn tail(&self, n: usize) -> &[DailyObservation] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache format error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("archive payload invalid: {0}")]
    Payload(String),
}

// ============================================================================
// ARCHIVE PAYLOAD
// ============================================================================

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: ArchiveDaily,
}

#[derive(Debug, Deserialize)]
struct ArchiveDaily {
    time: Vec<NaiveDate>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    precipitation_sum: Vec<Option<f64>>,
}

/// Forward-fill then backward-fill gaps in a feature column
fn fill_gaps(column: &mut [Option<f64>]) {
    let mut last = None;
    for value in column.iter_mut() {
        match value {
            Some(v) => last = Some(*v),
            None => *value = last,
        }
    }

    let mut next = None;
    for value in column.iter_mut().rev() {
        match value {
            Some(v) => next = Some(*v),
            None => *value = next,
        }
    }
}

impl ArchiveDaily {
    fn into_history(mut self) -> Result<WeatherHistory, HistoryError> {
        let n = self.time.len();
        if self.temperature_2m_max.len() != n
            || self.temperature_2m_min.len() != n
            || self.precipitation_sum.len() != n
        {
            return Err(HistoryError::Payload("daily columns differ in length".to_string()));
        }

        fill_gaps(&mut self.temperature_2m_max);
        fill_gaps(&mut self.temperature_2m_min);
        fill_gaps(&mut self.precipitation_sum);

        let records = self.time.into_iter()
            .zip(self.temperature_2m_max)
            .zip(self.temperature_2m_min)
            .zip(self.precipitation_sum)
            .filter_map(|(((date, max), min), rain)| {
                Some(DailyObservation {
                    date,
                    temp_max: max?,
                    temp_min: min?,
                    rainfall: rain?,
                })
            })
            .collect();

        Ok(WeatherHistory::new(records))
    }
}

// ============================================================================
// SOURCE
// ============================================================================

/// Loads history from the local cache or the Open-Meteo archive
#[derive(Debug, Clone)]
pub struct HistorySource {
    client: reqwest::Client,
    archive_url: String,
    latitude: f64,
    longitude: f64,
    years: u32,
    cache_path: PathBuf,
}

impl HistorySource {
    pub fn from_config(config: &Config) -> Result<Self, HistoryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            archive_url: config.archive_api_url.clone(),
            latitude: config.history_latitude,
            longitude: config.history_longitude,
            years: config.history_years,
            cache_path: config.history_cache_path.clone(),
        })
    }

    /// Local cache first, archive when the cache is missing or short
    pub async fn load_or_fetch(&self) -> Result<WeatherHistory, HistoryError> {
        let local = match self.load_local().await {
            Ok(local) => local,
            Err(e) => {
                tracing::warn!("Ignoring unreadable history cache {}: {}", self.cache_path.display(), e);
                None
            }
        };

        if let Some(history) = &local {
            if history.len() >= MIN_CACHED_RECORDS {
                tracing::info!("Loaded {} records from {}", history.len(), self.cache_path.display());
                return Ok(history.clone());
            }
        }

        tracing::info!("Fetching historical weather from Open-Meteo archive...");
        match self.fetch_archive(Utc::now().date_naive()).await {
            Ok(history) => {
                if let Err(e) = self.save_local(&history).await {
                    tracing::warn!("Could not write history cache: {}", e);
                }
                tracing::info!("Fetched {} records from Open-Meteo", history.len());
                Ok(history)
            }
            Err(e) => match local {
                Some(history) if history.len() >= crate::forecast::SEQUENCE_LENGTH => {
                    tracing::warn!(
                        "Archive fetch failed ({}), using short local cache of {} records",
                        e, history.len()
                    );
                    Ok(history)
                }
                _ => Err(e),
            },
        }
    }

    async fn load_local(&self) -> Result<Option<WeatherHistory>, HistoryError> {
        if !tokio::fs::try_exists(&self.cache_path).await? {
            return Ok(None);
        }

        let raw = tokio::fs::read(&self.cache_path).await?;
        let history: WeatherHistory = serde_json::from_slice(&raw)?;
        // Re-establish ordering in case the file was edited by hand
        Ok(Some(WeatherHistory::new(history.records)))
    }

    async fn save_local(&self, history: &WeatherHistory) -> Result<(), HistoryError> {
        if let Some(parent) = self.cache_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_vec(history)?;
        tokio::fs::write(&self.cache_path, raw).await?;
        Ok(())
    }

    /// Fetch `years` of daily observations ending `end_date`
    pub async fn fetch_archive(&self, end_date: NaiveDate) -> Result<WeatherHistory, HistoryError> {
        let start_date = end_date - ChronoDuration::days(365 * i64::from(self.years));

        let response = self.client
            .get(&self.archive_url)
            .query(&[
                ("latitude", self.latitude.to_string()),
                ("longitude", self.longitude.to_string()),
                ("start_date", start_date.format("%Y-%m-%d").to_string()),
                ("end_date", end_date.format("%Y-%m-%d").to_string()),
                ("daily", "temperature_2m_max,temperature_2m_min,precipitation_sum".to_string()),
                ("timezone", "Asia/Kolkata".to_string()),
                ("temperature_unit", "celsius".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let payload: ArchiveResponse = response.json().await?;
        payload.daily.into_history()
    }
}
