//! Forecast pipeline: history -> model selection -> inference -> report

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::OnceCell;

use super::summary::{alerts, summarize, ForecastAlerts, ForecastSummary};
use super::{DailyForecast, ForecastError, ModelRegistry, SEQUENCE_LENGTH};
use crate::weather::{HistorySource, WeatherHistory};

/// Forecast plus everything derived from it
#[derive(Debug, Clone, Serialize)]
pub struct ForecastReport {
    pub predictions: Vec<DailyForecast>,
    pub summary: Option<ForecastSummary>,
    pub alerts: ForecastAlerts,
    /// Slug of the model that produced the forecast
    pub model: String,
}

pub struct ForecastService {
    registry: Arc<ModelRegistry>,
    history: OnceCell<Arc<WeatherHistory>>,
    source: Option<HistorySource>,
}

impl ForecastService {
    pub fn new(registry: ModelRegistry, source: HistorySource) -> Self {
        Self {
            registry: Arc::new(registry),
            history: OnceCell::new(),
            source: Some(source),
        }
    }

    /// Service over a fixed history with no archive behind it
    pub fn with_history(registry: ModelRegistry, history: WeatherHistory) -> Self {
        Self {
            registry: Arc::new(registry),
            history: OnceCell::new_with(Some(Arc::new(history))),
            source: None,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn model_count(&self) -> usize {
        self.registry.len()
    }

    /// Load history into the cache so requests don't block on the archive
    pub async fn warm_up(&self) -> Result<usize, ForecastError> {
        let history = self.history().await?;
        Ok(history.len())
    }

    /// Cached history; concurrent misses share one load
    async fn history(&self) -> Result<Arc<WeatherHistory>, ForecastError> {
        let history = self.history.get_or_try_init(|| async {
            let Some(source) = &self.source else {
                return Err(ForecastError::InsufficientData { needed: SEQUENCE_LENGTH, available: 0 });
            };

            tracing::info!("Loading weather data (cache miss)...");
            Ok(Arc::new(source.load_or_fetch().await?))
        }).await?;

        Ok(Arc::clone(history))
    }

    /// 30-day forecast for a location
    pub async fn forecast_next_month(
        &self,
        location: &str,
        coords: Option<(f64, f64)>,
    ) -> Result<ForecastReport, ForecastError> {
        let start_time = Instant::now();

        let history = self.history().await?;
        if history.len() < SEQUENCE_LENGTH {
            return Err(ForecastError::InsufficientData {
                needed: SEQUENCE_LENGTH,
                available: history.len(),
            });
        }
        tracing::debug!("Using {} historical records", history.len());

        let model = self.registry.resolve(location, coords)?;
        let slug = model.slug().to_string();
        tracing::info!("Generating 30-day forecast for {} using {} model", location, slug);

        let predictions = tokio::task::spawn_blocking(move || model.predict_next_30_days(&history))
            .await
            .map_err(|e| ForecastError::Task(e.to_string()))??;

        let report = ForecastReport {
            summary: summarize(&predictions),
            alerts: alerts(&predictions),
            predictions,
            model: slug,
        };

        tracing::info!(
            "✓ Forecast generated in {:.2}s for {}",
            start_time.elapsed().as_secs_f32(), location
        );
        Ok(report)
    }

    /// One day out of the 30-day forecast
    pub async fn forecast_for_date(
        &self,
        date: NaiveDate,
        location: &str,
        coords: Option<(f64, f64)>,
    ) -> Result<DailyForecast, ForecastError> {
        let report = self.forecast_next_month(location, coords).await?;
        report.predictions
            .into_iter()
            .find(|p| p.date == date)
            .ok_or_else(|| ForecastError::DateOutOfRange(date.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::forecast::registry::tests::{history, test_scaler, EchoForecaster};
    use crate::forecast::registry::LocationModel;

    fn service(days: usize) -> ForecastService {
        let mut registry = ModelRegistry::new();
        registry.insert(LocationModel::new("kasaba_hosakote", Box::new(EchoForecaster), test_scaler()));
        ForecastService::with_history(registry, history(days))
    }

    #[tokio::test]
    async fn test_forecast_next_month_report() {
        let svc = service(60);
        let report = svc.forecast_next_month("Kasaba, Hosakote", Some((13.47, 77.80))).await.unwrap();

        assert_eq!(report.model, "kasaba_hosakote");
        assert_eq!(report.predictions.len(), 30);
        let summary = report.summary.unwrap();
        assert_eq!(summary.rainy_days + summary.dry_days, 30);
        // 12mm every 7th day in the echoed window
        assert_eq!(summary.rain_threshold, 5.0);
    }

    #[tokio::test]
    async fn test_insufficient_history() {
        let svc = service(10);
        let err = svc.forecast_next_month("Kasaba, Hosakote", None).await.unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { available: 10, .. }));
    }

    #[tokio::test]
    async fn test_no_models() {
        let svc = ForecastService::with_history(ModelRegistry::new(), history(40));
        let err = svc.forecast_next_month("Anywhere", None).await.unwrap_err();
        assert!(matches!(err, ForecastError::NoModels(_)));
    }

    #[tokio::test]
    async fn test_forecast_for_date() {
        let svc = service(40);
        let first_day = history(40).last_date().unwrap() + Duration::days(1);

        let day = svc.forecast_for_date(first_day, "Kasaba, Hosakote", None).await.unwrap();
        assert_eq!(day.date, first_day);

        let too_far = first_day + Duration::days(45);
        let err = svc.forecast_for_date(too_far, "Kasaba, Hosakote", None).await.unwrap_err();
        assert!(matches!(err, ForecastError::DateOutOfRange(_)));
    }

    #[tokio::test]
    async fn test_concurrent_misses_fetch_archive_once() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let days = 400;
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let time: Vec<String> = (0..days).map(|i| (start + Duration::days(i)).to_string()).collect();
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "daily": {
                            "time": time,
                            "temperature_2m_max": vec![31.0; days as usize],
                            "temperature_2m_min": vec![19.0; days as usize],
                            "precipitation_sum": vec![0.0; days as usize],
                        }
                    }))
                    .set_delay(std::time::Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut config = crate::config::Config::from_env();
        config.archive_api_url = format!("{}/v1/archive", server.uri());
        config.history_cache_path = dir.path().join("history.json");
        let source = HistorySource::from_config(&config).unwrap();
        let svc = ForecastService::new(ModelRegistry::new(), source);

        let (a, b, c) = tokio::join!(svc.warm_up(), svc.warm_up(), svc.warm_up());
        assert_eq!(a.unwrap(), days as usize);
        assert_eq!(b.unwrap(), days as usize);
        assert_eq!(c.unwrap(), days as usize);
    }

    #[tokio::test]
    async fn test_warm_up_reports_cached_records() {
        let svc = service(40);
        assert_eq!(svc.warm_up().await.unwrap(), 40);
    }
}
