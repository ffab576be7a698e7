//! Per-location model registry
//!
//! Each hobli has an `lstm_<slug>.onnx` model and a `scaler_<slug>.json`
//! min-max scaler side by side in the model directory.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Duration;
use ndarray::Array2;
use tracing::Level;

use super::inference::{Forecaster, InferenceError, OnnxForecaster};
use super::scaler::MinMaxScaler;
use super::{locations, DailyForecast, ForecastError, FEATURE_COUNT, SEQUENCE_LENGTH};
use crate::weather::WeatherHistory;

/// Model and scaler for one location
pub struct LocationModel {
    slug: String,
    forecaster: Box<dyn Forecaster>,
    scaler: MinMaxScaler,
}

impl std::fmt::Debug for LocationModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationModel")
            .field("slug", &self.slug)
            .field("scaler", &self.scaler)
            .finish()
    }
}

impl LocationModel {
    pub fn new(slug: impl Into<String>, forecaster: Box<dyn Forecaster>, scaler: MinMaxScaler) -> Self {
        Self {
            slug: slug.into(),
            forecaster,
            scaler,
        }
    }

    /// Load the model and its scaler; a location without a scaler is unusable
    pub fn load(slug: &str, model_path: &Path, scaler_path: &Path) -> Result<Self, InferenceError> {
        let scaler = MinMaxScaler::load(scaler_path)?;
        let forecaster = OnnxForecaster::load(model_path)?;
        tracing::info!("✓ Loaded model for {} ({} load)", slug, forecaster.strategy());

        Ok(Self::new(slug, Box::new(forecaster), scaler))
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Forecast the 30 days following the last observation
    pub fn predict_next_30_days(&self, history: &WeatherHistory) -> Result<Vec<DailyForecast>, ForecastError> {
        let recent = history.tail(SEQUENCE_LENGTH);
        let last_date = match history.last_date() {
            Some(date) if recent.len() == SEQUENCE_LENGTH => date,
            _ => {
                return Err(ForecastError::InsufficientData {
                    needed: SEQUENCE_LENGTH,
                    available: history.len(),
                })
            }
        };

        let mut window = Array2::<f32>::zeros((SEQUENCE_LENGTH, FEATURE_COUNT));
        for (i, obs) in recent.iter().enumerate() {
            window[[i, 0]] = obs.temp_max as f32;
            window[[i, 1]] = obs.temp_min as f32;
            window[[i, 2]] = obs.rainfall as f32;
        }

        let normalized = self.scaler.transform(&window);
        let predicted = self.forecaster.predict(&normalized)?;
        if predicted.dim() != (SEQUENCE_LENGTH, FEATURE_COUNT) {
            return Err(InferenceError::Shape(format!(
                "model {} returned {:?}",
                self.slug,
                predicted.dim()
            )).into());
        }
        let values = self.scaler.inverse_transform(&predicted);

        let forecast = values
            .outer_iter()
            .enumerate()
            .map(|(i, row)| DailyForecast {
                date: last_date + Duration::days(i as i64 + 1),
                temp_max: f64::from(row[0]),
                temp_min: f64::from(row[1]),
                rainfall: f64::from(row[2]),
            })
            .collect();

        Ok(forecast)
    }
}

/// Log level for a skipped model: a missing scaler warns, a broken model errors
fn skip_level(err: &InferenceError) -> Level {
    match err {
        InferenceError::Scaler(_) => Level::WARN,
        _ => Level::ERROR,
    }
}

/// All location models that loaded successfully
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Arc<LocationModel>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `lstm_*.onnx` in `dir`; failures are logged and skipped
    pub fn load_dir(dir: &Path) -> Self {
        let mut registry = Self::new();
        tracing::info!("Loading location-specific models from {}", dir.display());

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Models directory not available: {} ({})", dir.display(), e);
                return registry;
            }
        };

        let mut model_files: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                name.starts_with("lstm_") && name.ends_with(".onnx")
            })
            .collect();
        model_files.sort();
        tracing::info!("Found {} model files", model_files.len());

        for model_path in model_files {
            let Some(slug) = model_path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_prefix("lstm_"))
                .map(str::to_string)
            else {
                continue;
            };

            let scaler_path = dir.join(format!("scaler_{}.json", slug));
            match LocationModel::load(&slug, &model_path, &scaler_path) {
                Ok(model) => registry.insert(model),
                Err(e) if skip_level(&e) == Level::WARN => {
                    tracing::warn!("Skipping model for {}: {}", slug, e)
                }
                Err(e) => tracing::error!("✗ Failed to load model for {}: {}", slug, e),
            }
        }

        tracing::info!("✓ Successfully loaded {} models", registry.len());
        registry
    }

    pub fn insert(&mut self, model: LocationModel) {
        self.models.insert(model.slug.clone(), Arc::new(model));
    }

    pub fn get(&self, slug: &str) -> Option<Arc<LocationModel>> {
        self.models.get(slug).cloned()
    }

    /// Slugs in sorted order
    pub fn slugs(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Model for a request location
    pub fn resolve(&self, location: &str, coords: Option<(f64, f64)>) -> Result<Arc<LocationModel>, ForecastError> {
        let slugs = self.slugs();
        let slug = locations::resolve(location, coords, &slugs)?;
        self.get(slug).ok_or_else(|| ForecastError::NoModels(location.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::weather::history::DailyObservation;

    /// Echoes the input window, so output equals the last 30 days
    pub(crate) struct EchoForecaster;

    impl Forecaster for EchoForecaster {
        fn predict(&self, window: &Array2<f32>) -> Result<Array2<f32>, InferenceError> {
            Ok(window.clone())
        }
    }

    struct TruncatingForecaster;

    impl Forecaster for TruncatingForecaster {
        fn predict(&self, _window: &Array2<f32>) -> Result<Array2<f32>, InferenceError> {
            Ok(Array2::zeros((10, FEATURE_COUNT)))
        }
    }

    pub(crate) fn test_scaler() -> MinMaxScaler {
        MinMaxScaler::new([15.0, 5.0, 0.0], [40.0, 25.0, 120.0])
    }

    pub(crate) fn history(days: usize) -> WeatherHistory {
        let start = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        WeatherHistory::new(
            (0..days)
                .map(|i| DailyObservation {
                    date: start + Duration::days(i as i64),
                    temp_max: 30.0 + (i % 5) as f64,
                    temp_min: 18.0,
                    rainfall: if i % 7 == 0 { 12.0 } else { 0.0 },
                })
                .collect(),
        )
    }

    #[test]
    fn test_predict_next_30_days_dates_and_values() {
        let model = LocationModel::new("kasaba_hosakote", Box::new(EchoForecaster), test_scaler());
        let history = history(45);

        let forecast = model.predict_next_30_days(&history).unwrap();
        assert_eq!(forecast.len(), SEQUENCE_LENGTH);

        let last = history.last_date().unwrap();
        assert_eq!(forecast[0].date, last + Duration::days(1));
        assert_eq!(forecast[29].date, last + Duration::days(30));

        // Echo + round trip through the scaler reproduces the input window
        let tail = history.tail(SEQUENCE_LENGTH);
        for (f, obs) in forecast.iter().zip(tail) {
            assert!((f.temp_max - obs.temp_max).abs() < 1e-3);
            assert!((f.rainfall - obs.rainfall).abs() < 1e-3);
        }
    }

    #[test]
    fn test_predict_requires_thirty_days() {
        let model = LocationModel::new("kasaba_hosakote", Box::new(EchoForecaster), test_scaler());
        let err = model.predict_next_30_days(&history(29)).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { needed: 30, available: 29 }));
    }

    #[test]
    fn test_predict_rejects_bad_output_shape() {
        let model = LocationModel::new("kasaba_hosakote", Box::new(TruncatingForecaster), test_scaler());
        let err = model.predict_next_30_days(&history(30)).unwrap_err();
        assert!(matches!(err, ForecastError::Inference(InferenceError::Shape(_))));
    }

    #[test]
    fn test_load_dir_missing_directory() {
        let registry = ModelRegistry::load_dir(Path::new("/nonexistent/models"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_dir_skips_models_without_scaler() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lstm_makali_nelamangala.onnx"), b"graph").unwrap();
        std::fs::write(dir.path().join("lstm_makali_nelamangala.onnx.backup"), b"old").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignore").unwrap();

        let registry = ModelRegistry::load_dir(dir.path());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_dir_skips_models_that_fail_every_strategy() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("scaler_makali_nelamangala.json"),
            r#"{"data_min":[15,5,0],"data_max":[40,25,120]}"#,
        ).unwrap();
        std::fs::write(dir.path().join("lstm_makali_nelamangala.onnx"), b"not an onnx graph").unwrap();

        let err = LocationModel::load(
            "makali_nelamangala",
            &dir.path().join("lstm_makali_nelamangala.onnx"),
            &dir.path().join("scaler_makali_nelamangala.json"),
        ).unwrap_err();
        assert!(matches!(err, InferenceError::Load(_)));

        let registry = ModelRegistry::load_dir(dir.path());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_missing_scaler_is_a_warning() {
        assert_eq!(skip_level(&InferenceError::Scaler("missing".to_string())), Level::WARN);
        assert_eq!(skip_level(&InferenceError::Load("garbage".to_string())), Level::ERROR);
        assert_eq!(skip_level(&InferenceError::ModelNotFound("gone".to_string())), Level::ERROR);
    }

    #[test]
    fn test_resolve_through_registry() {
        let mut registry = ModelRegistry::new();
        registry.insert(LocationModel::new("makali_nelamangala", Box::new(EchoForecaster), test_scaler()));
        registry.insert(LocationModel::new("kundana_devanahalli", Box::new(EchoForecaster), test_scaler()));

        assert_eq!(registry.slugs(), vec!["kundana_devanahalli", "makali_nelamangala"]);
        let model = registry.resolve("Makali, Nelamangala", None).unwrap();
        assert_eq!(model.slug(), "makali_nelamangala");
    }

    #[test]
    fn test_resolve_empty_registry() {
        let registry = ModelRegistry::new();
        assert!(matches!(registry.resolve("Kasaba", None), Err(ForecastError::NoModels(_))));
    }
}
