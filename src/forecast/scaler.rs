//! Min-max scaler fitted at training time

use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::inference::InferenceError;
use super::FEATURE_COUNT;

/// Per-feature minimum and maximum seen during training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub data_min: Vec<f32>,
    pub data_max: Vec<f32>,
}

impl MinMaxScaler {
    pub fn new(data_min: [f32; FEATURE_COUNT], data_max: [f32; FEATURE_COUNT]) -> Self {
        Self {
            data_min: data_min.to_vec(),
            data_max: data_max.to_vec(),
        }
    }

    /// Load `scaler_<slug>.json`
    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| InferenceError::Scaler(format!("{}: {}", path.display(), e)))?;

        let scaler: Self = serde_json::from_str(&raw)
            .map_err(|e| InferenceError::Scaler(format!("{}: {}", path.display(), e)))?;

        scaler.validate()?;
        Ok(scaler)
    }

    fn validate(&self) -> Result<(), InferenceError> {
        if self.data_min.len() != FEATURE_COUNT || self.data_max.len() != FEATURE_COUNT {
            return Err(InferenceError::Scaler(format!(
                "expected {} features, got min={} max={}",
                FEATURE_COUNT,
                self.data_min.len(),
                self.data_max.len()
            )));
        }

        if self.data_min.iter().chain(self.data_max.iter()).any(|v| !v.is_finite()) {
            return Err(InferenceError::Scaler("non-finite scaler bounds".to_string()));
        }

        Ok(())
    }

    fn range(&self, feature: usize) -> f32 {
        let range = self.data_max[feature] - self.data_min[feature];
        if range == 0.0 { 1.0 } else { range }
    }

    /// Scale raw observations into the training range
    pub fn transform(&self, data: &Array2<f32>) -> Array2<f32> {
        let mut out = data.clone();
        for ((_, feature), value) in out.indexed_iter_mut() {
            *value = (*value - self.data_min[feature]) / self.range(feature);
        }
        out
    }

    /// Map model output back to physical units
    pub fn inverse_transform(&self, data: &Array2<f32>) -> Array2<f32> {
        let mut out = data.clone();
        for ((_, feature), value) in out.indexed_iter_mut() {
            *value = *value * self.range(feature) + self.data_min[feature];
        }
        out
    }
}
