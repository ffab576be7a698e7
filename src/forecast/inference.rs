//! Inference Engine - ONNX Runtime Integration
//!
//! Loads the per-location LSTM exported to ONNX and runs it on a normalized
//! 30-day window. The pipeline above only sees the [`Forecaster`] trait, so
//! the runtime can be swapped (or stubbed in tests).

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::{Array2, Array3};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;
use serde::Serialize;

use super::{FEATURE_COUNT, SEQUENCE_LENGTH};

// ============================================================================
// STATE
// ============================================================================

/// Latency stats
static LATENCY_SUM: AtomicU64 = AtomicU64::new(0);
static INFERENCE_COUNT: AtomicU64 = AtomicU64::new(0);

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Inference stats for the info endpoint
#[derive(Debug, Clone, Serialize)]
pub struct InferenceStats {
    pub inference_device: String,
    pub avg_latency_ms: f32,
    pub inference_count: u64,
}

pub fn inference_stats() -> InferenceStats {
    let sum = LATENCY_SUM.load(Ordering::Relaxed);
    let count = INFERENCE_COUNT.load(Ordering::Relaxed);
    let avg = if count > 0 { (sum as f32 / count as f32) / 1000.0 } else { 0.0 };

    InferenceStats {
        inference_device: "ONNX Runtime (CPU)".to_string(),
        avg_latency_ms: avg,
        inference_count: count,
    }
}

fn record_latency(micros: u64) {
    LATENCY_SUM.fetch_add(micros, Ordering::Relaxed);
    INFERENCE_COUNT.fetch_add(1, Ordering::Relaxed);
}

/// How a model file was finally opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStrategy {
    /// From file, full graph optimization
    Standard,
    /// From file, graph optimization disabled
    Unoptimized,
    /// From bytes in memory, basic optimization
    InMemory,
}

impl std::fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Standard => "standard",
            Self::Unoptimized => "unoptimized",
            Self::InMemory => "in-memory",
        };
        f.write_str(s)
    }
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("could not load model after 3 strategies: {0}")]
    Load(String),

    #[error("scaler error: {0}")]
    Scaler(String),

    #[error("shape error: {0}")]
    Shape(String),

    #[error("inference failed: {0}")]
    Runtime(String),
}

// ============================================================================
// FORECASTER TRAIT
// ============================================================================

/// A model mapping a normalized (30, 3) history window to a normalized
/// (30, 3) forecast window
pub trait Forecaster: Send + Sync {
    fn predict(&self, window: &Array2<f32>) -> Result<Array2<f32>, InferenceError>;
}

/// Reject windows that are not (30, 3)
pub fn check_window(window: &Array2<f32>) -> Result<(), InferenceError> {
    if window.dim() != (SEQUENCE_LENGTH, FEATURE_COUNT) {
        return Err(InferenceError::Shape(format!(
            "expected input ({}, {}), got {:?}",
            SEQUENCE_LENGTH,
            FEATURE_COUNT,
            window.dim()
        )));
    }
    Ok(())
}

/// Take the first 30x3 values of a raw model output
pub fn output_window(data: &[f32]) -> Result<Array2<f32>, InferenceError> {
    let needed = SEQUENCE_LENGTH * FEATURE_COUNT;
    if data.len() < needed {
        return Err(InferenceError::Shape(format!(
            "expected at least {} output values, got {}",
            needed,
            data.len()
        )));
    }

    Array2::from_shape_vec((SEQUENCE_LENGTH, FEATURE_COUNT), data[..needed].to_vec())
        .map_err(|e| InferenceError::Shape(e.to_string()))
}

// ============================================================================
// ONNX IMPLEMENTATION
// ============================================================================

/// ONNX-backed forecaster for one location
pub struct OnnxForecaster {
    session: Mutex<Session>,
    strategy: LoadStrategy,
}

impl std::fmt::Debug for OnnxForecaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxForecaster")
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl OnnxForecaster {
    /// Open a model, trying each load strategy in turn
    pub fn load(model_path: &Path) -> Result<Self, InferenceError> {
        if !model_path.exists() {
            return Err(InferenceError::ModelNotFound(model_path.display().to_string()));
        }

        let standard = open_from_file(model_path, GraphOptimizationLevel::Level3);
        let (session, strategy) = match standard {
            Ok(session) => (session, LoadStrategy::Standard),
            Err(e) => {
                tracing::debug!("Standard load failed for {}: {}", model_path.display(), e);
                tracing::info!("Attempting unoptimized load for {}", model_path.display());

                match open_from_file(model_path, GraphOptimizationLevel::Disable) {
                    Ok(session) => (session, LoadStrategy::Unoptimized),
                    Err(e) => {
                        tracing::debug!("Unoptimized load failed for {}: {}", model_path.display(), e);
                        tracing::info!("Attempting in-memory load for {}", model_path.display());

                        let session = open_from_memory(model_path)?;
                        (session, LoadStrategy::InMemory)
                    }
                }
            }
        };

        Ok(Self {
            session: Mutex::new(session),
            strategy,
        })
    }

    pub fn strategy(&self) -> LoadStrategy {
        self.strategy
    }
}

fn open_from_file(path: &Path, level: GraphOptimizationLevel) -> Result<Session, InferenceError> {
    Session::builder()
        .map_err(|e| InferenceError::Load(format!("session builder: {}", e)))?
        .with_optimization_level(level)
        .map_err(|e| InferenceError::Load(format!("optimization level: {}", e)))?
        .commit_from_file(path)
        .map_err(|e| InferenceError::Load(e.to_string()))
}

fn open_from_memory(path: &Path) -> Result<Session, InferenceError> {
    let bytes = std::fs::read(path)
        .map_err(|e| InferenceError::Load(format!("{}: {}", path.display(), e)))?;

    Session::builder()
        .map_err(|e| InferenceError::Load(format!("session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level1)
        .map_err(|e| InferenceError::Load(format!("optimization level: {}", e)))?
        .commit_from_memory(&bytes)
        .map_err(|e| InferenceError::Load(e.to_string()))
}

impl Forecaster for OnnxForecaster {
    fn predict(&self, window: &Array2<f32>) -> Result<Array2<f32>, InferenceError> {
        let start_time = std::time::Instant::now();
        check_window(window)?;

        let input_array = Array3::<f32>::from_shape_vec(
            (1, SEQUENCE_LENGTH, FEATURE_COUNT),
            window.iter().copied().collect(),
        ).map_err(|e| InferenceError::Shape(e.to_string()))?;

        let input_tensor = Value::from_array(input_array)
            .map_err(|e| InferenceError::Runtime(format!("tensor: {}", e)))?;

        let mut session = self.session.lock();

        let output_name = session.outputs.first()
            .map(|o| o.name.clone())
            .ok_or_else(|| InferenceError::Runtime("no output defined".to_string()))?;

        let outputs = session.run(ort::inputs![input_tensor])
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;

        let output = outputs.get(&output_name)
            .ok_or_else(|| InferenceError::Runtime("no output".to_string()))?;

        let (_, data) = output.try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Runtime(format!("extract: {}", e)))?;

        let forecast = output_window(data)?;

        record_latency(start_time.elapsed().as_micros() as u64);
        Ok(forecast)
    }
}
