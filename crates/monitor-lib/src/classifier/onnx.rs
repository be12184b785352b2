//! ONNX Runtime inference using tract
//!
//! Loads the pre-trained anomaly classifier via tract-onnx and runs it over
//! encoded sample features. The model, label table, and optional feature
//! scaler are loaded once at session start and are immutable afterwards.
//! Any artifact that cannot be loaded leaves the classifier in permanent
//! fallback mode instead of failing startup.

use super::{Classifier, ClassifierError};
use crate::models::{SampleFeatures, TaskPriority, TaskStatus, TaskType};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Numeric features, in the order the model expects them
const NUM_NUMERIC_FEATURES: usize = 7;

/// One-hot width of the three categorical features (3 + 3 + 4)
const NUM_CATEGORICAL_SLOTS: usize = 10;

/// Total width of the encoded input row
pub const NUM_FEATURES: usize = NUM_NUMERIC_FEATURES + NUM_CATEGORICAL_SLOTS;

/// Maximum inference latency before warning (5ms target)
const MAX_INFERENCE_MS: u128 = 5;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Filesystem locations of the classifier artifacts. Every path is
/// optional; the scaler in particular is expected to be absent sometimes.
#[derive(Debug, Clone, Default)]
pub struct ClassifierArtifacts {
    pub model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    pub scaler_path: Option<PathBuf>,
}

/// Class-index to display-label table backing `decode`
#[derive(Debug, Clone)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    /// Load a label table from a JSON array of strings
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read label table {}", path.display()))?;
        let labels: Vec<String> =
            serde_json::from_slice(&data).context("failed to parse label table")?;
        if labels.is_empty() {
            anyhow::bail!("label table is empty");
        }
        Ok(Self { labels })
    }

    pub fn get(&self, class: u8) -> Result<String, ClassifierError> {
        self.labels
            .get(class as usize)
            .cloned()
            .ok_or(ClassifierError::MissingLabel(class))
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self {
            labels: vec!["normal".to_string(), "anomaly".to_string()],
        }
    }
}

/// Per-feature standardization parameters for the numeric columns
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl FeatureScaler {
    /// Load scaler parameters from a JSON object with `mean` and `scale`
    /// arrays, one entry per numeric feature
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read scaler {}", path.display()))?;
        let scaler: FeatureScaler =
            serde_json::from_slice(&data).context("failed to parse scaler")?;
        if scaler.mean.len() != NUM_NUMERIC_FEATURES || scaler.scale.len() != NUM_NUMERIC_FEATURES
        {
            anyhow::bail!(
                "scaler expects {} numeric features, got mean={} scale={}",
                NUM_NUMERIC_FEATURES,
                scaler.mean.len(),
                scaler.scale.len()
            );
        }
        Ok(scaler)
    }

    fn apply(&self, index: usize, value: f64) -> f64 {
        let scale = self.scale[index];
        if scale.abs() < f64::EPSILON {
            return 0.0;
        }
        (value - self.mean[index]) / scale
    }
}

/// ONNX-based classifier using tract for lightweight inference
pub struct OnnxClassifier {
    model: Option<TractModel>,
    labels: LabelTable,
    scaler: Option<FeatureScaler>,
    model_version: String,
    inference_count: AtomicU64,
    slow_inference_count: AtomicU64,
}

impl OnnxClassifier {
    /// Load all configured artifacts, degrading per-artifact instead of
    /// failing: a missing or unreadable model means permanent fallback mode,
    /// a missing scaler means unstandardized features.
    pub fn load(artifacts: &ClassifierArtifacts) -> Self {
        let labels = match &artifacts.labels_path {
            Some(path) => match LabelTable::from_path(path) {
                Ok(table) => table,
                Err(e) => {
                    warn!(error = %e, "label table unavailable, using built-in labels");
                    LabelTable::default()
                }
            },
            None => LabelTable::default(),
        };

        let scaler = artifacts.scaler_path.as_ref().and_then(|path| {
            match FeatureScaler::from_path(path) {
                Ok(scaler) => Some(scaler),
                Err(e) => {
                    warn!(error = %e, "scaler artifact unavailable, features will not be standardized");
                    None
                }
            }
        });

        let model = artifacts.model_path.as_ref().and_then(|path| {
            let loaded = std::fs::read(path)
                .with_context(|| format!("failed to read model {}", path.display()))
                .and_then(|bytes| Self::load_model(&bytes));
            match loaded {
                Ok(model) => Some(model),
                Err(e) => {
                    warn!(error = %e, "model artifact unavailable, classifier will run in fallback mode");
                    None
                }
            }
        });

        let model_version = if model.is_some() { "v0.1.0" } else { "fallback" };

        Self {
            model,
            labels,
            scaler,
            model_version: model_version.to_string(),
            inference_count: AtomicU64::new(0),
            slow_inference_count: AtomicU64::new(0),
        }
    }

    /// Create a classifier directly from model bytes
    pub fn from_model_bytes(
        bytes: &[u8],
        labels: LabelTable,
        scaler: Option<FeatureScaler>,
    ) -> Result<Self> {
        Ok(Self {
            model: Some(Self::load_model(bytes)?),
            labels,
            scaler,
            model_version: "v0.1.0".to_string(),
            inference_count: AtomicU64::new(0),
            slow_inference_count: AtomicU64::new(0),
        })
    }

    /// True when no model artifact is loaded and every prediction falls back
    pub fn is_fallback_only(&self) -> bool {
        self.model.is_none()
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// Get inference statistics
    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_inferences: self.inference_count.load(Ordering::Relaxed),
            slow_inferences: self.slow_inference_count.load(Ordering::Relaxed),
        }
    }

    /// Load and optimize an ONNX model from bytes
    fn load_model(model_bytes: &[u8]) -> Result<TractModel> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, NUM_FEATURES]).into())
            .context("failed to set input shape")?
            .into_optimized()
            .context("failed to optimize model")?
            .into_runnable()
            .context("failed to create runnable model")?;
        Ok(model)
    }

    /// Encode a feature view into the model's input row: standardized
    /// numerics followed by one-hot categoricals
    fn encode(&self, features: &SampleFeatures) -> Tensor {
        let numerics = [
            features.cpu_usage,
            features.memory_usage,
            features.network_traffic,
            features.power_consumption,
            features.num_executed_instructions,
            features.execution_time,
            features.energy_efficiency,
        ];

        let mut data = Vec::with_capacity(NUM_FEATURES);
        for (i, value) in numerics.iter().enumerate() {
            let v = match &self.scaler {
                Some(scaler) => scaler.apply(i, *value),
                None => *value,
            };
            data.push(v as f32);
        }

        push_one_hot(&mut data, task_type_slot(features.task_type), 3);
        push_one_hot(&mut data, task_priority_slot(features.task_priority), 3);
        push_one_hot(&mut data, task_status_slot(features.task_status), 4);

        tract_ndarray::Array2::from_shape_vec((1, NUM_FEATURES), data)
            .unwrap()
            .into()
    }

    /// Reduce the model output tensor to a class index. Handles both export
    /// shapes: a single label value, or one logit per class (argmax).
    fn output_to_class(output: &Tensor) -> Result<u8, ClassifierError> {
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        let values: Vec<f32> = view.iter().copied().collect();

        match values.as_slice() {
            [] => Err(ClassifierError::Inference(
                "model output is empty".to_string(),
            )),
            [single] => {
                let rounded = single.round();
                if !(0.0..=255.0).contains(&rounded) {
                    return Err(ClassifierError::Inference(format!(
                        "class output {rounded} out of range"
                    )));
                }
                Ok(rounded as u8)
            }
            logits => {
                let argmax = logits
                    .iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                Ok(argmax as u8)
            }
        }
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, features: &SampleFeatures) -> Result<u8, ClassifierError> {
        let model = self
            .model
            .as_ref()
            .ok_or(ClassifierError::ModelUnavailable)?;

        let start = Instant::now();
        let input = self.encode(features);

        let result = model
            .run(tvec!(input.into()))
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        let output = result
            .first()
            .ok_or_else(|| ClassifierError::Inference("no output from model".to_string()))?;

        let elapsed = start.elapsed();
        self.inference_count.fetch_add(1, Ordering::Relaxed);

        if elapsed.as_millis() > MAX_INFERENCE_MS {
            self.slow_inference_count.fetch_add(1, Ordering::Relaxed);
            warn!(
                elapsed_ms = elapsed.as_millis(),
                "Inference exceeded {}ms target", MAX_INFERENCE_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        Self::output_to_class(output)
    }

    fn decode(&self, class: u8) -> Result<String, ClassifierError> {
        self.labels.get(class)
    }
}

/// Inference statistics
#[derive(Debug, Clone)]
pub struct InferenceStats {
    pub total_inferences: u64,
    pub slow_inferences: u64,
}

fn push_one_hot(data: &mut Vec<f32>, slot: usize, width: usize) {
    for i in 0..width {
        data.push(if i == slot { 1.0 } else { 0.0 });
    }
}

fn task_type_slot(value: TaskType) -> usize {
    match value {
        TaskType::Compute => 0,
        TaskType::Io => 1,
        TaskType::Network => 2,
    }
}

fn task_priority_slot(value: TaskPriority) -> usize {
    match value {
        TaskPriority::Low => 0,
        TaskPriority::Medium => 1,
        TaskPriority::High => 2,
    }
}

fn task_status_slot(value: TaskStatus) -> usize {
    match value {
        TaskStatus::Running => 0,
        TaskStatus::Waiting => 1,
        TaskStatus::Idle => 2,
        TaskStatus::Done => 3,
    }
}
