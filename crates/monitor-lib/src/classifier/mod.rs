//! Anomaly classification behind a narrow capability boundary
//!
//! The core invokes the externally trained model through exactly two
//! operations, `predict` and `decode`, and has no dependency on how the
//! model was trained or serialized. Classification errors never block
//! telemetry ingestion: the adapter substitutes the safe default verdict
//! and records why.

mod adapter;
mod onnx;

pub use adapter::{Classification, ClassifierAdapter};
pub use onnx::{
    ClassifierArtifacts, FeatureScaler, InferenceStats, LabelTable, OnnxClassifier, NUM_FEATURES,
};

use crate::models::SampleFeatures;

/// Reasons a classification attempt can fail. All of them are recovered to
/// the default verdict inside the adapter; none propagate to ingestion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifierError {
    #[error("no model artifact loaded")]
    ModelUnavailable,
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("classifier returned unsupported class {0}")]
    UnsupportedClass(u8),
    #[error("label table has no entry for class {0}")]
    MissingLabel(u8),
}

/// Trait for classification implementations
pub trait Classifier: Send + Sync {
    /// Map a feature view to a class index
    fn predict(&self, features: &SampleFeatures) -> Result<u8, ClassifierError>;

    /// Map a class index to its display label
    fn decode(&self, class: u8) -> Result<String, ClassifierError>;
}
