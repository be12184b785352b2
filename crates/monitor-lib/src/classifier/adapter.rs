//! Fallback-substituting classification adapter
//!
//! The adapter is the only way the ingestion path invokes a classifier.
//! A failure in either `predict` or `decode` becomes an explicit
//! `Fallback` branch carrying the reason, and the verdict degrades to
//! normal. Ingestion never halts on a classification failure.

use super::{Classifier, ClassifierError};
use crate::models::{Prediction, SampleFeatures};
use std::sync::Arc;
use tracing::warn;

/// Outcome of one classification attempt. The fallback branch is a visible
/// value, not a hidden catch-all, so failure reasons stay inspectable.
#[derive(Debug, Clone)]
pub enum Classification {
    Classified {
        prediction: Prediction,
        label: String,
    },
    Fallback {
        reason: ClassifierError,
    },
}

impl Classification {
    /// The verdict to record; fallback degrades to normal
    pub fn prediction(&self) -> Prediction {
        match self {
            Classification::Classified { prediction, .. } => *prediction,
            Classification::Fallback { .. } => Prediction::Normal,
        }
    }

    /// The label to record; fallback degrades to "normal"
    pub fn label(&self) -> &str {
        match self {
            Classification::Classified { label, .. } => label,
            Classification::Fallback { .. } => Prediction::Normal.as_label(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Classification::Fallback { .. })
    }

    pub fn fallback_reason(&self) -> Option<&ClassifierError> {
        match self {
            Classification::Fallback { reason } => Some(reason),
            Classification::Classified { .. } => None,
        }
    }
}

/// Narrow boundary between ingestion and the model artifact
#[derive(Clone)]
pub struct ClassifierAdapter {
    inner: Arc<dyn Classifier>,
}

impl ClassifierAdapter {
    pub fn new(inner: Arc<dyn Classifier>) -> Self {
        Self { inner }
    }

    /// Classify one feature view. Never fails; a classifier error of any
    /// kind degrades to the default verdict with the reason attached.
    pub fn classify(&self, features: &SampleFeatures) -> Classification {
        let class = match self.inner.predict(features) {
            Ok(class) => class,
            Err(reason) => {
                warn!(error = %reason, "classification failed, substituting normal verdict");
                return Classification::Fallback { reason };
            }
        };

        let prediction = match Prediction::try_from(class) {
            Ok(prediction) => prediction,
            Err(_) => {
                let reason = ClassifierError::UnsupportedClass(class);
                warn!(error = %reason, "classification failed, substituting normal verdict");
                return Classification::Fallback { reason };
            }
        };

        match self.inner.decode(class) {
            Ok(label) => Classification::Classified { prediction, label },
            Err(reason) => {
                warn!(error = %reason, "label decoding failed, substituting normal verdict");
                Classification::Fallback { reason }
            }
        }
    }
}
