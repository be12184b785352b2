//! Core data models for the fleet monitor

use serde::{Deserialize, Serialize};

/// Task category reported by a virtual machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Compute,
    Io,
    Network,
}

impl TaskType {
    pub const ALL: [TaskType; 3] = [TaskType::Compute, TaskType::Io, TaskType::Network];
}

/// Scheduling priority of the task a VM is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 3] = [
        TaskPriority::Low,
        TaskPriority::Medium,
        TaskPriority::High,
    ];
}

/// Lifecycle state of the task a VM is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Waiting,
    Idle,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Running,
        TaskStatus::Waiting,
        TaskStatus::Idle,
        TaskStatus::Done,
    ];
}

/// Classifier verdict for one sample, wire-encoded as 0 (normal) or 1 (anomaly)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Prediction {
    Normal,
    Anomaly,
}

impl Prediction {
    /// Display label derived purely from the verdict
    pub fn as_label(self) -> &'static str {
        match self {
            Prediction::Normal => "normal",
            Prediction::Anomaly => "anomaly",
        }
    }

    pub fn is_anomaly(self) -> bool {
        matches!(self, Prediction::Anomaly)
    }
}

impl From<Prediction> for u8 {
    fn from(p: Prediction) -> u8 {
        match p {
            Prediction::Normal => 0,
            Prediction::Anomaly => 1,
        }
    }
}

/// Error for class indices outside the binary {0, 1} domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("prediction must be 0 or 1, got {0}")]
pub struct InvalidPrediction(pub u8);

impl TryFrom<u8> for Prediction {
    type Error = InvalidPrediction;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Prediction::Normal),
            1 => Ok(Prediction::Anomaly),
            other => Err(InvalidPrediction(other)),
        }
    }
}

/// The feature view of a sample: exactly what the classifier is allowed to
/// see. Identity (`vm_id`) and `timestamp` are stripped by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleFeatures {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub network_traffic: f64,
    pub power_consumption: f64,
    pub num_executed_instructions: f64,
    pub execution_time: f64,
    pub energy_efficiency: f64,
    pub task_type: TaskType,
    pub task_priority: TaskPriority,
    pub task_status: TaskStatus,
}

/// One unclassified telemetry reading, as emitted by the sample generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSample {
    pub vm_id: String,
    /// Unix seconds at generation time
    pub timestamp: i64,
    #[serde(flatten)]
    pub features: SampleFeatures,
}

/// One classified telemetry reading, immutable once appended to the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub vm_id: String,
    /// Unix seconds at generation time
    pub timestamp: i64,
    #[serde(flatten)]
    pub features: SampleFeatures,
    pub prediction: Prediction,
    pub prediction_label: String,
}

impl TelemetrySample {
    /// Attach a classifier verdict to a raw reading
    pub fn classified(raw: RawSample, prediction: Prediction, label: impl Into<String>) -> Self {
        Self {
            vm_id: raw.vm_id,
            timestamp: raw.timestamp,
            features: raw.features,
            prediction,
            prediction_label: label.into(),
        }
    }
}
