//! Rolling KPIs and per-VM summaries
//!
//! Every operation here is a pure read over the store's contents at call
//! time. Empty-store queries return defined values (zero, `None`, empty),
//! never errors. Stores are small and session-scoped, so nothing is cached.

use crate::models::{Prediction, TelemetrySample};
use crate::store::TelemetryStore;
use serde::Serialize;

/// Numeric sample fields a rolling average can be computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    CpuUsage,
    MemoryUsage,
    NetworkTraffic,
    PowerConsumption,
    NumExecutedInstructions,
    ExecutionTime,
    EnergyEfficiency,
}

impl MetricField {
    fn value(self, sample: &TelemetrySample) -> f64 {
        let f = &sample.features;
        match self {
            MetricField::CpuUsage => f.cpu_usage,
            MetricField::MemoryUsage => f.memory_usage,
            MetricField::NetworkTraffic => f.network_traffic,
            MetricField::PowerConsumption => f.power_consumption,
            MetricField::NumExecutedInstructions => f.num_executed_instructions,
            MetricField::ExecutionTime => f.execution_time,
            MetricField::EnergyEfficiency => f.energy_efficiency,
        }
    }
}

/// Size of the store
pub fn total_count(store: &TelemetryStore) -> usize {
    store.len()
}

/// Count of retained samples classified as anomalous
pub fn anomaly_count(store: &TelemetryStore) -> usize {
    store.all().filter(|s| s.prediction.is_anomaly()).count()
}

/// Percentage of retained samples classified as anomalous.
/// Defined as 0.0 on an empty store.
pub fn anomaly_rate(store: &TelemetryStore) -> f64 {
    let total = store.len();
    if total == 0 {
        return 0.0;
    }
    anomaly_count(store) as f64 / total as f64 * 100.0
}

/// Mean of one numeric field over the most recent `n` samples.
/// `None` means "no data".
pub fn rolling_average(store: &TelemetryStore, field: MetricField, n: usize) -> Option<f64> {
    let tail = store.tail(n);
    if tail.is_empty() {
        return None;
    }
    let sum: f64 = tail.iter().map(|s| field.value(s)).sum();
    Some(sum / tail.len() as f64)
}

/// Normal/anomaly badge for one sample, derived purely from the verdict
#[derive(Debug, Clone, Serialize)]
pub struct VmStatus {
    pub vm_id: String,
    pub prediction: Prediction,
    pub status: &'static str,
}

impl VmStatus {
    fn of(sample: &TelemetrySample) -> Self {
        Self {
            vm_id: sample.vm_id.clone(),
            prediction: sample.prediction,
            status: sample.prediction.as_label(),
        }
    }
}

/// Badges for the most recent `n` samples, in chronological order
pub fn latest_status_per_vm(store: &TelemetryStore, n: usize) -> Vec<VmStatus> {
    store.tail(n).into_iter().map(VmStatus::of).collect()
}

/// The overview KPI row: totals plus rolling CPU/memory averages over the
/// latest window (normally one fleet batch)
#[derive(Debug, Clone, Serialize)]
pub struct KpiSnapshot {
    pub total_samples: usize,
    pub anomaly_count: usize,
    pub anomaly_rate: f64,
    pub avg_cpu_usage: Option<f64>,
    pub avg_memory_usage: Option<f64>,
}

pub fn kpi_snapshot(store: &TelemetryStore, window: usize) -> KpiSnapshot {
    KpiSnapshot {
        total_samples: total_count(store),
        anomaly_count: anomaly_count(store),
        anomaly_rate: anomaly_rate(store),
        avg_cpu_usage: rolling_average(store, MetricField::CpuUsage, window),
        avg_memory_usage: rolling_average(store, MetricField::MemoryUsage, window),
    }
}

/// Per-VM anomaly summary over the whole retained history
#[derive(Debug, Clone, Serialize)]
pub struct VmSummary {
    pub vm_id: String,
    pub samples: usize,
    pub anomalies: usize,
    pub anomaly_rate: f64,
    pub last_timestamp: Option<i64>,
}

pub fn vm_summary(store: &TelemetryStore, vm_id: &str) -> VmSummary {
    let samples = store.filter_by_vm(vm_id);
    let anomalies = samples.iter().filter(|s| s.prediction.is_anomaly()).count();
    let rate = if samples.is_empty() {
        0.0
    } else {
        anomalies as f64 / samples.len() as f64 * 100.0
    };

    VmSummary {
        vm_id: vm_id.to_string(),
        samples: samples.len(),
        anomalies,
        anomaly_rate: rate,
        last_timestamp: samples.last().map(|s| s.timestamp),
    }
}
