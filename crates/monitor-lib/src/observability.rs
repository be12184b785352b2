//! Observability infrastructure for the fleet monitor
//!
//! Provides:
//! - Prometheus metrics (tick latency, store size, ingestion/anomaly/fallback
//!   totals, model version)
//! - Structured JSON logging with tracing

use crate::session::TickReport;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_gauge, GaugeVec, Histogram, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct MonitorMetricsInner {
    tick_latency_seconds: Histogram,
    store_samples: IntGauge,
    fleet_size: IntGauge,
    samples_ingested: IntGauge,
    anomalies_detected: IntGauge,
    classification_fallbacks: IntGauge,
    model_version_info: GaugeVec,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            tick_latency_seconds: register_histogram!(
                "fleet_monitor_tick_latency_seconds",
                "Time spent generating, classifying, and appending one batch",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_latency_seconds"),

            store_samples: register_int_gauge!(
                "fleet_monitor_store_samples",
                "Number of telemetry samples currently retained in the store"
            )
            .expect("Failed to register store_samples"),

            fleet_size: register_int_gauge!(
                "fleet_monitor_fleet_size",
                "Number of virtual machines simulated per tick"
            )
            .expect("Failed to register fleet_size"),

            samples_ingested: register_int_gauge!(
                "fleet_monitor_samples_ingested_total",
                "Total number of telemetry samples ingested"
            )
            .expect("Failed to register samples_ingested"),

            anomalies_detected: register_int_gauge!(
                "fleet_monitor_anomalies_detected_total",
                "Total number of samples classified as anomalous"
            )
            .expect("Failed to register anomalies_detected"),

            classification_fallbacks: register_int_gauge!(
                "fleet_monitor_classification_fallbacks_total",
                "Total number of samples that fell back to the default verdict"
            )
            .expect("Failed to register classification_fallbacks"),

            model_version_info: register_gauge_vec!(
                "fleet_monitor_model_version_info",
                "Information about the currently loaded classifier artifact",
                &["version"]
            )
            .expect("Failed to register model_version_info"),
        }
    }
}

/// Monitor metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct MonitorMetrics {
    // This is just a marker - we use the global instance
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record a tick latency observation
    pub fn observe_tick_latency(&self, duration_secs: f64) {
        self.inner().tick_latency_seconds.observe(duration_secs);
    }

    /// Update retained store size
    pub fn set_store_samples(&self, samples: i64) {
        self.inner().store_samples.set(samples);
    }

    /// Update the configured fleet size
    pub fn set_fleet_size(&self, size: i64) {
        self.inner().fleet_size.set(size);
    }

    /// Add to the ingested samples counter
    pub fn add_samples_ingested(&self, count: i64) {
        self.inner().samples_ingested.add(count);
    }

    /// Add to the anomalies detected counter
    pub fn add_anomalies_detected(&self, count: i64) {
        self.inner().anomalies_detected.add(count);
    }

    /// Add to the classification fallbacks counter
    pub fn add_classification_fallbacks(&self, count: i64) {
        self.inner().classification_fallbacks.add(count);
    }

    /// Update model version info
    pub fn set_model_version(&self, version: &str) {
        self.inner().model_version_info.reset();
        self.inner()
            .model_version_info
            .with_label_values(&[version])
            .set(1.0);
    }
}

/// Structured logger for monitor events
///
/// Provides consistent JSON-formatted logging for ticks, anomalies, and
/// classifier degradations.
#[derive(Clone)]
pub struct StructuredLogger {
    session_id: String,
}

impl StructuredLogger {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }

    /// Log monitor startup
    pub fn log_startup(&self, version: &str, model_version: &str, fleet_size: usize) {
        info!(
            event = "monitor_started",
            session = %self.session_id,
            monitor_version = %version,
            model_version = %model_version,
            fleet_size = fleet_size,
            "Fleet monitor started"
        );
    }

    /// Log monitor shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "monitor_shutdown",
            session = %self.session_id,
            reason = %reason,
            "Fleet monitor shutting down"
        );
    }

    /// Log the outcome of one refresh tick
    pub fn log_tick(&self, tick: u64, report: &TickReport) {
        if report.fallbacks > 0 {
            warn!(
                event = "tick_complete",
                session = %self.session_id,
                tick = tick,
                appended = report.appended,
                anomalies = report.anomalies,
                fallbacks = report.fallbacks,
                "Tick completed with degraded classifications"
            );
        } else {
            info!(
                event = "tick_complete",
                session = %self.session_id,
                tick = tick,
                appended = report.appended,
                anomalies = report.anomalies,
                "Tick completed"
            );
        }
    }

    /// Log an anomalous sample
    pub fn log_anomaly(&self, vm_id: &str, cpu_usage: f64, memory_usage: f64) {
        info!(
            event = "anomaly_detected",
            session = %self.session_id,
            vm_id = %vm_id,
            cpu_usage = cpu_usage,
            memory_usage = memory_usage,
            "Anomalous sample recorded"
        );
    }

    /// Log classifier artifact status at startup
    pub fn log_classifier_status(&self, model_version: &str, fallback_only: bool) {
        if fallback_only {
            warn!(
                event = "classifier_degraded",
                session = %self.session_id,
                model_version = %model_version,
                "No usable model artifact, every verdict will default to normal"
            );
        } else {
            info!(
                event = "classifier_ready",
                session = %self.session_id,
                model_version = %model_version,
                "Classifier artifact loaded"
            );
        }
    }
}
