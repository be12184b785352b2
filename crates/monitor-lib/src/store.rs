//! Session-scoped telemetry store
//!
//! Ordered, append-only buffer of classified samples. Insertion order is
//! chronological and consumers rely on it: `tail(n)` is always the most
//! recent `n` entries. The store is created empty at session start, owned
//! exclusively by its session, and dropped with it. No persistence.
//!
//! The reference behavior grows without bound for the session lifetime;
//! an optional capacity turns the store into a bounded ring that evicts
//! oldest-first, for long-running deployments.

use crate::models::{Prediction, TelemetrySample};
use std::collections::VecDeque;

/// Configuration for the telemetry store
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Maximum number of samples to retain; `None` means unbounded
    pub capacity: Option<usize>,
}

/// Ordered buffer of classified telemetry samples
#[derive(Debug)]
pub struct TelemetryStore {
    samples: VecDeque<TelemetrySample>,
    config: StoreConfig,
    total_appended: u64,
    evicted: u64,
}

impl TelemetryStore {
    /// Create an unbounded store (the session-scoped default)
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create a bounded ring store that evicts oldest-first at capacity
    pub fn bounded(capacity: usize) -> Self {
        Self::with_config(StoreConfig {
            capacity: Some(capacity),
        })
    }

    pub fn with_config(config: StoreConfig) -> Self {
        let initial = config.capacity.unwrap_or(0).min(10_000);
        Self {
            samples: VecDeque::with_capacity(initial),
            config,
            total_appended: 0,
            evicted: 0,
        }
    }

    /// Append a batch, preserving input order. O(1) amortized per sample.
    pub fn append(&mut self, batch: Vec<TelemetrySample>) {
        for sample in batch {
            if let Some(capacity) = self.config.capacity {
                while self.samples.len() >= capacity {
                    self.samples.pop_front();
                    self.evicted += 1;
                }
            }
            self.samples.push_back(sample);
            self.total_appended += 1;
        }
    }

    /// The last `min(n, len)` samples in original chronological order.
    /// Never errors on small or empty stores.
    pub fn tail(&self, n: usize) -> Vec<&TelemetrySample> {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(skip).collect()
    }

    /// Ordered subsequence of samples for one VM
    pub fn filter_by_vm(&self, vm_id: &str) -> Vec<&TelemetrySample> {
        self.samples.iter().filter(|s| s.vm_id == vm_id).collect()
    }

    /// Ordered subsequence of samples with the given verdict
    pub fn filter_by_prediction(&self, prediction: Prediction) -> Vec<&TelemetrySample> {
        self.samples
            .iter()
            .filter(|s| s.prediction == prediction)
            .collect()
    }

    /// Read-only view of the full ordered sequence
    pub fn all(&self) -> impl Iterator<Item = &TelemetrySample> {
        self.samples.iter()
    }

    /// Number of samples currently retained
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Retention cap, if any
    pub fn capacity(&self) -> Option<usize> {
        self.config.capacity
    }

    /// Samples ever appended this session; monotone even when the ring evicts
    pub fn total_appended(&self) -> u64 {
        self.total_appended
    }

    /// Get statistics about the store
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            entries: self.samples.len(),
            capacity: self.config.capacity,
            total_appended: self.total_appended,
            evicted: self.evicted,
            oldest_timestamp: self.samples.front().map(|s| s.timestamp),
            newest_timestamp: self.samples.back().map(|s| s.timestamp),
        }
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Store statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    /// Number of samples currently retained
    pub entries: usize,
    /// Retention cap, if any
    pub capacity: Option<usize>,
    /// Samples ever appended this session
    pub total_appended: u64,
    /// Samples evicted by the ring, zero when unbounded
    pub evicted: u64,
    /// Oldest retained timestamp (Unix seconds)
    pub oldest_timestamp: Option<i64>,
    /// Newest retained timestamp (Unix seconds)
    pub newest_timestamp: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SampleFeatures, TaskPriority, TaskStatus, TaskType};

    fn sample(vm_id: &str, timestamp: i64, prediction: Prediction) -> TelemetrySample {
        TelemetrySample {
            vm_id: vm_id.to_string(),
            timestamp,
            features: SampleFeatures {
                cpu_usage: 50.0,
                memory_usage: 60.0,
                network_traffic: 1000.0,
                power_consumption: 100.0,
                num_executed_instructions: 5000.0,
                execution_time: 0.5,
                energy_efficiency: 0.8,
                task_type: TaskType::Compute,
                task_priority: TaskPriority::Medium,
                task_status: TaskStatus::Running,
            },
            prediction,
            prediction_label: prediction.as_label().to_string(),
        }
    }

    #[test]
    fn test_append_preserves_order_and_grows_by_batch_len() {
        let mut store = TelemetryStore::new();
        assert_eq!(store.len(), 0);

        store.append(vec![
            sample("VM-1", 1, Prediction::Normal),
            sample("VM-2", 1, Prediction::Normal),
        ]);
        assert_eq!(store.len(), 2);

        store.append(vec![sample("VM-1", 2, Prediction::Anomaly)]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.total_appended(), 3);

        let ids: Vec<&str> = store.all().map(|s| s.vm_id.as_str()).collect();
        assert_eq!(ids, vec!["VM-1", "VM-2", "VM-1"]);
    }

    #[test]
    fn test_tail_is_contiguous_suffix() {
        let mut store = TelemetryStore::new();
        for i in 0..10 {
            store.append(vec![sample("VM-1", i, Prediction::Normal)]);
        }

        let tail = store.tail(3);
        assert_eq!(tail.len(), 3);
        let timestamps: Vec<i64> = tail.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![7, 8, 9]);
    }

    #[test]
    fn test_tail_never_errors_on_small_stores() {
        let mut store = TelemetryStore::new();
        assert!(store.tail(0).is_empty());
        assert!(store.tail(5).is_empty());

        store.append(vec![sample("VM-1", 1, Prediction::Normal)]);
        assert_eq!(store.tail(5).len(), 1);
        assert!(store.tail(0).is_empty());
    }

    #[test]
    fn test_filter_by_vm_preserves_relative_order() {
        let mut store = TelemetryStore::new();
        // Interleave three VMs across ticks
        for tick in 0..4 {
            store.append(vec![
                sample("VM-1", tick, Prediction::Normal),
                sample("VM-2", tick, Prediction::Normal),
                sample("VM-3", tick, Prediction::Normal),
            ]);
        }

        let vm3 = store.filter_by_vm("VM-3");
        assert_eq!(vm3.len(), 4);
        assert!(vm3.iter().all(|s| s.vm_id == "VM-3"));
        let timestamps: Vec<i64> = vm3.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_filter_by_vm_unknown_id_is_empty() {
        let mut store = TelemetryStore::new();
        store.append(vec![sample("VM-1", 1, Prediction::Normal)]);
        assert!(store.filter_by_vm("VM-99").is_empty());
    }

    #[test]
    fn test_filter_by_prediction() {
        let mut store = TelemetryStore::new();
        store.append(vec![
            sample("VM-1", 1, Prediction::Normal),
            sample("VM-2", 1, Prediction::Anomaly),
            sample("VM-3", 1, Prediction::Normal),
            sample("VM-1", 2, Prediction::Anomaly),
        ]);

        let anomalies = store.filter_by_prediction(Prediction::Anomaly);
        assert_eq!(anomalies.len(), 2);
        assert_eq!(anomalies[0].vm_id, "VM-2");
        assert_eq!(anomalies[1].vm_id, "VM-1");
    }

    #[test]
    fn test_bounded_ring_evicts_oldest_first() {
        let mut store = TelemetryStore::bounded(5);
        for i in 0..10 {
            store.append(vec![sample("VM-1", i, Prediction::Normal)]);
        }

        assert_eq!(store.len(), 5);
        assert_eq!(store.total_appended(), 10);
        let timestamps: Vec<i64> = store.all().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![5, 6, 7, 8, 9]);

        let stats = store.stats();
        assert_eq!(stats.evicted, 5);
        assert_eq!(stats.oldest_timestamp, Some(5));
        assert_eq!(stats.newest_timestamp, Some(9));
    }

    #[test]
    fn test_stats_on_empty_store() {
        let store = TelemetryStore::new();
        let stats = store.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.total_appended, 0);
        assert!(stats.oldest_timestamp.is_none());
        assert!(stats.newest_timestamp.is_none());
    }
}
