//! Session state and tick orchestration
//!
//! A session owns the telemetry store, the fleet roster, the sample source,
//! and the classifier adapter. One refresh tick is one atomic unit of work:
//! derive the roster, generate a batch, classify each reading, append the
//! whole batch. Every tick appends a full batch regardless of classifier
//! failures. Callers pass the session explicitly; there is no process-wide
//! ambient state.

use crate::classifier::ClassifierAdapter;
use crate::fleet::FleetSize;
use crate::generator::SampleSource;
use crate::models::TelemetrySample;
use crate::observability::{MonitorMetrics, StructuredLogger};
use crate::store::{StoreConfig, TelemetryStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, Instant};
use tracing::{debug, info};

/// Outcome of one tick
#[derive(Debug, Clone, Copy)]
pub struct TickReport {
    /// Samples appended this tick, always equal to the fleet size
    pub appended: usize,
    /// Samples classified as anomalous
    pub anomalies: usize,
    /// Samples that fell back to the default verdict
    pub fallbacks: usize,
}

/// One dashboard user's isolated telemetry state
pub struct Session {
    fleet_size: FleetSize,
    store: TelemetryStore,
    source: Arc<dyn SampleSource>,
    classifier: ClassifierAdapter,
    started_at: i64,
    ticks: u64,
}

impl Session {
    pub fn new(
        fleet_size: FleetSize,
        store_config: StoreConfig,
        source: Arc<dyn SampleSource>,
        classifier: ClassifierAdapter,
    ) -> Self {
        Self {
            fleet_size,
            store: TelemetryStore::with_config(store_config),
            source,
            classifier,
            started_at: chrono::Utc::now().timestamp(),
            ticks: 0,
        }
    }

    /// Run one refresh tick: generate, classify, append. The batch is
    /// always appended in roster order, one sample per VM.
    pub fn run_tick(&mut self) -> TickReport {
        let mut batch = Vec::with_capacity(self.fleet_size.get());
        let mut anomalies = 0;
        let mut fallbacks = 0;

        for vm_id in self.fleet_size.vm_ids() {
            let raw = self.source.sample(&vm_id);
            let outcome = self.classifier.classify(&raw.features);

            if outcome.prediction().is_anomaly() {
                anomalies += 1;
            }
            if outcome.is_fallback() {
                fallbacks += 1;
            }

            let label = outcome.label().to_string();
            batch.push(TelemetrySample::classified(raw, outcome.prediction(), label));
        }

        let appended = batch.len();
        self.store.append(batch);
        self.ticks += 1;

        TickReport {
            appended,
            anomalies,
            fallbacks,
        }
    }

    pub fn store(&self) -> &TelemetryStore {
        &self.store
    }

    pub fn fleet_size(&self) -> FleetSize {
        self.fleet_size
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Seconds since the session was created
    pub fn uptime_secs(&self) -> i64 {
        (chrono::Utc::now().timestamp() - self.started_at).max(0)
    }
}

/// Configuration for the ingestion loop
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Interval between refresh ticks
    pub interval: Duration,
    /// Log cycle stats every this many ticks
    pub log_every: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            log_every: 10,
        }
    }
}

/// Ingestion loop that fires one tick per interval
///
/// The session sits behind a write lock, so ticks are serialized with each
/// other and with query reads: at most one tick is in flight at a time.
pub struct IngestLoop {
    session: Arc<RwLock<Session>>,
    config: IngestConfig,
    metrics: MonitorMetrics,
    logger: StructuredLogger,
}

impl IngestLoop {
    pub fn new(
        session: Arc<RwLock<Session>>,
        config: IngestConfig,
        metrics: MonitorMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            session,
            config,
            metrics,
            logger,
        }
    }

    /// Run until the shutdown signal fires
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting ingestion loop"
        );

        let mut ticker = interval(self.config.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_one().await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down ingestion loop");
                    break;
                }
            }
        }
    }

    async fn run_one(&self) {
        let start = Instant::now();

        let (report, tick, store_len, total_appended) = {
            let mut session = self.session.write().await;
            let report = session.run_tick();

            for sample in session.store().tail(report.appended) {
                if sample.prediction.is_anomaly() {
                    self.logger.log_anomaly(
                        &sample.vm_id,
                        sample.features.cpu_usage,
                        sample.features.memory_usage,
                    );
                }
            }

            let stats = session.store().stats();
            (report, session.ticks(), stats.entries, stats.total_appended)
        };

        let elapsed = start.elapsed();
        self.metrics.observe_tick_latency(elapsed.as_secs_f64());
        self.metrics.add_samples_ingested(report.appended as i64);
        self.metrics.add_anomalies_detected(report.anomalies as i64);
        self.metrics
            .add_classification_fallbacks(report.fallbacks as i64);
        self.metrics.set_store_samples(store_len as i64);

        self.logger.log_tick(tick, &report);

        if tick % self.config.log_every == 0 {
            debug!(
                tick = tick,
                store_samples = store_len,
                total_appended = total_appended,
                elapsed_ms = elapsed.as_millis(),
                "Ingestion cycle complete"
            );
        }
    }
}
