//! Fleet Monitor - VM telemetry simulation and anomaly detection service
//!
//! Simulates a fleet of virtual machines, classifies each telemetry
//! reading through a pre-trained model artifact, and serves KPIs and
//! sample queries to an external presentation layer.

use anyhow::Result;
use monitor_lib::{
    classifier::{ClassifierAdapter, OnnxClassifier},
    generator::UniformSampleGenerator,
    health::{components, HealthRegistry},
    observability::{MonitorMetrics, StructuredLogger},
    session::{IngestConfig, IngestLoop, Session},
};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const MONITOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting fleet-monitor");

    // Load and validate configuration at the boundary
    let config = config::MonitorConfig::load()?;
    let fleet_size = config.fleet()?;
    let refresh_interval = config.refresh_interval()?;
    let store_config = config.store()?;
    info!(
        fleet_size = fleet_size.get(),
        refresh_secs = refresh_interval.as_secs(),
        "Monitor configured"
    );

    // Load the classifier artifacts once; a missing model degrades to
    // fallback mode instead of failing startup
    let classifier = OnnxClassifier::load(&config.artifacts());
    let model_version = classifier.model_version().to_string();
    let fallback_only = classifier.is_fallback_only();

    let session_id = format!("session-{}", chrono::Utc::now().timestamp());
    let logger = StructuredLogger::new(&session_id);
    logger.log_classifier_status(&model_version, fallback_only);

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::GENERATOR).await;
    health_registry.register(components::CLASSIFIER).await;
    health_registry.register(components::STORE).await;
    health_registry.register(components::INGEST).await;
    if fallback_only {
        health_registry
            .set_degraded(
                components::CLASSIFIER,
                "no model artifact, defaulting every verdict to normal",
            )
            .await;
    }

    // Initialize metrics
    let metrics = MonitorMetrics::new();
    metrics.set_model_version(&model_version);
    metrics.set_fleet_size(fleet_size.get() as i64);

    logger.log_startup(MONITOR_VERSION, &model_version, fleet_size.get());

    // Create the session: it owns the store for its whole lifetime
    let session = Arc::new(RwLock::new(Session::new(
        fleet_size,
        store_config,
        Arc::new(UniformSampleGenerator::new()),
        ClassifierAdapter::new(Arc::new(classifier)),
    )));

    // Create shared application state
    let app_state = Arc::new(api::AppState::new(
        session.clone(),
        health_registry.clone(),
        metrics.clone(),
    ));

    // Start the ingestion loop
    let (shutdown_tx, _) = broadcast::channel(1);
    let ingest = IngestLoop::new(
        session,
        IngestConfig {
            interval: refresh_interval,
            log_every: 10,
        },
        metrics.clone(),
        logger.clone(),
    );
    let ingest_handle = tokio::spawn(ingest.run(shutdown_tx.subscribe()));

    // Mark monitor as ready after initialization
    health_registry.set_ready(true).await;

    // Start health, metrics, and query server
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    let _ = shutdown_tx.send(());
    let _ = ingest_handle.await;
    api_handle.abort();
    info!("Shutting down");

    Ok(())
}
