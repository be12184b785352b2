//! Integration tests for the monitor API endpoints

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use monitor_lib::{
    aggregate,
    classifier::{Classifier, ClassifierAdapter, ClassifierError},
    fleet::FleetSize,
    generator::UniformSampleGenerator,
    health::{components, ComponentStatus, HealthRegistry},
    models::{Prediction, SampleFeatures, TelemetrySample},
    observability::MonitorMetrics,
    session::Session,
    store::StoreConfig,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceExt;

/// Classifier that flags every third prediction as anomalous
struct CyclingClassifier {
    counter: std::sync::atomic::AtomicU64,
}

impl CyclingClassifier {
    fn new() -> Self {
        Self {
            counter: std::sync::atomic::AtomicU64::new(0),
        }
    }
}

impl Classifier for CyclingClassifier {
    fn predict(&self, _features: &SampleFeatures) -> Result<u8, ClassifierError> {
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(u8::from(n % 3 == 0))
    }

    fn decode(&self, class: u8) -> Result<String, ClassifierError> {
        Prediction::try_from(class)
            .map(|p| p.as_label().to_string())
            .map_err(|e| ClassifierError::MissingLabel(e.0))
    }
}

/// Classifier that always returns a fixed class
struct StaticClassifier(u8);

impl Classifier for StaticClassifier {
    fn predict(&self, _features: &SampleFeatures) -> Result<u8, ClassifierError> {
        Ok(self.0)
    }

    fn decode(&self, class: u8) -> Result<String, ClassifierError> {
        Prediction::try_from(class)
            .map(|p| p.as_label().to_string())
            .map_err(|e| ClassifierError::MissingLabel(e.0))
    }
}

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RwLock<Session>>,
    pub health_registry: HealthRegistry,
    pub metrics: MonitorMetrics,
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(readiness))
}

async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

async fn overview(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.session.read().await;
    let fleet_size = session.fleet_size().get();
    Json(serde_json::json!({
        "kpis": aggregate::kpi_snapshot(session.store(), fleet_size),
        "fleet_size": fleet_size,
        "ticks": session.ticks(),
        "uptime_secs": session.uptime_secs(),
    }))
}

async fn samples(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<TelemetrySample>> {
    let session = state.session.read().await;
    let limit = query.limit.unwrap_or(50);
    Json(session.store().tail(limit).into_iter().cloned().collect())
}

async fn vm_samples(
    State(state): State<Arc<AppState>>,
    Path(vm_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> impl IntoResponse {
    let session = state.session.read().await;
    let limit = query.limit.unwrap_or(100);
    let history = session.store().filter_by_vm(&vm_id);
    let start = history.len().saturating_sub(limit);
    let samples: Vec<TelemetrySample> = history[start..].iter().map(|&s| s.clone()).collect();
    Json(serde_json::json!({
        "summary": aggregate::vm_summary(session.store(), &vm_id),
        "samples": samples,
    }))
}

async fn anomalies(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<TelemetrySample>> {
    let session = state.session.read().await;
    let limit = query.limit.unwrap_or(50);
    let anomalous = session.store().filter_by_prediction(Prediction::Anomaly);
    let start = anomalous.len().saturating_sub(limit);
    Json(anomalous[start..].iter().map(|&s| s.clone()).collect())
}

async fn fleet_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.session.read().await;
    let fleet_size = session.fleet_size().get();
    Json(aggregate::latest_status_per_vm(session.store(), fleet_size))
}

fn create_test_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/overview", get(overview))
        .route("/api/v1/samples", get(samples))
        .route("/api/v1/vms/:vm_id/samples", get(vm_samples))
        .route("/api/v1/anomalies", get(anomalies))
        .route("/api/v1/fleet/status", get(fleet_status))
        .with_state(state)
}

fn seeded_session(fleet: usize, classifier: Arc<dyn Classifier>, ticks: usize) -> Session {
    let mut session = Session::new(
        FleetSize::new(fleet).unwrap(),
        StoreConfig::default(),
        Arc::new(UniformSampleGenerator::new()),
        ClassifierAdapter::new(classifier),
    );
    for _ in 0..ticks {
        session.run_tick();
    }
    session
}

async fn setup_test_app(session: Session) -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::CLASSIFIER).await;
    health_registry.register(components::STORE).await;

    let metrics = MonitorMetrics::new();
    let state = Arc::new(AppState {
        session: Arc::new(RwLock::new(session)),
        health_registry,
        metrics,
    });
    let router = create_test_router(state.clone());

    (router, state)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    (status, value)
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app(seeded_session(3, Arc::new(StaticClassifier(0)), 0)).await;

    let (status, health) = get_json(&app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["classifier"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_classifier_degraded() {
    let (app, state) = setup_test_app(seeded_session(3, Arc::new(StaticClassifier(0)), 0)).await;

    state
        .health_registry
        .set_degraded(components::CLASSIFIER, "running in fallback mode")
        .await;

    // Degraded still returns 200 (operational)
    let (status, health) = get_json(&app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app(seeded_session(3, Arc::new(StaticClassifier(0)), 0)).await;

    state
        .health_registry
        .set_unhealthy(components::STORE, "failed")
        .await;

    let (status, health) = get_json(&app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_lifecycle() {
    let (app, state) = setup_test_app(seeded_session(3, Arc::new(StaticClassifier(0)), 0)).await;

    // Not ready until initialization marks it so
    let (status, readiness) = get_json(&app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);

    state.health_registry.set_ready(true).await;
    let (status, readiness) = get_json(&app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app(seeded_session(3, Arc::new(StaticClassifier(0)), 0)).await;

    state.metrics.observe_tick_latency(0.001);
    state.metrics.set_store_samples(9);
    state.metrics.set_model_version("v0.1.0");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("fleet_monitor_tick_latency_seconds"));
    assert!(metrics_text.contains("fleet_monitor_store_samples"));
    assert!(metrics_text.contains("fleet_monitor_model_version_info"));
}

#[tokio::test]
async fn test_overview_reports_kpis() {
    let (app, _state) = setup_test_app(seeded_session(5, Arc::new(StaticClassifier(1)), 2)).await;

    let (status, overview) = get_json(&app, "/api/v1/overview").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["fleet_size"], 5);
    assert_eq!(overview["ticks"], 2);
    assert_eq!(overview["kpis"]["total_samples"], 10);
    assert_eq!(overview["kpis"]["anomaly_count"], 10);
    assert_eq!(overview["kpis"]["anomaly_rate"], 100.0);
    assert!(overview["kpis"]["avg_cpu_usage"].is_number());
}

#[tokio::test]
async fn test_overview_on_empty_session() {
    let (app, _state) = setup_test_app(seeded_session(5, Arc::new(StaticClassifier(0)), 0)).await;

    let (status, overview) = get_json(&app, "/api/v1/overview").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["kpis"]["total_samples"], 0);
    assert_eq!(overview["kpis"]["anomaly_rate"], 0.0);
    assert!(overview["kpis"]["avg_cpu_usage"].is_null());
}

#[tokio::test]
async fn test_samples_tail_limit() {
    let (app, _state) = setup_test_app(seeded_session(3, Arc::new(StaticClassifier(0)), 3)).await;

    let (status, samples) = get_json(&app, "/api/v1/samples?limit=3").await;
    assert_eq!(status, StatusCode::OK);

    let samples = samples.as_array().unwrap();
    assert_eq!(samples.len(), 3);
    // The tail of three ticks x fleet 3 is the third batch, in roster order
    let ids: Vec<&str> = samples.iter().map(|s| s["vm_id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["VM-1", "VM-2", "VM-3"]);
}

#[tokio::test]
async fn test_vm_samples_filters_one_vm() {
    let (app, _state) = setup_test_app(seeded_session(3, Arc::new(StaticClassifier(0)), 4)).await;

    let (status, body) = get_json(&app, "/api/v1/vms/VM-2/samples").await;
    assert_eq!(status, StatusCode::OK);

    let samples = body["samples"].as_array().unwrap();
    assert_eq!(samples.len(), 4);
    assert!(samples.iter().all(|s| s["vm_id"] == "VM-2"));
    assert_eq!(body["summary"]["vm_id"], "VM-2");
    assert_eq!(body["summary"]["samples"], 4);
}

#[tokio::test]
async fn test_vm_samples_unknown_vm_is_empty() {
    let (app, _state) = setup_test_app(seeded_session(3, Arc::new(StaticClassifier(0)), 2)).await;

    let (status, body) = get_json(&app, "/api/v1/vms/VM-99/samples").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["samples"].as_array().unwrap().is_empty());
    assert_eq!(body["summary"]["samples"], 0);
    assert_eq!(body["summary"]["anomaly_rate"], 0.0);
}

#[tokio::test]
async fn test_anomalies_endpoint_returns_only_anomalies() {
    let (app, _state) =
        setup_test_app(seeded_session(3, Arc::new(CyclingClassifier::new()), 4)).await;

    let (status, anomalies) = get_json(&app, "/api/v1/anomalies").await;
    assert_eq!(status, StatusCode::OK);

    let anomalies = anomalies.as_array().unwrap();
    // Every third of twelve predictions is anomalous
    assert_eq!(anomalies.len(), 4);
    assert!(anomalies.iter().all(|s| s["prediction"] == 1));
    assert!(anomalies.iter().all(|s| s["prediction_label"] == "anomaly"));
}

#[tokio::test]
async fn test_anomalies_endpoint_empty_when_all_normal() {
    let (app, _state) = setup_test_app(seeded_session(3, Arc::new(StaticClassifier(0)), 3)).await;

    let (status, anomalies) = get_json(&app, "/api/v1/anomalies").await;
    assert_eq!(status, StatusCode::OK);
    assert!(anomalies.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_fleet_status_badges_cover_latest_batch() {
    let (app, _state) = setup_test_app(seeded_session(5, Arc::new(StaticClassifier(1)), 2)).await;

    let (status, badges) = get_json(&app, "/api/v1/fleet/status").await;
    assert_eq!(status, StatusCode::OK);

    let badges = badges.as_array().unwrap();
    assert_eq!(badges.len(), 5);
    let ids: Vec<&str> = badges.iter().map(|b| b["vm_id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["VM-1", "VM-2", "VM-3", "VM-4", "VM-5"]);
    assert!(badges.iter().all(|b| b["status"] == "anomaly"));
}
