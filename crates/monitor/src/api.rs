//! HTTP API: health checks, Prometheus metrics, and the telemetry query
//! surface consumed by the (external) presentation layer
//!
//! Every query endpoint is a read over the session's current store
//! snapshot. Responses are plain JSON; rendering, colors, and badges are
//! the presentation layer's concern.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use monitor_lib::{
    aggregate::{self, KpiSnapshot, VmStatus, VmSummary},
    health::{ComponentStatus, HealthRegistry},
    models::{Prediction, TelemetrySample},
    observability::MonitorMetrics,
    session::Session,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Default window for `GET /api/v1/samples`
const DEFAULT_TAIL_LIMIT: usize = 50;

/// Default window for per-VM history
const DEFAULT_VM_LIMIT: usize = 100;

/// Default window for the anomaly log
const DEFAULT_ANOMALY_LIMIT: usize = 50;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RwLock<Session>>,
    pub health_registry: HealthRegistry,
    pub metrics: MonitorMetrics,
}

impl AppState {
    pub fn new(
        session: Arc<RwLock<Session>>,
        health_registry: HealthRegistry,
        metrics: MonitorMetrics,
    ) -> Self {
        Self {
            session,
            health_registry,
            metrics,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// Overview payload backing the dashboard's KPI row
#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub kpis: KpiSnapshot,
    pub fleet_size: usize,
    pub ticks: u64,
    pub uptime_secs: i64,
}

/// Per-VM history payload
#[derive(Debug, Serialize)]
pub struct VmSamplesResponse {
    pub summary: VmSummary,
    pub samples: Vec<TelemetrySample>,
}

/// Health check response - returns 200 if healthy, 503 if degraded/unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
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

/// KPI row, tick count, and session uptime
async fn overview(State(state): State<Arc<AppState>>) -> Json<OverviewResponse> {
    let session = state.session.read().await;
    let fleet_size = session.fleet_size().get();

    Json(OverviewResponse {
        kpis: aggregate::kpi_snapshot(session.store(), fleet_size),
        fleet_size,
        ticks: session.ticks(),
        uptime_secs: session.uptime_secs(),
    })
}

/// Most recent samples across the whole fleet
async fn samples(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<TelemetrySample>> {
    let session = state.session.read().await;
    let limit = query.limit.unwrap_or(DEFAULT_TAIL_LIMIT);

    Json(clone_samples(session.store().tail(limit)))
}

/// History window and summary for one VM
async fn vm_samples(
    State(state): State<Arc<AppState>>,
    Path(vm_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Json<VmSamplesResponse> {
    let session = state.session.read().await;
    let limit = query.limit.unwrap_or(DEFAULT_VM_LIMIT);

    let history = session.store().filter_by_vm(&vm_id);
    let start = history.len().saturating_sub(limit);

    Json(VmSamplesResponse {
        summary: aggregate::vm_summary(session.store(), &vm_id),
        samples: clone_samples(history[start..].to_vec()),
    })
}

/// Most recent anomalous samples
async fn anomalies(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<TelemetrySample>> {
    let session = state.session.read().await;
    let limit = query.limit.unwrap_or(DEFAULT_ANOMALY_LIMIT);

    let anomalous = session.store().filter_by_prediction(Prediction::Anomaly);
    let start = anomalous.len().saturating_sub(limit);

    Json(clone_samples(anomalous[start..].to_vec()))
}

/// Latest normal/anomaly badge per fleet slot
async fn fleet_status(State(state): State<Arc<AppState>>) -> Json<Vec<VmStatus>> {
    let session = state.session.read().await;
    let fleet_size = session.fleet_size().get();

    Json(aggregate::latest_status_per_vm(session.store(), fleet_size))
}

fn clone_samples(samples: Vec<&TelemetrySample>) -> Vec<TelemetrySample> {
    samples.into_iter().cloned().collect()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
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

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
