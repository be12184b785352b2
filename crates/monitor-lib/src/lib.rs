//! Core library for the VM fleet monitor
//!
//! This crate provides the core functionality for:
//! - Synthetic telemetry generation per virtual machine
//! - Anomaly classification behind a narrow model boundary
//! - Session-scoped telemetry storage with tail/filter queries
//! - Rolling KPI aggregation
//! - Health checks and observability

pub mod aggregate;
pub mod classifier;
pub mod fleet;
pub mod generator;
pub mod health;
pub mod models;
pub mod observability;
pub mod session;
pub mod store;

pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{MonitorMetrics, StructuredLogger};
