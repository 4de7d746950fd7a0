//! Agent library for per-workload energy attribution
//!
//! This crate provides the core functionality for:
//! - Resolving kernel identifiers (cgroup IDs, PIDs) to pod/container identities
//! - Caching the expensive cgroup-walk and kubelet cross-reference steps
//! - Kubelet pod-listing integration and alive-pod tracking
//! - Health checks and observability

pub mod estimator;
pub mod health;
pub mod kubelet;
pub mod models;
pub mod observability;
pub mod resolver;

pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{AgentMetrics, StructuredLogger};
