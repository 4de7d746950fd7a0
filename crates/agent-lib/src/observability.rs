//! Observability infrastructure for the energy-attribution agent
//!
//! Provides:
//! - Prometheus metrics (resolution latency, walk and refresh counts, cache sizes)
//! - Structured JSON logging with tracing

use prometheus::{register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for resolution latency (in seconds)
///
/// Cache hits land in the sub-millisecond buckets; misses that trigger a
/// cgroup walk or kubelet round-trip land in the tail.
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct AgentMetricsInner {
    resolution_latency_seconds: Histogram,
    resolution_failures: IntCounter,
    cgroup_walks: IntGauge,
    kubelet_refreshes: IntCounter,
    pod_cache_entries: IntGauge,
    container_id_cache_entries: IntGauge,
    cgroup_path_entries: IntGauge,
    pods_alive: IntGauge,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            resolution_latency_seconds: register_histogram!(
                "energy_agent_resolution_latency_seconds",
                "Time spent resolving a process to its workload identity",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register resolution_latency_seconds"),

            resolution_failures: register_int_counter!(
                "energy_agent_resolution_failures_total",
                "Resolutions that fell back to the system-process bucket"
            )
            .expect("Failed to register resolution_failures"),

            cgroup_walks: register_int_gauge!(
                "energy_agent_cgroup_walks",
                "Filesystem walks performed to rebuild the cgroup path index"
            )
            .expect("Failed to register cgroup_walks"),

            kubelet_refreshes: register_int_counter!(
                "energy_agent_kubelet_refreshes_total",
                "Pod-list refreshes fetched from the kubelet"
            )
            .expect("Failed to register kubelet_refreshes"),

            pod_cache_entries: register_int_gauge!(
                "energy_agent_pod_cache_entries",
                "Entries in the container-ID to workload-identity cache"
            )
            .expect("Failed to register pod_cache_entries"),

            container_id_cache_entries: register_int_gauge!(
                "energy_agent_container_id_cache_entries",
                "Memoized cgroup-ID/PID to container-ID mappings"
            )
            .expect("Failed to register container_id_cache_entries"),

            cgroup_path_entries: register_int_gauge!(
                "energy_agent_cgroup_path_entries",
                "Entries in the cgroup-ID to path index"
            )
            .expect("Failed to register cgroup_path_entries"),

            pods_alive: register_int_gauge!(
                "energy_agent_pods_alive",
                "Pod UIDs reported alive by the last kubelet listing"
            )
            .expect("Failed to register pods_alive"),
        }
    }
}

/// Agent metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record one end-to-end resolution latency observation
    pub fn observe_resolution_latency(&self, duration_secs: f64) {
        self.inner()
            .resolution_latency_seconds
            .observe(duration_secs);
    }

    /// Count a resolution that degraded to the sentinel identity
    pub fn inc_resolution_failures(&self) {
        self.inner().resolution_failures.inc();
    }

    /// Count one kubelet pod-list refresh
    pub fn inc_kubelet_refreshes(&self) {
        self.inner().kubelet_refreshes.inc();
    }

    /// Update cache-size gauges in one shot
    pub fn set_cache_sizes(&self, pod_cache: i64, container_ids: i64, cgroup_paths: i64) {
        self.inner().pod_cache_entries.set(pod_cache);
        self.inner().container_id_cache_entries.set(container_ids);
        self.inner().cgroup_path_entries.set(cgroup_paths);
    }

    /// Update the cumulative walk count gauge
    pub fn set_cgroup_walks(&self, walks: i64) {
        self.inner().cgroup_walks.set(walks);
    }

    /// Update the alive-pod gauge
    pub fn set_pods_alive(&self, count: i64) {
        self.inner().pods_alive.set(count);
    }
}

/// Structured logger for agent lifecycle and attribution events
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, resolution_mode: &str) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            version = %version,
            resolution_mode = %resolution_mode,
            "Agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_stopped",
            node = %self.node_name,
            reason = %reason,
            "Agent stopped"
        );
    }

    /// Log a pod GC pass
    pub fn log_pod_gc(&self, alive: usize, cache_entries: usize) {
        info!(
            event = "pod_gc",
            node = %self.node_name,
            alive_pods = alive,
            cache_entries = cache_entries,
            "Pruned pod metadata cache"
        );
    }

    /// Log a kubelet outage observed during refresh
    pub fn log_kubelet_unreachable(&self, error: &str) {
        warn!(
            event = "kubelet_unreachable",
            node = %self.node_name,
            error = %error,
            "Kubelet pod listing failed, identities may go stale"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handle_is_cloneable_and_shared() {
        let a = AgentMetrics::new();
        let b = a.clone();
        a.observe_resolution_latency(0.001);
        b.inc_resolution_failures();
        a.set_cache_sizes(3, 2, 10);
        b.set_pods_alive(4);
    }
}
