//! Container-ID to workload-identity cache backed by the kubelet pod list

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use tracing::{debug, warn};

use super::container_id::strip_runtime_prefix;
use super::error::ResolveError;
use super::Resolution;
use crate::kubelet::PodLister;
use crate::models::ContainerInfo;
use crate::observability::AgentMetrics;

/// Cap on cached negative (system-process) entries
///
/// Hosts with heavy churn of short-lived non-pod processes would otherwise
/// grow the negative cache without bound; hitting the cap clears it.
const NEGATIVE_CACHE_LIMIT: usize = 4096;

/// Authoritative mapping from container-runtime ID to workload identity
///
/// Entries are inserted whenever a pod-list refresh observes a container
/// status with a non-empty runtime ID and are overwritten wholesale on
/// later refreshes; disappeared pods leave stale but harmless entries until
/// [`PodMetadataCache::retain_pods`] prunes them.
pub struct PodMetadataCache {
    lister: Arc<dyn PodLister>,
    by_container: DashMap<String, ContainerInfo>,
    negative_entries: AtomicUsize,
    metrics: AgentMetrics,
}

impl PodMetadataCache {
    pub fn new(lister: Arc<dyn PodLister>) -> Self {
        Self {
            lister,
            by_container: DashMap::new(),
            negative_entries: AtomicUsize::new(0),
            metrics: AgentMetrics::new(),
        }
    }

    /// Pure cache read
    pub fn lookup(&self, container_id: &str) -> Option<ContainerInfo> {
        self.by_container
            .get(container_id)
            .map(|entry| entry.clone())
    }

    /// Refresh the cache from one kubelet pod listing
    ///
    /// Iterates every pod's init, main, and ephemeral container statuses,
    /// stripping the runtime prefix from each status ID. With a `target`,
    /// returns as soon as the target's entry was inserted, skipping the
    /// remaining pods for this cycle (latency optimization). A full refresh
    /// (no target) first drops previously cached negative entries so
    /// processes that became pods can resolve again.
    ///
    /// Returns whether the target was found; always `false` for a full
    /// refresh.
    pub async fn refresh(&self, target: Option<&str>) -> Result<bool> {
        let pods = self
            .lister
            .list_pods()
            .await
            .context("kubelet pod listing failed")?;
        self.metrics.inc_kubelet_refreshes();

        if target.is_none() {
            self.drop_negative_entries();
        }

        for pod in &pods {
            for status in pod.all_statuses() {
                let id = strip_runtime_prefix(&status.container_id);
                if id.is_empty() {
                    // container created but not yet started
                    continue;
                }

                let info = ContainerInfo {
                    pod_name: pod.name.clone(),
                    container_name: status.name.clone(),
                    namespace: pod.namespace.clone(),
                    pod_id: pod.uid.clone(),
                };
                let was_negative = self
                    .by_container
                    .insert(id.to_string(), info)
                    .map(|old| old.is_system())
                    .unwrap_or(false);
                if was_negative {
                    self.negative_entries.fetch_sub(1, Ordering::Relaxed);
                }

                if target == Some(id) {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    /// Resolve a bare container ID to its workload identity
    ///
    /// Cache first, then a targeted refresh, then the cache again; a second
    /// miss caches and returns the sentinel so genuinely non-pod processes
    /// do not re-trigger pod-list fetches every tick. Kubelet failures
    /// degrade to the sentinel without caching the miss.
    pub async fn resolve(&self, container_id: &str) -> Resolution {
        if let Some(info) = self.lookup(container_id) {
            if info.is_system() {
                return Resolution {
                    info,
                    error: Some(ResolveError::UnknownContainer(container_id.to_string())),
                };
            }
            return Resolution::ok(info);
        }

        if let Err(err) = self.refresh(Some(container_id)).await {
            warn!(container_id = %container_id, error = %err, "pod-list refresh failed");
            return Resolution::fallback(ResolveError::PodList(format!("{err:#}")));
        }

        if let Some(info) = self.lookup(container_id) {
            return Resolution::ok(info);
        }

        debug!(container_id = %container_id, "container not in pod list, caching as system process");
        self.insert_negative(container_id);
        Resolution {
            info: ContainerInfo::system_process(),
            error: Some(ResolveError::UnknownContainer(container_id.to_string())),
        }
    }

    /// Drop entries belonging to pods that are no longer alive
    ///
    /// Negative entries are kept; they are bounded separately.
    pub fn retain_pods(&self, alive: &HashSet<String>) {
        self.by_container
            .retain(|_, info| info.is_system() || alive.contains(&info.pod_id));
    }

    /// Number of cached entries, negative entries included
    pub fn len(&self) -> usize {
        self.by_container.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_container.is_empty()
    }

    fn insert_negative(&self, container_id: &str) {
        if self.negative_entries.load(Ordering::Relaxed) >= NEGATIVE_CACHE_LIMIT {
            warn!(
                limit = NEGATIVE_CACHE_LIMIT,
                "negative cache limit reached, clearing"
            );
            self.drop_negative_entries();
        }
        let previous = self
            .by_container
            .insert(container_id.to_string(), ContainerInfo::system_process());
        if previous.map(|old| old.is_system()) != Some(true) {
            self.negative_entries.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn drop_negative_entries(&self) {
        self.by_container.retain(|_, info| !info.is_system());
        self.negative_entries.store(0, Ordering::Relaxed);
    }
}
