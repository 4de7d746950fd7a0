//! Top-level identity resolution entry point
//!
//! Invoked once per tracked process on every sampling tick, so repeat
//! lookups must be O(1): the final (cgroup ID or PID) to container-ID
//! mapping is memoized here, on top of the path index and pod cache.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tracing::debug;

use super::cgroup_index::{CgroupPathIndexer, UNKNOWN_PATH};
use super::container_id::{extract_container_id, proc_cgroup_line};
use super::error::ResolveError;
use super::pod_cache::PodMetadataCache;
use super::Resolution;
use crate::models::ResolutionMode;
use crate::observability::AgentMetrics;

/// Resolves (cgroup ID, PID) pairs to workload identities
///
/// Safe for concurrent use from many sampling tasks; all internal caches
/// are concurrent maps and no lock is held across the filesystem walk or
/// the kubelet round-trip.
pub struct IdentityResolver {
    index: Arc<CgroupPathIndexer>,
    pods: Arc<PodMetadataCache>,
    mode: ResolutionMode,
    proc_root: PathBuf,
    by_cgroup: DashMap<u64, Arc<str>>,
    by_pid: DashMap<u32, Arc<str>>,
    metrics: AgentMetrics,
}

impl IdentityResolver {
    pub fn new(
        index: Arc<CgroupPathIndexer>,
        pods: Arc<PodMetadataCache>,
        mode: ResolutionMode,
    ) -> Self {
        Self::with_proc_root(index, pods, mode, "/proc")
    }

    /// Create a resolver with a custom proc root (for tests)
    pub fn with_proc_root(
        index: Arc<CgroupPathIndexer>,
        pods: Arc<PodMetadataCache>,
        mode: ResolutionMode,
        proc_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            index,
            pods,
            mode,
            proc_root: proc_root.into(),
            by_cgroup: DashMap::new(),
            by_pid: DashMap::new(),
            metrics: AgentMetrics::new(),
        }
    }

    /// Resolve the container-runtime ID for a process
    ///
    /// Cgroup-ID mode goes through the path index (walk on miss, off the
    /// async runtime); PID mode parses `/proc/<pid>/cgroup`. Both branches
    /// memoize successful extractions per key.
    pub async fn container_id(&self, cgroup_id: u64, pid: u32) -> Result<Arc<str>, ResolveError> {
        match self.mode {
            ResolutionMode::CgroupId => {
                if let Some(id) = self.by_cgroup.get(&cgroup_id) {
                    return Ok(Arc::clone(&id));
                }

                let index = Arc::clone(&self.index);
                let path = tokio::task::spawn_blocking(move || index.path_of(cgroup_id))
                    .await
                    .map_err(|err| ResolveError::WalkTask(err.to_string()))??;

                if &*path == UNKNOWN_PATH {
                    return Err(ResolveError::UnresolvedCgroupId(cgroup_id));
                }

                let id: Arc<str> = Arc::from(extract_container_id(&path)?);
                self.by_cgroup.insert(cgroup_id, Arc::clone(&id));
                Ok(id)
            }
            ResolutionMode::Pid => {
                if let Some(id) = self.by_pid.get(&pid) {
                    return Ok(Arc::clone(&id));
                }

                let line = proc_cgroup_line(&self.proc_root, pid)?;
                let id: Arc<str> = Arc::from(extract_container_id(&line)?);
                self.by_pid.insert(pid, Arc::clone(&id));
                Ok(id)
            }
        }
    }

    /// Resolve a process to its workload identity
    ///
    /// Never returns an empty identity: any failure yields the sentinel
    /// system-process identity paired with the triggering error, so the
    /// caller can still attribute energy to the system bucket.
    pub async fn resolve(&self, cgroup_id: u64, pid: u32) -> Resolution {
        let start = Instant::now();

        let resolution = match self.container_id(cgroup_id, pid).await {
            Ok(container_id) => self.pods.resolve(&container_id).await,
            Err(err) => {
                debug!(cgroup_id, pid, error = %err, "identity resolution fell back to system bucket");
                Resolution::fallback(err)
            }
        };

        self.metrics
            .observe_resolution_latency(start.elapsed().as_secs_f64());
        if resolution.error.is_some() {
            self.metrics.inc_resolution_failures();
        }

        resolution
    }

    pub async fn pod_name(&self, cgroup_id: u64, pid: u32) -> String {
        self.resolve(cgroup_id, pid).await.info.pod_name
    }

    pub async fn pod_namespace(&self, cgroup_id: u64, pid: u32) -> String {
        self.resolve(cgroup_id, pid).await.info.namespace
    }

    pub async fn container_name(&self, cgroup_id: u64, pid: u32) -> String {
        self.resolve(cgroup_id, pid).await.info.container_name
    }

    pub async fn pod_id(&self, cgroup_id: u64, pid: u32) -> String {
        self.resolve(cgroup_id, pid).await.info.pod_id
    }

    /// Drop the memoized mapping for a PID
    ///
    /// The kernel recycles PIDs after process exit; the surrounding
    /// collector should call this when it observes an exit so a recycled
    /// PID cannot inherit the old container mapping.
    pub fn invalidate_pid(&self, pid: u32) {
        self.by_pid.remove(&pid);
    }

    /// Number of memoized container-ID entries across both key spaces
    pub fn cached_ids(&self) -> usize {
        self.by_cgroup.len() + self.by_pid.len()
    }
}
