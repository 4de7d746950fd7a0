//! Core data models for the energy-attribution agent

use serde::{Deserialize, Serialize};

/// Pod name used for processes that cannot be attributed to any workload
pub const SYSTEM_PROCESS_NAME: &str = "system_processes";

/// Namespace used for processes that cannot be attributed to any workload
pub const SYSTEM_PROCESS_NAMESPACE: &str = "system";

/// Resolved workload identity for a tracked process
///
/// Every resolvable process maps to exactly one `ContainerInfo`.
/// Unresolvable processes map to the synthetic system-process identity so
/// their energy is still accounted for instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub pod_name: String,
    pub container_name: String,
    pub namespace: String,
    pub pod_id: String,
}

impl ContainerInfo {
    /// The sentinel identity for processes outside any Kubernetes pod
    pub fn system_process() -> Self {
        Self {
            pod_name: SYSTEM_PROCESS_NAME.to_string(),
            container_name: String::new(),
            namespace: SYSTEM_PROCESS_NAMESPACE.to_string(),
            pod_id: String::new(),
        }
    }

    /// Returns true if this is the synthetic system-process identity
    pub fn is_system(&self) -> bool {
        self.pod_name == SYSTEM_PROCESS_NAME && self.namespace == SYSTEM_PROCESS_NAMESPACE
    }
}

impl Default for ContainerInfo {
    fn default() -> Self {
        Self::system_process()
    }
}

/// How kernel-visible identifiers are mapped to container identities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolutionMode {
    /// Resolve via the cgroup file-handle index (preferred; cgroup IDs are
    /// not recycled the way PIDs are)
    #[default]
    CgroupId,
    /// Resolve via /proc/<pid>/cgroup membership lines
    Pid,
}
