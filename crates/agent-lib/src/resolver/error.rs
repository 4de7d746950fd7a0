use std::path::PathBuf;

/// Errors raised while resolving a kernel identifier to a workload identity
///
/// None of these are fatal to the sampling loop: callers receive the
/// sentinel system-process identity alongside the error and keep going.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The cgroup path belongs to a conmon wrapper or a systemd service
    /// unit, not to a container the agent tracks
    #[error("not in a kubernetes pod: {0}")]
    NotInPod(String),

    /// No known container-runtime convention matched the path
    #[error("failed to find pod's container id in {0}")]
    ContainerIdNotFound(String),

    /// The cgroup ID was not present in the path index even after a walk
    #[error("cgroup id {0} could not be resolved to a path")]
    UnresolvedCgroupId(u64),

    /// /proc/<pid>/cgroup carried no pod, crio, or containerd line
    #[error("no container cgroup line for pid {0}")]
    NoCgroupLine(u32),

    /// The container ID is not present in the latest kubelet pod list
    #[error("container {0} not found in kubelet pod list")]
    UnknownContainer(String),

    /// The kubelet pod-listing call itself failed
    #[error("kubelet pod listing failed: {0}")]
    PodList(String),

    /// Filesystem access failed (walk root unreadable, /proc entry gone)
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A background walk task was cancelled or panicked
    #[error("cgroup walk task failed: {0}")]
    WalkTask(String),
}
