//! cgroup-to-workload identity resolution
//!
//! This module maps kernel-visible identifiers (cgroup IDs or PIDs) to
//! stable container/pod identities, cheaply enough to repeat on every
//! sampling tick. It combines:
//!
//! - [`CgroupPathIndexer`]: a memoized inode-handle-to-path index built by
//!   walking the cgroup filesystem.
//! - [`extract_container_id`]: pure classification of cgroup paths across
//!   container-runtime conventions (crio, docker, containerd, podman).
//! - [`PodMetadataCache`]: the authoritative container-ID-to-workload map,
//!   refreshed from the kubelet pod list.
//! - [`IdentityResolver`]: the per-key memoizing entry point invoked once
//!   per tracked process per tick.
//!
//! Resolution never aborts the caller: any failure degrades to the
//! synthetic system-process identity so total energy accounting is
//! preserved even when per-workload attribution fails.

mod cgroup_index;
mod container_id;
mod endian;
mod error;
mod identity;
mod pod_cache;


pub use cgroup_index::{CgroupPathIndexer, UNKNOWN_PATH};
pub use container_id::{extract_container_id, proc_cgroup_line, strip_runtime_prefix};
pub use endian::{decode_handle, host_byte_order, ByteOrder};
pub use error::ResolveError;
pub use identity::IdentityResolver;
pub use pod_cache::PodMetadataCache;

use crate::models::ContainerInfo;

/// Outcome of an identity resolution
///
/// Always carries a usable identity: on failure `info` is the sentinel
/// system-process identity and `error` records why attribution fell back,
/// so the caller can log or count the failure without dropping the sample.
#[derive(Debug)]
pub struct Resolution {
    pub info: ContainerInfo,
    pub error: Option<ResolveError>,
}

impl Resolution {
    pub fn ok(info: ContainerInfo) -> Self {
        Self { info, error: None }
    }

    pub fn fallback(error: ResolveError) -> Self {
        Self {
            info: ContainerInfo::system_process(),
            error: Some(error),
        }
    }
}
