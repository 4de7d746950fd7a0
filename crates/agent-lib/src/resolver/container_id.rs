//! Container-ID extraction from cgroup paths
//!
//! Pure string classification over the small set of known cgroup path
//! shapes. Handles both cgroup v1 per-hierarchy paths
//! (`1:name=systemd:/kubepods.slice/.../crio-<id>.scope`) and v2 unified
//! paths (`0::/kubepods.slice/.../crio-<id>.scope`), across crio, docker,
//! containerd, and podman (rootful, rootless, quadlet) conventions.
//!
//! Non-pod host processes hit this code constantly, so a mismatch is a
//! normal, cheap code path rather than an exceptional one.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use super::error::ResolveError;

/// Matches a runtime-prefixed scope segment: `<runtime>-<64-hex-id>.scope`
fn scope_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(crio|docker|cri-containerd|containerd|libpod)-([0-9a-f]{64})\.scope")
            .expect("scope pattern must compile")
    })
}

fn is_hex64(token: &str) -> bool {
    token.len() == 64 && token.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

/// Extract a container-runtime ID from a cgroup path or a
/// `/proc/<pid>/cgroup` line
///
/// Returns [`ResolveError::NotInPod`] for conmon wrappers and bare systemd
/// service units under the v2 unified hierarchy, and
/// [`ResolveError::ContainerIdNotFound`] when no known runtime convention
/// matches.
pub fn extract_container_id(path: &str) -> Result<String, ResolveError> {
    let path = path.trim();

    // conmon runs beside the container it supervises; its cgroup must not
    // be attributed to the pod
    if path.contains("-conmon-") {
        return Err(ResolveError::NotInPod(path.to_string()));
    }

    // v1 lines carry a "N:controller:" prefix, v2 lines "0::"; plain
    // filesystem paths from the indexer carry neither
    let unified = path.starts_with("0::") || !path.contains(':');
    if unified && path.ends_with(".service") {
        return Err(ResolveError::NotInPod(path.to_string()));
    }

    if let Some(caps) = scope_pattern().captures(path) {
        return Ok(caps[2].to_string());
    }

    // Fallback for conventions without a runtime-prefixed scope segment:
    // kubelet besteffort paths end in a bare hex ID, RHEL-style systemd
    // unit paths embed it as the final colon-delimited field
    // (`...slice:cri-containerd:<id>`)
    for token in path.rsplit(['/', ':']) {
        if is_hex64(token) {
            return Ok(token.to_string());
        }
    }

    Err(ResolveError::ContainerIdNotFound(path.to_string()))
}

/// Strip the runtime URI scheme from a kubelet container-status ID
///
/// Status IDs are formatted `<runtime>://<hex>` (e.g. `cri-o://f93ee4...`);
/// the bare hex is what cgroup-derived IDs are keyed by.
pub fn strip_runtime_prefix(container_id: &str) -> &str {
    match container_id.find("://") {
        Some(idx) => &container_id[idx + 3..],
        None => container_id,
    }
}

/// Read the container-relevant cgroup membership line for a process
///
/// Returns the first line of `/proc/<pid>/cgroup` mentioning `pod`, `crio`,
/// or `containerd`. Used only in PID-based resolution mode; the proc root
/// is injectable for tests.
pub fn proc_cgroup_line(proc_root: &Path, pid: u32) -> Result<String, ResolveError> {
    let path = proc_root.join(pid.to_string()).join("cgroup");
    let content = std::fs::read_to_string(&path).map_err(|source| ResolveError::Io {
        path: path.clone(),
        source,
    })?;

    content
        .lines()
        .find(|line| {
            line.contains("pod") || line.contains("crio") || line.contains("containerd")
        })
        .map(str::to_string)
        .ok_or(ResolveError::NoCgroupLine(pid))
}
