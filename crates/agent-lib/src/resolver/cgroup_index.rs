//! Memoized cgroup-ID to filesystem-path index
//!
//! The kernel identifies cgroups by a file-handle-derived 64-bit ID. Going
//! from that ID back to a path requires converting every directory under
//! the cgroup mount into a handle and remembering the mapping. The walk is
//! expensive (tens of milliseconds on large trees), so one walk populates
//! the whole index, not just the queried key, amortizing its fixed cost
//! across future lookups.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, warn};

use super::endian::{decode_handle, host_byte_order, ByteOrder};
use super::error::ResolveError;

/// Sentinel path cached for cgroup IDs a full walk could not locate
///
/// Caching the miss keeps repeated queries for the same unresolvable ID
/// from re-walking the tree every tick. The entry is overwritten if a later
/// walk does find the ID.
pub const UNKNOWN_PATH: &str = "unknown";

/// Largest handle payload name_to_handle_at may produce (MAX_HANDLE_SZ)
const MAX_HANDLE_SZ: usize = 128;

type HandleFn = dyn Fn(&Path) -> io::Result<u64> + Send + Sync;

/// Concurrent cgroup-ID to path index backed by filesystem walks
///
/// Lookups never hold a lock across a walk; only the per-key map inserts
/// are synchronized, so concurrent misses for different IDs proceed
/// independently.
pub struct CgroupPathIndexer {
    root: PathBuf,
    paths: DashMap<u64, Arc<str>>,
    handle_of: Box<HandleFn>,
    walk_timeout: Duration,
    walks: AtomicU64,
}

impl CgroupPathIndexer {
    /// Create an indexer over the given cgroup mount root
    /// (typically `/sys/fs/cgroup`) with the default 2s walk deadline
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_timeout(root, Duration::from_secs(2))
    }

    /// Create an indexer with an explicit walk deadline
    pub fn with_timeout(root: impl Into<PathBuf>, walk_timeout: Duration) -> Self {
        let order = host_byte_order();
        Self::with_handle_fn(root, walk_timeout, move |path| {
            cgroup_handle_id(path, order)
        })
    }

    /// Create an indexer with an injected handle function (for tests) and
    /// an explicit walk deadline
    pub fn with_handle_fn(
        root: impl Into<PathBuf>,
        walk_timeout: Duration,
        handle_of: impl Fn(&Path) -> io::Result<u64> + Send + Sync + 'static,
    ) -> Self {
        Self {
            root: root.into(),
            paths: DashMap::new(),
            handle_of: Box::new(handle_of),
            walk_timeout,
            walks: AtomicU64::new(0),
        }
    }

    /// Resolve a cgroup ID to its filesystem path
    ///
    /// Fast path returns the cached entry, including the [`UNKNOWN_PATH`]
    /// sentinel. A miss triggers a full walk that indexes every cgroup it
    /// sees; if the target is still absent afterwards the sentinel is
    /// cached and returned without error. The only hard failure is a walk
    /// that cannot start at all.
    pub fn path_of(&self, cgroup_id: u64) -> Result<Arc<str>, ResolveError> {
        if let Some(path) = self.paths.get(&cgroup_id) {
            return Ok(Arc::clone(&path));
        }

        let completed = self.walk()?;

        if let Some(path) = self.paths.get(&cgroup_id) {
            return Ok(Arc::clone(&path));
        }

        let unknown: Arc<str> = Arc::from(UNKNOWN_PATH);
        if completed {
            // only a full walk proves the ID is currently unresolvable; a
            // timed-out walk must not pin the miss
            self.paths.insert(cgroup_id, Arc::clone(&unknown));
        }
        Ok(unknown)
    }

    /// Number of cached path entries
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Number of filesystem walks performed so far
    pub fn walk_count(&self) -> u64 {
        self.walks.load(Ordering::Relaxed)
    }

    /// Walk the cgroup tree, indexing every directory encountered
    ///
    /// Returns `Ok(true)` when the walk covered the whole tree, `Ok(false)`
    /// when it stopped at the deadline. Subdirectories vanishing mid-walk
    /// (containers exiting) are skipped, not errors.
    fn walk(&self) -> Result<bool, ResolveError> {
        let root_entries = std::fs::read_dir(&self.root).map_err(|source| ResolveError::Io {
            path: self.root.clone(),
            source,
        })?;

        self.walks.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + self.walk_timeout;

        self.index_dir(&self.root);
        let mut stack: Vec<PathBuf> = root_entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();

        while let Some(dir) = stack.pop() {
            if Instant::now() >= deadline {
                warn!(
                    root = %self.root.display(),
                    timeout_ms = self.walk_timeout.as_millis() as u64,
                    "cgroup walk hit deadline, index left partial"
                );
                return Ok(false);
            }

            self.index_dir(&dir);

            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) => {
                    debug!(dir = %dir.display(), error = %err, "skipping unreadable cgroup dir");
                    continue;
                }
            };

            for entry in entries.filter_map(|e| e.ok()) {
                if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    stack.push(entry.path());
                }
            }
        }

        Ok(true)
    }

    fn index_dir(&self, dir: &Path) {
        match (self.handle_of)(dir) {
            Ok(id) => {
                let path: Arc<str> = Arc::from(dir.to_string_lossy().as_ref());
                self.paths.insert(id, path);
            }
            Err(err) => {
                debug!(dir = %dir.display(), error = %err, "failed to obtain cgroup handle");
            }
        }
    }
}

/// Raw file-handle buffer for name_to_handle_at
///
/// `libc::file_handle` omits the flexible payload array; this layout
/// prepends the same header to an inline buffer.
#[repr(C)]
struct FileHandleBuf {
    handle_bytes: libc::c_uint,
    handle_type: libc::c_int,
    f_handle: [u8; MAX_HANDLE_SZ],
}

/// Convert a cgroup directory into its kernel-assigned 64-bit ID
///
/// On cgroup2 the handle payload is the 8-byte kernfs inode ID, encoded in
/// the kernel's native byte order.
#[cfg(target_os = "linux")]
fn cgroup_handle_id(path: &Path, order: ByteOrder) -> io::Result<u64> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL byte"))?;

    let mut buf = FileHandleBuf {
        handle_bytes: MAX_HANDLE_SZ as libc::c_uint,
        handle_type: 0,
        f_handle: [0; MAX_HANDLE_SZ],
    };
    let mut mount_id: libc::c_int = 0;

    // SAFETY: buf starts with the same header layout as libc::file_handle
    // and handle_bytes tells the kernel how much payload space follows it.
    let rc = unsafe {
        libc::name_to_handle_at(
            libc::AT_FDCWD,
            c_path.as_ptr(),
            &mut buf as *mut FileHandleBuf as *mut libc::file_handle,
            &mut mount_id,
            0,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    let len = (buf.handle_bytes as usize).min(MAX_HANDLE_SZ);
    decode_handle(&buf.f_handle[..len], order)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "handle payload under 8 bytes"))
}

#[cfg(not(target_os = "linux"))]
fn cgroup_handle_id(_path: &Path, _order: ByteOrder) -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "name_to_handle_at is only available on linux",
    ))
}
