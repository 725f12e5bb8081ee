//! Network namespace operations.
//!
//! A [`NetNs`] is an open handle on a namespace file such as
//! `/var/run/netns/<name>` or `/proc/<pid>/ns/net`. Entering a namespace
//! switches the calling thread only; [`NetNs::run`] always switches back,
//! including when the closure fails or panics.

use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};

use ovn_cni_common::{CniError, CniResult};
use rustix::fs::{Mode, OFlags};
use rustix::thread::{LinkNameSpaceType, move_into_link_name_space};

/// Namespace of the calling thread.
const THREAD_NETNS: &str = "/proc/thread-self/ns/net";

/// Link target prefix of an open network namespace descriptor.
const NETNS_LINK_PREFIX: &[u8] = b"net:[";

/// Handle to a network namespace.
#[derive(Debug)]
pub struct NetNs {
    path: PathBuf,
    fd: OwnedFd,
}

impl NetNs {
    /// Open the namespace at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CniError::NamespaceNotFound`] if the path cannot be opened
    /// or is not a network namespace.
    pub fn open(path: impl AsRef<Path>) -> CniResult<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Opening network namespace");

        let not_found = |message: String| CniError::NamespaceNotFound {
            path: path.display().to_string(),
            message,
        };

        let fd = rustix::fs::open(path, OFlags::RDONLY | OFlags::CLOEXEC, Mode::empty())
            .map_err(|e| not_found(e.to_string()))?;

        // nsfs descriptors read back as `net:[<inode>]`, `mnt:[<inode>]`, ...
        let fd_link = format!("/proc/self/fd/{}", fd.as_raw_fd());
        let target =
            rustix::fs::readlink(fd_link, Vec::new()).map_err(|e| not_found(e.to_string()))?;
        if !target.as_bytes().starts_with(NETNS_LINK_PREFIX) {
            return Err(not_found(format!(
                "not a network namespace ({})",
                target.to_string_lossy()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            fd,
        })
    }

    /// Open the namespace the calling thread currently belongs to.
    pub fn current() -> CniResult<Self> {
        Self::open(THREAD_NETNS)
    }

    /// Path the handle was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` inside this namespace, then return to the caller's namespace.
    ///
    /// # Errors
    ///
    /// Returns [`CniError::NamespaceInvalid`] if the namespace cannot be
    /// entered; otherwise whatever `f` returns.
    pub fn run<R>(&self, f: impl FnOnce() -> CniResult<R>) -> CniResult<R> {
        let origin = Self::current()?;
        self.enter()?;
        let _restore = Restore { origin };

        tracing::trace!(path = %self.path.display(), "Entered network namespace");
        f()
    }

    fn enter(&self) -> CniResult<()> {
        move_into_link_name_space(self.fd.as_fd(), Some(LinkNameSpaceType::Network)).map_err(
            |e| CniError::NamespaceInvalid {
                path: self.path.display().to_string(),
                message: e.to_string(),
            },
        )
    }
}

impl AsFd for NetNs {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for NetNs {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// Switches the thread back to `origin` when dropped.
struct Restore {
    origin: NetNs,
}

impl Drop for Restore {
    fn drop(&mut self) {
        if let Err(e) = self.origin.enter() {
            // Every later syscall would run in the wrong namespace.
            tracing::error!(error = %e, "Failed to restore network namespace, aborting");
            std::process::abort();
        }
        tracing::trace!("Restored network namespace");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_namespace() {
        let err = NetNs::open("/var/run/netns/does-not-exist-12345").unwrap_err();
        assert!(matches!(err, CniError::NamespaceNotFound { .. }));
    }

    #[test]
    fn open_empty_path() {
        let err = NetNs::open("").unwrap_err();
        assert!(matches!(err, CniError::NamespaceNotFound { .. }));
    }

    #[test]
    fn open_current_namespace() {
        let ns = NetNs::current().unwrap();
        assert_eq!(ns.path(), Path::new(THREAD_NETNS));
    }

    #[test]
    fn open_rejects_regular_file() {
        let file = tempfile::NamedTempFile::new().unwrap();

        let err = NetNs::open(file.path()).unwrap_err();

        match err {
            CniError::NamespaceNotFound { message, .. } => {
                assert!(message.contains("not a network namespace"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn open_rejects_other_namespace_type() {
        let err = NetNs::open("/proc/self/ns/mnt").unwrap_err();
        assert!(matches!(err, CniError::NamespaceNotFound { .. }));
    }
}
