//! Advisory exclusion of concurrent managers on one source root.
//!
//! Two managers overlaying the same tree race on the mount table. A
//! non-blocking `flock(2)` on a file inside the build-output directory
//! turns that into an immediate [`KeystoneError::Busy`].

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use keystone_common::error::{KeystoneError, Result};
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};

/// Exclusive lock held until dropped.
pub struct SourceRootLock {
    path: PathBuf,
    _guard: Flock<File>,
}

impl SourceRootLock {
    /// Takes the lock at `path`, creating the file if needed.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError::Busy`] if another process or manager holds
    /// the lock, or [`KeystoneError::Io`] if the file cannot be opened.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| KeystoneError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        let guard = Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| {
            if errno == Errno::EWOULDBLOCK {
                KeystoneError::Busy {
                    path: path.to_path_buf(),
                }
            } else {
                KeystoneError::Io {
                    path: path.to_path_buf(),
                    source: errno.into(),
                }
            }
        })?;

        tracing::debug!(path = %path.display(), "source root locked");
        Ok(Self {
            path: path.to_path_buf(),
            _guard: guard,
        })
    }

    /// Location of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for SourceRootLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRootLock")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lock_on_same_file_is_busy() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("lock");

        let held = SourceRootLock::acquire(&path).expect("first lock");
        let err = SourceRootLock::acquire(&path).unwrap_err();
        assert!(matches!(err, KeystoneError::Busy { .. }));
        assert_eq!(held.path(), path);
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("lock");

        drop(SourceRootLock::acquire(&path).expect("first lock"));
        assert!(SourceRootLock::acquire(&path).is_ok());
    }

    #[test]
    fn missing_parent_is_an_io_error() {
        let err = SourceRootLock::acquire(Path::new("/nonexistent/dir/lock")).unwrap_err();
        assert!(matches!(err, KeystoneError::Io { .. }));
    }
}
