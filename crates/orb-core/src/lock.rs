// # Host Lock
//
// Host-wide advisory exclusive lock serializing every coordinator call that
// writes the routing file.
//
// ## Protocol
//
// 1. Open (creating if needed) the lock file at a fixed well-known path
// 2. Try `flock(LOCK_EX | LOCK_NB)`
// 3. If held elsewhere, poll until the configured timeout, then fail with
//    `Error::LockTimeout`
// 4. The returned guard keeps the file open; dropping it releases the lock on
//    every exit path, including unwinding
//
// The kernel drops a `flock` when the holding process exits, so a crashed
// invocation never leaves the lock held. A holder that is alive but stuck is
// what the timeout is for.
//
// Locks are per open file description: two guards for the same path exclude
// each other even inside one process.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Interval between attempts while another holder has the lock
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Host-wide lock handle
#[derive(Debug, Clone)]
pub struct HostLock {
    path: PathBuf,
    timeout: Duration,
}

impl HostLock {
    /// Create a lock handle; nothing is opened until `acquire`
    pub fn new<P: AsRef<Path>>(path: P, timeout: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            timeout,
        }
    }

    /// Lock file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the lock, waiting at most the configured timeout
    ///
    /// # Errors
    ///
    /// - `Error::LockTimeout`: another holder kept the lock past the timeout
    /// - `Error::PermissionDenied` / `Error::Io`: the lock file could not be opened
    pub async fn acquire(&self) -> Result<HostLockGuard> {
        let file = self.open()?;
        let start = Instant::now();
        let mut announced = false;

        loop {
            if try_flock_exclusive(&file)? {
                debug!("Acquired host lock {}", self.path.display());
                return Ok(HostLockGuard {
                    file,
                    path: self.path.clone(),
                });
            }

            let waited = start.elapsed();
            if waited >= self.timeout {
                warn!(
                    "Gave up on host lock {} after {:?}",
                    self.path.display(),
                    waited
                );
                return Err(Error::LockTimeout {
                    path: self.path.clone(),
                    waited,
                });
            }

            if !announced {
                debug!(
                    "Host lock {} is held by another invocation, waiting up to {:?}",
                    self.path.display(),
                    self.timeout
                );
                announced = true;
            }

            tokio::time::sleep(LOCK_POLL_INTERVAL.min(self.timeout - waited)).await;
        }
    }

    fn open(&self) -> Result<File> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::PermissionDenied => Error::permission_denied(format!(
                    "cannot open lock file {}",
                    self.path.display()
                )),
                _ => Error::Io(e),
            })
    }
}

/// Held host lock; released on drop
pub struct HostLockGuard {
    file: File,
    path: PathBuf,
}

impl HostLockGuard {
    /// Lock file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for HostLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostLockGuard")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Drop for HostLockGuard {
    fn drop(&mut self) {
        unlock(&self.file);
        debug!("Released host lock {}", self.path.display());
    }
}

/// Try to take an exclusive flock without blocking.
///
/// Returns `Ok(false)` if another open file description holds it. Hosts
/// without `flock` get `Error::Config`: running unserialized is never allowed.
fn try_flock_exclusive(file: &File) -> Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: `file` owns a valid descriptor for the duration of the call.
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK) {
            return Ok(false);
        }
        Err(Error::Io(err))
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Err(Error::config(
            "the host lock needs flock(2); orb only runs on unix hosts",
        ))
    }
}

fn unlock(file: &File) {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: see `try_flock_exclusive`. Closing the file would release the
        // lock as well; unlocking first makes the release independent of drop order.
        let _ = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
    }
    #[cfg(not(unix))]
    {
        let _ = file;
    }
}
