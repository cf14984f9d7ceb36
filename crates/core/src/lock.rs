//! Single-instance execution lock.
//!
//! A PID-stamped lock file prevents two orchestrator instances from acting
//! on the same installation. The guard is best-effort local coordination:
//! creation is not atomic-if-absent, which is acceptable because an
//! installation assumes one orchestrator host. Stale files left by crashed
//! processes are detected through the OS process table and reaped through
//! the explicit [`ExecutionLock::reap_if_stale`]; [`ExecutionLock::is_locked`]
//! never mutates anything.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("cannot create lock file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot remove lock file {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LockError {
    fn create(path: &Path, source: io::Error) -> Self {
        Self::Create {
            path: path.to_path_buf(),
            source,
        }
    }

    fn remove(path: &Path, source: io::Error) -> Self {
        Self::Remove {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What the lock file currently holds.
enum Stamp {
    Missing,
    /// Present but unreadable or not a decimal PID; treated as stale.
    Unreadable,
    Pid(u32),
}

/// Process-wide mutual-exclusion guard backed by a PID-stamped file.
#[derive(Debug, Clone)]
pub struct ExecutionLock {
    path: PathBuf,
}

impl ExecutionLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the current process id, as decimal text, to the lock file.
    ///
    /// Callers run `reap_if_stale()` → `is_locked()` → `create()`; the
    /// sequence is not atomic against a concurrent creator.
    pub fn create(&self) -> Result<(), LockError> {
        fs::write(&self.path, std::process::id().to_string())
            .map_err(|e| LockError::create(&self.path, e))
    }

    /// Pure query: is the lock held by a live process?
    ///
    /// Missing file, unreadable content, or a dead PID all read as
    /// unlocked. Nothing is deleted here.
    pub fn is_locked(&self) -> bool {
        match self.read_stamp() {
            Stamp::Pid(pid) => pid_alive(pid),
            Stamp::Missing | Stamp::Unreadable => false,
        }
    }

    /// Deletes the lock file when its holder is gone.
    ///
    /// Returns `Ok(true)` when a stale file was removed (or lost to a
    /// concurrent sweep), `Ok(false)` when there was nothing stale.
    pub fn reap_if_stale(&self) -> Result<bool, LockError> {
        match self.read_stamp() {
            Stamp::Missing => return Ok(false),
            Stamp::Pid(pid) if pid_alive(pid) => return Ok(false),
            Stamp::Pid(_) | Stamp::Unreadable => {}
        }

        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(LockError::remove(&self.path, e)),
        }
    }

    /// Deletes the lock file. An already-absent file is success, so a race
    /// with a concurrent stale sweep is not a spurious failure.
    pub fn unlock(&self) -> Result<(), LockError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::remove(&self.path, e)),
        }
    }

    fn read_stamp(&self) -> Stamp {
        match fs::read_to_string(&self.path) {
            Ok(content) => match content.trim().parse::<u32>() {
                Ok(pid) => Stamp::Pid(pid),
                Err(_) => Stamp::Unreadable,
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Stamp::Missing,
            Err(_) => Stamp::Unreadable,
        }
    }
}

#[cfg(target_os = "linux")]
fn pid_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(not(target_os = "linux"))]
fn pid_alive(_pid: u32) -> bool {
    // No /proc to consult; locks are never considered stale here.
    true
}
