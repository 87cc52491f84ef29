//! PID file single-instance guard.
//!
//! Only one process may consume the update stream. The guard is taken before
//! any delivery mode starts and released on drop.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::DaemonError;

/// A held PID file. Dropping it removes the file.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    pid: u32,
    held: bool,
}

impl PidFile {
    /// Take the PID file for the current process.
    ///
    /// Fails with [`DaemonError::AlreadyRunning`] if the file names another
    /// live process. A file left behind by a dead process is replaced.
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Self, DaemonError> {
        Self::acquire_for(path, std::process::id())
    }

    fn acquire_for<P: AsRef<Path>>(path: P, pid: u32) -> Result<Self, DaemonError> {
        let path = path.as_ref().to_path_buf();

        if let Some(existing) = read_pid(&path)? {
            if existing != pid && is_process_running(existing) {
                return Err(DaemonError::AlreadyRunning {
                    path,
                    pid: existing,
                });
            }
            warn!(
                "Replacing stale PID file (PID {} not running): {}",
                existing,
                path.display()
            );
        }

        write_pid(&path, pid)?;
        info!("PID file created: {} (PID: {})", path.display(), pid);

        Ok(Self {
            path,
            pid,
            held: true,
        })
    }

    /// Get the PID file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PID recorded in the file.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Whether the guard still owns the file.
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Remove the file now instead of at drop.
    pub fn release(&mut self) -> Result<(), DaemonError> {
        if !self.held {
            return Ok(());
        }
        self.held = false;

        // Only remove the file if it still names us.
        if read_pid(&self.path)? != Some(self.pid) {
            return Ok(());
        }

        fs::remove_file(&self.path).map_err(|e| DaemonError::PidFileRemoval {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        info!("PID file removed: {}", self.path.display());
        Ok(())
    }

    /// PID of a live process holding `path`, if any.
    pub fn running_pid<P: AsRef<Path>>(path: P) -> Result<Option<u32>, DaemonError> {
        Ok(read_pid(path.as_ref())?.filter(|pid| is_process_running(*pid)))
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to remove PID file on drop: {}", e);
        }
    }
}

fn read_pid(path: &Path) -> Result<Option<u32>, DaemonError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|e| DaemonError::PidFileRead {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|e| DaemonError::PidFileRead {
            path: path.to_path_buf(),
            reason: format!("Invalid PID format: {}", e),
        })
}

fn write_pid(path: &Path, pid: u32) -> Result<(), DaemonError> {
    let creation_error = |reason: String| DaemonError::PidFileCreation {
        path: path.to_path_buf(),
        reason,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| creation_error(format!("Failed to create parent directory: {}", e)))?;
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| creation_error(e.to_string()))?;

    write!(file, "{}", pid).map_err(|e| creation_error(e.to_string()))
}

/// Check if a process with the given PID is running.
#[cfg(unix)]
pub fn is_process_running(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };

    // Signal 0 probes for existence; EPERM means it exists but is not ours.
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn is_process_running(_pid: u32) -> bool {
    // On non-Unix systems, assume process is running if we can't check
    true
}

#[cfg(test)]
#[path = "pid_tests.rs"]
mod tests;
