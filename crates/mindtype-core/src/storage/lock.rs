//! Cross-process write lock.
//!
//! A lock file created with `create_new` holds the owning PID. A lock whose
//! owner is no longer running is treated as stale and removed.
//!
//! Breaking a stale lock renames it to a name private to the caller first,
//! so of several waiters that saw the same stale file only one removes it.

use super::io_err;
use crate::MindtypeError;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const LOCK_RETRY_DELAY: Duration = Duration::from_millis(25);

static CLAIM_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Held lock; the lock file is removed on drop.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[derive(Debug)]
enum LockState {
    HeldBy(u32),
    Stale(u32),
    Unknown,
    /// The lock file cannot be created at all (missing directory, permissions).
    Unavailable(std::io::Error),
}

impl FileLock {
    /// Acquire the lock at `path`, waiting up to `timeout`.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, MindtypeError> {
        let started = Instant::now();

        loop {
            match try_acquire(path) {
                Ok(lock) => return Ok(lock),
                Err(LockState::Stale(pid)) if break_stale_lock(path, pid) => {}
                Err(LockState::Unavailable(e)) => {
                    return Err(MindtypeError::Persistence(format!(
                        "cannot create write lock {}: {}",
                        path.display(),
                        e
                    )));
                }
                Err(state) => {
                    if started.elapsed() >= timeout {
                        return Err(MindtypeError::Persistence(match state {
                            LockState::HeldBy(pid) => format!(
                                "another writer (pid {}) holds {}",
                                pid,
                                path.display()
                            ),
                            _ => format!(
                                "could not acquire write lock at {}; remove it if no writer is running",
                                path.display()
                            ),
                        }));
                    }
                    std::thread::sleep(LOCK_RETRY_DELAY);
                }
            }
        }
    }
}

fn try_acquire(path: &Path) -> Result<FileLock, LockState> {
    match OpenOptions::new().create_new(true).write(true).open(path) {
        Ok(mut file) => {
            let _ = writeln!(file, "{}", std::process::id());
            Ok(FileLock {
                path: path.to_path_buf(),
            })
        }
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => match read_pid(path) {
            Some(pid) if is_process_running(pid) => Err(LockState::HeldBy(pid)),
            Some(pid) => Err(LockState::Stale(pid)),
            None => Err(LockState::Unknown),
        },
        Err(err) => Err(LockState::Unavailable(err)),
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    let mut pid_buf = String::new();
    OpenOptions::new()
        .read(true)
        .open(path)
        .and_then(|mut file| file.read_to_string(&mut pid_buf))
        .ok()?;
    pid_buf.trim().parse().ok()
}

/// Remove the lock at `path` if it still belongs to `stale_pid`.
///
/// Returns false when the file could not be moved aside at all.
fn break_stale_lock(path: &Path, stale_pid: u32) -> bool {
    let mut claimed = OsString::from(path.as_os_str());
    claimed.push(format!(
        ".stale-{}-{}",
        std::process::id(),
        CLAIM_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let claimed = PathBuf::from(claimed);

    if let Err(e) = std::fs::rename(path, &claimed) {
        // NotFound: another waiter already moved it.
        return e.kind() == std::io::ErrorKind::NotFound;
    }
    if read_pid(&claimed) != Some(stale_pid) {
        // A live writer replaced the stale file in between; put its lock back.
        // `hard_link` fails if the name was taken meanwhile.
        let _ = std::fs::hard_link(&claimed, path);
    }
    let _ = std::fs::remove_file(&claimed);
    true
}

#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }
    std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .status()
        .map(|status| status.success())
        .unwrap_or(true)
}

#[cfg(not(unix))]
fn is_process_running(_pid: u32) -> bool {
    true
}

/// Lock file path next to `data_path` (`<data_path>.lock`).
pub(crate) fn lock_path_for(data_path: &Path) -> Result<PathBuf, MindtypeError> {
    let name = data_path
        .file_name()
        .ok_or_else(|| io_err("lock path", "data path has no file name"))?;
    let mut lock_name = name.to_os_string();
    lock_name.push(".lock");
    Ok(data_path.with_file_name(lock_name))
}
