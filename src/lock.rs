//! Cross-process advisory lock with a liveness-checked owner.
//!
//! The lock file holds a [`LockInfo`] as strict JSON.  It is published by
//! hard-linking a fully written private temporary file onto the lock path, so
//! a concurrent reader never observes a half-written lock.  A lock whose owner
//! is dead (or whose content is unreadable) is reclaimed once.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Result, SyncError};

/// Owner of a held lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockInfo {
    /// Owner process id.
    pub pid: u32,
    /// Acquisition time.
    pub started_at: DateTime<Utc>,
    /// Owner host name.
    pub hostname: String,
}

impl LockInfo {
    /// Describe the current process.
    #[must_use]
    pub fn current() -> Self {
        Self {
            pid: std::process::id(),
            started_at: Utc::now(),
            hostname: hostname(),
        }
    }
}

fn hostname() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Check whether a process id refers to a running process.
#[must_use]
pub fn is_process_alive(pid: u32) -> bool {
    #[cfg(target_os = "linux")]
    {
        Path::new("/proc").join(pid.to_string()).exists()
    }
    #[cfg(all(unix, not(target_os = "linux")))]
    {
        std::process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .output()
            .is_ok_and(|o| o.status.success())
    }
    #[cfg(windows)]
    {
        std::process::Command::new("tasklist")
            .args(["/FI", &format!("PID eq {pid}"), "/NH"])
            .output()
            .is_ok_and(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = pid;
        false
    }
}

/// Acquires the advisory lock at a fixed path.
#[derive(Debug, Clone)]
pub struct LockManager {
    path: PathBuf,
    probe: fn(u32) -> bool,
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl LockManager {
    /// Lock manager for `path` using the real process liveness probe.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_probe(path, is_process_alive)
    }

    /// Lock manager with a custom liveness probe.
    #[must_use]
    pub fn with_probe(path: impl Into<PathBuf>, probe: fn(u32) -> bool) -> Self {
        Self {
            path: path.into(),
            probe,
        }
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the lock.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::LockBusy`] if a live process holds the lock,
    /// [`SyncError::Parse`] if a corrupt lock reappears after reclaiming it,
    /// or [`SyncError::Io`] on filesystem failure.
    pub fn acquire(&self) -> Result<LockGuard> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
        }
        let info = LockInfo::current();
        let content = serde_json::to_string_pretty(&info)
            .map_err(|e| SyncError::parse(&self.path, &e))?;

        let tmp = self.path.with_file_name(format!(
            ".sync.lock.{}.{}.tmp",
            info.pid,
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::write(&tmp, &content).map_err(|e| SyncError::io(&tmp, e))?;
        let result = self.publish(&tmp, &content);
        let _ = std::fs::remove_file(&tmp);
        result
    }

    fn publish(&self, tmp: &Path, content: &str) -> Result<LockGuard> {
        let mut reclaimed = false;
        loop {
            match std::fs::hard_link(tmp, &self.path) {
                Ok(()) => {
                    return Ok(LockGuard {
                        path: self.path.clone(),
                        content: content.to_string(),
                        released: false,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(SyncError::io(&self.path, e)),
            }

            let existing = match std::fs::read_to_string(&self.path) {
                Ok(text) => text,
                Err(e) if e.kind() == ErrorKind::NotFound && !reclaimed => {
                    reclaimed = true;
                    continue;
                }
                Err(e) => return Err(SyncError::io(&self.path, e)),
            };

            let parsed = serde_json::from_str::<LockInfo>(&existing);
            if let Ok(info) = &parsed
                && (self.probe)(info.pid)
            {
                return Err(SyncError::LockBusy(info.clone()));
            }
            if reclaimed {
                return match parsed {
                    Ok(info) => Err(SyncError::LockBusy(info)),
                    Err(e) => Err(SyncError::parse(&self.path, &e)),
                };
            }

            tracing::debug!("reclaiming stale lock at {}", self.path.display());
            remove_if_unchanged(&self.path, &existing)?;
            reclaimed = true;
        }
    }
}

/// Remove `path` only if it still contains `expected`.
fn remove_if_unchanged(path: &Path, expected: &str) -> Result<()> {
    match std::fs::read_to_string(path) {
        Ok(current) if current == expected => match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::io(path, e)),
        },
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SyncError::io(path, e)),
    }
}

/// A held lock; released on drop.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    content: String,
    released: bool,
}

impl LockGuard {
    /// Release the lock explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if the lock file cannot be removed.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        remove_if_unchanged(&self.path, &self.content)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            let _ = remove_if_unchanged(&self.path, &self.content);
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};

    fn write_lock(path: &Path, pid: u32) {
        let info = LockInfo {
            pid,
            started_at: "2026-01-01T00:00:00Z".parse().unwrap(),
            hostname: "elsewhere".to_string(),
        };
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_string(&info).unwrap()).unwrap();
    }

    #[test]
    fn acquire_writes_info_and_release_removes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync").join("sync.lock");
        let manager = LockManager::new(&path);

        let guard = manager.acquire().unwrap();
        let info: LockInfo = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(info.pid, std::process::id());
        guard.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn drop_releases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.lock");
        {
            let _guard = LockManager::new(&path).acquire().unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn live_owner_is_busy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.lock");
        write_lock(&path, 4242);
        let err = LockManager::with_probe(&path, |_| true).acquire().unwrap_err();
        match err {
            SyncError::LockBusy(info) => {
                assert_eq!(info.pid, 4242);
                assert_eq!(info.hostname, "elsewhere");
            }
            other => panic!("expected LockBusy, got {other:?}"),
        }
        assert!(path.exists(), "a live lock must not be removed");
    }

    #[test]
    fn dead_owner_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.lock");
        write_lock(&path, 999_999_999);
        let guard = LockManager::new(&path).acquire().unwrap();
        let info: LockInfo = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(info.pid, std::process::id());
        drop(guard);
    }

    #[test]
    fn corrupt_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.lock");
        std::fs::write(&path, "{\"pid\": ").unwrap();
        let guard = LockManager::with_probe(&path, |_| true).acquire().unwrap();
        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn held_lock_blocks_second_acquire_in_same_process() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.lock");
        let manager = LockManager::new(&path);
        let _guard = manager.acquire().unwrap();
        assert!(matches!(manager.acquire(), Err(SyncError::LockBusy(_))));
    }

    #[test]
    fn concurrent_acquire_is_mutually_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.lock");
        let threads = 8;
        let start = Arc::new(Barrier::new(threads));
        let done = Arc::new(Barrier::new(threads));
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let path = path.clone();
                let start = Arc::clone(&start);
                let done = Arc::clone(&done);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    start.wait();
                    let guard = LockManager::new(&path).acquire();
                    if guard.is_ok() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                    done.wait();
                    drop(guard);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(!path.exists());
    }

    #[test]
    fn release_leaves_foreign_lock_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.lock");
        let guard = LockManager::new(&path).acquire().unwrap();
        write_lock(&path, 1);
        guard.release().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn current_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
    }
}
