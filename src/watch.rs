//! Debounced change watcher for the local opencode directories.
//!
//! File events are funnelled into a worker thread which restarts a timer on
//! every relevant event and invokes the callback once the directory has been
//! quiet for the debounce window.
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::{Result, SyncError};
use crate::locations::SyncLocations;

/// Quiet period before a burst of changes triggers a sync.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

enum Signal {
    Changed,
    Stop,
}

/// What to watch and what to ignore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTargets {
    /// Directories watched recursively.
    pub roots: Vec<PathBuf>,
    /// Paths whose events never trigger a sync (the tool's own files).
    pub ignored: Vec<PathBuf>,
}

impl WatchTargets {
    /// Watch the opencode config directory, ignoring the sync configuration,
    /// the overrides file and the mirror checkout.
    #[must_use]
    pub fn for_locations(locations: &SyncLocations, repo_dir: &Path) -> Self {
        Self {
            roots: vec![locations.config_dir.clone()],
            ignored: vec![
                locations.sync_config_path.clone(),
                locations.overrides_path.clone(),
                repo_dir.to_path_buf(),
            ],
        }
    }

    fn is_relevant(&self, path: &Path) -> bool {
        !self.ignored.iter().any(|ignored| path.starts_with(ignored))
    }
}

fn is_relevant_event(targets: &WatchTargets, event: &notify::Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    ) && event.paths.iter().any(|p| targets.is_relevant(p))
}

/// Running watcher.  Dropping it stops the worker.
pub struct SyncWatcher {
    watcher: Option<RecommendedWatcher>,
    signals: Sender<Signal>,
    worker: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl std::fmt::Debug for SyncWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncWatcher")
            .field("active", &self.worker.is_some())
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl SyncWatcher {
    /// Start watching `targets`, calling `on_change` after `debounce` of
    /// quiet.  Roots that do not exist yet are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailure`] if the platform watcher cannot
    /// be created or a root cannot be watched.
    pub fn start(
        targets: WatchTargets,
        debounce: Duration,
        on_change: impl Fn() + Send + 'static,
    ) -> Result<Self> {
        let mut watcher = Self::spawn(debounce, on_change);
        let signals = watcher.signals.clone();
        let filter = targets.clone();
        let mut platform = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
            if let Ok(event) = event
                && is_relevant_event(&filter, &event)
            {
                let _ = signals.send(Signal::Changed);
            }
        })
        .map_err(|e| SyncError::command("watch", e.to_string()))?;

        for root in targets.roots.iter().filter(|r| r.is_dir()) {
            platform
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| SyncError::command("watch", format!("{}: {e}", root.display())))?;
        }
        watcher.watcher = Some(platform);
        Ok(watcher)
    }

    /// Worker without a platform watcher; changes arrive via [`Self::notify`].
    fn spawn(debounce: Duration, on_change: impl Fn() + Send + 'static) -> Self {
        let (signals, rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(false));
        let guard = Arc::clone(&running);
        let worker = std::thread::spawn(move || {
            let mut deadline: Option<Instant> = None;
            loop {
                let signal = match deadline {
                    Some(at) => rx.recv_timeout(at.saturating_duration_since(Instant::now())),
                    None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                };
                match signal {
                    Ok(Signal::Changed) => deadline = Some(Instant::now() + debounce),
                    Ok(Signal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        deadline = None;
                        if guard
                            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                            .is_ok()
                        {
                            on_change();
                            guard.store(false, Ordering::SeqCst);
                        }
                    }
                }
            }
        });
        Self {
            watcher: None,
            signals,
            worker: Some(worker),
            running,
        }
    }

    /// Report a change as if it came from the filesystem.
    pub fn notify(&self) {
        let _ = self.signals.send(Signal::Changed);
    }

    /// Whether the callback is executing right now.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Cancel any pending timer and wait for the worker to finish.  A
    /// callback already in progress is allowed to complete.
    pub fn stop(&mut self) {
        self.watcher = None;
        let _ = self.signals.send(Signal::Stop);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for SyncWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn burst_of_changes_fires_once() {
        let (count, callback) = counter();
        let mut watcher = SyncWatcher::spawn(Duration::from_millis(50), callback);
        for _ in 0..5 {
            watcher.notify();
        }
        std::thread::sleep(Duration::from_millis(300));
        watcher.stop();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_cancels_pending_timer() {
        let (count, callback) = counter();
        let mut watcher = SyncWatcher::spawn(Duration::from_secs(30), callback);
        watcher.notify();
        let started = Instant::now();
        watcher.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn separate_bursts_fire_separately() {
        let (count, callback) = counter();
        let mut watcher = SyncWatcher::spawn(Duration::from_millis(30), callback);
        watcher.notify();
        std::thread::sleep(Duration::from_millis(250));
        watcher.notify();
        std::thread::sleep(Duration::from_millis(250));
        watcher.stop();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn own_files_are_ignored() {
        let locations = SyncLocations::from_roots(
            PathBuf::from("/h"),
            PathBuf::from("/h/.config/opencode"),
            PathBuf::from("/h/.local/share/opencode"),
            PathBuf::from("/h/.local/state/opencode"),
        );
        let targets = WatchTargets::for_locations(&locations, Path::new("/h/.config/opencode/mirror"));
        assert_eq!(targets.roots, vec![PathBuf::from("/h/.config/opencode")]);
        assert!(!targets.is_relevant(&locations.sync_config_path));
        assert!(!targets.is_relevant(Path::new("/h/.config/opencode/mirror/config/x.json")));
        assert!(targets.is_relevant(Path::new("/h/.config/opencode/opencode.json")));

        let event = notify::Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/h/.config/opencode/opencode.json"));
        assert!(!is_relevant_event(&targets, &event));
        let event = notify::Event::new(EventKind::Modify(notify::event::ModifyKind::Any))
            .add_path(PathBuf::from("/h/.config/opencode/opencode.json"));
        assert!(is_relevant_event(&targets, &event));
    }

    #[test]
    fn filesystem_changes_trigger_callback() {
        let dir = tempfile::tempdir().unwrap();
        let (count, callback) = counter();
        let targets = WatchTargets {
            roots: vec![dir.path().to_path_buf()],
            ignored: Vec::new(),
        };
        let mut watcher = SyncWatcher::start(targets, Duration::from_millis(50), callback).unwrap();
        std::fs::write(dir.path().join("opencode.json"), "{}").unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        while count.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        watcher.stop();
        assert!(count.load(Ordering::SeqCst) >= 1);
    }
}
