//! Policy hot-reload manager
//!
//! Owns the current document snapshot in an atomically-swapped slot.
//! After a successful initial load the manager watches the directory
//! containing the policy file (watching the directory, not the file,
//! survives the atomic symlink swaps projected secret mounts perform,
//! which surface as events on the `..data` sentinel). Bursts of events
//! are coalesced with a debounce, and a periodic timer re-reads the file
//! unconditionally to recover from missed events. A failed reload keeps
//! the last known good snapshot.

use crate::error::PolicyResult;
use crate::loader::load_from_file;
use crate::model::Document;
use arc_swap::ArcSwapOption;
use notify::{RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

/// Sentinel directory name used by atomic symlink-swap mount layouts
const DATA_SENTINEL: &str = "..data";

/// Tunables for the reloader.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Quiet period after a file event before reloading
    pub debounce: Duration,

    /// Unconditional periodic reload interval
    pub interval: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(200),
            interval: Duration::from_secs(30),
        }
    }
}

/// Owns the current policy snapshot and the background reloader.
pub struct PolicyManager {
    file_path: PathBuf,
    dir_path: PathBuf,
    base_name: String,
    options: ManagerOptions,
    current: ArcSwapOption<Document>,
}

impl PolicyManager {
    /// Create a manager for the given policy file. Nothing is loaded
    /// until [`PolicyManager::start`].
    pub fn new(file_path: impl Into<PathBuf>, options: ManagerOptions) -> Self {
        let file_path = file_path.into();
        let dir_path = file_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let base_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            file_path,
            dir_path,
            base_name,
            options,
            current: ArcSwapOption::empty(),
        }
    }

    /// The current snapshot, if one has been loaded.
    ///
    /// The returned pointer is shared-immutable; callers hold it for one
    /// evaluation and never mutate it.
    pub fn current(&self) -> Option<Arc<Document>> {
        self.current.load_full()
    }

    /// Load the document synchronously and spawn the reloader task.
    ///
    /// Fails when the initial load fails; afterwards reload failures are
    /// only logged. The task exits when `shutdown` observes a change.
    pub fn start(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> PolicyResult<()> {
        self.reload()?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = event_tx.send(res);
        })?;
        watcher.watch(&self.dir_path, RecursiveMode::NonRecursive)?;

        tokio::spawn(async move {
            // The watcher stops when dropped; keep it alive with the task.
            let _watcher = watcher;
            self.run(event_rx, shutdown).await;
        });

        Ok(())
    }

    async fn run(
        &self,
        mut events: mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval_at(
            Instant::now() + self.options.interval,
            self.options.interval,
        );
        let mut reload_at: Option<Instant> = None;

        loop {
            let debounce_due = async move {
                match reload_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::debug!("policy reloader stopping");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.reload() {
                        tracing::error!(error = %err, "periodic policy reload failed (keeping last known good)");
                    }
                }
                maybe_event = events.recv() => {
                    match maybe_event {
                        Some(Ok(event)) => {
                            if self.is_relevant(&event) {
                                // Each trigger resets the pending reload
                                reload_at = Some(Instant::now() + self.options.debounce);
                            }
                        }
                        Some(Err(err)) => {
                            tracing::error!(error = %err, "policy watcher error");
                        }
                        None => {
                            tracing::warn!("policy watcher channel closed");
                            return;
                        }
                    }
                }
                _ = debounce_due => {
                    reload_at = None;
                    match self.reload() {
                        Ok(()) => tracing::info!(file = %self.file_path.display(), "policy reloaded"),
                        Err(err) => {
                            tracing::error!(error = %err, "policy reload failed (keeping last known good)");
                        }
                    }
                }
            }
        }
    }

    /// An event matters when it touches the policy file itself or the
    /// `..data` swap sentinel.
    fn is_relevant(&self, event: &notify::Event) -> bool {
        event.paths.iter().any(|path| {
            path.file_name()
                .map(|name| name == self.base_name.as_str() || name == DATA_SENTINEL)
                .unwrap_or(false)
        })
    }

    fn reload(&self) -> PolicyResult<()> {
        let doc = load_from_file(&self.file_path)?;
        self.current.store(Some(Arc::new(doc)));
        Ok(())
    }
}

impl std::fmt::Debug for PolicyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyManager")
            .field("file_path", &self.file_path)
            .field("loaded", &self.current.load().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID: &str = r#"
api_version: glass.secretstore/v1alpha1
kind: Policy
subjects:
  - name: team-a
    match:
      kind: bearer
      name: team-a-token
roles:
  - name: reader
    permissions:
      - action: read
        key_prefix: "team-a/"
bindings:
  - subject: team-a
    roles: [reader]
"#;

    fn write_policy(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.yaml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_start_loads_initial_document() {
        let (_dir, path) = write_policy(VALID);
        let manager = Arc::new(PolicyManager::new(&path, ManagerOptions::default()));
        let (_tx, rx) = watch::channel(false);

        Arc::clone(&manager).start(rx).unwrap();
        let doc = manager.current().expect("document loaded");
        assert_eq!(doc.subjects[0].name, "team-a");
    }

    #[tokio::test]
    async fn test_start_fails_on_invalid_initial_document() {
        let (_dir, path) = write_policy("kind: Policy\n");
        let manager = Arc::new(PolicyManager::new(&path, ManagerOptions::default()));
        let (_tx, rx) = watch::channel(false);

        assert!(Arc::clone(&manager).start(rx).is_err());
        assert!(manager.current().is_none());
    }

    #[test]
    fn test_reload_swaps_the_snapshot() {
        let (_dir, path) = write_policy(VALID);
        let manager = PolicyManager::new(&path, ManagerOptions::default());

        manager.reload().unwrap();
        let first = manager.current().unwrap();

        std::fs::write(&path, VALID.replace("team-a", "team-b")).unwrap();
        manager.reload().unwrap();
        let second = manager.current().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.subjects[0].name, "team-b");
        // The old snapshot is still intact for readers that hold it
        assert_eq!(first.subjects[0].name, "team-a");
    }

    #[test]
    fn test_failed_reload_keeps_last_known_good() {
        let (_dir, path) = write_policy(VALID);
        let manager = PolicyManager::new(&path, ManagerOptions::default());
        manager.reload().unwrap();

        std::fs::write(&path, "not: [valid").unwrap();
        assert!(manager.reload().is_err());

        let doc = manager.current().expect("last known good retained");
        assert_eq!(doc.subjects[0].name, "team-a");
    }

    #[test]
    fn test_event_relevance() {
        let (_dir, path) = write_policy(VALID);
        let manager = PolicyManager::new(&path, ManagerOptions::default());
        let dir = path.parent().unwrap();

        let event_for = |p: PathBuf| notify::Event {
            kind: notify::EventKind::Modify(notify::event::ModifyKind::Any),
            paths: vec![p],
            attrs: Default::default(),
        };

        assert!(manager.is_relevant(&event_for(path.clone())));
        assert!(manager.is_relevant(&event_for(dir.join("..data"))));
        assert!(!manager.is_relevant(&event_for(dir.join("unrelated.txt"))));
    }
}
