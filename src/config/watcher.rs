//! Hot reload of the policy file.
//!
//! The parent directory is watched rather than the file itself so that editors
//! which save by writing a new file and renaming it over the old one still
//! trigger a reload. Events for other files in that directory are ignored, and
//! a reload that parses to the policy already in force is not forwarded.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GuardConfig;
use crate::observability::metrics;

/// Watches a policy file and sends each new valid config over a channel.
pub struct ConfigWatcher {
    reloader: PolicyReloader,
    update_tx: mpsc::UnboundedSender<GuardConfig>,
}

impl ConfigWatcher {
    /// `current` is the config already in force; re-saving it unchanged sends nothing.
    pub fn new(path: &Path, current: GuardConfig) -> (Self, mpsc::UnboundedReceiver<GuardConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            reloader: PolicyReloader::new(path, Some(current)),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching in a background thread.
    ///
    /// The returned watcher must be kept alive for updates to keep flowing.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self {
            mut reloader,
            update_tx,
        } = self;
        let dir = reloader.watch_dir();
        let path = reloader.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !reloader.is_config_event(&event) {
                        return;
                    }
                    if let Some(config) = reloader.reload() {
                        if update_tx.send(config).is_err() {
                            tracing::debug!("Config receiver dropped, ignoring change");
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}

/// Filters file events down to the policy file and loads it.
struct PolicyReloader {
    path: PathBuf,
    file_name: Option<OsString>,
    last_sent: Option<GuardConfig>,
}

impl PolicyReloader {
    fn new(path: &Path, current: Option<GuardConfig>) -> Self {
        Self {
            path: path.to_path_buf(),
            file_name: path.file_name().map(OsString::from),
            last_sent: current,
        }
    }

    fn watch_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Writes, creations and renames that touch the policy file.
    fn is_config_event(&self, event: &Event) -> bool {
        let relevant = matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_));
        relevant
            && event
                .paths
                .iter()
                .any(|p| p.file_name().map(OsString::from) == self.file_name)
    }

    /// Load the file. `None` when it fails to load or matches the last config sent.
    fn reload(&mut self) -> Option<GuardConfig> {
        match load_config(&self.path) {
            Ok(config) if self.last_sent.as_ref() == Some(&config) => {
                tracing::debug!(path = ?self.path, "Config file touched without changes");
                None
            }
            Ok(config) => {
                tracing::info!(path = ?self.path, "Config file changed, reloading");
                self.last_sent = Some(config.clone());
                Some(config)
            }
            Err(e) => {
                metrics::record_config_reload(false);
                tracing::error!(
                    path = ?self.path,
                    error = %e,
                    "Failed to reload config, keeping current configuration"
                );
                None
            }
        }
    }
}
