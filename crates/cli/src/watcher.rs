//! Hot reload of `goblin.toml`.
//!
//! [`ConfigWatcher`] watches the config file and, once changes settle,
//! re-reads it and applies the result through [`GobStore::configure`]. A file
//! that fails to parse is logged and the running settings are kept.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info, warn};

use goblin_facade::GobStore;

use crate::config::GoblinConfig;

/// How long change events must settle before a reload.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

pub struct ConfigWatcher {
    gobs: Arc<GobStore>,
    path: PathBuf,
    debounce: Duration,
}

impl ConfigWatcher {
    pub fn new(gobs: Arc<GobStore>, path: impl Into<PathBuf>) -> Self {
        Self {
            gobs,
            path: path.into(),
            debounce: SETTLE_DELAY,
        }
    }

    /// Start watching on a background task.
    ///
    /// Runs until the returned handle is aborted or the process exits.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                error!(error = %e, "config watcher exited with error");
            }
        })
    }

    async fn run(&self) -> Result<(), notify::Error> {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(4);

        // Editors often replace the file, so watch its directory.
        let watch_dir = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();
        let filename = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();

        let _watcher = {
            let mut watcher = RecommendedWatcher::new(
                move |res: Result<notify::Event, notify::Error>| match res {
                    Ok(event) => {
                        let ours = event
                            .paths
                            .iter()
                            .any(|p| p.file_name().is_some_and(|name| name == filename.as_os_str()));
                        if is_change_event(event.kind) && ours {
                            // A full channel already holds a pending reload.
                            let _ = tx.try_send(());
                        }
                    }
                    Err(e) => warn!(error = %e, "filesystem watcher error"),
                },
                notify::Config::default(),
            )?;
            watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;
            info!(path = %self.path.display(), "config watcher started");
            watcher
        };

        while rx.recv().await.is_some() {
            tokio::time::sleep(self.debounce).await;
            while rx.try_recv().is_ok() {}
            self.reload().await;
        }
        debug!("config watcher channel closed, shutting down");
        Ok(())
    }

    async fn reload(&self) {
        info!(path = %self.path.display(), "reloading config");
        if let Err(e) = reload_into(&self.gobs, &self.path).await {
            error!(error = %e, "config reload failed, keeping previous settings");
        }
    }
}

/// Parse `path` and apply its settings to `gobs`.
///
/// The backend kind, transport and pool size are fixed at startup; changing
/// them needs a restart.
pub async fn reload_into(gobs: &GobStore, path: &Path) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(path)?;
    let config: GoblinConfig = toml::from_str(&contents)?;
    gobs.configure(config.settings()).await?;
    info!("config reloaded");
    Ok(())
}

/// Create, modify and remove events; reads and metadata-only access are ignored.
fn is_change_event(kind: EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
