// File watcher for incremental re-indexing

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::indexer::TagExtractor;

/// What a file system event means for the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchAction {
    Walk(PathBuf),
    Delete(PathBuf),
    Rename { from: PathBuf, to: PathBuf },
}

/// Maps a notify event to store actions
pub fn actions_for(event: &Event) -> Vec<WatchAction> {
    match &event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            vec![WatchAction::Rename {
                from: event.paths[0].clone(),
                to: event.paths[1].clone(),
            }]
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) | EventKind::Remove(_) => {
            event.paths.iter().cloned().map(WatchAction::Delete).collect()
        }
        EventKind::Create(_) | EventKind::Modify(_) => event.paths.iter().cloned().map(WatchAction::Walk).collect(),
        _ => Vec::new(),
    }
}

/// Re-indexes files of one source root as they change
pub struct FileWatcher {
    extractor: Arc<Mutex<TagExtractor>>,
    watch_path: PathBuf,
}

impl FileWatcher {
    pub fn new(extractor: Arc<Mutex<TagExtractor>>, watch_path: PathBuf) -> Self {
        Self {
            extractor,
            watch_path,
        }
    }

    /// Start watching for file changes; runs until the event channel closes
    pub async fn watch(&self) -> Result<()> {
        info!("Starting file watcher for: {}", self.watch_path.display());

        self.extractor.lock().begin_search(&self.watch_path)?;

        let (tx, mut rx) = mpsc::channel(256);

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if let Err(e) = tx.blocking_send(event) {
                        error!("Failed to send file event: {}", e);
                    }
                }
                Err(e) => error!("File watch error: {}", e),
            },
            Config::default(),
        )?;

        watcher.watch(&self.watch_path, RecursiveMode::Recursive)?;

        info!("File watcher started. Monitoring for changes...");

        while let Some(event) = rx.recv().await {
            debug!("File event: {:?}", event);
            for action in actions_for(&event) {
                self.apply(&action);
            }
        }

        self.extractor.lock().end_search();
        Ok(())
    }

    /// Applies one action. Failures are logged and never stop the watcher.
    pub fn apply(&self, action: &WatchAction) {
        let mut extractor = self.extractor.lock();
        let result = match action {
            WatchAction::Walk(path) if path.is_file() => extractor.walk(path).map(|outcome| {
                info!("Re-indexed {}: {:?}", path.display(), outcome);
            }),
            WatchAction::Walk(_) => Ok(()),
            WatchAction::Delete(path) => remove_path(&mut extractor, path),
            WatchAction::Rename { from, to } => rename_path(&mut extractor, from, to),
        };
        if let Err(e) = result {
            warn!("Failed to apply {:?}: {:#}", action, e);
        }
    }
}

fn remove_path(extractor: &mut TagExtractor, path: &Path) -> Result<()> {
    // the path is gone, so it may have been a file or a directory
    let tags = extractor.delete_file(path)?;
    let files = extractor.delete_dir(path)?;
    info!("Removed {}: {} tags, {} files below it", path.display(), tags, files);
    Ok(())
}

/// Moves the tags of a renamed file or directory, re-walking the new path
/// when the old one was never indexed
pub fn rename_path(extractor: &mut TagExtractor, from: &Path, to: &Path) -> Result<()> {
    if to.is_dir() {
        let moved = extractor.rename_dir(from, to)?;
        info!("Moved {} files from {} to {}", moved, from.display(), to.display());
    } else if !extractor.rename_file(from, to)? {
        extractor.walk(to)?;
    }
    Ok(())
}

/// Watches a project root until interrupted
pub async fn start_watcher(extractor: TagExtractor, project_path: &Path) -> Result<()> {
    info!("Initializing file watcher for project: {}", project_path.display());
    let watcher = FileWatcher::new(Arc::new(Mutex::new(extractor)), project_path.to_path_buf());
    watcher.watch().await
}
