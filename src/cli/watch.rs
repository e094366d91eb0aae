use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use phptags::config::Config;
use phptags::indexer::watcher::start_watcher;
use phptags::indexer::TagExtractor;

use super::{open_store, source_root};

/// Watches `root`, or the project's first source root, until Ctrl-C
pub async fn watch_project(project: &Path, config: &Config, root: Option<PathBuf>) -> Result<()> {
    let root = match root {
        Some(root) => Some(
            root.canonicalize()
                .with_context(|| format!("Cannot watch {}", root.display()))?,
        ),
        None => None,
    };
    let source = match &root {
        Some(root) => config
            .project
            .sources
            .iter()
            .find(|s| root.starts_with(source_root(project, s)))
            .or_else(|| config.project.sources.first()),
        None => config.project.sources.first(),
    }
    .context("No source root to watch")?;
    if root.is_none() && config.project.sources.len() > 1 {
        warn!("Only the first of {} source roots is watched", config.project.sources.len());
    }
    let root = root.unwrap_or_else(|| source_root(project, source));

    let store = open_store(project, config)?;
    let extractor = TagExtractor::new(&store, config.source_tag_config(source))?;

    println!("Watching {} for changes. Press Ctrl+C to stop.", root.display());
    tokio::select! {
        result = start_watcher(extractor, &root) => result?,
        _ = tokio::signal::ctrl_c() => info!("Stopped watching {}", root.display()),
    }
    Ok(())
}
