use std::path::Path;

use anyhow::{Context, Result};

use phptags::config::Config;
use phptags::indexer::{watcher, TagExtractor};

use super::{open_store, source_root};

/// Applies a rename made outside the watcher. `from` must already be gone.
pub fn rename_path(project: &Path, config: &Config, from: &Path, to: &Path) -> Result<()> {
    let to = to
        .canonicalize()
        .with_context(|| format!("Rename target {} does not exist", to.display()))?;
    let from = match from.parent().and_then(|p| p.canonicalize().ok()) {
        Some(parent) => parent.join(from.file_name().unwrap_or_default()),
        None => from.to_path_buf(),
    };

    let source = config
        .project
        .sources
        .iter()
        .find(|s| to.starts_with(source_root(project, s)))
        .with_context(|| format!("{} is outside every source root", to.display()))?;

    let store = open_store(project, config)?;
    let mut extractor = TagExtractor::new(&store, config.source_tag_config(source))?;
    extractor.begin_search(&source_root(project, source))?;
    watcher::rename_path(&mut extractor, &from, &to)?;
    extractor.end_search();

    println!("Renamed {} to {}", from.display(), to.display());
    Ok(())
}
