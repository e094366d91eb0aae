// CLI command implementations

pub mod complete;
pub mod find;
pub mod index;
pub mod lint;
pub mod rename;
pub mod stats;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::WalkDir;

use phptags::config::{Config, FileClass, SourceConfig};
use phptags::index::{NativeTags, Tag, TagStore};
use phptags::query::TagCache;

/// Opens the project's store, creating it when needed
pub fn open_store(project: &Path, config: &Config) -> Result<TagStore> {
    let db_path = config.db_path(project);
    TagStore::open(&db_path).with_context(|| format!("Failed to open tag store {}", db_path.display()))
}

/// A cache over the project's store, or over the native set alone when
/// the project was never indexed
pub fn open_cache(project: &Path, config: &Config) -> Result<TagCache> {
    let tag_config = config.tag_config();
    let native = NativeTags::load(&tag_config)?;
    let cache = TagCache::new(tag_config, native, config.completion.duck_typing);
    if config.db_path(project).exists() {
        cache.register_global(open_store(project, config)?);
    } else {
        debug!("No tag store in {}", project.display());
    }
    Ok(cache)
}

/// A source root, resolved against the project directory. Stored paths are
/// canonical, so the root is too whenever it exists.
pub fn source_root(project: &Path, source: &SourceConfig) -> PathBuf {
    let root = if source.root.is_absolute() {
        source.root.clone()
    } else {
        project.join(&source.root)
    };
    root.canonicalize().unwrap_or(root)
}

/// Files below `root` the source's filters accept, in walk order
pub fn source_files(root: &Path, config: &Config, source: &SourceConfig, php_only: bool) -> Result<Vec<PathBuf>> {
    let filter = config.source_tag_config(source).file_filter()?;
    let files = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| match filter.classify(path) {
            FileClass::Php => true,
            FileClass::Misc => !php_only,
            FileClass::Ignored => false,
        })
        .collect();
    Ok(files)
}

pub fn print_tag(tag: &Tag) {
    let location = if tag.full_path.is_empty() {
        "<native>".to_string()
    } else {
        format!("{}:{}", tag.full_path, tag.line)
    };
    println!(
        "{:<40} {:<10} {}{}",
        tag.key,
        tag.tag_type.as_str(),
        location,
        if tag.signature.is_empty() {
            String::new()
        } else {
            format!("  {}", tag.signature)
        }
    );
}
