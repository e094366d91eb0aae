// Tag extraction and file watching

pub mod tags;
pub mod watcher;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{FileClass, FileFilter, TagConfig};
use crate::index::{Source, TagStore, TagWriter};
use crate::parser::{lint::lint_string, scan_string};

pub use tags::build_tags;

/// Why a walked file produced no new tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    Excluded,
    SyntaxError,
    TooLarge,
    Unreadable,
}

/// What `walk` did with one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WalkOutcome {
    /// Parsed and its tags replaced
    Parsed { tags: usize },
    /// Recorded as a path only (misc extension)
    Recorded,
    /// Content hash matches the stored one
    Unchanged,
    Skipped(SkipReason),
    /// The cancel flag was set before the file was touched
    Cancelled,
}

/// Per-search counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    pub parsed: usize,
    pub recorded: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub tags: usize,
    pub cancelled: bool,
}

impl WalkStats {
    fn record(&mut self, outcome: WalkOutcome) {
        match outcome {
            WalkOutcome::Parsed { tags } => {
                self.parsed += 1;
                self.tags += tags;
            }
            WalkOutcome::Recorded => self.recorded += 1,
            WalkOutcome::Unchanged => self.unchanged += 1,
            WalkOutcome::Skipped(_) => self.skipped += 1,
            WalkOutcome::Cancelled => self.cancelled = true,
        }
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Writes the tags of walked files into the store.
///
/// Usage is bracketed: `begin_search(root)`, then `walk(file)` once per file
/// in whatever order the caller's directory walker produces, then
/// `end_search()`. Each `walk` is one unit of work, so the caller can check
/// for cancellation between files; a file is either fully re-indexed or left
/// at its previous state.
pub struct TagExtractor {
    store: TagStore,
    writer: TagWriter,
    config: TagConfig,
    filter: FileFilter,
    source: Option<Source>,
    stats: WalkStats,
    cancel: Arc<AtomicBool>,
}

impl TagExtractor {
    /// Takes the store's writer capability for the extractor's lifetime
    pub fn new(store: &TagStore, config: TagConfig) -> anyhow::Result<Self> {
        let writer = store.writer().context("Failed to acquire the tag store writer")?;
        let filter = config.file_filter()?;
        Ok(Self {
            store: store.clone(),
            writer,
            config,
            filter,
            source: None,
            stats: WalkStats::default(),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Shared flag; setting it makes every later `walk` return `Cancelled`
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &TagConfig {
        &self.config
    }

    /// Establishes the source row new tags reference. An existing row for
    /// the same root is reused, so an interrupted walk can be resumed.
    pub fn begin_search(&mut self, root: &Path) -> anyhow::Result<Source> {
        let directory = path_string(root);
        let source = self
            .writer
            .begin_source(&directory, &self.config.php_extensions, &self.config.misc_extensions)
            .with_context(|| format!("Failed to register source {}", directory))?;
        info!("Begin search in {} (source {})", directory, source.id);
        self.cancel.store(false, Ordering::Relaxed);
        self.stats = WalkStats::default();
        self.source = Some(source.clone());
        Ok(source)
    }

    /// Indexes one file of the current source
    pub fn walk(&mut self, path: &Path) -> anyhow::Result<WalkOutcome> {
        let outcome = self.walk_file(path)?;
        debug!("Walked {}: {:?}", path.display(), outcome);
        self.stats.record(outcome);
        Ok(outcome)
    }

    fn walk_file(&mut self, path: &Path) -> anyhow::Result<WalkOutcome> {
        if self.is_cancelled() {
            return Ok(WalkOutcome::Cancelled);
        }
        let source_id = self
            .source
            .as_ref()
            .map(|s| s.id)
            .ok_or_else(|| anyhow::anyhow!("walk called outside begin_search/end_search"))?;

        let class = self.filter.classify(path);
        if class == FileClass::Ignored {
            return Ok(WalkOutcome::Skipped(SkipReason::Excluded));
        }

        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > self.config.max_file_size => {
                return Ok(WalkOutcome::Skipped(SkipReason::TooLarge));
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Cannot stat {}: {}", path.display(), e);
                return Ok(WalkOutcome::Skipped(SkipReason::Unreadable));
            }
        }

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return Ok(WalkOutcome::Skipped(SkipReason::Unreadable));
            }
        };

        let full_path = path_string(path);
        let content_hash = blake3::hash(&bytes).to_hex().to_string();
        let is_parsed = class == FileClass::Php;
        if let Some(item) = self.store.file_item(&full_path)? {
            if item.content_hash == content_hash && item.is_parsed == is_parsed && item.source_id == source_id {
                return Ok(WalkOutcome::Unchanged);
            }
        }

        if !is_parsed {
            self.writer.replace_file(source_id, &full_path, &content_hash, false, &[])?;
            return Ok(WalkOutcome::Recorded);
        }

        let content = String::from_utf8_lossy(&bytes);
        if let Err(e) = lint_string(&content, self.config.short_open_tags) {
            info!("Keeping previous tags of {}: {}", full_path, e);
            return Ok(WalkOutcome::Skipped(SkipReason::SyntaxError));
        }

        let events = scan_string(&content, &self.config);
        let tags = build_tags(&events, &full_path);
        self.writer.replace_file(source_id, &full_path, &content_hash, true, &tags)?;
        Ok(WalkOutcome::Parsed { tags: tags.len() })
    }

    /// Closes the current search and returns its counters
    pub fn end_search(&mut self) -> WalkStats {
        let stats = std::mem::take(&mut self.stats);
        if let Some(source) = self.source.take() {
            info!(
                "End search in {}: {} parsed, {} recorded, {} unchanged, {} skipped, {} tags{}",
                source.directory,
                stats.parsed,
                stats.recorded,
                stats.unchanged,
                stats.skipped,
                stats.tags,
                if stats.cancelled { " (cancelled)" } else { "" }
            );
        }
        stats
    }

    /// Clears the current source before a full re-index
    pub fn wipe(&mut self) -> anyhow::Result<usize> {
        let source_id = self
            .source
            .as_ref()
            .map(|s| s.id)
            .ok_or_else(|| anyhow::anyhow!("wipe called outside begin_search/end_search"))?;
        Ok(self.writer.wipe(source_id)?)
    }

    pub fn remove_source(&mut self, root: &Path) -> anyhow::Result<bool> {
        Ok(self.writer.remove_source(&path_string(root))?)
    }

    pub fn delete_file(&mut self, path: &Path) -> anyhow::Result<usize> {
        Ok(self.writer.delete_file(&path_string(path))?)
    }

    pub fn delete_dir(&mut self, path: &Path) -> anyhow::Result<usize> {
        Ok(self.writer.delete_dir(&path_string(path))?)
    }

    /// Moves a file's tags to `new` without re-parsing, but only when `old`
    /// is known and no longer exists on disk. Editors that save by
    /// replace-then-recreate would otherwise look like renames.
    pub fn rename_file(&mut self, old: &Path, new: &Path) -> anyhow::Result<bool> {
        if old.exists() {
            debug!("Not renaming {}: it still exists", old.display());
            return Ok(false);
        }
        let renamed = self.writer.rename_file(&path_string(old), &path_string(new))?;
        if renamed {
            info!("Renamed {} to {}", old.display(), new.display());
        }
        Ok(renamed)
    }

    /// Directory counterpart of [`rename_file`](Self::rename_file)
    pub fn rename_dir(&mut self, old: &Path, new: &Path) -> anyhow::Result<usize> {
        if old.exists() {
            debug!("Not renaming {}: it still exists", old.display());
            return Ok(0);
        }
        Ok(self.writer.rename_dir(&path_string(old), &path_string(new))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SearchScope;
    use std::fs;
    use tempfile::tempdir;

    struct Fixture {
        dir: tempfile::TempDir,
        store: TagStore,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let store = TagStore::open(dir.path().join("db").join("tags.db")).unwrap();
            fs::create_dir_all(dir.path().join("src")).unwrap();
            Self { dir, store }
        }

        fn root(&self) -> std::path::PathBuf {
            self.dir.path().join("src")
        }

        fn write(&self, name: &str, content: &str) -> std::path::PathBuf {
            let path = self.root().join(name);
            fs::write(&path, content).unwrap();
            path
        }
    }

    #[test]
    fn test_walk_parses_and_skips_unchanged() {
        let fx = Fixture::new();
        let file = fx.write("a.php", "<?php class C { function m() {} }");
        let mut extractor = TagExtractor::new(&fx.store, TagConfig::default()).unwrap();

        extractor.begin_search(&fx.root()).unwrap();
        assert_eq!(extractor.walk(&file).unwrap(), WalkOutcome::Parsed { tags: 2 });
        assert_eq!(extractor.walk(&file).unwrap(), WalkOutcome::Unchanged);
        let stats = extractor.end_search();
        assert_eq!(stats.parsed, 1);
        assert_eq!(stats.unchanged, 1);

        let found = fx.store.exact("C::m", &SearchScope::default()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].class_name, "C");
    }

    #[test]
    fn test_syntax_error_keeps_previous_tags() {
        let fx = Fixture::new();
        let file = fx.write("a.php", "<?php class Good {}");
        let mut extractor = TagExtractor::new(&fx.store, TagConfig::default()).unwrap();
        extractor.begin_search(&fx.root()).unwrap();
        extractor.walk(&file).unwrap();

        fs::write(&file, "<?php class Bad { function ( }").unwrap();
        assert_eq!(
            extractor.walk(&file).unwrap(),
            WalkOutcome::Skipped(SkipReason::SyntaxError)
        );
        assert_eq!(fx.store.exact("Good", &SearchScope::default()).unwrap().len(), 1);
        assert!(fx.store.exact("Bad", &SearchScope::default()).unwrap().is_empty());
    }

    #[test]
    fn test_misc_and_excluded_files() {
        let fx = Fixture::new();
        let js = fx.write("app.js", "var a = 1;");
        let txt = fx.write("notes.txt", "hello");
        let mut extractor = TagExtractor::new(&fx.store, TagConfig::default()).unwrap();
        extractor.begin_search(&fx.root()).unwrap();

        assert_eq!(extractor.walk(&js).unwrap(), WalkOutcome::Recorded);
        assert_eq!(
            extractor.walk(&txt).unwrap(),
            WalkOutcome::Skipped(SkipReason::Excluded)
        );
        let files = fx.store.near_match_files("app", &SearchScope::default()).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_cancellation_between_files() {
        let fx = Fixture::new();
        let file = fx.write("a.php", "<?php class C {}");
        let mut extractor = TagExtractor::new(&fx.store, TagConfig::default()).unwrap();
        extractor.begin_search(&fx.root()).unwrap();
        extractor.cancel_flag().store(true, Ordering::Relaxed);

        assert_eq!(extractor.walk(&file).unwrap(), WalkOutcome::Cancelled);
        assert!(extractor.end_search().cancelled);
        assert!(fx.store.exact("C", &SearchScope::default()).unwrap().is_empty());
    }

    #[test]
    fn test_walk_requires_begin_search() {
        let fx = Fixture::new();
        let file = fx.write("a.php", "<?php class C {}");
        let mut extractor = TagExtractor::new(&fx.store, TagConfig::default()).unwrap();
        assert!(extractor.walk(&file).is_err());
    }

    #[test]
    fn test_rename_only_when_old_is_gone() {
        let fx = Fixture::new();
        let old = fx.write("old.php", "<?php class Moved {}");
        let mut extractor = TagExtractor::new(&fx.store, TagConfig::default()).unwrap();
        extractor.begin_search(&fx.root()).unwrap();
        extractor.walk(&old).unwrap();

        let new = fx.root().join("new.php");
        assert!(!extractor.rename_file(&old, &new).unwrap());

        fs::rename(&old, &new).unwrap();
        assert!(extractor.rename_file(&old, &new).unwrap());
        let tags = fx.store.exact("Moved", &SearchScope::default()).unwrap();
        assert_eq!(tags[0].full_path, new.to_string_lossy());
    }

    #[test]
    fn test_second_extractor_is_refused() {
        let fx = Fixture::new();
        let _first = TagExtractor::new(&fx.store, TagConfig::default()).unwrap();
        assert!(TagExtractor::new(&fx.store, TagConfig::default()).is_err());
    }
}
