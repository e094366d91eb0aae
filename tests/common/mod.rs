//! Shared fixtures: a temporary project with an on-disk tag store

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use phptags::config::{LintConfig, TagConfig};
use phptags::index::{NativeTags, TagStore};
use phptags::indexer::{TagExtractor, WalkStats};
use phptags::lint::Linter;
use phptags::query::TagCache;
use tempfile::TempDir;

pub const MY_CLASS: &str = r#"<?php
namespace Util;

class MyClass
{
    const MAX = 10;
    public static $instances = 0;

    public function __construct() {}

    public function work($amount = 1) {}

    public function removed() {}
}
"#;

pub struct Project {
    _dir: TempDir,
    pub root: PathBuf,
    pub src: PathBuf,
    pub store: TagStore,
}

impl Project {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let src = root.join("src");
        std::fs::create_dir_all(&src).unwrap();
        let store = TagStore::open(root.join(".phptags.db")).unwrap();
        Self {
            _dir: dir,
            root,
            src,
            store,
        }
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.src.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn extractor(&self) -> TagExtractor {
        let mut extractor = TagExtractor::new(&self.store, TagConfig::default()).unwrap();
        extractor.begin_search(&self.src).unwrap();
        extractor
    }

    /// Walks every file below `src` in name order
    pub fn index(&self) -> WalkStats {
        let mut extractor = self.extractor();
        for path in files_below(&self.src) {
            extractor.walk(&path).unwrap();
        }
        extractor.end_search()
    }

    pub fn cache(&self) -> TagCache {
        let cache = TagCache::new(TagConfig::default(), NativeTags::bundled().unwrap(), false);
        cache.register_global(self.store.clone());
        cache
    }

    pub fn linter(&self) -> Linter {
        Linter::new(
            TagConfig::default(),
            LintConfig::default(),
            Arc::new(NativeTags::bundled().unwrap()),
        )
        .with_store(self.store.clone())
    }
}

pub fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn files_below(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}
