// The query facade: one store, the open buffers, and the native set

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::TagConfig;
use crate::error::{LookupError, StoreResult};
use crate::index::{NativeTags, SearchScope, StoreStats, Tag, TagStore};
use crate::parser::expression::parse_expression_with_version;
use crate::parser::language::{language_at, Language};
use crate::parser::ExpressionChain;
use crate::working::{UpdateOutcome, WorkingFile, WorkingOverlay};

use super::resolver::{CompletionMatches, ResourceMatches, Resolver};
use super::{GlobalTags, Layer, MemoryTags, NativeLayer};

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub store: Option<StoreStats>,
    pub working_files: usize,
    pub native_tags: usize,
}

/// Everything completion, navigation and lint ask questions of
pub struct TagCache {
    config: TagConfig,
    duck_typing: bool,
    global: RwLock<Option<TagStore>>,
    working: WorkingOverlay,
    native: Arc<NativeTags>,
}

impl TagCache {
    pub fn new(config: TagConfig, native: NativeTags, duck_typing: bool) -> Self {
        Self {
            working: WorkingOverlay::new(config.clone()),
            config,
            duck_typing,
            global: RwLock::new(None),
            native: Arc::new(native),
        }
    }

    pub fn config(&self) -> &TagConfig {
        &self.config
    }

    pub fn native(&self) -> &NativeTags {
        &self.native
    }

    pub fn register_global(&self, store: TagStore) {
        debug!("Registered global store {}", store.db_path().display());
        *self.global.write() = Some(store);
    }

    pub fn global(&self) -> Option<TagStore> {
        self.global.read().clone()
    }

    pub fn register_working(&self, file_id: &str, full_path: Option<&Path>, is_new: bool) {
        self.working.register(file_id, full_path, is_new);
    }

    pub fn update_working(&self, file_id: &str, text: &str) -> UpdateOutcome {
        self.working.update(file_id, text)
    }

    pub fn unregister_working(&self, file_id: &str) -> bool {
        self.working.unregister(file_id)
    }

    pub fn working(&self) -> &WorkingOverlay {
        &self.working
    }

    /// Drops the global store and every open buffer
    pub fn clear(&self) {
        *self.global.write() = None;
        self.working.clear();
    }

    fn search_scope(&self, search_dirs: &[String]) -> SearchScope {
        SearchScope::in_dirs(search_dirs.to_vec(), self.config.max_results)
    }

    /// Layers for a query made from `current`, or from no buffer at all
    fn resolver(&self, current: Option<&WorkingFile>, search_dirs: &[String], duck_typing: bool) -> Resolver<'_> {
        let mut resolver = Resolver::new(self.search_scope(search_dirs), duck_typing);
        if let Some(file) = current {
            resolver = resolver.with_layer(MemoryTags::new(Layer::CurrentFile, file.tags.clone()));
        }
        let skip = current.map(|f| f.file_id.as_str()).unwrap_or_default();
        let others: Vec<Tag> = self
            .working
            .others(skip)
            .into_iter()
            .flat_map(|f| f.tags)
            .collect();
        resolver = resolver.with_layer(MemoryTags::new(Layer::OtherWorking, others));
        if let Some(store) = self.global() {
            resolver = resolver.with_layer(GlobalTags::new(store, self.working.tags_by_path()));
        }
        resolver.with_layer(NativeLayer::new(&self.native))
    }

    pub fn near_match_tags(&self, prefix: &str, search_dirs: &[String]) -> Vec<Tag> {
        self.resolver(None, search_dirs, false).near_match(prefix)
    }

    pub fn exact_tags(&self, key: &str, search_dirs: &[String]) -> Vec<Tag> {
        self.resolver(None, search_dirs, false).exact(key)
    }

    /// "Go to file" candidates from the global store
    pub fn near_match_files(&self, prefix: &str, search_dirs: &[String]) -> StoreResult<Vec<Tag>> {
        match self.global() {
            Some(store) => store.near_match_files(prefix, &self.search_scope(search_dirs)),
            None => Ok(Vec::new()),
        }
    }

    pub fn stats(&self) -> StoreResult<CacheStats> {
        let store = match self.global() {
            Some(store) => Some(store.stats()?),
            None => None,
        };
        Ok(CacheStats {
            store,
            working_files: self.working.len(),
            native_tags: self.native.len(),
        })
    }

    /// Completion for `chain`, typed at `offset` of a registered buffer
    pub fn expression_completion_matches(
        &self,
        file_id: &str,
        chain: &ExpressionChain,
        offset: usize,
        search_dirs: &[String],
    ) -> CompletionMatches {
        let Some(file) = self.working.snapshot(file_id) else {
            return CompletionMatches::failed(LookupError::UnregisteredFile(file_id.to_string()));
        };
        let resolver = self.resolver(Some(&file), search_dirs, self.duck_typing);
        resolver.completion(chain, &file.symbols.view_at(offset))
    }

    /// Declarations `chain` refers to, at `offset` of a registered buffer
    pub fn resource_matches(
        &self,
        file_id: &str,
        chain: &ExpressionChain,
        offset: usize,
        search_dirs: &[String],
    ) -> ResourceMatches {
        let Some(file) = self.working.snapshot(file_id) else {
            return ResourceMatches::failed(LookupError::UnregisteredFile(file_id.to_string()));
        };
        let resolver = self.resolver(Some(&file), search_dirs, self.duck_typing);
        resolver.resource(chain, &file.symbols.view_at(offset))
    }

    /// Declarations named by the expression under the cursor. Outside PHP
    /// code there is nothing to look up.
    pub fn get_tags_at_position(
        &self,
        file_id: &str,
        text: &str,
        cursor: usize,
        search_dirs: &[String],
    ) -> ResourceMatches {
        if !self.working.is_registered(file_id) {
            return ResourceMatches::failed(LookupError::UnregisteredFile(file_id.to_string()));
        }
        let language = language_at(text, cursor, self.config.short_open_tags);
        if language != Language::Php {
            debug!("Cursor {} of {} is in {:?}", cursor, file_id, language);
            return ResourceMatches::default();
        }
        let expression = expression_at(text, cursor);
        let chain = parse_expression_with_version(&expression, self.config.version);
        if chain.is_empty() {
            return ResourceMatches::failed(LookupError::EmptyExpression);
        }
        let found = self.resource_matches(file_id, &chain, cursor, search_dirs);
        if let Some(error) = &found.error {
            warn!("No tags at {}:{}: {}", file_id, cursor, error);
        }
        found
    }
}

impl TagCache {
    /// Completion for the expression that ends at `cursor`
    pub fn completion_at_position(
        &self,
        file_id: &str,
        text: &str,
        cursor: usize,
        search_dirs: &[String],
    ) -> CompletionMatches {
        if !self.working.is_registered(file_id) {
            return CompletionMatches::failed(LookupError::UnregisteredFile(file_id.to_string()));
        }
        if language_at(text, cursor, self.config.short_open_tags) != Language::Php {
            return CompletionMatches::default();
        }
        let typed: String = text.chars().take(cursor).collect();
        let chain = parse_expression_with_version(&typed, self.config.version);
        if chain.is_empty() {
            return CompletionMatches::failed(LookupError::EmptyExpression);
        }
        self.expression_completion_matches(file_id, &chain, cursor, search_dirs)
    }
}

/// Text up to the end of the identifier the cursor is in
fn expression_at(text: &str, cursor: usize) -> String {
    let mut chars = text.chars();
    let mut expression: String = chars.by_ref().take(cursor).collect();
    expression.extend(chars.take_while(|c| c.is_alphanumeric() || *c == '_'));
    expression
}
