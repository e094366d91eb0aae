//! Layered tag lookup.
//!
//! Every place tags can come from implements [`TagSource`]. A
//! [`Resolver`] asks its layers in a fixed order: the buffer being edited,
//! the other open buffers, the persistent store, and the native set. An
//! earlier layer shadows a later one when both know the same declaration.

pub mod cache;
pub mod resolver;

use std::collections::HashMap;

use tracing::warn;

use crate::error::StoreResult;
use crate::index::{NativeTags, SearchScope, Tag, TagStore, TagType};

pub use cache::{CacheStats, TagCache};
pub use resolver::{CompletionMatches, MemberLookup, ResourceMatches, Resolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    CurrentFile,
    OtherWorking,
    Global,
    Native,
}

/// One source of tags
pub trait TagSource {
    fn layer(&self) -> Layer;

    /// Case-insensitive key prefix search, ordered by key
    fn near_match(&self, prefix: &str, scope: &SearchScope) -> StoreResult<Vec<Tag>>;

    fn exact(&self, key: &str, scope: &SearchScope) -> StoreResult<Vec<Tag>>;

    fn class_by_fqn(&self, fqn: &str, scope: &SearchScope) -> StoreResult<Vec<Tag>>;

    /// Members declared directly on a class
    fn class_members(&self, class_fqn: &str, member: &str, exact: bool, scope: &SearchScope)
        -> StoreResult<Vec<Tag>>;

    /// Members of any class, by name
    fn members_named(&self, member: &str, exact: bool, scope: &SearchScope) -> StoreResult<Vec<Tag>>;
}

/// Tags held in memory: one buffer, or all the other open buffers
pub struct MemoryTags {
    layer: Layer,
    tags: Vec<Tag>,
}

impl MemoryTags {
    pub fn new(layer: Layer, tags: Vec<Tag>) -> Self {
        Self { layer, tags }
    }

    /// Tags matching `test` on their key, plus fully qualified alias copies
    /// matching on the qualified key, ordered by the matched key.
    fn by_key(&self, limit: usize, test: impl Fn(&str) -> bool) -> Vec<Tag> {
        let mut found: Vec<Tag> = Vec::new();
        for tag in &self.tags {
            if test(&tag.key.to_lowercase()) {
                found.push(tag.clone());
            }
            if let Some(qualified) = tag.qualified_key() {
                if test(&qualified.to_lowercase()) {
                    found.push(Tag {
                        key: qualified,
                        ..tag.clone()
                    });
                }
            }
        }
        found.sort_by_key(|t| t.key.to_lowercase());
        found.truncate(limit);
        found
    }
}

impl TagSource for MemoryTags {
    fn layer(&self) -> Layer {
        self.layer
    }

    fn near_match(&self, prefix: &str, scope: &SearchScope) -> StoreResult<Vec<Tag>> {
        let lower = prefix.to_lowercase();
        Ok(self.by_key(scope.limit, |key| key.starts_with(&lower)))
    }

    fn exact(&self, key: &str, scope: &SearchScope) -> StoreResult<Vec<Tag>> {
        let lower = key.to_lowercase();
        Ok(self.by_key(scope.limit, |k| k == lower))
    }

    fn class_by_fqn(&self, fqn: &str, _scope: &SearchScope) -> StoreResult<Vec<Tag>> {
        Ok(self
            .tags
            .iter()
            .filter(|t| t.tag_type == TagType::Class && t.fully_qualified_name().eq_ignore_ascii_case(fqn))
            .cloned()
            .collect())
    }

    fn class_members(
        &self,
        class_fqn: &str,
        member: &str,
        exact: bool,
        scope: &SearchScope,
    ) -> StoreResult<Vec<Tag>> {
        let lower = member.to_lowercase();
        let mut found: Vec<Tag> = self
            .tags
            .iter()
            .filter(|t| t.tag_type.is_class_member())
            .filter(|t| t.fully_qualified_class().eq_ignore_ascii_case(class_fqn))
            .filter(|t| name_matches(&t.identifier, &lower, exact))
            .cloned()
            .collect();
        found.sort_by_key(|t| t.key.to_lowercase());
        found.truncate(scope.limit);
        Ok(found)
    }

    fn members_named(&self, member: &str, exact: bool, scope: &SearchScope) -> StoreResult<Vec<Tag>> {
        let lower = member.to_lowercase();
        let mut found: Vec<Tag> = self
            .tags
            .iter()
            .filter(|t| t.tag_type.is_class_member() && name_matches(&t.identifier, &lower, exact))
            .cloned()
            .collect();
        found.sort_by_key(|t| (t.identifier.to_lowercase(), t.key.to_lowercase()));
        found.truncate(scope.limit);
        Ok(found)
    }
}

fn name_matches(identifier: &str, lower: &str, exact: bool) -> bool {
    let name = identifier.to_lowercase();
    if exact {
        name == lower
    } else {
        name.starts_with(lower)
    }
}

/// The persistent store, minus declarations an open buffer no longer has
pub struct GlobalTags {
    store: TagStore,
    /// Tags of open buffers keyed by the on-disk path they shadow
    overlay: HashMap<String, Vec<Tag>>,
}

impl GlobalTags {
    pub fn new(store: TagStore, overlay: HashMap<String, Vec<Tag>>) -> Self {
        Self { store, overlay }
    }

    /// Drops tags whose file is open and no longer declares them
    fn fresh(&self, tags: Vec<Tag>) -> Vec<Tag> {
        tags.into_iter()
            .filter(|tag| match self.overlay.get(&tag.full_path) {
                Some(open) => open.iter().any(|t| t.same_declaration(tag)),
                None => true,
            })
            .collect()
    }
}

impl TagSource for GlobalTags {
    fn layer(&self) -> Layer {
        Layer::Global
    }

    fn near_match(&self, prefix: &str, scope: &SearchScope) -> StoreResult<Vec<Tag>> {
        Ok(self.fresh(self.store.near_match(prefix, scope)?))
    }

    fn exact(&self, key: &str, scope: &SearchScope) -> StoreResult<Vec<Tag>> {
        Ok(self.fresh(self.store.exact(key, scope)?))
    }

    fn class_by_fqn(&self, fqn: &str, scope: &SearchScope) -> StoreResult<Vec<Tag>> {
        Ok(self.fresh(self.store.class_by_fqn(fqn, scope)?))
    }

    fn class_members(
        &self,
        class_fqn: &str,
        member: &str,
        exact: bool,
        scope: &SearchScope,
    ) -> StoreResult<Vec<Tag>> {
        Ok(self.fresh(self.store.class_members(class_fqn, member, exact, scope)?))
    }

    fn members_named(&self, member: &str, exact: bool, scope: &SearchScope) -> StoreResult<Vec<Tag>> {
        Ok(self.fresh(self.store.members_named(member, exact, scope)?))
    }
}

/// Built-in functions and classes. Directory restrictions do not apply.
pub struct NativeLayer<'a> {
    native: &'a NativeTags,
}

impl<'a> NativeLayer<'a> {
    pub fn new(native: &'a NativeTags) -> Self {
        Self { native }
    }
}

impl TagSource for NativeLayer<'_> {
    fn layer(&self) -> Layer {
        Layer::Native
    }

    fn near_match(&self, prefix: &str, scope: &SearchScope) -> StoreResult<Vec<Tag>> {
        Ok(self.native.near_match(prefix, scope.limit))
    }

    fn exact(&self, key: &str, scope: &SearchScope) -> StoreResult<Vec<Tag>> {
        Ok(self.native.exact(key, scope.limit))
    }

    fn class_by_fqn(&self, fqn: &str, _scope: &SearchScope) -> StoreResult<Vec<Tag>> {
        Ok(self.native.class_by_fqn(fqn))
    }

    fn class_members(
        &self,
        class_fqn: &str,
        member: &str,
        exact: bool,
        scope: &SearchScope,
    ) -> StoreResult<Vec<Tag>> {
        Ok(self.native.class_members(class_fqn, member, exact, scope.limit))
    }

    fn members_named(&self, member: &str, exact: bool, scope: &SearchScope) -> StoreResult<Vec<Tag>> {
        Ok(self.native.members_named(member, exact, scope.limit))
    }
}

/// Runs one query against a layer; a failing store reads as empty.
pub(crate) fn query_layer(
    source: &dyn TagSource,
    what: &str,
    query: impl FnOnce(&dyn TagSource) -> StoreResult<Vec<Tag>>,
) -> Vec<Tag> {
    match query(source) {
        Ok(tags) => tags,
        Err(e) => {
            warn!("{:?} lookup of {} failed: {}", source.layer(), what, e);
            Vec::new()
        }
    }
}

/// Identity of a declaration across layers
pub(crate) fn declaration_key(tag: &Tag) -> (TagType, String, String) {
    (
        tag.tag_type,
        tag.fully_qualified_name().to_lowercase(),
        tag.key.to_lowercase(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TagConfig;
    use crate::indexer::tags::build_tags;
    use crate::parser::scan_string;

    fn memory(source: &str, path: &str) -> MemoryTags {
        let events = scan_string(source, &TagConfig::default());
        MemoryTags::new(Layer::CurrentFile, build_tags(&events, path))
    }

    #[test]
    fn test_memory_layer_keys_and_aliases() {
        let layer = memory(
            "<?php\nnamespace Util;\nclass MyClass { const MAX = 1; function work() {} }\nfunction helper() {}\n",
            "/p/a.php",
        );
        let scope = SearchScope::default();

        let found = layer.near_match("My", &scope).unwrap();
        let keys: Vec<&str> = found.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["MyClass", "MyClass::MAX", "MyClass::work"]);

        let alias = layer.exact("\\util\\myclass", &scope).unwrap();
        assert_eq!(alias.len(), 1);
        assert_eq!(alias[0].key, "\\Util\\MyClass");

        assert_eq!(layer.class_by_fqn("\\Util\\MyClass", &scope).unwrap().len(), 1);
        assert_eq!(layer.class_members("\\Util\\MyClass", "w", false, &scope).unwrap().len(), 1);
        assert!(layer.class_members("\\Other\\MyClass", "work", true, &scope).unwrap().is_empty());
        assert_eq!(layer.members_named("max", true, &scope).unwrap().len(), 1);
    }

    #[test]
    fn test_global_layer_suppresses_stale_tags() {
        let dir = tempfile::tempdir().unwrap();
        let store = TagStore::open(dir.path().join("tags.db")).unwrap();
        let path = "/p/src/a.php";
        let saved = build_tags(
            &scan_string("<?php class A { function kept() {} function gone() {} }", &TagConfig::default()),
            path,
        );
        {
            let mut writer = store.writer().unwrap();
            let source = writer.begin_source("/p/src", &[], &[]).unwrap();
            writer.replace_file(source.id, path, "h", true, &saved).unwrap();
        }

        let open = build_tags(
            &scan_string("<?php class A { function kept() {} }", &TagConfig::default()),
            path,
        );
        let overlay = HashMap::from([(path.to_string(), open)]);
        let global = GlobalTags::new(store, overlay);
        let scope = SearchScope::default();

        assert_eq!(global.class_members("\\A", "kept", true, &scope).unwrap().len(), 1);
        assert!(global.class_members("\\A", "gone", true, &scope).unwrap().is_empty());
        assert!(global.exact("A::gone", &scope).unwrap().is_empty());
    }
}
