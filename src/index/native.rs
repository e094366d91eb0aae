//! Built-in PHP functions and classes.
//!
//! Loaded once from a JSON asset (bundled, or a configured override) into an
//! ordered in-memory map keyed like the persistent store, so the same
//! prefix range scan serves both. Never mutated after loading.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, info};

use super::{member_key, Tag, TagType, Visibility};
use crate::config::TagConfig;
use crate::parser::names::split_qualified;

const BUNDLED_ASSET: &str = include_str!("../../assets/native_tags.json");

#[derive(Debug, Deserialize)]
struct NativeAsset {
    #[serde(default)]
    functions: Vec<NativeFunction>,
    #[serde(default)]
    classes: Vec<NativeClass>,
}

#[derive(Debug, Deserialize)]
struct NativeFunction {
    name: String,
    #[serde(default)]
    signature: String,
    #[serde(default)]
    return_type: String,
    #[serde(default)]
    variable_args: bool,
    #[serde(default, rename = "static")]
    is_static: bool,
}

#[derive(Debug, Deserialize)]
struct NativeClass {
    name: String,
    #[serde(default)]
    parent: String,
    #[serde(default)]
    interfaces: Vec<String>,
    #[serde(default)]
    methods: Vec<NativeFunction>,
    #[serde(default)]
    properties: Vec<NativeProperty>,
    #[serde(default)]
    constants: Vec<NativeConstant>,
}

#[derive(Debug, Deserialize)]
struct NativeProperty {
    name: String,
    #[serde(default, rename = "type")]
    type_hint: String,
    #[serde(default)]
    visibility: Option<Visibility>,
}

#[derive(Debug, Deserialize)]
struct NativeConstant {
    name: String,
}

fn global(name: &str) -> String {
    if name.is_empty() || name.starts_with('\\') {
        name.to_string()
    } else {
        format!("\\{}", name)
    }
}

/// The read-only native tag set
#[derive(Debug, Default, Clone)]
pub struct NativeTags {
    by_key: BTreeMap<String, Vec<Tag>>,
    members_by_name: BTreeMap<String, Vec<Tag>>,
}

impl NativeTags {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The asset compiled into the binary
    pub fn bundled() -> anyhow::Result<Self> {
        Self::from_json(BUNDLED_ASSET).context("Bundled native tag asset is invalid")
    }

    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read native tags from {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid native tag asset {}", path.display()))
    }

    /// The configured override, or the bundled asset
    pub fn load(config: &TagConfig) -> anyhow::Result<Self> {
        let tags = match &config.native_asset {
            Some(path) => Self::from_path(path)?,
            None => Self::bundled()?,
        };
        info!("Loaded {} native tags", tags.len());
        Ok(tags)
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let asset: NativeAsset = serde_json::from_str(text)?;
        let mut tags = Self::default();

        for function in asset.functions {
            let mut tag = native_function(TagType::Function, function);
            tag.key = tag.identifier.clone();
            tags.insert(tag);
        }

        for class in asset.classes {
            let tag = Tag {
                parent_class: global(&class.parent),
                interfaces: class.interfaces.iter().map(|i| global(i)).collect(),
                is_native: true,
                ..Tag::new(TagType::Class, class.name.clone())
            };
            tags.insert(tag);

            for method in class.methods {
                let mut tag = native_function(TagType::Method, method);
                tag.key = member_key(&class.name, &tag.identifier);
                tag.class_name = class.name.clone();
                tags.insert(tag);
            }
            for property in class.properties {
                let tag = Tag {
                    return_type: property.type_hint,
                    visibility: property.visibility.unwrap_or_default(),
                    is_native: true,
                    ..Tag::member(TagType::Member, &class.name, "\\", &property.name)
                };
                tags.insert(tag);
            }
            for constant in class.constants {
                let tag = Tag {
                    is_static: true,
                    is_native: true,
                    ..Tag::member(TagType::ClassConstant, &class.name, "\\", &constant.name)
                };
                tags.insert(tag);
            }
        }

        debug!("Native set holds {} keys", tags.by_key.len());
        Ok(tags)
    }

    fn insert(&mut self, tag: Tag) {
        if let Some(qualified) = tag.qualified_key() {
            let alias = Tag {
                key: qualified.clone(),
                ..tag.clone()
            };
            self.by_key.entry(qualified.to_lowercase()).or_default().push(alias);
        }
        if tag.tag_type.is_class_member() {
            self.members_by_name
                .entry(tag.identifier.to_lowercase())
                .or_default()
                .push(tag.clone());
        }
        self.by_key.entry(tag.key.to_lowercase()).or_default().push(tag);
    }

    /// Number of distinct native declarations (alias keys excluded)
    pub fn len(&self) -> usize {
        self.by_key
            .iter()
            .filter(|(key, _)| !key.starts_with('\\'))
            .map(|(_, tags)| tags.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Ordered case-insensitive prefix scan
    pub fn near_match(&self, prefix: &str, limit: usize) -> Vec<Tag> {
        prefix_scan(&self.by_key, &prefix.to_lowercase(), limit)
    }

    pub fn exact(&self, key: &str, limit: usize) -> Vec<Tag> {
        self.by_key
            .get(&key.to_lowercase())
            .map(|tags| tags.iter().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    pub fn class_by_fqn(&self, fqn: &str) -> Vec<Tag> {
        self.exact(fqn, usize::MAX)
            .into_iter()
            .filter(|t| t.tag_type == TagType::Class)
            .collect()
    }

    /// Members of a native class. Native classes live in the global
    /// namespace.
    pub fn class_members(&self, class_fqn: &str, member: &str, exact: bool, limit: usize) -> Vec<Tag> {
        let (namespace, short) = split_qualified(class_fqn);
        if namespace != "\\" {
            return Vec::new();
        }
        let key = member_key(&short, member);
        if exact {
            self.exact(&key, limit)
        } else {
            self.near_match(&key, limit)
        }
    }

    /// Members with a given name on any native class
    pub fn members_named(&self, member: &str, exact: bool, limit: usize) -> Vec<Tag> {
        let lower = member.to_lowercase();
        if exact {
            return self
                .members_by_name
                .get(&lower)
                .map(|tags| tags.iter().take(limit).cloned().collect())
                .unwrap_or_default();
        }
        prefix_scan(&self.members_by_name, &lower, limit)
    }
}

fn native_function(tag_type: TagType, function: NativeFunction) -> Tag {
    Tag {
        signature: function.signature,
        return_type: function.return_type,
        has_variable_args: function.variable_args,
        is_static: function.is_static,
        is_native: true,
        ..Tag::new(tag_type, function.name)
    }
}

fn prefix_scan(map: &BTreeMap<String, Vec<Tag>>, lower: &str, limit: usize) -> Vec<Tag> {
    map.range(lower.to_string()..)
        .take_while(|(key, _)| key.starts_with(lower))
        .flat_map(|(_, tags)| tags.iter().cloned())
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_asset_loads() {
        let native = NativeTags::bundled().unwrap();
        assert!(native.len() > 200);

        let sprintf = native.exact("sprintf", 10);
        assert_eq!(sprintf.len(), 1);
        assert!(sprintf[0].has_variable_args);
        assert!(sprintf[0].is_native);
        assert_eq!(native.exact("\\strlen", 10).len(), 1);
    }

    #[test]
    fn test_bundled_asset_covers_extensions() {
        let native = NativeTags::bundled().unwrap();
        for name in ["version_compare", "array_rand", "mb_str_pad", "json_validate", "preg_grep"] {
            assert_eq!(native.exact(name, 1).len(), 1, "{name}");
        }
        assert!(native.exact("array_multisort", 1)[0].has_variable_args);
        assert!(!native.exact("array_rand", 1)[0].has_variable_args);

        let queue = native.class_by_fqn("\\SplQueue");
        assert_eq!(queue[0].parent_class, "\\SplDoublyLinkedList");
        assert_eq!(native.class_members("\\DOMDocument", "loadHTML", true, 10).len(), 1);
        assert!(native.exact("ReflectionEnum::getCases", 1)[0].return_type == "array");
        assert!(native.exact("Locale::getDefault", 1)[0].is_static);
    }

    #[test]
    fn test_near_match_is_ordered() {
        let native = NativeTags::bundled().unwrap();
        let found = native.near_match("str_", 100);
        let names: Vec<&str> = found.iter().map(|t| t.identifier.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort_by_key(|n| n.to_lowercase());
        assert_eq!(names, sorted);
        assert!(names.contains(&"str_replace"));
        assert!(native.near_match("str_", 2).len() == 2);
    }

    #[test]
    fn test_class_members() {
        let native = NativeTags::bundled().unwrap();
        let class = native.class_by_fqn("\\PDO");
        assert_eq!(class.len(), 1);

        let prepare = native.class_members("\\PDO", "prepare", true, 10);
        assert_eq!(prepare.len(), 1);
        assert_eq!(prepare[0].return_type, "PDOStatement|false");

        let fetches = native.class_members("\\PDOStatement", "fetch", false, 10);
        assert_eq!(fetches.len(), 3);
        assert!(native.class_members("\\App\\PDO", "prepare", true, 10).is_empty());

        let counts = native.members_named("count", true, 100);
        assert!(counts.len() >= 3);
    }

    #[test]
    fn test_custom_asset() {
        let native = NativeTags::from_json(
            r#"{"functions": [{"name": "my_builtin", "signature": "($a, ...$rest)", "variable_args": true}],
                "classes": [{"name": "Thing", "parent": "Base", "constants": [{"name": "ONE"}]}]}"#,
        )
        .unwrap();
        assert_eq!(native.exact("my_builtin", 1)[0].signature, "($a, ...$rest)");
        assert_eq!(native.class_by_fqn("\\Thing")[0].parent_class, "\\Base");
        assert!(native.exact("Thing::ONE", 1)[0].is_static);
        assert!(NativeTags::from_json("not json").is_err());
    }
}
