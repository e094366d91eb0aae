// Tag storage: the persisted store, its schema and the bundled native set

pub mod db;
pub mod native;
pub mod schema;

use serde::{Deserialize, Serialize};

use crate::parser::names::join_namespace;
pub use crate::parser::Visibility;

pub use db::{StoreStats, TagStore, TagWriter};
pub use native::NativeTags;

/// Kind of an extracted declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagType {
    Class,
    Method,
    Function,
    /// Class property
    Member,
    ClassConstant,
    Namespace,
    File,
    /// `define()` or top-level `const`
    Define,
}

impl TagType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagType::Class => "class",
            TagType::Method => "method",
            TagType::Function => "function",
            TagType::Member => "member",
            TagType::ClassConstant => "class_constant",
            TagType::Namespace => "namespace",
            TagType::File => "file",
            TagType::Define => "define",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "class" => Some(TagType::Class),
            "method" => Some(TagType::Method),
            "function" => Some(TagType::Function),
            "member" => Some(TagType::Member),
            "class_constant" => Some(TagType::ClassConstant),
            "namespace" => Some(TagType::Namespace),
            "file" => Some(TagType::File),
            "define" => Some(TagType::Define),
            _ => None,
        }
    }

    /// Declared inside a class body
    pub fn is_class_member(&self) -> bool {
        matches!(self, TagType::Method | TagType::Member | TagType::ClassConstant)
    }

    /// Also stored under its fully qualified key
    pub fn has_qualified_alias(&self) -> bool {
        matches!(self, TagType::Class | TagType::Function | TagType::Define)
    }
}

/// One extracted declaration.
///
/// `class_name` is the short name of the declaring class and
/// `namespace_name` its namespace (`\` for the global one). Queries always
/// hand out copies; nothing shares a mutable tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub source_id: i64,
    pub file_item_id: i64,
    pub key: String,
    pub identifier: String,
    pub class_name: String,
    pub namespace_name: String,
    pub tag_type: TagType,
    pub signature: String,
    pub return_type: String,
    pub comment: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_native: bool,
    pub has_variable_args: bool,
    /// Fully qualified parent of a class tag
    pub parent_class: String,
    pub interfaces: Vec<String>,
    pub traits: Vec<String>,
    pub full_path: String,
    pub line: usize,
}

impl Default for Tag {
    fn default() -> Self {
        Self {
            id: 0,
            source_id: 0,
            file_item_id: 0,
            key: String::new(),
            identifier: String::new(),
            class_name: String::new(),
            namespace_name: "\\".to_string(),
            tag_type: TagType::Function,
            signature: String::new(),
            return_type: String::new(),
            comment: String::new(),
            visibility: Visibility::Public,
            is_static: false,
            is_native: false,
            has_variable_args: false,
            parent_class: String::new(),
            interfaces: Vec::new(),
            traits: Vec::new(),
            full_path: String::new(),
            line: 0,
        }
    }
}

impl Tag {
    pub fn new(tag_type: TagType, identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self {
            key: identifier.clone(),
            identifier,
            tag_type,
            ..Self::default()
        }
    }

    /// A member tag keyed `Class::member`
    pub fn member(tag_type: TagType, class_name: &str, namespace_name: &str, identifier: &str) -> Self {
        Self {
            key: member_key(class_name, identifier),
            identifier: identifier.to_string(),
            class_name: class_name.to_string(),
            namespace_name: namespace_name.to_string(),
            tag_type,
            ..Self::default()
        }
    }

    /// `\Ns\Name` for classes, functions and defines; `\Ns\Class::member`
    /// for members; the namespace itself for namespace tags.
    pub fn fully_qualified_name(&self) -> String {
        match self.tag_type {
            TagType::Namespace => self.namespace_name.clone(),
            TagType::File => self.full_path.clone(),
            t if t.is_class_member() => format!("{}::{}", self.fully_qualified_class(), self.identifier),
            _ => join_namespace(&self.namespace_name, &self.identifier),
        }
    }

    /// Fully qualified declaring class of a member, or of the class itself
    pub fn fully_qualified_class(&self) -> String {
        match self.tag_type {
            TagType::Class => join_namespace(&self.namespace_name, &self.identifier),
            _ if self.class_name.is_empty() => String::new(),
            _ => join_namespace(&self.namespace_name, &self.class_name),
        }
    }

    /// Key under which the fully qualified alias row is stored
    pub fn qualified_key(&self) -> Option<String> {
        self.tag_type
            .has_qualified_alias()
            .then(|| join_namespace(&self.namespace_name, &self.identifier))
    }

    /// Same declaration, ignoring row ids
    pub fn same_declaration(&self, other: &Tag) -> bool {
        self.tag_type == other.tag_type
            && self.identifier.eq_ignore_ascii_case(&other.identifier)
            && self.class_name.eq_ignore_ascii_case(&other.class_name)
            && self.namespace_name.eq_ignore_ascii_case(&other.namespace_name)
    }
}

pub fn member_key(class_name: &str, member: &str) -> String {
    format!("{}::{}", class_name, member)
}

/// An indexed root directory and the extension globs it tracks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub directory: String,
    pub php_extensions: Vec<String>,
    pub misc_extensions: Vec<String>,
}

/// A file the store knows about, parsed or merely recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileItem {
    pub id: i64,
    pub source_id: i64,
    pub full_path: String,
    pub content_hash: String,
    pub last_indexed: i64,
    pub is_parsed: bool,
}

impl FileItem {
    /// File name used by "go to file"
    pub fn name(&self) -> &str {
        file_name(&self.full_path)
    }

    pub fn to_tag(&self) -> Tag {
        Tag {
            file_item_id: self.id,
            source_id: self.source_id,
            full_path: self.full_path.clone(),
            ..Tag::new(TagType::File, self.name())
        }
    }
}

/// Restricts global lookups to some directories and caps the result size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchScope {
    /// Path prefixes; empty means everywhere
    pub dirs: Vec<String>,
    pub limit: usize,
}

impl Default for SearchScope {
    fn default() -> Self {
        Self {
            dirs: Vec::new(),
            limit: 100,
        }
    }
}

impl SearchScope {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            dirs: Vec::new(),
            limit,
        }
    }

    pub fn in_dirs(dirs: Vec<String>, limit: usize) -> Self {
        Self { dirs, limit }
    }

    /// Whether a path lies under one of the directories
    pub fn contains(&self, full_path: &str) -> bool {
        self.dirs.is_empty()
            || self
                .dirs
                .iter()
                .any(|dir| full_path.starts_with(dir_prefix(dir).as_str()))
    }
}

/// Last path component of a stored path
pub fn file_name(full_path: &str) -> &str {
    full_path
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(full_path)
}

/// Directory with a trailing separator, so `/a/b` does not match `/a/bc`
pub fn dir_prefix(dir: &str) -> String {
    if dir.ends_with('/') || dir.ends_with('\\') {
        dir.to_string()
    } else {
        format!("{}{}", dir, std::path::MAIN_SEPARATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_names() {
        let mut class = Tag::new(TagType::Class, "MyClass");
        class.namespace_name = "\\Util".into();
        assert_eq!(class.fully_qualified_name(), "\\Util\\MyClass");
        assert_eq!(class.qualified_key().as_deref(), Some("\\Util\\MyClass"));

        let method = Tag::member(TagType::Method, "MyClass", "\\Util", "work");
        assert_eq!(method.key, "MyClass::work");
        assert_eq!(method.fully_qualified_name(), "\\Util\\MyClass::work");
        assert_eq!(method.qualified_key(), None);

        let func = Tag::new(TagType::Function, "helper");
        assert_eq!(func.fully_qualified_name(), "\\helper");
    }

    #[test]
    fn test_tag_type_round_trips_through_text() {
        for t in [TagType::Class, TagType::ClassConstant, TagType::Define, TagType::File] {
            assert_eq!(TagType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(TagType::from_str("bogus"), None);
    }

    #[test]
    fn test_search_scope_prefix() {
        let scope = SearchScope::in_dirs(vec!["/p/src".into()], 10);
        assert!(scope.contains("/p/src/a.php"));
        assert!(!scope.contains("/p/srcx/a.php"));
        assert!(SearchScope::default().contains("/anything"));
    }

    #[test]
    fn test_file_item_name() {
        let item = FileItem {
            id: 1,
            source_id: 1,
            full_path: "/p/src/index.php".into(),
            content_hash: String::new(),
            last_indexed: 0,
            is_parsed: true,
        };
        assert_eq!(item.name(), "index.php");
        assert_eq!(item.to_tag().tag_type, TagType::File);
    }
}
