// Namespace and `use` alias resolution

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Names that are never namespaced
const RESERVED_TYPES: &[&str] = &[
    "self", "static", "parent", "array", "callable", "int", "integer", "float", "double", "bool",
    "boolean", "string", "iterable", "object", "mixed", "void", "null", "never", "false", "true",
    "resource",
];

pub fn is_reserved_type(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    RESERVED_TYPES.contains(&lower.as_str())
}

/// Kind of symbol a `use` statement imports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UseKind {
    Class,
    Function,
    Constant,
}

/// The namespace and imports in effect at some point of a file.
///
/// Namespaces are stored fully qualified with a leading backslash; the
/// global namespace is `\`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameContext {
    pub namespace: String,
    pub classes: HashMap<String, String>,
    pub functions: HashMap<String, String>,
    pub constants: HashMap<String, String>,
}

impl Default for NameContext {
    fn default() -> Self {
        Self {
            namespace: "\\".to_string(),
            classes: HashMap::new(),
            functions: HashMap::new(),
            constants: HashMap::new(),
        }
    }
}

impl NameContext {
    pub fn in_namespace(namespace: &str) -> Self {
        Self {
            namespace: normalize_namespace(namespace),
            ..Self::default()
        }
    }

    /// Enters a new namespace; imports do not carry over.
    pub fn enter_namespace(&mut self, namespace: &str) {
        *self = Self::in_namespace(namespace);
    }

    pub fn import(&mut self, kind: UseKind, fqn: &str, alias: &str) {
        let fqn = qualified(fqn);
        let table = match kind {
            UseKind::Class => &mut self.classes,
            UseKind::Function => &mut self.functions,
            UseKind::Constant => &mut self.constants,
        };
        table.insert(alias.to_lowercase(), fqn);
    }

    /// Prefixes a declared short name with the current namespace.
    pub fn qualify(&self, short: &str) -> String {
        join_namespace(&self.namespace, short)
    }

    /// Resolves a class reference as written to a fully qualified name.
    /// Reserved and scalar type names are returned unchanged.
    pub fn resolve_class(&self, name: &str) -> String {
        if let Some(element) = name.strip_suffix("[]") {
            return format!("{}[]", self.resolve_class(element));
        }
        if name.is_empty() || name.starts_with('\\') || is_reserved_type(name) {
            return name.to_string();
        }
        if let Some(rest) = strip_namespace_keyword(name) {
            return self.qualify(rest);
        }
        let (first, rest) = match name.split_once('\\') {
            Some((first, rest)) => (first, Some(rest)),
            None => (name, None),
        };
        if let Some(imported) = self.classes.get(&first.to_lowercase()) {
            return match rest {
                Some(rest) => format!("{}\\{}", imported, rest),
                None => imported.clone(),
            };
        }
        self.qualify(name)
    }

    /// Resolves a function call name. The flag is true when an unqualified
    /// name inside a namespace may still fall back to the global function.
    pub fn resolve_function(&self, name: &str) -> (String, bool) {
        if name.starts_with('\\') {
            return (name.to_string(), false);
        }
        if let Some(rest) = strip_namespace_keyword(name) {
            return (self.qualify(rest), false);
        }
        if name.contains('\\') {
            return (self.resolve_class(name), false);
        }
        if let Some(imported) = self.functions.get(&name.to_lowercase()) {
            return (imported.clone(), false);
        }
        (self.qualify(name), self.namespace != "\\")
    }

    /// Resolves a type hint that may be nullable or a union.
    pub fn resolve_type(&self, type_text: &str) -> String {
        let mut out = String::new();
        let mut name = String::new();
        for c in type_text.chars() {
            if matches!(c, '|' | '&' | '(' | ')' | '?') {
                if !name.is_empty() {
                    out.push_str(&self.resolve_class(name.trim()));
                    name.clear();
                }
                if c != '?' {
                    out.push(c);
                }
            } else if !c.is_whitespace() {
                name.push(c);
            }
        }
        if !name.is_empty() {
            out.push_str(&self.resolve_class(&name));
        }
        out
    }
}

fn strip_namespace_keyword(name: &str) -> Option<&str> {
    let prefix = "namespace\\";
    if name.len() > prefix.len() && name[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&name[prefix.len()..])
    } else {
        None
    }
}

fn qualified(name: &str) -> String {
    if name.starts_with('\\') {
        name.to_string()
    } else {
        format!("\\{}", name)
    }
}

/// `\` for the global namespace, `\A\B` otherwise
pub fn normalize_namespace(namespace: &str) -> String {
    let trimmed = namespace.trim_matches('\\');
    if trimmed.is_empty() {
        "\\".to_string()
    } else {
        format!("\\{}", trimmed)
    }
}

pub fn join_namespace(namespace: &str, short: &str) -> String {
    if namespace == "\\" || namespace.is_empty() {
        format!("\\{}", short)
    } else {
        format!("{}\\{}", namespace, short)
    }
}

/// Splits `\A\B\C` into (`\A\B`, `C`)
pub fn split_qualified(fqn: &str) -> (String, String) {
    match fqn.rfind('\\') {
        Some(idx) => (normalize_namespace(&fqn[..idx]), fqn[idx + 1..].to_string()),
        None => ("\\".to_string(), fqn.to_string()),
    }
}
