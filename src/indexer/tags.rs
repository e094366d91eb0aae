// Turns scanner events into tag records

use std::collections::HashSet;

use crate::index::{Tag, TagType};
use crate::parser::{
    ClassDecl, ConstantDecl, ExpressionKind, FunctionDecl, MethodDecl, ParseEvent, PropertyDecl,
};

/// Calls that let a function take more arguments than it declares
const ARGUMENT_INTROSPECTION: &[&str] = &["func_get_args", "func_get_arg", "func_num_args"];

/// Builds the tags of one file from its event stream, in source order.
pub fn build_tags(events: &[ParseEvent], full_path: &str) -> Vec<Tag> {
    let mut tags = Vec::new();
    let mut namespaces = HashSet::new();
    // innermost open function body; closures hide their enclosing function
    let mut bodies: Vec<Option<usize>> = Vec::new();

    for event in events {
        let tag = match event {
            ParseEvent::Namespace { name, line, .. } => {
                if name == "\\" || !namespaces.insert(name.to_lowercase()) {
                    continue;
                }
                namespace_tag(name, *line)
            }
            ParseEvent::ClassFound(class) => class_tag(class),
            ParseEvent::TraitUsed {
                class_name,
                trait_name,
                ..
            } => {
                let owner = tags
                    .iter_mut()
                    .rev()
                    .find(|t: &&mut Tag| t.tag_type == TagType::Class && t.fully_qualified_name() == *class_name);
                if let Some(owner) = owner {
                    owner.traits.push(trait_name.clone());
                }
                continue;
            }
            ParseEvent::MethodFound(method) => {
                bodies.push(Some(tags.len()));
                method_tag(method)
            }
            ParseEvent::PropertyFound(property) => property_tag(property),
            ParseEvent::ConstantFound(constant) => constant_tag(constant),
            ParseEvent::FunctionFound(function) => {
                bodies.push(Some(tags.len()));
                function_tag(function)
            }
            ParseEvent::ClosureStart(_) => {
                bodies.push(None);
                continue;
            }
            ParseEvent::FunctionEnd { .. } | ParseEvent::ClosureEnd { .. } => {
                bodies.pop();
                continue;
            }
            ParseEvent::Expression(expr) => {
                if let ExpressionKind::FunctionCall { name, .. } = &expr.kind {
                    let name = name.trim_start_matches('\\').to_ascii_lowercase();
                    if ARGUMENT_INTROSPECTION.contains(&name.as_str()) {
                        if let Some(Some(index)) = bodies.last() {
                            tags[*index].has_variable_args = true;
                        }
                    }
                }
                continue;
            }
            _ => continue,
        };
        tags.push(Tag {
            full_path: full_path.to_string(),
            ..tag
        });
    }

    tags
}

fn namespace_tag(name: &str, line: usize) -> Tag {
    let short = name.rsplit('\\').next().unwrap_or(name);
    Tag {
        key: name.to_string(),
        namespace_name: name.to_string(),
        line,
        ..Tag::new(TagType::Namespace, short)
    }
}

fn class_tag(class: &ClassDecl) -> Tag {
    Tag {
        namespace_name: class.namespace_name.clone(),
        parent_class: class.parent.clone(),
        interfaces: class.interfaces.clone(),
        comment: class.comment.clone(),
        line: class.line,
        ..Tag::new(TagType::Class, class.name.clone())
    }
}

fn method_tag(method: &MethodDecl) -> Tag {
    Tag {
        signature: method.signature.clone(),
        return_type: method.return_type.clone(),
        comment: method.comment.clone(),
        visibility: method.visibility,
        is_static: method.is_static,
        has_variable_args: method.params.iter().any(|p| p.variadic),
        line: method.line,
        ..Tag::member(TagType::Method, &method.class_name, &method.namespace_name, &method.name)
    }
}

fn property_tag(property: &PropertyDecl) -> Tag {
    Tag {
        return_type: property.type_hint.clone(),
        comment: property.comment.clone(),
        visibility: property.visibility,
        is_static: property.is_static,
        line: property.line,
        ..Tag::member(TagType::Member, &property.class_name, &property.namespace_name, &property.name)
    }
}

/// Class constants become members; `const` and `define()` become defines
/// whose signature holds the value as written.
fn constant_tag(constant: &ConstantDecl) -> Tag {
    let base = if constant.class_name.is_empty() {
        Tag {
            namespace_name: constant.namespace_name.clone(),
            ..Tag::new(TagType::Define, constant.name.clone())
        }
    } else {
        Tag {
            is_static: true,
            ..Tag::member(
                TagType::ClassConstant,
                &constant.class_name,
                &constant.namespace_name,
                &constant.name,
            )
        }
    };
    Tag {
        signature: constant.value.clone(),
        comment: constant.comment.clone(),
        visibility: constant.visibility,
        line: constant.line,
        ..base
    }
}

fn function_tag(function: &FunctionDecl) -> Tag {
    Tag {
        namespace_name: function.namespace_name.clone(),
        signature: function.signature.clone(),
        return_type: function.return_type.clone(),
        comment: function.comment.clone(),
        has_variable_args: function.params.iter().any(|p| p.variadic),
        line: function.line,
        ..Tag::new(TagType::Function, function.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TagConfig;
    use crate::parser::scan_string;

    fn tags_of(source: &str) -> Vec<Tag> {
        build_tags(&scan_string(source, &TagConfig::default()), "/p/a.php")
    }

    #[test]
    fn test_class_members_become_tags() {
        let tags = tags_of(
            r#"<?php
namespace Util;

class MyClass extends Base {
    use Helper;
    const MAX = 10;
    private static $count = 0;
    public function work(int ...$items): array { return $items; }
}
"#,
        );

        let summary: Vec<(TagType, &str)> = tags.iter().map(|t| (t.tag_type, t.key.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (TagType::Namespace, "\\Util"),
                (TagType::Class, "MyClass"),
                (TagType::ClassConstant, "MyClass::MAX"),
                (TagType::Member, "MyClass::count"),
                (TagType::Method, "MyClass::work"),
            ]
        );

        let class = &tags[1];
        assert_eq!(class.parent_class, "\\Util\\Base");
        assert_eq!(class.traits, vec!["\\Util\\Helper".to_string()]);
        assert!(tags[3].is_static);
        assert!(tags[4].has_variable_args);
        assert_eq!(tags[4].namespace_name, "\\Util");
        assert!(tags.iter().all(|t| t.full_path == "/p/a.php"));
    }

    #[test]
    fn test_functions_and_defines() {
        let tags = tags_of("<?php\nfunction helper($a, $b = 2) {}\ndefine('VERSION', '1.0');\n");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].tag_type, TagType::Function);
        assert_eq!(tags[0].signature, "($a, $b = 2)");
        assert_eq!(tags[1].tag_type, TagType::Define);
        assert_eq!(tags[1].identifier, "VERSION");
    }

    #[test]
    fn test_argument_introspection_marks_variable_args() {
        let tags = tags_of(
            "<?php\nfunction sum() { return array_sum(func_get_args()); }\nfunction plain($a) { $f = function () { return func_get_args(); }; }\n",
        );
        assert!(tags[0].has_variable_args);
        assert!(!tags[1].has_variable_args);
    }

    #[test]
    fn test_repeated_namespace_tagged_once() {
        let tags = tags_of("<?php\nnamespace A { class X {} }\nnamespace A { class Y {} }\n");
        let namespaces = tags.iter().filter(|t| t.tag_type == TagType::Namespace).count();
        assert_eq!(namespaces, 1);
    }
}
