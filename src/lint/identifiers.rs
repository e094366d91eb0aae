// Unknown class, function and member references

use std::collections::HashSet;

use crate::parser::names::is_reserved_type;
use crate::parser::{ChainSubject, ExpressionChain, ExpressionKind, MemberKind, Param, ParseEvent};
use crate::query::resolver::{kind_matches, type_parts};

use super::{display_name, IdentifierKind, LintContext, LintEngine, LintResult};

/// Language constructs that look like function calls
const CONSTRUCTS: &[&str] = &[
    "array", "list", "isset", "empty", "unset", "eval", "exit", "die", "echo", "print", "include",
    "include_once", "require", "require_once", "__halt_compiler",
];

/// Classes whose instances take any property
const DYNAMIC_CLASSES: &[&str] = &["\\stdclass"];

#[derive(Debug, Default)]
pub struct UnknownIdentifiers {
    /// Member names passed to `method_exists()` or `property_exists()`
    guarded: HashSet<String>,
    /// Property names written somewhere in the file
    written: HashSet<String>,
    results: Vec<LintResult>,
}

impl UnknownIdentifiers {
    fn report(&mut self, kind: IdentifierKind, identifier: String, line: usize, offset: usize) {
        self.results.push(LintResult::UnknownIdentifier {
            kind,
            identifier,
            line,
            offset,
        });
    }

    fn check_class(&mut self, kind: IdentifierKind, fqn: &str, line: usize, offset: usize, cx: &LintContext<'_, '_>) {
        if fqn.is_empty() || is_reserved_type(fqn.trim_start_matches('\\')) {
            return;
        }
        if !cx.class_exists(fqn) {
            self.report(kind, display_name(fqn), line, offset);
        }
    }

    fn check_params(&mut self, params: &[Param], line: usize, offset: usize, cx: &LintContext<'_, '_>) {
        for param in params {
            for part in type_parts(&param.type_hint) {
                self.check_class(IdentifierKind::Class, part, line, offset, cx);
            }
        }
    }

    fn check_chain(
        &mut self,
        chain: &ExpressionChain,
        is_write: bool,
        line: usize,
        offset: usize,
        cx: &LintContext<'_, '_>,
    ) {
        match &chain.subject {
            // the enclosing class is always there, whatever the store holds
            ChainSubject::SelfClass | ChainSubject::Parent | ChainSubject::Static => return,
            ChainSubject::Class(name) => {
                let fqn = cx.view_at(offset).names().resolve_class(name);
                if !is_reserved_type(name) && !cx.class_exists(&fqn) {
                    self.report(IdentifierKind::Class, display_name(&fqn), line, offset);
                    return;
                }
            }
            _ => {}
        }

        let last = chain.members.len().saturating_sub(1);
        for (index, member) in chain.members.iter().enumerate() {
            let name = member.name.as_str();
            if name.is_empty() || name.starts_with("__") {
                return;
            }
            if member.kind == MemberKind::Constant && name.eq_ignore_ascii_case("class") {
                return;
            }
            let lower = name.to_lowercase();
            if member.kind == MemberKind::Property && ((is_write && index == last) || self.written.contains(&lower)) {
                continue;
            }
            let Some(class) = cx.receiver_class(chain, index, offset) else {
                return;
            };
            if DYNAMIC_CLASSES.contains(&class.to_lowercase().as_str()) {
                return;
            }
            let lookup = cx.members(&class, name);
            if lookup.tags.iter().any(|t| kind_matches(t, member)) {
                continue;
            }
            let magic = match (member.kind, member.is_static) {
                (MemberKind::Method, false) => Some("__call"),
                (MemberKind::Method, true) => Some("__callstatic"),
                (MemberKind::Property, false) => Some("__get"),
                _ => None,
            };
            if !lookup.complete || magic.map_or(false, |m| lookup.has_magic(m)) || self.guarded.contains(&lower) {
                return;
            }
            let kind = match member.kind {
                MemberKind::Method => IdentifierKind::Method,
                MemberKind::Property => IdentifierKind::Property,
                MemberKind::Constant => IdentifierKind::Constant,
            };
            self.report(kind, format!("{}::{}", display_name(&class), name), line, offset);
            return;
        }
    }
}

impl LintEngine for UnknownIdentifiers {
    fn observe(&mut self, event: &ParseEvent, cx: &LintContext<'_, '_>) {
        match event {
            ParseEvent::ClassFound(class) => {
                let (line, offset) = (class.line, class.offset);
                self.check_class(IdentifierKind::Class, &class.parent, line, offset, cx);
                for interface in &class.interfaces {
                    self.check_class(IdentifierKind::Interface, interface, line, offset, cx);
                }
            }
            ParseEvent::MethodFound(method) => self.check_params(&method.params, method.line, method.offset, cx),
            ParseEvent::FunctionFound(function) => {
                self.check_params(&function.params, function.line, function.offset, cx)
            }
            ParseEvent::ClosureStart(closure) => {
                self.check_params(&closure.params, closure.line, closure.offset, cx)
            }
            ParseEvent::Expression(expr) => {
                let (line, offset) = (expr.line, expr.offset);
                match &expr.kind {
                    ExpressionKind::New { class_name, .. }
                    | ExpressionKind::Instanceof { class_name }
                    | ExpressionKind::TypeReference { class_name } => {
                        self.check_class(IdentifierKind::Class, class_name, line, offset, cx)
                    }
                    ExpressionKind::FunctionCall {
                        name,
                        fqn,
                        global_fallback,
                        args,
                    } => {
                        let short = name.trim_start_matches('\\').to_ascii_lowercase();
                        if CONSTRUCTS.contains(&short.as_str()) {
                            return;
                        }
                        if short == "method_exists" || short == "property_exists" {
                            if let Some(member) = args.get(1).and_then(|a| a.string_literal.as_deref()) {
                                self.guarded.insert(member.to_lowercase());
                            }
                        }
                        if cx.functions(name, fqn, *global_fallback).is_empty() {
                            self.report(IdentifierKind::Function, display_name(name), line, offset);
                        }
                    }
                    ExpressionKind::MemberAccess { chain, is_write } => {
                        if *is_write {
                            if let Some(last) = chain.last_member().filter(|m| m.kind == MemberKind::Property) {
                                self.written.insert(last.name.to_lowercase());
                            }
                        }
                        self.check_chain(chain, *is_write, line, offset, cx);
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    fn finish(self: Box<Self>) -> Vec<LintResult> {
        self.results
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::config::{LintConfig, TagConfig};
    use crate::index::NativeTags;
    use crate::lint::{LintResult, Linter};

    fn unknown(source: &str) -> Vec<LintResult> {
        let checks = LintConfig {
            check_uninitialized_variables: false,
            check_unknown_identifiers: true,
            check_call_arity: false,
            ..LintConfig::default()
        };
        let linter = Linter::new(TagConfig::default(), checks, Arc::new(NativeTags::bundled().unwrap()));
        linter.lint_string(source, "/p/a.php")
    }

    fn summary(results: &[LintResult]) -> Vec<(&str, &str)> {
        results.iter().map(|r| (r.status_code(), r.identifier())).collect()
    }

    const MY_CLASS: &str = r#"<?php
namespace Util;

class MyClass {
    const MAX = 10;
    public static $count;
    public function work() {}
}
"#;

    #[test]
    fn test_unknown_class() {
        let results = unknown("<?php\nclass MyClass {}\nnew MyClass();\nnew NoneClass();\n");
        assert_eq!(summary(&results), vec![("UNKNOWN_CLASS", "NoneClass")]);
        assert_eq!(results[0].line(), 4);
    }

    #[test]
    fn test_common_builtins_are_known() {
        let source = r#"<?php
function build(array $items) {
    if (version_compare(PHP_VERSION, '8.1.0', '>=')) {
        $doc = new DOMDocument();
        $doc->loadHTML('<p>x</p>');
        $queue = new \SplQueue();
        $queue->enqueue(array_rand([1, 2]));
        $queue->count();
        return iterator_count(new ArrayIterator($items)) + mb_strwidth('x');
    }
    throw new \OutOfBoundsException('old runtime');
}
"#;
        assert_eq!(summary(&unknown(source)), vec![]);
    }

    #[test]
    fn test_self_parent_static_never_unknown() {
        let source = format!(
            "{}{}",
            MY_CLASS,
            r#"
class NextClass extends \Util\MyClass {
    public function __construct() {
        parent::__construct();
        $this->__construct();
        echo self::MISSING_CONST, parent::MAX, static::$nothing;
        parent::gone();
    }
}
"#
        );
        assert!(unknown(&source).is_empty());
    }

    #[test]
    fn test_unknown_members() {
        let source = format!(
            "{}{}",
            MY_CLASS,
            r#"
function run() {
    $obj = new MyClass();
    $obj->work();
    $obj->missing();
    echo MyClass::MAX, MyClass::NOPE, MyClass::$count, MyClass::class;
    $obj->ghost = 1;
    echo $obj->ghost;
}
"#
        );
        let results = unknown(&source);
        assert_eq!(
            summary(&results),
            vec![
                ("UNKNOWN_METHOD", "Util\\MyClass::missing"),
                ("UNKNOWN_CONSTANT", "Util\\MyClass::NOPE"),
            ]
        );
    }

    #[test]
    fn test_magic_and_guarded_members() {
        let source = r#"<?php
class Proxy {
    public function __call($name, $args) {}
    public function __get($name) {}
}
class Plain {}
function run(Proxy $proxy, Plain $plain, $untyped) {
    $proxy->anything();
    $proxy->field;
    $untyped->whatever();
    if (method_exists($plain, 'maybe')) {
        $plain->maybe();
    }
    $plain->nope();
}
"#;
        assert_eq!(summary(&unknown(source)), vec![("UNKNOWN_METHOD", "Plain::nope")]);
    }

    #[test]
    fn test_incomplete_hierarchy_is_skipped() {
        let source = "<?php\nclass Child extends \\Vendor\\Base {}\n$c = new Child();\n$c->inherited();\n";
        assert_eq!(summary(&unknown(source)), vec![("UNKNOWN_CLASS", "Vendor\\Base")]);
    }

    #[test]
    fn test_functions_type_hints_and_interfaces() {
        let source = r#"<?php
namespace App;

interface Known {}
class Impl implements Known, Missing {}
function take(Known $a, ?Absent $b, int $c) {}
strlen('a');
helper();
try {
    take(null, null, 1);
} catch (\Exception | NoSuchException $e) {
}
if ($x instanceof \DateTime) {}
"#;
        let results = unknown(source);
        assert_eq!(
            summary(&results),
            vec![
                ("UNKNOWN_INTERFACE", "App\\Missing"),
                ("UNKNOWN_CLASS", "App\\Absent"),
                ("UNKNOWN_FUNCTION", "helper"),
                ("UNKNOWN_CLASS", "App\\NoSuchException"),
            ]
        );
    }

    #[test]
    fn test_aliased_class_resolves() {
        let source = format!(
            "{}{}",
            MY_CLASS,
            "\nnamespace App;\nuse Util\\MyClass as UtilClass;\n$a = new UtilClass();\n$b = new \\Util\\MyClass();\n$a->work();\n"
        );
        assert!(unknown(&source).is_empty());
    }
}
