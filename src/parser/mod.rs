//! PHP declaration and expression scanner.
//!
//! [`Parser`] drives the [`Lexer`] and yields a lazy, single-pass stream of
//! [`ParseEvent`]s, one top-level statement at a time. Consumers (the tag
//! extractor, the symbol table and the lint engines) pick the events they
//! need. Malformed input never aborts the scan; unrecognized tokens are
//! skipped and the stream simply carries fewer events.

pub(crate) mod ast;
mod emit;
pub mod expression;
mod expressions;
pub mod language;
pub mod lint;
pub mod names;
mod statements;

use std::collections::VecDeque;
use std::io;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{PhpVersion, TagConfig};
use crate::lexer::{Lexer, Token, TokenKind};

pub use expression::{parse_expression, ChainMember, ChainSubject, ExpressionChain, MemberKind};
pub use names::{NameContext, UseKind};

/// Member visibility; PHP defaults to public.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "protected" => Some(Visibility::Protected),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

/// A declared function, method or closure parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    /// Name including the `$`
    pub name: String,
    /// Fully qualified type hint, empty when untyped
    pub type_hint: String,
    pub by_ref: bool,
    pub variadic: bool,
    pub default: Option<String>,
}

impl Param {
    pub fn is_required(&self) -> bool {
        self.default.is_none() && !self.variadic
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassKind {
    Class,
    Interface,
    Trait,
    Enum,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    pub namespace_name: String,
    pub kind: ClassKind,
    /// Fully qualified parent, empty when the class extends nothing
    pub parent: String,
    pub interfaces: Vec<String>,
    pub is_abstract: bool,
    pub is_final: bool,
    pub comment: String,
    pub line: usize,
    pub offset: usize,
}

impl ClassDecl {
    pub fn fully_qualified_name(&self) -> String {
        names::join_namespace(&self.namespace_name, &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub class_name: String,
    pub namespace_name: String,
    pub name: String,
    pub params: Vec<Param>,
    /// Parameter list as written, whitespace collapsed
    pub signature: String,
    pub return_type: String,
    pub comment: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub line: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDecl {
    pub class_name: String,
    pub namespace_name: String,
    /// Name without the `$`
    pub name: String,
    pub type_hint: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub comment: String,
    pub line: usize,
    pub offset: usize,
}

/// Class constants and enum cases carry their class; `const` statements
/// and `define()` calls carry an empty class name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantDecl {
    pub class_name: String,
    pub namespace_name: String,
    pub name: String,
    pub value: String,
    pub visibility: Visibility,
    pub comment: String,
    pub line: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub namespace_name: String,
    pub params: Vec<Param>,
    pub signature: String,
    pub return_type: String,
    pub comment: String,
    pub line: usize,
    pub offset: usize,
}

impl FunctionDecl {
    pub fn fully_qualified_name(&self) -> String {
        names::join_namespace(&self.namespace_name, &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseDecl {
    pub kind: UseKind,
    /// Fully qualified imported name
    pub name: String,
    pub alias: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureUse {
    pub name: String,
    pub by_ref: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureDecl {
    pub params: Vec<Param>,
    pub uses: Vec<ClosureUse>,
    pub is_arrow: bool,
    pub is_static: bool,
    pub line: usize,
    pub offset: usize,
}

/// What was assigned to a variable, as far as the scanner can tell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignedValue {
    /// `new Foo`, fully qualified
    New(String),
    /// Result of a variable, call or member chain
    Chain(ExpressionChain),
    /// One element of an iterated chain (`foreach ($chain as $v)`)
    Element(ExpressionChain),
    /// Declared parameter or catch type
    TypeHint(String),
    /// `@var` doc comment type
    DocType(String),
    Literal(LiteralType),
    Closure,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiteralType {
    String,
    Integer,
    Float,
    Boolean,
    Null,
    Array,
}

impl LiteralType {
    pub fn type_name(&self) -> &'static str {
        match self {
            LiteralType::String => "string",
            LiteralType::Integer => "int",
            LiteralType::Float => "float",
            LiteralType::Boolean => "bool",
            LiteralType::Null => "null",
            LiteralType::Array => "array",
        }
    }
}

/// A call argument. Only bare variables and string literals are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub variable: Option<String>,
    pub string_literal: Option<String>,
    pub is_spread: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncludeKind {
    Include,
    IncludeOnce,
    Require,
    RequireOnce,
    Eval,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpressionKind {
    VariableRead {
        name: String,
    },
    VariableWrite {
        name: String,
        value: AssignedValue,
        by_ref: bool,
    },
    MemberAccess {
        chain: ExpressionChain,
        is_write: bool,
    },
    FunctionCall {
        /// As written
        name: String,
        /// Namespaced candidate
        fqn: String,
        /// Unqualified call inside a namespace; `\name` is tried next
        global_fallback: bool,
        args: Vec<Argument>,
    },
    New {
        /// Fully qualified; empty for anonymous or computed classes
        class_name: String,
        args: Vec<Argument>,
    },
    Instanceof {
        class_name: String,
    },
    Include {
        kind: IncludeKind,
    },
    Isset {
        variables: Vec<String>,
        is_empty: bool,
    },
    Global {
        name: String,
    },
    StaticVariable {
        name: String,
    },
    Operator {
        op: String,
    },
    ArrayLiteral {
        count: usize,
    },
    /// A class named outside an expression chain (catch clauses)
    TypeReference {
        class_name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub line: usize,
    pub offset: usize,
}

/// One construct recognized by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseEvent {
    Namespace {
        name: String,
        line: usize,
        offset: usize,
    },
    Use(UseDecl),
    ClassFound(ClassDecl),
    ClassEnd {
        /// Fully qualified
        name: String,
        offset: usize,
    },
    TraitUsed {
        class_name: String,
        trait_name: String,
        line: usize,
    },
    MethodFound(MethodDecl),
    PropertyFound(PropertyDecl),
    ConstantFound(ConstantDecl),
    FunctionFound(FunctionDecl),
    /// Closes the last `MethodFound` or `FunctionFound`
    FunctionEnd {
        offset: usize,
    },
    ClosureStart(ClosureDecl),
    ClosureEnd {
        offset: usize,
    },
    VariableDocType {
        variable: String,
        type_name: String,
        line: usize,
    },
    Expression(Expression),
}

/// A significant token plus the doc comment that preceded it
#[derive(Debug, Clone)]
pub(crate) struct Tok {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub offset: usize,
    pub byte_offset: usize,
    pub doc: Option<String>,
}

impl Tok {
    fn from_token(token: &Token, kind: TokenKind, doc: Option<String>) -> Self {
        Self {
            kind,
            text: token.text.clone(),
            line: token.line,
            offset: token.offset,
            byte_offset: token.byte_offset,
            doc,
        }
    }

    pub fn end_offset(&self) -> usize {
        self.offset + self.text.chars().count()
    }

    pub fn end_byte(&self) -> usize {
        self.byte_offset + self.text.len()
    }

    pub fn is_name_like(&self) -> bool {
        self.kind == TokenKind::Identifier || self.kind.is_keyword()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ClassContext {
    pub name: String,
    pub fqn: String,
    pub parent: String,
}

static RETURN_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@return\s+([^\s*]+)").expect("@return pattern"));

static VAR_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@var\s+(?:([^\s$*]+)\s+(\$\w+)|(\$\w+)\s+([^\s*]+)|([^\s$*]+))")
        .expect("@var pattern")
});

/// `@return` type of a doc comment, as written
pub fn doc_return_type(comment: &str) -> Option<String> {
    RETURN_TAG.captures(comment).map(|c| c[1].to_string())
}

/// `@var` tags of a doc comment as (variable, type); the variable is empty
/// for the bare `@var Type` form used on properties.
pub fn doc_var_types(comment: &str) -> Vec<(String, String)> {
    VAR_TAG
        .captures_iter(comment)
        .filter_map(|c| {
            if let (Some(t), Some(v)) = (c.get(1), c.get(2)) {
                Some((v.as_str().to_string(), t.as_str().to_string()))
            } else if let (Some(v), Some(t)) = (c.get(3), c.get(4)) {
                Some((v.as_str().to_string(), t.as_str().to_string()))
            } else {
                c.get(5).map(|t| (String::new(), t.as_str().to_string()))
            }
        })
        .collect()
}

/// Lazy event producer over one source buffer
pub struct Parser {
    lexer: Lexer,
    lookahead: VecDeque<Tok>,
    pending_doc: Option<String>,
    last_end_offset: usize,
    last_end_byte: usize,
    consumed: usize,
    names: NameContext,
    classes: Vec<ClassContext>,
    queue: VecDeque<ParseEvent>,
    sinks: Vec<Vec<ParseEvent>>,
    halted: bool,
    done: bool,
}

impl Parser {
    pub fn new(lexer: Lexer) -> Self {
        Self {
            lexer,
            lookahead: VecDeque::new(),
            pending_doc: None,
            last_end_offset: 0,
            last_end_byte: 0,
            consumed: 0,
            names: NameContext::default(),
            classes: Vec::new(),
            queue: VecDeque::new(),
            sinks: Vec::new(),
            halted: false,
            done: false,
        }
    }

    /// Scanner over a whole document (markup mode until the first open tag)
    pub fn for_source(source: &str, config: &TagConfig) -> Self {
        Self::new(
            Lexer::new(source)
                .with_version(config.version)
                .with_short_tags(config.short_open_tags),
        )
    }

    pub fn from_file(path: impl AsRef<Path>, config: &TagConfig) -> io::Result<Self> {
        let lexer = Lexer::open_file(path)?
            .with_version(config.version)
            .with_short_tags(config.short_open_tags);
        Ok(Self::new(lexer))
    }

    /// The namespace and imports in effect at the current position
    pub fn names(&self) -> &NameContext {
        &self.names
    }

    fn source_slice(&self, start_byte: usize, end_byte: usize) -> &str {
        let source = self.lexer.source();
        let end = end_byte.min(source.len());
        source.get(start_byte.min(end)..end).unwrap_or("")
    }

    fn fill(&mut self, n: usize) {
        while self.lookahead.len() <= n {
            if self.halted {
                let end = Tok {
                    kind: TokenKind::End,
                    text: String::new(),
                    line: self.lexer.line(),
                    offset: self.last_end_offset,
                    byte_offset: self.last_end_byte,
                    doc: None,
                };
                self.lookahead.push_back(end);
                continue;
            }
            let kind = self.lexer.next_token();
            let token = self.lexer.token();
            let tok = match kind {
                TokenKind::Comment | TokenKind::InlineHtml | TokenKind::OpenTag => continue,
                TokenKind::DocComment => {
                    self.pending_doc = Some(token.text.clone());
                    continue;
                }
                TokenKind::CloseTag => Tok::from_token(token, TokenKind::Semicolon, None),
                TokenKind::OpenTagWithEcho => Tok::from_token(token, TokenKind::Echo, None),
                _ => {
                    let doc = self.pending_doc.take();
                    Tok::from_token(token, kind, doc)
                }
            };
            self.lookahead.push_back(tok);
        }
    }

    pub(crate) fn peek(&mut self) -> &Tok {
        self.peek_at(0)
    }

    pub(crate) fn peek_at(&mut self, n: usize) -> &Tok {
        self.fill(n);
        &self.lookahead[n]
    }

    pub(crate) fn peek_kind(&mut self) -> TokenKind {
        self.peek_at(0).kind
    }

    pub(crate) fn nth_kind(&mut self, n: usize) -> TokenKind {
        self.peek_at(n).kind
    }

    pub(crate) fn at(&mut self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    pub(crate) fn bump(&mut self) -> Tok {
        self.fill(0);
        match self.lookahead.pop_front() {
            Some(tok) if tok.kind == TokenKind::End => {
                self.lookahead.push_front(tok.clone());
                tok
            }
            Some(tok) => {
                self.consumed += 1;
                self.last_end_offset = tok.end_offset();
                self.last_end_byte = tok.end_byte();
                tok
            }
            None => unreachable!("fill guarantees one token"),
        }
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Char offset just past the last consumed token
    pub(crate) fn last_end(&self) -> usize {
        self.last_end_offset
    }

    /// Stops the scan after `__halt_compiler`; the rest of the buffer is data.
    pub(crate) fn halt(&mut self) {
        self.halted = true;
        self.lookahead.clear();
    }

    pub(crate) fn emit(&mut self, event: ParseEvent) {
        match self.sinks.last_mut() {
            Some(sink) => sink.push(event),
            None => self.queue.push_back(event),
        }
    }

    pub(crate) fn emit_expression(&mut self, kind: ExpressionKind, line: usize, offset: usize) {
        self.emit(ParseEvent::Expression(Expression { kind, line, offset }));
    }

    /// Parses one top-level statement, guaranteeing progress.
    fn advance(&mut self) {
        if self.at(TokenKind::End) {
            self.done = true;
            return;
        }
        self.statement();
    }
}

impl Iterator for Parser {
    type Item = ParseEvent;

    fn next(&mut self) -> Option<ParseEvent> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some(event);
            }
            if self.done {
                return None;
            }
            self.advance();
        }
    }
}

/// Scans a whole document and collects its events.
pub fn scan_string(source: &str, config: &TagConfig) -> Vec<ParseEvent> {
    Parser::for_source(source, config).collect()
}

pub fn scan_file(path: impl AsRef<Path>, config: &TagConfig) -> io::Result<Vec<ParseEvent>> {
    Ok(Parser::from_file(path, config)?.collect())
}

/// Scanner over a snippet with no open tag, used by expression parsing
pub(crate) fn snippet_parser(source: &str, version: PhpVersion) -> Parser {
    Parser::new(Lexer::php(source).with_version(version))
}

/// Collapses whitespace runs and trims padding inside parentheses.
pub(crate) fn normalize_signature(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.replace("( ", "(").replace(" )", ")")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<ParseEvent> {
        scan_string(source, &TagConfig::default())
    }

    fn expressions(events: &[ParseEvent]) -> Vec<&ExpressionKind> {
        events
            .iter()
            .filter_map(|e| match e {
                ParseEvent::Expression(expr) => Some(&expr.kind),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_class_with_members() {
        let events = scan(
            r#"<?php
namespace Util;

/** A class */
abstract class MyClass extends Base implements \Countable {
    const MAX = 10;
    public static $count = 0;
    protected ?Foo $foo;

    /**
     * @return string
     */
    public function name($a, $b = 1) {
        return $a;
    }

    abstract protected function work(int ...$items): array;
}
"#,
        );

        let class = events
            .iter()
            .find_map(|e| match e {
                ParseEvent::ClassFound(c) => Some(c),
                _ => None,
            })
            .unwrap();
        assert_eq!(class.name, "MyClass");
        assert_eq!(class.namespace_name, "\\Util");
        assert_eq!(class.parent, "\\Util\\Base");
        assert_eq!(class.interfaces, vec!["\\Countable".to_string()]);
        assert!(class.is_abstract);
        assert!(class.comment.contains("A class"));

        let methods: Vec<&MethodDecl> = events
            .iter()
            .filter_map(|e| match e {
                ParseEvent::MethodFound(m) => Some(m),
                _ => None,
            })
            .collect();
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].name, "name");
        assert_eq!(methods[0].signature, "($a, $b = 1)");
        assert_eq!(methods[0].return_type, "string");
        assert_eq!(methods[0].params.len(), 2);
        assert!(methods[0].params[0].is_required());
        assert!(!methods[0].params[1].is_required());
        assert_eq!(methods[1].visibility, Visibility::Protected);
        assert!(methods[1].is_abstract);
        assert_eq!(methods[1].return_type, "array");
        assert!(methods[1].params[0].variadic);

        let props: Vec<&PropertyDecl> = events
            .iter()
            .filter_map(|e| match e {
                ParseEvent::PropertyFound(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(props.len(), 2);
        assert_eq!(props[0].name, "count");
        assert!(props[0].is_static);
        assert_eq!(props[1].type_hint, "\\Util\\Foo");

        assert!(events.iter().any(|e| matches!(e,
            ParseEvent::ConstantFound(c) if c.name == "MAX" && c.class_name == "MyClass")));
        assert!(events.iter().any(|e| matches!(e,
            ParseEvent::ClassEnd { name, .. } if name == "\\Util\\MyClass")));
    }

    #[test]
    fn test_functions_and_defines() {
        let events = scan(
            "<?php\nfunction format_date(string $format, $timestamp = now()) {}\ndefine('APP_VERSION', '1.0');\nconst LIMIT = 5;",
        );
        let function = events
            .iter()
            .find_map(|e| match e {
                ParseEvent::FunctionFound(f) => Some(f),
                _ => None,
            })
            .unwrap();
        assert_eq!(function.name, "format_date");
        assert_eq!(function.signature, "(string $format, $timestamp = now())");
        assert_eq!(function.params[1].default.as_deref(), Some("now()"));

        let constants: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                ParseEvent::ConstantFound(c) if c.class_name.is_empty() => Some(c.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(constants, vec!["APP_VERSION", "LIMIT"]);
    }

    #[test]
    fn test_use_statements_resolve_new() {
        let events = scan(
            "<?php\nnamespace App;\nuse Util\\MyClass as UtilClass;\nuse Util\\{A, B as Bee};\n$a = new UtilClass();\n$b = new \\Util\\MyClass();",
        );
        let uses: Vec<&UseDecl> = events
            .iter()
            .filter_map(|e| match e {
                ParseEvent::Use(u) => Some(u),
                _ => None,
            })
            .collect();
        assert_eq!(uses.len(), 3);
        assert_eq!(uses[2].name, "\\Util\\B");
        assert_eq!(uses[2].alias, "Bee");

        let news: Vec<&str> = expressions(&events)
            .into_iter()
            .filter_map(|k| match k {
                ExpressionKind::New { class_name, .. } => Some(class_name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(news, vec!["\\Util\\MyClass", "\\Util\\MyClass"]);
    }

    #[test]
    fn test_assignment_events_in_order() {
        let events = scan("<?php function f() { $a = new Foo(); $b = $a->make(); echo $c; }");
        let kinds = expressions(&events);
        assert!(matches!(kinds[0], ExpressionKind::New { class_name, .. } if class_name == "\\Foo"));
        assert!(matches!(kinds[1],
            ExpressionKind::VariableWrite { name, value: AssignedValue::New(c), .. } if name == "$a" && c == "\\Foo"));
        assert!(matches!(kinds[2], ExpressionKind::VariableRead { name } if name == "$a"));
        assert!(matches!(kinds[3], ExpressionKind::MemberAccess { chain, is_write: false } if chain.members[0].name == "make"));
        assert!(matches!(kinds[4],
            ExpressionKind::VariableWrite { name, value: AssignedValue::Chain(_), .. } if name == "$b"));
        assert!(matches!(kinds[5], ExpressionKind::VariableRead { name } if name == "$c"));
    }

    #[test]
    fn test_closure_body_is_spliced_in_place() {
        let events = scan("<?php $x = 1; $f = function ($y) use ($x, &$z) { return $y; }; $w = 2;");
        let start = events
            .iter()
            .position(|e| matches!(e, ParseEvent::ClosureStart(_)))
            .unwrap();
        let end = events
            .iter()
            .position(|e| matches!(e, ParseEvent::ClosureEnd { .. }))
            .unwrap();
        assert!(start < end);
        assert!(matches!(&events[start + 1],
            ParseEvent::Expression(Expression { kind: ExpressionKind::VariableRead { name }, .. }) if name == "$y"));
        match &events[start] {
            ParseEvent::ClosureStart(decl) => {
                assert_eq!(decl.params[0].name, "$y");
                assert_eq!(decl.uses.len(), 2);
                assert!(decl.uses[1].by_ref);
            }
            _ => unreachable!(),
        }
        // $f is written after the closure is emitted, $w after that
        let writes: Vec<&str> = expressions(&events)
            .into_iter()
            .filter_map(|k| match k {
                ExpressionKind::VariableWrite { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(writes, vec!["$x", "$z", "$f", "$w"]);
    }

    #[test]
    fn test_doc_var_types_inside_bodies() {
        let events = scan("<?php function f() {\n/** @var \\App\\User $user */\n$user = load();\n}");
        assert!(events.iter().any(|e| matches!(e,
            ParseEvent::VariableDocType { variable, type_name, .. } if variable == "$user" && type_name == "\\App\\User")));
    }

    #[test]
    fn test_html_and_echo_tags() {
        let events = scan("<p><?= $title ?></p><?php if ($a): ?><b><?php endif; ?>");
        let reads: Vec<&str> = expressions(&events)
            .into_iter()
            .filter_map(|k| match k {
                ExpressionKind::VariableRead { name } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(reads, vec!["$title", "$a"]);
    }

    #[test]
    fn test_halt_compiler_stops_scan() {
        let events = scan("<?php class A {} __halt_compiler(); class B {}");
        let classes = events
            .iter()
            .filter(|e| matches!(e, ParseEvent::ClassFound(_)))
            .count();
        assert_eq!(classes, 1);
    }

    #[test]
    fn test_scan_file_matches_scan_string() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.php");
        let source = "<?php\nnamespace App;\nfunction helper($x) { return $x; }\n";
        std::fs::write(&path, source).unwrap();

        assert_eq!(scan_file(&path, &TagConfig::default()).unwrap(), scan(source));
        assert!(scan_file(dir.path().join("missing.php"), &TagConfig::default()).is_err());
    }

    #[test]
    fn test_malformed_input_yields_partial_events() {
        let events = scan("<?php class A { function ok() {} function ( } class B {}");
        assert!(events.iter().any(|e| matches!(e, ParseEvent::ClassFound(c) if c.name == "A")));
    }

    #[test]
    fn test_enum_cases_and_trait_use() {
        let events = scan("<?php enum Suit: string { use Describes; case Hearts = 'H'; case Spades = 'S'; }");
        let cases = events
            .iter()
            .filter(|e| matches!(e, ParseEvent::ConstantFound(c) if c.class_name == "Suit"))
            .count();
        assert_eq!(cases, 2);
        assert!(events.iter().any(|e| matches!(e,
            ParseEvent::TraitUsed { trait_name, .. } if trait_name == "\\Describes")));
    }

    #[test]
    fn test_doc_tags() {
        assert_eq!(doc_return_type("/** @return Foo|null */").as_deref(), Some("Foo|null"));
        assert_eq!(
            doc_var_types("/** @var Foo $a */"),
            vec![("$a".to_string(), "Foo".to_string())]
        );
        assert_eq!(
            doc_var_types("/** @var $b Bar */"),
            vec![("$b".to_string(), "Bar".to_string())]
        );
        assert_eq!(doc_var_types("/** @var int */"), vec![(String::new(), "int".to_string())]);
    }

    #[test]
    fn test_normalize_signature() {
        assert_eq!(normalize_signature("(\n    $a,\n    $b = 2\n)"), "($a, $b = 2)");
    }
}
