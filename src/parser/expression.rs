//! Expression chains: `$obj->prop->method()`, `Foo::bar()`, `self::X`.
//!
//! Chains come from two places. The scanner attaches them to member-access
//! events with class names already resolved, and [`parse_expression`]
//! re-parses the text in front of the cursor, where the last member may be
//! empty because the user has only typed `->` or `::` so far.

use serde::{Deserialize, Serialize};

use super::ast::{Arg, ClassRef, Expr, LiteralKind};
use super::names::NameContext;
use super::{snippet_parser, Argument};
use crate::config::PhpVersion;
use crate::lexer::{Lexer, TokenKind};

/// What the chain starts from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainSubject {
    /// Nothing to resolve (empty or unparseable text)
    None,
    /// `$name`, including the `$`
    Variable(String),
    /// A bare name that may be a class, function or constant
    Name(String),
    /// The class of a `Name::` access
    Class(String),
    SelfClass,
    Parent,
    Static,
    /// Result of calling `name()`
    Function(String),
    /// `new Name`
    New(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberKind {
    Property,
    Method,
    Constant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMember {
    /// Name without `$`; empty for a trailing `->` or `::`
    pub name: String,
    pub kind: MemberKind,
    pub is_static: bool,
    pub args: Vec<Argument>,
    /// The member's value is indexed with `[...]`
    pub array_access: bool,
}

impl ChainMember {
    pub fn new(name: impl Into<String>, kind: MemberKind, is_static: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            is_static,
            args: Vec::new(),
            array_access: false,
        }
    }

    pub fn has_spread(&self) -> bool {
        self.args.iter().any(|a| a.is_spread)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionChain {
    pub subject: ChainSubject,
    pub subject_array_access: bool,
    pub members: Vec<ChainMember>,
}

impl Default for ExpressionChain {
    fn default() -> Self {
        Self::new(ChainSubject::None)
    }
}

impl ExpressionChain {
    pub fn new(subject: ChainSubject) -> Self {
        Self {
            subject,
            subject_array_access: false,
            members: Vec::new(),
        }
    }

    pub fn with_member(mut self, member: ChainMember) -> Self {
        self.members.push(member);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.subject == ChainSubject::None && self.members.is_empty()
    }

    /// True when the text ended in `->` or `::` with nothing typed after it
    pub fn is_partial(&self) -> bool {
        self.members.last().map_or(false, |m| m.name.is_empty())
    }

    pub fn last_member(&self) -> Option<&ChainMember> {
        self.members.last()
    }

    /// The chain without its last member
    pub fn prefix(&self) -> ExpressionChain {
        let mut prefix = self.clone();
        prefix.members.pop();
        prefix
    }

    /// Variable subject name, if any
    pub fn variable(&self) -> Option<&str> {
        match &self.subject {
            ChainSubject::Variable(name) => Some(name),
            _ => None,
        }
    }
}

/// Strips the quotes off a single- or double-quoted literal.
pub(crate) fn unquote(text: &str) -> String {
    let trimmed = text.trim();
    let bytes = trimmed.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'\'' || bytes[0] == b'"')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

pub(crate) fn to_argument(arg: &Arg) -> Argument {
    match &arg.value {
        Expr::Variable { name, .. } => Argument {
            variable: Some(name.clone()),
            string_literal: None,
            is_spread: arg.spread,
        },
        Expr::Literal {
            kind: LiteralKind::String,
            text,
            ..
        } => Argument {
            variable: None,
            string_literal: Some(unquote(text)),
            is_spread: arg.spread,
        },
        _ => Argument {
            variable: None,
            string_literal: None,
            is_spread: arg.spread,
        },
    }
}

fn resolve(names: Option<&NameContext>, name: &str) -> String {
    match names {
        Some(names) => names.resolve_class(name),
        None => name.to_string(),
    }
}

fn class_subject(class: &Expr, names: Option<&NameContext>) -> Option<ExpressionChain> {
    match class {
        Expr::Name { name, .. } => {
            let subject = match name.to_ascii_lowercase().as_str() {
                "self" => ChainSubject::SelfClass,
                "parent" => ChainSubject::Parent,
                "static" => ChainSubject::Static,
                _ => ChainSubject::Class(resolve(names, name)),
            };
            Some(ExpressionChain::new(subject))
        }
        other => chain_from_expr(other, names),
    }
}

fn member_name(name: &Option<String>) -> Option<String> {
    name.as_ref().map(|n| n.trim_start_matches('$').to_string())
}

/// Builds a chain from a parsed expression. Class names are resolved when
/// a name context is given. Computed member names yield `None`.
pub(crate) fn chain_from_expr(expr: &Expr, names: Option<&NameContext>) -> Option<ExpressionChain> {
    match expr {
        Expr::Variable { name, .. } => Some(ExpressionChain::new(ChainSubject::Variable(name.clone()))),
        Expr::Name { name, .. } => Some(ExpressionChain::new(ChainSubject::Name(name.clone()))),
        Expr::Call { callee, .. } => match callee.as_ref() {
            Expr::Name { name, .. } => Some(ExpressionChain::new(ChainSubject::Function(name.clone()))),
            _ => None,
        },
        Expr::New {
            class: ClassRef::Named(name),
            ..
        } => Some(ExpressionChain::new(ChainSubject::New(resolve(names, name)))),
        Expr::PropertyFetch { object, name, .. } => {
            let chain = chain_from_expr(object, names)?;
            Some(chain.with_member(ChainMember::new(member_name(name)?, MemberKind::Property, false)))
        }
        Expr::MethodCall {
            object, name, args, ..
        } => {
            let chain = chain_from_expr(object, names)?;
            let mut member = ChainMember::new(member_name(name)?, MemberKind::Method, false);
            member.args = args.iter().map(to_argument).collect();
            Some(chain.with_member(member))
        }
        Expr::StaticProperty { class, name, .. } => {
            let chain = class_subject(class, names)?;
            Some(chain.with_member(ChainMember::new(member_name(name)?, MemberKind::Property, true)))
        }
        Expr::StaticCall {
            class, name, args, ..
        } => {
            let chain = class_subject(class, names)?;
            let mut member = ChainMember::new(member_name(name)?, MemberKind::Method, true);
            member.args = args.iter().map(to_argument).collect();
            Some(chain.with_member(member))
        }
        Expr::ClassConst { class, name, .. } => {
            let chain = class_subject(class, names)?;
            Some(chain.with_member(ChainMember::new(name.clone(), MemberKind::Constant, true)))
        }
        Expr::ArrayAccess { base, .. } => {
            let mut chain = chain_from_expr(base, names)?;
            match chain.members.last_mut() {
                Some(last) => last.array_access = true,
                None => chain.subject_array_access = true,
            }
            Some(chain)
        }
        Expr::Assign { value, .. } => chain_from_expr(value, names),
        _ => None,
    }
}

/// A significant token of the cursor text
#[derive(Debug, Clone, Copy)]
struct Lexed {
    kind: TokenKind,
    start: usize,
    end: usize,
}

fn significant_tokens(text: &str, version: PhpVersion) -> Vec<Lexed> {
    let lexer = if text.contains("<?") {
        Lexer::new(text)
    } else {
        Lexer::php(text)
    };
    lexer
        .with_version(version)
        .filter(|t| !t.kind.is_trivia() && t.kind != TokenKind::CloseTag)
        .map(|t| Lexed {
            kind: t.kind,
            start: t.byte_offset,
            end: t.byte_offset + t.text.len(),
        })
        .collect()
}

fn matching_open(tokens: &[Lexed], close: usize) -> Option<usize> {
    let mut depth = 0usize;
    for i in (0..=close).rev() {
        match tokens[i].kind {
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => depth += 1,
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace | TokenKind::Attribute => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_operand_end(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Identifier
            | TokenKind::Variable
            | TokenKind::Static
            | TokenKind::RParen
            | TokenKind::RBracket
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Want {
    Operand,
    Operator { after_name: bool },
    NameSegment,
}

/// Walks back from the end of the token list to where the trailing chain
/// starts.
fn chain_start(tokens: &[Lexed]) -> usize {
    let mut i = tokens.len();
    let mut want = Want::Operand;
    while i > 0 {
        let kind = tokens[i - 1].kind;
        match want {
            Want::Operand => match kind {
                TokenKind::RParen | TokenKind::RBracket => {
                    let Some(open) = matching_open(tokens, i - 1) else {
                        break;
                    };
                    i = open;
                    if open == 0 || !is_operand_end(tokens[open - 1].kind) {
                        break;
                    }
                }
                TokenKind::Identifier | TokenKind::Static => {
                    i -= 1;
                    want = Want::Operator { after_name: true };
                }
                TokenKind::Variable => {
                    i -= 1;
                    want = Want::Operator { after_name: false };
                }
                _ => break,
            },
            Want::Operator { after_name } => match kind {
                TokenKind::Arrow | TokenKind::NullsafeArrow | TokenKind::DoubleColon => {
                    i -= 1;
                    want = Want::Operand;
                }
                TokenKind::NsSeparator if after_name => {
                    i -= 1;
                    want = Want::NameSegment;
                }
                TokenKind::New if after_name => {
                    i -= 1;
                    break;
                }
                _ => break,
            },
            Want::NameSegment => match kind {
                TokenKind::Identifier | TokenKind::Namespace => {
                    i -= 1;
                    want = Want::Operator { after_name: true };
                }
                _ => break,
            },
        }
    }
    i
}

/// Parses the expression ending at the end of `text`, typically the text in
/// front of the cursor. A trailing `->` or `::` yields a chain whose last
/// member has an empty name.
pub fn parse_expression(text: &str) -> ExpressionChain {
    parse_expression_with_version(text, PhpVersion::default())
}

pub fn parse_expression_with_version(text: &str, version: PhpVersion) -> ExpressionChain {
    let mut tokens = significant_tokens(text, version);
    let Some(last) = tokens.last().copied() else {
        return ExpressionChain::default();
    };

    match last.kind {
        TokenKind::Dollar => return ExpressionChain::new(ChainSubject::Variable("$".to_string())),
        TokenKind::NsSeparator => {
            let start = chain_start(&tokens[..tokens.len() - 1]);
            let begin = tokens.get(start).map_or(last.start, |t| t.start);
            let name = &text[begin..last.end];
            return ExpressionChain::new(ChainSubject::Name(name.trim_start_matches("new").trim().to_string()));
        }
        _ => {}
    }

    let partial = match last.kind {
        TokenKind::Arrow | TokenKind::NullsafeArrow => Some(false),
        TokenKind::DoubleColon => Some(true),
        _ => None,
    };
    if partial.is_some() {
        tokens.pop();
    }
    if tokens.is_empty() {
        return ExpressionChain::default();
    }

    let start = chain_start(&tokens);
    if start >= tokens.len() {
        return ExpressionChain::default();
    }
    let end = tokens[tokens.len() - 1].end;
    let snippet = &text[tokens[start].start..end];
    let mut parser = snippet_parser(snippet, version);
    let expr = parser.expression();

    let Some(mut chain) = chain_from_expr(&expr, None) else {
        return ExpressionChain::default();
    };
    if let Some(is_static) = partial {
        let kind = if is_static {
            MemberKind::Constant
        } else {
            MemberKind::Property
        };
        if let ChainSubject::Name(name) = &chain.subject {
            if chain.members.is_empty() {
                chain.subject = match name.to_ascii_lowercase().as_str() {
                    "self" => ChainSubject::SelfClass,
                    "parent" => ChainSubject::Parent,
                    "static" => ChainSubject::Static,
                    _ => ChainSubject::Class(name.clone()),
                };
            }
        }
        chain.members.push(ChainMember::new("", kind, is_static));
    }
    chain
}
