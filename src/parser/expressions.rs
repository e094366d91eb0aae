// Pratt parser for PHP expressions. Produces an `Expr` tree; events are
// emitted separately once the whole expression is known.

use super::ast::{Arg, ArrayItem, ArrowFnExpr, ClassRef, ClosureExpr, Expr, LiteralKind, Pos};
use super::{normalize_signature, ClosureDecl, ClosureUse, IncludeKind, Param, Parser, Tok, Visibility};
use crate::lexer::TokenKind;

/// Binding power for the right side of an assignment
const ASSIGN_RBP: u8 = 7;
const NOT_RBP: u8 = 36;
const UNARY_RBP: u8 = 39;

const CASTS: &[&str] = &[
    "int", "integer", "bool", "boolean", "float", "double", "real", "string", "binary", "object",
    "unset",
];

fn infix_power(kind: TokenKind) -> Option<(u8, u8)> {
    use TokenKind::*;
    let power = match kind {
        LogicalOr => (1, 2),
        LogicalXor => (3, 4),
        LogicalAnd => (5, 6),
        Question => (9, 10),
        Coalesce => (11, 11),
        BooleanOr => (13, 14),
        BooleanAnd => (15, 16),
        Pipe => (17, 18),
        Caret => (19, 20),
        Ampersand => (21, 22),
        Equal | NotEqual | Identical | NotIdentical | Spaceship => (23, 24),
        Less | Greater | LessEqual | GreaterEqual => (25, 26),
        Dot => (27, 28),
        ShiftLeft | ShiftRight => (29, 30),
        Plus | Minus => (31, 32),
        Star | Slash | Percent => (33, 34),
        InstanceOf => (37, 38),
        Pow => (39, 39),
        _ => return None,
    };
    Some(power)
}

pub(crate) fn pos_of(tok: &Tok) -> Pos {
    Pos {
        line: tok.line,
        offset: tok.offset,
    }
}

/// Variables interpolated into a double-quoted string or heredoc body
pub(crate) fn interpolated_variables(text: &str) -> Vec<String> {
    let mut variables = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '$' => {
                let starts_name = chars
                    .peek()
                    .map_or(false, |(_, n)| n.is_ascii_alphabetic() || *n == '_' || !n.is_ascii());
                if !starts_name {
                    continue;
                }
                let mut end = i + 1;
                while let Some((j, n)) = chars.peek().copied() {
                    if n.is_ascii_alphanumeric() || n == '_' || !n.is_ascii() {
                        end = j + n.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let name = &text[i..end];
                if !variables.iter().any(|v| v == name) {
                    variables.push(name.to_string());
                }
            }
            _ => {}
        }
    }
    variables
}

fn is_nowdoc(text: &str) -> bool {
    text.trim_start_matches("<<<").trim_start().starts_with('\'')
}

/// Parsed parameter list plus the constructor-promoted properties in it
#[derive(Debug, Default)]
pub(crate) struct ParamList {
    pub params: Vec<Param>,
    pub signature: String,
    pub promoted: Vec<PromotedParam>,
}

#[derive(Debug)]
pub(crate) struct PromotedParam {
    pub param: Param,
    pub visibility: Visibility,
    pub comment: String,
    pub line: usize,
    pub offset: usize,
}

impl Parser {
    pub(crate) fn expression(&mut self) -> Expr {
        self.expr_bp(0)
    }

    fn expr_bp(&mut self, min_bp: u8) -> Expr {
        let mut lhs = self.unary();
        loop {
            let kind = self.peek_kind();
            if kind.is_assignment() {
                if !lhs.is_assignable() {
                    break;
                }
                let op = self.bump();
                let by_ref = kind == TokenKind::Assign && self.eat(TokenKind::Ampersand);
                let value = self.expr_bp(ASSIGN_RBP);
                let pos = lhs.pos();
                lhs = Expr::Assign {
                    target: Box::new(lhs),
                    value: Box::new(value),
                    compound: op.kind == TokenKind::CompoundAssign,
                    by_ref,
                    pos,
                };
                continue;
            }
            let Some((lbp, rbp)) = infix_power(kind) else {
                break;
            };
            if lbp < min_bp {
                break;
            }
            let op = self.bump();
            let pos = lhs.pos();
            lhs = match kind {
                TokenKind::Question => {
                    let then = if self.at(TokenKind::Colon) {
                        None
                    } else {
                        Some(Box::new(self.expr_bp(0)))
                    };
                    self.eat(TokenKind::Colon);
                    let otherwise = self.expr_bp(rbp);
                    Expr::Ternary {
                        condition: Box::new(lhs),
                        then,
                        otherwise: Box::new(otherwise),
                        pos,
                    }
                }
                TokenKind::InstanceOf => {
                    let class = self.instanceof_class();
                    Expr::Instanceof {
                        expr: Box::new(lhs),
                        class: Box::new(class),
                        pos,
                    }
                }
                _ => {
                    let right = self.expr_bp(rbp);
                    Expr::Binary {
                        op: op.text.to_ascii_lowercase(),
                        left: Box::new(lhs),
                        right: Box::new(right),
                        pos,
                    }
                }
            };
        }
        lhs
    }

    fn instanceof_class(&mut self) -> Expr {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Identifier | TokenKind::NsSeparator | TokenKind::Namespace | TokenKind::Static => {
                match self.qualified_name() {
                    Some(name) => Expr::Name {
                        name,
                        pos: pos_of(&tok),
                    },
                    None => {
                        self.bump();
                        Expr::Name {
                            name: tok.text.clone(),
                            pos: pos_of(&tok),
                        }
                    }
                }
            }
            _ => self.unary(),
        }
    }

    fn prefix_operand(&mut self, op: &str, tok: &Tok, rbp: u8) -> Expr {
        let operand = self.expr_bp(rbp);
        Expr::Unary {
            op: op.to_string(),
            operand: Box::new(operand),
            pos: pos_of(tok),
        }
    }

    fn wrapped(&mut self, keyword: &'static str, tok: &Tok, inner: Option<Expr>) -> Expr {
        Expr::Wrapped {
            keyword,
            inner: inner.map(Box::new),
            pos: pos_of(tok),
        }
    }

    fn at_expression_end(&mut self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Semicolon
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
                | TokenKind::Comma
                | TokenKind::End
                | TokenKind::DoubleArrow
                | TokenKind::Colon
        )
    }

    /// The class operand of `(Type)` when the parenthesis is a cast
    fn cast_type(&mut self) -> Option<String> {
        if !self.at(TokenKind::LParen) || self.nth_kind(2) != TokenKind::RParen {
            return None;
        }
        let inner = self.peek_at(1).clone();
        let lower = inner.text.to_ascii_lowercase();
        let is_cast = match inner.kind {
            TokenKind::Identifier => CASTS.contains(&lower.as_str()),
            TokenKind::Array => true,
            _ => false,
        };
        is_cast.then_some(lower)
    }

    fn unary(&mut self) -> Expr {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Bang => {
                self.bump();
                self.prefix_operand("!", &tok, NOT_RBP)
            }
            TokenKind::Minus | TokenKind::Plus | TokenKind::Tilde => {
                self.bump();
                self.prefix_operand(&tok.text, &tok, UNARY_RBP)
            }
            TokenKind::At => {
                self.bump();
                let operand = self.unary();
                Expr::Unary {
                    op: "@".to_string(),
                    operand: Box::new(operand),
                    pos: pos_of(&tok),
                }
            }
            TokenKind::Ampersand => {
                self.bump();
                self.unary()
            }
            TokenKind::Increment | TokenKind::Decrement => {
                self.bump();
                let operand = self.unary();
                Expr::IncDec {
                    operand: Box::new(operand),
                    pos: pos_of(&tok),
                }
            }
            TokenKind::LParen => {
                if let Some(cast) = self.cast_type() {
                    self.bump();
                    self.bump();
                    self.bump();
                    let op = format!("({})", cast);
                    return self.prefix_operand(&op, &tok, UNARY_RBP);
                }
                self.bump();
                let inner = self.expression();
                self.eat(TokenKind::RParen);
                let expr = self.postfix(inner);
                self.postfix_incdec(expr)
            }
            TokenKind::New => self.new_expression(),
            TokenKind::Clone => {
                self.bump();
                let inner = self.unary();
                self.wrapped("clone", &tok, Some(inner))
            }
            TokenKind::Print => {
                self.bump();
                let inner = self.expr_bp(ASSIGN_RBP);
                self.wrapped("print", &tok, Some(inner))
            }
            TokenKind::Throw => {
                self.bump();
                let inner = self.expression();
                self.wrapped("throw", &tok, Some(inner))
            }
            TokenKind::Yield => {
                self.bump();
                if self.at(TokenKind::Identifier) && self.peek().text.eq_ignore_ascii_case("from") {
                    self.bump();
                }
                if self.at_expression_end() {
                    return self.wrapped("yield", &tok, None);
                }
                let mut inner = self.expr_bp(ASSIGN_RBP);
                if self.eat(TokenKind::DoubleArrow) {
                    let value = self.expr_bp(ASSIGN_RBP);
                    let pos = inner.pos();
                    inner = Expr::Binary {
                        op: "=>".to_string(),
                        left: Box::new(inner),
                        right: Box::new(value),
                        pos,
                    };
                }
                self.wrapped("yield", &tok, Some(inner))
            }
            TokenKind::Exit => {
                self.bump();
                let mut inner = None;
                if self.eat(TokenKind::LParen) {
                    if !self.at(TokenKind::RParen) {
                        inner = Some(self.expression());
                    }
                    self.eat(TokenKind::RParen);
                }
                self.wrapped("exit", &tok, inner)
            }
            TokenKind::Include | TokenKind::IncludeOnce | TokenKind::Require | TokenKind::RequireOnce => {
                self.bump();
                let kind = match tok.kind {
                    TokenKind::Include => IncludeKind::Include,
                    TokenKind::IncludeOnce => IncludeKind::IncludeOnce,
                    TokenKind::Require => IncludeKind::Require,
                    _ => IncludeKind::RequireOnce,
                };
                let inner = self.expr_bp(ASSIGN_RBP);
                Expr::Include {
                    kind,
                    expr: Box::new(inner),
                    pos: pos_of(&tok),
                }
            }
            TokenKind::Eval => {
                self.bump();
                self.eat(TokenKind::LParen);
                let inner = self.expression();
                self.eat(TokenKind::RParen);
                Expr::Eval {
                    expr: Box::new(inner),
                    pos: pos_of(&tok),
                }
            }
            TokenKind::Isset | TokenKind::Empty => {
                self.bump();
                let mut items = Vec::new();
                if self.eat(TokenKind::LParen) {
                    while !self.at(TokenKind::RParen) && !self.at(TokenKind::End) {
                        let before = self.consumed;
                        items.push(self.expression());
                        if !self.eat(TokenKind::Comma) {
                            if self.consumed == before {
                                self.bump();
                            }
                            break;
                        }
                    }
                    self.eat(TokenKind::RParen);
                }
                Expr::Isset {
                    items,
                    is_empty: tok.kind == TokenKind::Empty,
                    pos: pos_of(&tok),
                }
            }
            TokenKind::Function => self.closure(false),
            TokenKind::Fn => self.arrow_function(false),
            TokenKind::Static if matches!(self.nth_kind(1), TokenKind::Function | TokenKind::Fn) => {
                self.bump();
                if self.at(TokenKind::Function) {
                    self.closure(true)
                } else {
                    self.arrow_function(true)
                }
            }
            TokenKind::Match => self.match_expression(),
            TokenKind::Attribute => {
                self.skip_attributes();
                self.unary()
            }
            _ => {
                let primary = self.primary();
                let expr = self.postfix(primary);
                self.postfix_incdec(expr)
            }
        }
    }

    fn postfix_incdec(&mut self, expr: Expr) -> Expr {
        if matches!(self.peek_kind(), TokenKind::Increment | TokenKind::Decrement) {
            self.bump();
            let pos = expr.pos();
            return Expr::IncDec {
                operand: Box::new(expr),
                pos,
            };
        }
        expr
    }

    fn primary(&mut self) -> Expr {
        let tok = self.peek().clone();
        let pos = pos_of(&tok);
        match tok.kind {
            TokenKind::Variable => {
                self.bump();
                Expr::Variable { name: tok.text, pos }
            }
            TokenKind::Dollar => {
                self.bump();
                let inner = if self.eat(TokenKind::LBrace) {
                    let inner = self.expression();
                    self.eat(TokenKind::RBrace);
                    inner
                } else {
                    self.primary()
                };
                Expr::VariableVariable {
                    inner: Box::new(inner),
                    pos,
                }
            }
            TokenKind::IntegerLiteral | TokenKind::FloatLiteral | TokenKind::StringLiteral => {
                self.bump();
                let kind = match tok.kind {
                    TokenKind::IntegerLiteral => LiteralKind::Integer,
                    TokenKind::FloatLiteral => LiteralKind::Float,
                    _ => LiteralKind::String,
                };
                Expr::Literal {
                    kind,
                    text: tok.text,
                    pos,
                }
            }
            TokenKind::TemplateString | TokenKind::ShellCommand => {
                self.bump();
                Expr::Interpolated {
                    variables: interpolated_variables(&tok.text),
                    pos,
                }
            }
            TokenKind::Heredoc => {
                self.bump();
                let variables = if is_nowdoc(&tok.text) {
                    Vec::new()
                } else {
                    interpolated_variables(&tok.text)
                };
                Expr::Interpolated { variables, pos }
            }
            TokenKind::Array | TokenKind::List if self.nth_kind(1) == TokenKind::LParen => {
                self.bump();
                self.bump();
                let items = self.array_items(TokenKind::RParen);
                Expr::Array { items, pos }
            }
            TokenKind::LBracket => {
                self.bump();
                let items = self.array_items(TokenKind::RBracket);
                Expr::Array { items, pos }
            }
            TokenKind::Static => {
                self.bump();
                Expr::Name {
                    name: tok.text,
                    pos,
                }
            }
            TokenKind::Identifier | TokenKind::NsSeparator | TokenKind::Namespace => {
                let Some(name) = self.qualified_name() else {
                    self.bump();
                    return Expr::Unknown { pos };
                };
                let lower = name.to_ascii_lowercase();
                match lower.as_str() {
                    "true" | "false" => Expr::Literal {
                        kind: LiteralKind::Boolean,
                        text: name,
                        pos,
                    },
                    "null" => Expr::Literal {
                        kind: LiteralKind::Null,
                        text: name,
                        pos,
                    },
                    _ => Expr::Name { name, pos },
                }
            }
            _ => {
                if !self.at_expression_end() && !self.at(TokenKind::Question) {
                    self.bump();
                }
                Expr::Unknown { pos }
            }
        }
    }

    /// Member name after `->`; `None` for `$obj->$name` and `$obj->{...}`
    fn member_name(&mut self) -> Option<String> {
        if self.peek().is_name_like() {
            return Some(self.bump().text);
        }
        if self.eat(TokenKind::Variable) {
            return None;
        }
        if self.eat(TokenKind::LBrace) {
            let _ = self.expression();
            self.eat(TokenKind::RBrace);
        }
        None
    }

    fn postfix(&mut self, mut lhs: Expr) -> Expr {
        loop {
            let pos = lhs.pos();
            match self.peek_kind() {
                TokenKind::Arrow | TokenKind::NullsafeArrow => {
                    self.bump();
                    let name = self.member_name();
                    lhs = if self.at(TokenKind::LParen) {
                        let args = self.arguments();
                        Expr::MethodCall {
                            object: Box::new(lhs),
                            name,
                            args,
                            pos,
                        }
                    } else {
                        Expr::PropertyFetch {
                            object: Box::new(lhs),
                            name,
                            pos,
                        }
                    };
                }
                TokenKind::DoubleColon => {
                    self.bump();
                    let member = self.peek().clone();
                    lhs = match member.kind {
                        TokenKind::Variable => {
                            self.bump();
                            let name = Some(member.text.trim_start_matches('$').to_string());
                            if self.at(TokenKind::LParen) {
                                let args = self.arguments();
                                Expr::StaticCall {
                                    class: Box::new(lhs),
                                    name: None,
                                    args,
                                    pos,
                                }
                            } else {
                                Expr::StaticProperty {
                                    class: Box::new(lhs),
                                    name,
                                    pos,
                                }
                            }
                        }
                        TokenKind::LBrace => {
                            self.bump();
                            let _ = self.expression();
                            self.eat(TokenKind::RBrace);
                            let args = if self.at(TokenKind::LParen) {
                                self.arguments()
                            } else {
                                Vec::new()
                            };
                            Expr::StaticCall {
                                class: Box::new(lhs),
                                name: None,
                                args,
                                pos,
                            }
                        }
                        _ if member.is_name_like() => {
                            self.bump();
                            if self.at(TokenKind::LParen) {
                                let args = self.arguments();
                                Expr::StaticCall {
                                    class: Box::new(lhs),
                                    name: Some(member.text),
                                    args,
                                    pos,
                                }
                            } else {
                                Expr::ClassConst {
                                    class: Box::new(lhs),
                                    name: member.text,
                                    pos,
                                }
                            }
                        }
                        _ => {
                            // `Foo::` with nothing usable after it
                            Expr::ClassConst {
                                class: Box::new(lhs),
                                name: String::new(),
                                pos,
                            }
                        }
                    };
                }
                TokenKind::LBracket => {
                    self.bump();
                    let index = if self.at(TokenKind::RBracket) {
                        None
                    } else {
                        Some(Box::new(self.expression()))
                    };
                    self.eat(TokenKind::RBracket);
                    lhs = Expr::ArrayAccess {
                        base: Box::new(lhs),
                        index,
                        pos,
                    };
                }
                TokenKind::LParen => {
                    let args = self.arguments();
                    lhs = Expr::Call {
                        callee: Box::new(lhs),
                        args,
                        pos,
                    };
                }
                _ => break,
            }
        }
        lhs
    }

    /// Call arguments, starting at `(`
    pub(crate) fn arguments(&mut self) -> Vec<Arg> {
        let mut args = Vec::new();
        if !self.eat(TokenKind::LParen) {
            return args;
        }
        loop {
            if self.at(TokenKind::RParen) || self.at(TokenKind::End) {
                break;
            }
            let before = self.consumed;
            // first-class callable syntax: strlen(...)
            if self.at(TokenKind::Ellipsis) && self.nth_kind(1) == TokenKind::RParen {
                self.bump();
                break;
            }
            if self.peek().is_name_like() && self.nth_kind(1) == TokenKind::Colon {
                self.bump();
                self.bump();
            }
            let spread = self.eat(TokenKind::Ellipsis);
            self.eat(TokenKind::Ampersand);
            let value = self.expression();
            args.push(Arg { value, spread });
            if !self.eat(TokenKind::Comma) {
                if self.consumed == before {
                    self.bump();
                }
                break;
            }
        }
        self.eat(TokenKind::RParen);
        args
    }

    /// Items up to `close`; the opening bracket is already consumed.
    fn array_items(&mut self, close: TokenKind) -> Vec<ArrayItem> {
        let mut items = Vec::new();
        loop {
            if self.at(close) || self.at(TokenKind::End) {
                break;
            }
            if self.eat(TokenKind::Comma) {
                continue;
            }
            let before = self.consumed;
            // `...$rest` unpacks into the literal; the item is kept as a plain value
            self.eat(TokenKind::Ellipsis);
            let by_ref = self.eat(TokenKind::Ampersand);
            let first = self.expression();
            let item = if self.eat(TokenKind::DoubleArrow) {
                let by_ref = self.eat(TokenKind::Ampersand);
                let value = self.expression();
                ArrayItem {
                    key: Some(first),
                    value,
                    by_ref,
                }
            } else {
                ArrayItem {
                    key: None,
                    value: first,
                    by_ref,
                }
            };
            items.push(item);
            if !self.eat(TokenKind::Comma) {
                if self.consumed == before {
                    self.bump();
                }
                break;
            }
        }
        self.eat(close);
        items
    }

    fn new_expression(&mut self) -> Expr {
        let tok = self.bump();
        let pos = pos_of(&tok);
        if self.at(TokenKind::Class) {
            self.bump();
            let args = if self.at(TokenKind::LParen) {
                self.arguments()
            } else {
                Vec::new()
            };
            while matches!(
                self.peek_kind(),
                TokenKind::Extends
                    | TokenKind::Implements
                    | TokenKind::Identifier
                    | TokenKind::NsSeparator
                    | TokenKind::Comma
            ) {
                self.bump();
            }
            if self.at(TokenKind::LBrace) {
                self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
            }
            return Expr::New {
                class: ClassRef::Anonymous,
                args,
                pos,
            };
        }
        let class = match self.peek_kind() {
            TokenKind::Identifier | TokenKind::NsSeparator | TokenKind::Namespace => {
                match self.qualified_name() {
                    Some(name) => ClassRef::Named(name),
                    None => ClassRef::Dynamic(Box::new(Expr::Unknown { pos })),
                }
            }
            TokenKind::Static => {
                self.bump();
                ClassRef::Named("static".to_string())
            }
            TokenKind::Variable => {
                let var = self.bump();
                let pos = pos_of(&var);
                let mut expr = Expr::Variable { name: var.text, pos };
                loop {
                    let pos = expr.pos();
                    if self.at(TokenKind::Arrow) || self.at(TokenKind::NullsafeArrow) {
                        self.bump();
                        let name = self.member_name();
                        expr = Expr::PropertyFetch {
                            object: Box::new(expr),
                            name,
                            pos,
                        };
                    } else if self.at(TokenKind::DoubleColon) && self.nth_kind(1) == TokenKind::Variable {
                        self.bump();
                        let member = self.bump();
                        expr = Expr::StaticProperty {
                            class: Box::new(expr),
                            name: Some(member.text.trim_start_matches('$').to_string()),
                            pos,
                        };
                    } else if self.eat(TokenKind::LBracket) {
                        let index = if self.at(TokenKind::RBracket) {
                            None
                        } else {
                            Some(Box::new(self.expression()))
                        };
                        self.eat(TokenKind::RBracket);
                        expr = Expr::ArrayAccess {
                            base: Box::new(expr),
                            index,
                            pos,
                        };
                    } else {
                        break;
                    }
                }
                ClassRef::Dynamic(Box::new(expr))
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.expression();
                self.eat(TokenKind::RParen);
                ClassRef::Dynamic(Box::new(inner))
            }
            _ => ClassRef::Dynamic(Box::new(Expr::Unknown { pos })),
        };
        let args = if self.at(TokenKind::LParen) {
            self.arguments()
        } else {
            Vec::new()
        };
        Expr::New { class, args, pos }
    }

    fn closure(&mut self, is_static: bool) -> Expr {
        let tok = self.bump();
        self.eat(TokenKind::Ampersand);
        let params = self.parameter_list();
        let mut uses = Vec::new();
        if self.eat(TokenKind::Use) && self.eat(TokenKind::LParen) {
            loop {
                let by_ref = self.eat(TokenKind::Ampersand);
                if !self.at(TokenKind::Variable) {
                    break;
                }
                let name = self.bump().text;
                uses.push(ClosureUse { name, by_ref });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.eat(TokenKind::RParen);
        }
        if self.eat(TokenKind::Colon) {
            self.parse_type();
        }
        self.sinks.push(Vec::new());
        self.block();
        let body = self.sinks.pop().unwrap_or_default();
        Expr::Closure(Box::new(ClosureExpr {
            decl: ClosureDecl {
                params: params.params,
                uses,
                is_arrow: false,
                is_static,
                line: tok.line,
                offset: tok.offset,
            },
            body,
            end_offset: self.last_end(),
        }))
    }

    fn arrow_function(&mut self, is_static: bool) -> Expr {
        let tok = self.bump();
        self.eat(TokenKind::Ampersand);
        let params = self.parameter_list();
        if self.eat(TokenKind::Colon) {
            self.parse_type();
        }
        self.eat(TokenKind::DoubleArrow);
        let body = self.expr_bp(ASSIGN_RBP);
        Expr::ArrowFn(Box::new(ArrowFnExpr {
            decl: ClosureDecl {
                params: params.params,
                uses: Vec::new(),
                is_arrow: true,
                is_static,
                line: tok.line,
                offset: tok.offset,
            },
            body,
            end_offset: self.last_end(),
        }))
    }

    fn match_expression(&mut self) -> Expr {
        let tok = self.bump();
        let subject = if self.eat(TokenKind::LParen) {
            let subject = self.expression();
            self.eat(TokenKind::RParen);
            subject
        } else {
            Expr::Unknown { pos: pos_of(&tok) }
        };
        let mut arms = Vec::new();
        if self.eat(TokenKind::LBrace) {
            loop {
                if self.at(TokenKind::RBrace) || self.at(TokenKind::End) {
                    break;
                }
                let before = self.consumed;
                if !self.eat(TokenKind::Default) {
                    loop {
                        arms.push(self.expression());
                        if !self.eat(TokenKind::Comma) || self.at(TokenKind::DoubleArrow) {
                            break;
                        }
                    }
                }
                self.eat(TokenKind::DoubleArrow);
                arms.push(self.expression());
                self.eat(TokenKind::Comma);
                if self.consumed == before {
                    self.bump();
                }
            }
            self.eat(TokenKind::RBrace);
        }
        Expr::Match {
            subject: Box::new(subject),
            arms,
            pos: pos_of(&tok),
        }
    }

    /// `Name`, `\Name\Sub`, `Name\Sub` or `namespace\Name`, as written
    pub(crate) fn qualified_name(&mut self) -> Option<String> {
        let mut name = String::new();
        if self.at(TokenKind::Namespace) && self.nth_kind(1) == TokenKind::NsSeparator {
            name.push_str(&self.bump().text);
        } else if self.at(TokenKind::Identifier) {
            name.push_str(&self.bump().text);
        }
        while self.at(TokenKind::NsSeparator) && self.peek_at(1).is_name_like() {
            self.bump();
            name.push('\\');
            name.push_str(&self.bump().text);
        }
        (!name.is_empty()).then_some(name)
    }

    /// A type declaration as (written, resolved). Handles nullable, union,
    /// intersection and DNF forms.
    pub(crate) fn parse_type(&mut self) -> Option<(String, String)> {
        let start = self.peek().byte_offset;
        let mut end = start;
        let mut depth = 0usize;
        let mut prev_was_name = false;
        loop {
            let tok = self.peek().clone();
            let accept = match tok.kind {
                TokenKind::Question | TokenKind::Pipe => !prev_was_name || tok.kind == TokenKind::Pipe,
                TokenKind::Ampersand => {
                    prev_was_name
                        && !matches!(
                            self.nth_kind(1),
                            TokenKind::Variable | TokenKind::Ellipsis | TokenKind::Ampersand
                        )
                }
                TokenKind::LParen => {
                    !prev_was_name
                        && matches!(self.nth_kind(1), TokenKind::Identifier | TokenKind::NsSeparator)
                }
                TokenKind::RParen => depth > 0,
                TokenKind::NsSeparator => true,
                TokenKind::Identifier | TokenKind::Array | TokenKind::Static | TokenKind::Namespace => {
                    !prev_was_name
                }
                _ => false,
            };
            if !accept {
                break;
            }
            let tok = self.bump();
            match tok.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => depth -= 1,
                _ => {}
            }
            prev_was_name = matches!(
                tok.kind,
                TokenKind::Identifier | TokenKind::Array | TokenKind::Static | TokenKind::RParen
            );
            end = tok.end_byte();
        }
        if end == start {
            return None;
        }
        let raw: String = self
            .source_slice(start, end)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let resolved = self.names.resolve_type(&raw);
        Some((raw, resolved))
    }

    /// Parameter list starting at `(`. The signature is the source text of
    /// the list with whitespace collapsed.
    pub(crate) fn parameter_list(&mut self) -> ParamList {
        let mut list = ParamList::default();
        if !self.at(TokenKind::LParen) {
            list.signature = "()".to_string();
            return list;
        }
        let open = self.bump();
        loop {
            if self.at(TokenKind::RParen) || self.at(TokenKind::End) || self.at(TokenKind::LBrace) {
                break;
            }
            let first = self.peek().clone();
            let mut comment = first.doc.clone();
            if self.at(TokenKind::Attribute) {
                comment = comment.or(self.skip_attributes());
            }
            let mut visibility = None;
            while matches!(
                self.peek_kind(),
                TokenKind::Public | TokenKind::Protected | TokenKind::Private | TokenKind::Readonly
            ) {
                match self.bump().kind {
                    TokenKind::Public => visibility = Some(Visibility::Public),
                    TokenKind::Protected => visibility = Some(Visibility::Protected),
                    TokenKind::Private => visibility = Some(Visibility::Private),
                    _ => visibility = visibility.or(Some(Visibility::Public)),
                }
            }
            let type_hint = if matches!(
                self.peek_kind(),
                TokenKind::Variable | TokenKind::Ampersand | TokenKind::Ellipsis
            ) {
                String::new()
            } else {
                self.parse_type().map(|(_, resolved)| resolved).unwrap_or_default()
            };
            let by_ref = self.eat(TokenKind::Ampersand);
            let variadic = self.eat(TokenKind::Ellipsis);
            if !self.at(TokenKind::Variable) {
                while !matches!(
                    self.peek_kind(),
                    TokenKind::Comma | TokenKind::RParen | TokenKind::LBrace | TokenKind::End
                ) {
                    self.bump();
                }
                if !self.eat(TokenKind::Comma) {
                    break;
                }
                continue;
            }
            let name = self.bump().text;
            let default = if self.eat(TokenKind::Assign) {
                let start = self.peek().byte_offset;
                let _ = self.expression();
                let end = self.last_end_byte;
                Some(normalize_signature(self.source_slice(start, end)))
            } else {
                None
            };
            let param = Param {
                name,
                type_hint,
                by_ref,
                variadic,
                default,
            };
            if let Some(visibility) = visibility {
                list.promoted.push(PromotedParam {
                    param: param.clone(),
                    visibility,
                    comment: comment.unwrap_or_default(),
                    line: first.line,
                    offset: first.offset,
                });
            }
            list.params.push(param);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        let end = if self.at(TokenKind::RParen) {
            self.bump().end_byte()
        } else {
            self.last_end_byte
        };
        list.signature = normalize_signature(self.source_slice(open.byte_offset, end));
        list
    }

    /// Skips `#[...]` groups and returns a doc comment found in front of them.
    pub(crate) fn skip_attributes(&mut self) -> Option<String> {
        let mut doc = None;
        while self.at(TokenKind::Attribute) {
            let tok = self.bump();
            doc = doc.or(tok.doc);
            let mut depth = 1usize;
            while depth > 0 && !self.at(TokenKind::End) {
                match self.bump().kind {
                    TokenKind::LBracket | TokenKind::Attribute => depth += 1,
                    TokenKind::RBracket => depth -= 1,
                    _ => {}
                }
            }
        }
        doc
    }

    pub(crate) fn skip_balanced(&mut self, open: TokenKind, close: TokenKind) {
        if !self.eat(open) {
            return;
        }
        let mut depth = 1usize;
        while depth > 0 && !self.at(TokenKind::End) {
            let kind = self.bump().kind;
            if kind == open {
                depth += 1;
            } else if kind == close {
                depth -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhpVersion;
    use crate::parser::snippet_parser;

    fn parse(source: &str) -> Expr {
        snippet_parser(source, PhpVersion::default()).expression()
    }

    #[test]
    fn test_precedence() {
        match parse("$a = $b + $c * 2") {
            Expr::Assign { value, .. } => match *value {
                Expr::Binary { op, right, .. } => {
                    assert_eq!(op, "+");
                    assert!(matches!(*right, Expr::Binary { ref op, .. } if op == "*"));
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_assignment_binds_tighter_than_and() {
        assert!(matches!(parse("$a = $b and $c"), Expr::Binary { ref op, .. } if op == "and"));
    }

    #[test]
    fn test_ternary_and_coalesce() {
        assert!(matches!(parse("$a ?: $b"), Expr::Ternary { then: None, .. }));
        assert!(matches!(parse("$a ? $b : $c"), Expr::Ternary { then: Some(_), .. }));
        assert!(matches!(parse("$a ?? $b ?? $c"), Expr::Binary { ref op, .. } if op == "??"));
    }

    #[test]
    fn test_casts_and_parens() {
        assert!(matches!(parse("(int) $a"), Expr::Unary { ref op, .. } if op == "(int)"));
        assert!(matches!(parse("($a)"), Expr::Variable { .. }));
        assert!(matches!(parse("(new Foo)->bar()"), Expr::MethodCall { .. }));
    }

    #[test]
    fn test_member_chains() {
        match parse("$this->items[0]->name") {
            Expr::PropertyFetch { object, name, .. } => {
                assert_eq!(name.as_deref(), Some("name"));
                assert!(matches!(*object, Expr::ArrayAccess { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(parse("Foo::BAR"), Expr::ClassConst { ref name, .. } if name == "BAR"));
        assert!(matches!(parse("Foo::$bar"), Expr::StaticProperty { .. }));
        assert!(matches!(parse("Foo::make(1)"), Expr::StaticCall { .. }));
        assert!(matches!(parse("$obj->$dynamic"), Expr::PropertyFetch { name: None, .. }));
    }

    #[test]
    fn test_literals_and_names() {
        assert!(matches!(parse("true"), Expr::Literal { kind: LiteralKind::Boolean, .. }));
        assert!(matches!(parse("NULL"), Expr::Literal { kind: LiteralKind::Null, .. }));
        assert!(matches!(parse("\\App\\VERSION"), Expr::Name { ref name, .. } if name == "\\App\\VERSION"));
        assert!(matches!(parse("[1, 2, 3]"), Expr::Array { ref items, .. } if items.len() == 3));
        assert!(matches!(parse("array('a' => 1)"), Expr::Array { ref items, .. } if items[0].key.is_some()));
    }

    #[test]
    fn test_interpolated_variables() {
        assert_eq!(
            interpolated_variables("\"Hello $name, {$user->id} \\$escaped $name\""),
            vec!["$name".to_string(), "$user".to_string()]
        );
        assert!(is_nowdoc("<<<'EOT'\n$a\nEOT"));
        assert!(!is_nowdoc("<<<EOT\n$a\nEOT"));
    }

    #[test]
    fn test_named_and_spread_arguments() {
        match parse("f(...$args, name: $x)") {
            Expr::Call { args, .. } => {
                assert_eq!(args.len(), 2);
                assert!(args[0].spread);
                assert!(matches!(args[1].value, Expr::Variable { ref name, .. } if name == "$x"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_anonymous_class_body_is_skipped() {
        match parse("new class($a) extends Base { public function x() { return 1; } }") {
            Expr::New { class: ClassRef::Anonymous, args, .. } => assert_eq!(args.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_new_with_variable_class() {
        match parse("new $registry->handler($payload)") {
            Expr::New { class: ClassRef::Dynamic(class), args, .. } => {
                assert_eq!(args.len(), 1);
                match *class {
                    Expr::PropertyFetch { object, name, .. } => {
                        assert_eq!(name.as_deref(), Some("handler"));
                        assert!(matches!(*object, Expr::Variable { ref name, pos } if name == "$registry" && pos.offset == 4));
                    }
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_garbage_terminates() {
        let _ = parse(") ] } ;");
        let _ = parse("$a->");
        let _ = parse("Foo::");
    }
}
