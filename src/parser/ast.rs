// Expression tree built by the parser before events are emitted

use super::{ClosureDecl, IncludeKind, ParseEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LiteralKind {
    String,
    Integer,
    Float,
    Boolean,
    Null,
}

/// Position of the first token of a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Pos {
    pub line: usize,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct Arg {
    pub value: Expr,
    pub spread: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct ArrayItem {
    pub key: Option<Expr>,
    pub value: Expr,
    pub by_ref: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum ClassRef {
    Named(String),
    Dynamic(Box<Expr>),
    Anonymous,
}

/// Member name after `->` or `::`; `None` when computed at runtime
pub(crate) type MemberName = Option<String>;

#[derive(Debug, Clone)]
pub(crate) struct ClosureExpr {
    pub decl: ClosureDecl,
    pub body: Vec<ParseEvent>,
    pub end_offset: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct ArrowFnExpr {
    pub decl: ClosureDecl,
    pub body: Expr,
    pub end_offset: usize,
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Variable {
        name: String,
        pos: Pos,
    },
    VariableVariable {
        inner: Box<Expr>,
        pos: Pos,
    },
    Name {
        name: String,
        pos: Pos,
    },
    Literal {
        kind: LiteralKind,
        text: String,
        pos: Pos,
    },
    /// Double-quoted, heredoc or backtick string; holds the variables it reads
    Interpolated {
        variables: Vec<String>,
        pos: Pos,
    },
    Array {
        items: Vec<ArrayItem>,
        pos: Pos,
    },
    New {
        class: ClassRef,
        args: Vec<Arg>,
        pos: Pos,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Arg>,
        pos: Pos,
    },
    PropertyFetch {
        object: Box<Expr>,
        name: MemberName,
        pos: Pos,
    },
    MethodCall {
        object: Box<Expr>,
        name: MemberName,
        args: Vec<Arg>,
        pos: Pos,
    },
    StaticProperty {
        class: Box<Expr>,
        name: MemberName,
        pos: Pos,
    },
    StaticCall {
        class: Box<Expr>,
        name: MemberName,
        args: Vec<Arg>,
        pos: Pos,
    },
    ClassConst {
        class: Box<Expr>,
        name: String,
        pos: Pos,
    },
    ArrayAccess {
        base: Box<Expr>,
        index: Option<Box<Expr>>,
        pos: Pos,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        compound: bool,
        by_ref: bool,
        pos: Pos,
    },
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
        pos: Pos,
    },
    Unary {
        op: String,
        operand: Box<Expr>,
        pos: Pos,
    },
    IncDec {
        operand: Box<Expr>,
        pos: Pos,
    },
    Ternary {
        condition: Box<Expr>,
        then: Option<Box<Expr>>,
        otherwise: Box<Expr>,
        pos: Pos,
    },
    Instanceof {
        expr: Box<Expr>,
        class: Box<Expr>,
        pos: Pos,
    },
    Isset {
        items: Vec<Expr>,
        is_empty: bool,
        pos: Pos,
    },
    Include {
        kind: IncludeKind,
        expr: Box<Expr>,
        pos: Pos,
    },
    Eval {
        expr: Box<Expr>,
        pos: Pos,
    },
    Closure(Box<ClosureExpr>),
    ArrowFn(Box<ArrowFnExpr>),
    Match {
        subject: Box<Expr>,
        arms: Vec<Expr>,
        pos: Pos,
    },
    /// clone, print, throw, exit, yield and casts: one optional operand
    Wrapped {
        keyword: &'static str,
        inner: Option<Box<Expr>>,
        pos: Pos,
    },
    Unknown {
        pos: Pos,
    },
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Variable { pos, .. }
            | Expr::VariableVariable { pos, .. }
            | Expr::Name { pos, .. }
            | Expr::Literal { pos, .. }
            | Expr::Interpolated { pos, .. }
            | Expr::Array { pos, .. }
            | Expr::New { pos, .. }
            | Expr::Call { pos, .. }
            | Expr::PropertyFetch { pos, .. }
            | Expr::MethodCall { pos, .. }
            | Expr::StaticProperty { pos, .. }
            | Expr::StaticCall { pos, .. }
            | Expr::ClassConst { pos, .. }
            | Expr::ArrayAccess { pos, .. }
            | Expr::Assign { pos, .. }
            | Expr::Binary { pos, .. }
            | Expr::Unary { pos, .. }
            | Expr::IncDec { pos, .. }
            | Expr::Ternary { pos, .. }
            | Expr::Instanceof { pos, .. }
            | Expr::Isset { pos, .. }
            | Expr::Include { pos, .. }
            | Expr::Eval { pos, .. }
            | Expr::Match { pos, .. }
            | Expr::Wrapped { pos, .. }
            | Expr::Unknown { pos } => *pos,
            Expr::Closure(closure) => Pos {
                line: closure.decl.line,
                offset: closure.decl.offset,
            },
            Expr::ArrowFn(arrow) => Pos {
                line: arrow.decl.line,
                offset: arrow.decl.offset,
            },
        }
    }

    /// Whether the expression may stand on the left of `=`
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Expr::Variable { .. }
                | Expr::VariableVariable { .. }
                | Expr::PropertyFetch { .. }
                | Expr::StaticProperty { .. }
                | Expr::ArrayAccess { .. }
                | Expr::Array { .. }
        )
    }
}
