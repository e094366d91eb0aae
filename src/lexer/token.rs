// Token kinds and keyword tables

use serde::Serialize;

use crate::config::PhpVersion;

/// Terminal kinds produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    /// End of input; returned forever once reached
    End,
    /// Unrecognized or unterminated input
    Error,

    // Markup transitions
    InlineHtml,
    OpenTag,
    OpenTagWithEcho,
    CloseTag,

    // Trivia the parser may care about
    Comment,
    DocComment,

    // Names and literals
    Variable,
    Identifier,
    Dollar,
    IntegerLiteral,
    FloatLiteral,
    StringLiteral,
    TemplateString,
    Heredoc,
    ShellCommand,

    // Keywords
    Abstract,
    LogicalAnd,
    Array,
    As,
    Break,
    Case,
    Catch,
    Class,
    Clone,
    Const,
    Continue,
    Declare,
    Default,
    Do,
    Echo,
    Else,
    ElseIf,
    Empty,
    EndDeclare,
    EndFor,
    EndForeach,
    EndIf,
    EndSwitch,
    EndWhile,
    Enum,
    Eval,
    Exit,
    Extends,
    Final,
    Finally,
    Fn,
    For,
    Foreach,
    Function,
    Global,
    Goto,
    HaltCompiler,
    If,
    Implements,
    Include,
    IncludeOnce,
    InstanceOf,
    InsteadOf,
    Interface,
    Isset,
    List,
    Match,
    Namespace,
    New,
    LogicalOr,
    Print,
    Private,
    Protected,
    Public,
    Readonly,
    Require,
    RequireOnce,
    Return,
    Static,
    Switch,
    Throw,
    Trait,
    Try,
    Unset,
    Use,
    Var,
    While,
    LogicalXor,
    Yield,

    // Punctuation
    Semicolon,
    Comma,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Attribute,
    Arrow,
    NullsafeArrow,
    DoubleColon,
    DoubleArrow,
    NsSeparator,
    Question,
    Colon,
    Ellipsis,
    At,

    // Operators
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Pow,
    Ampersand,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    Identical,
    NotIdentical,
    Spaceship,
    ShiftLeft,
    ShiftRight,
    BooleanAnd,
    BooleanOr,
    Coalesce,
    Increment,
    Decrement,
    Assign,
    CompoundAssign,
}

impl TokenKind {
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::Comment | TokenKind::DocComment | TokenKind::InlineHtml | TokenKind::OpenTag
        )
    }

    /// Keywords are words the lexer recognized from the reserved table.
    pub fn is_keyword(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Abstract
                | LogicalAnd
                | Array
                | As
                | Break
                | Case
                | Catch
                | Class
                | Clone
                | Const
                | Continue
                | Declare
                | Default
                | Do
                | Echo
                | Else
                | ElseIf
                | Empty
                | EndDeclare
                | EndFor
                | EndForeach
                | EndIf
                | EndSwitch
                | EndWhile
                | Enum
                | Eval
                | Exit
                | Extends
                | Final
                | Finally
                | Fn
                | For
                | Foreach
                | Function
                | Global
                | Goto
                | HaltCompiler
                | If
                | Implements
                | Include
                | IncludeOnce
                | InstanceOf
                | InsteadOf
                | Interface
                | Isset
                | List
                | Match
                | Namespace
                | New
                | LogicalOr
                | Print
                | Private
                | Protected
                | Public
                | Readonly
                | Require
                | RequireOnce
                | Return
                | Static
                | Switch
                | Throw
                | Trait
                | Try
                | Unset
                | Use
                | Var
                | While
                | LogicalXor
                | Yield
        )
    }

    /// Member modifiers that may precede a class member declaration.
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            TokenKind::Public
                | TokenKind::Protected
                | TokenKind::Private
                | TokenKind::Static
                | TokenKind::Abstract
                | TokenKind::Final
                | TokenKind::Var
                | TokenKind::Readonly
        )
    }

    pub fn is_assignment(self) -> bool {
        matches!(self, TokenKind::Assign | TokenKind::CompoundAssign)
    }

    /// After these tokens a reserved word is just a name.
    pub(crate) fn expects_name(self) -> bool {
        matches!(
            self,
            TokenKind::Arrow
                | TokenKind::NullsafeArrow
                | TokenKind::DoubleColon
                | TokenKind::Function
                | TokenKind::Const
        )
    }
}

/// One lexed token. Offsets are 0-based, lines 1-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Offset in decoded characters
    pub offset: usize,
    /// Offset in UTF-8 bytes
    pub byte_offset: usize,
    pub line: usize,
}

impl Token {
    pub fn end() -> Self {
        Self {
            kind: TokenKind::End,
            text: String::new(),
            offset: 0,
            byte_offset: 0,
            line: 1,
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Identifier-like: a name or any reserved word usable as a name.
    pub fn is_name_like(&self) -> bool {
        self.kind == TokenKind::Identifier || self.kind.is_keyword()
    }
}

/// Looks up a lowercased word in the reserved table for the given version.
pub fn keyword(lower: &str, version: PhpVersion) -> Option<TokenKind> {
    use TokenKind::*;
    let kind = match lower {
        "abstract" => Abstract,
        "and" => LogicalAnd,
        "array" => Array,
        "as" => As,
        "break" => Break,
        "case" => Case,
        "catch" => Catch,
        "class" => Class,
        "clone" => Clone,
        "const" => Const,
        "continue" => Continue,
        "declare" => Declare,
        "default" => Default,
        "do" => Do,
        "echo" => Echo,
        "else" => Else,
        "elseif" => ElseIf,
        "empty" => Empty,
        "enddeclare" => EndDeclare,
        "endfor" => EndFor,
        "endforeach" => EndForeach,
        "endif" => EndIf,
        "endswitch" => EndSwitch,
        "endwhile" => EndWhile,
        "enum" if version >= PhpVersion::Php81 => Enum,
        "eval" => Eval,
        "exit" | "die" => Exit,
        "extends" => Extends,
        "final" => Final,
        "finally" => Finally,
        "fn" if version >= PhpVersion::Php74 => Fn,
        "for" => For,
        "foreach" => Foreach,
        "function" => Function,
        "global" => Global,
        "goto" => Goto,
        "__halt_compiler" => HaltCompiler,
        "if" => If,
        "implements" => Implements,
        "include" => Include,
        "include_once" => IncludeOnce,
        "instanceof" => InstanceOf,
        "insteadof" => InsteadOf,
        "interface" => Interface,
        "isset" => Isset,
        "list" => List,
        "match" if version >= PhpVersion::Php80 => Match,
        "namespace" => Namespace,
        "new" => New,
        "or" => LogicalOr,
        "print" => Print,
        "private" => Private,
        "protected" => Protected,
        "public" => Public,
        "readonly" if version >= PhpVersion::Php81 => Readonly,
        "require" => Require,
        "require_once" => RequireOnce,
        "return" => Return,
        "static" => Static,
        "switch" => Switch,
        "throw" => Throw,
        "trait" if version >= PhpVersion::Php54 => Trait,
        "try" => Try,
        "unset" => Unset,
        "use" => Use,
        "var" => Var,
        "while" => While,
        "xor" => LogicalXor,
        "yield" => Yield,
        _ => return None,
    };
    Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_are_version_gated() {
        assert_eq!(keyword("fn", PhpVersion::Php74), Some(TokenKind::Fn));
        assert_eq!(keyword("fn", PhpVersion::Php70), None);
        assert_eq!(keyword("match", PhpVersion::Php74), None);
        assert_eq!(keyword("match", PhpVersion::Php80), Some(TokenKind::Match));
        assert_eq!(keyword("enum", PhpVersion::Php80), None);
        assert_eq!(keyword("die", PhpVersion::Php53), Some(TokenKind::Exit));
    }

    #[test]
    fn test_modifiers() {
        assert!(TokenKind::Public.is_modifier());
        assert!(TokenKind::Var.is_modifier());
        assert!(!TokenKind::Function.is_modifier());
        assert!(TokenKind::Function.is_keyword());
        assert!(!TokenKind::Identifier.is_keyword());
    }
}
