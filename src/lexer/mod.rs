//! PHP lexer.
//!
//! Tokenizes mixed HTML/PHP source one token at a time. The lexer starts in
//! markup mode and flips to PHP mode on `<?php` / `<?=` (and `<?` when short
//! tags are enabled), back to markup on `?>`. Every token carries its
//! 1-based line, its 0-based offset in decoded characters and its 0-based
//! UTF-8 byte offset.
//!
//! The lexer never fails: unrecognized input produces [`TokenKind::Error`],
//! exhausted input produces [`TokenKind::End`] on every subsequent call.

pub mod token;

use std::io;
use std::path::Path;

use crate::config::PhpVersion;

pub use token::{keyword, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Markup,
    Php,
}

/// Three-character operators, longest first.
const OPERATORS_3: &[(&str, TokenKind)] = &[
    ("===", TokenKind::Identical),
    ("!==", TokenKind::NotIdentical),
    ("<=>", TokenKind::Spaceship),
    ("...", TokenKind::Ellipsis),
    ("?->", TokenKind::NullsafeArrow),
    ("<<=", TokenKind::CompoundAssign),
    (">>=", TokenKind::CompoundAssign),
    ("**=", TokenKind::CompoundAssign),
    ("??=", TokenKind::CompoundAssign),
];

const OPERATORS_2: &[(&str, TokenKind)] = &[
    ("->", TokenKind::Arrow),
    ("=>", TokenKind::DoubleArrow),
    ("::", TokenKind::DoubleColon),
    ("==", TokenKind::Equal),
    ("!=", TokenKind::NotEqual),
    ("<>", TokenKind::NotEqual),
    ("<=", TokenKind::LessEqual),
    (">=", TokenKind::GreaterEqual),
    ("&&", TokenKind::BooleanAnd),
    ("||", TokenKind::BooleanOr),
    ("??", TokenKind::Coalesce),
    ("++", TokenKind::Increment),
    ("--", TokenKind::Decrement),
    ("<<", TokenKind::ShiftLeft),
    (">>", TokenKind::ShiftRight),
    ("**", TokenKind::Pow),
    ("+=", TokenKind::CompoundAssign),
    ("-=", TokenKind::CompoundAssign),
    ("*=", TokenKind::CompoundAssign),
    ("/=", TokenKind::CompoundAssign),
    (".=", TokenKind::CompoundAssign),
    ("%=", TokenKind::CompoundAssign),
    ("&=", TokenKind::CompoundAssign),
    ("|=", TokenKind::CompoundAssign),
    ("^=", TokenKind::CompoundAssign),
    ("#[", TokenKind::Attribute),
];

fn single_char_operator(c: u8) -> Option<TokenKind> {
    let kind = match c {
        b';' => TokenKind::Semicolon,
        b',' => TokenKind::Comma,
        b'(' => TokenKind::LParen,
        b')' => TokenKind::RParen,
        b'{' => TokenKind::LBrace,
        b'}' => TokenKind::RBrace,
        b'[' => TokenKind::LBracket,
        b']' => TokenKind::RBracket,
        b'\\' => TokenKind::NsSeparator,
        b'?' => TokenKind::Question,
        b':' => TokenKind::Colon,
        b'@' => TokenKind::At,
        b'.' => TokenKind::Dot,
        b'+' => TokenKind::Plus,
        b'-' => TokenKind::Minus,
        b'*' => TokenKind::Star,
        b'/' => TokenKind::Slash,
        b'%' => TokenKind::Percent,
        b'&' => TokenKind::Ampersand,
        b'|' => TokenKind::Pipe,
        b'^' => TokenKind::Caret,
        b'~' => TokenKind::Tilde,
        b'!' => TokenKind::Bang,
        b'<' => TokenKind::Less,
        b'>' => TokenKind::Greater,
        b'=' => TokenKind::Assign,
        b'$' => TokenKind::Dollar,
        _ => return None,
    };
    Some(kind)
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c >= 0x80
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c >= 0x80
}

/// Tokenizer over an owned, decoded source buffer.
#[derive(Debug, Clone)]
pub struct Lexer {
    source: String,
    pos: usize,
    char_pos: usize,
    line: usize,
    mode: Mode,
    version: PhpVersion,
    short_tags: bool,
    name_expected: bool,
    current: Token,
}

impl Lexer {
    /// Lexer over a whole document, starting in markup mode. A leading
    /// byte order mark is skipped; offsets still count it.
    pub fn new(source: impl Into<String>) -> Self {
        let source: String = source.into();
        let bom = source.starts_with('\u{feff}');
        Self {
            pos: if bom { '\u{feff}'.len_utf8() } else { 0 },
            char_pos: usize::from(bom),
            source,
            line: 1,
            mode: Mode::Markup,
            version: PhpVersion::default(),
            short_tags: false,
            name_expected: false,
            current: Token::end(),
        }
    }

    /// Lexer over a bare PHP snippet (no open tag required).
    pub fn php(source: impl Into<String>) -> Self {
        let mut lexer = Self::new(source);
        lexer.mode = Mode::Php;
        lexer
    }

    /// Reads and decodes a file. Invalid UTF-8 sequences are replaced.
    pub fn open_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::new(String::from_utf8_lossy(&bytes).into_owned()))
    }

    pub fn with_version(mut self, version: PhpVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_short_tags(mut self, enabled: bool) -> Self {
        self.short_tags = enabled;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The last token produced by [`Lexer::next_token`].
    pub fn token(&self) -> &Token {
        &self.current
    }

    /// Text of the last token.
    pub fn lexeme(&self) -> &str {
        &self.current.text
    }

    /// Line the lexer is currently positioned on.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn in_php(&self) -> bool {
        self.mode == Mode::Php
    }

    /// Advances one token and returns its kind.
    pub fn next_token(&mut self) -> TokenKind {
        let kind = match self.mode {
            Mode::Markup => self.scan_markup(),
            Mode::Php => self.scan_php(),
        };
        if kind != TokenKind::Comment && kind != TokenKind::DocComment {
            self.name_expected = kind.expects_name()
                || (self.name_expected && kind == TokenKind::Ampersand);
        }
        kind
    }

    fn rest(&self) -> &[u8] {
        &self.source.as_bytes()[self.pos..]
    }

    fn peek_byte(&self, ahead: usize) -> Option<u8> {
        self.source.as_bytes().get(self.pos + ahead).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s.as_bytes())
    }

    fn starts_with_ignore_case(&self, s: &str) -> bool {
        let rest = self.rest();
        rest.len() >= s.len() && rest[..s.len()].eq_ignore_ascii_case(s.as_bytes())
    }

    /// Consumes one character, keeping line and char counters in sync.
    fn bump(&mut self) -> Option<char> {
        let c = self.source[self.pos..].chars().next()?;
        self.pos += c.len_utf8();
        self.char_pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            if self.bump().is_none() {
                break;
            }
        }
    }

    fn bump_to_end(&mut self) {
        while self.bump().is_some() {}
    }

    fn finish(&mut self, kind: TokenKind, start: usize, start_char: usize, start_line: usize) -> TokenKind {
        self.current = Token {
            kind,
            text: self.source[start..self.pos].to_string(),
            offset: start_char,
            byte_offset: start,
            line: start_line,
        };
        kind
    }

    fn finish_end(&mut self) -> TokenKind {
        let (pos, char_pos, line) = (self.pos, self.char_pos, self.line);
        self.finish(TokenKind::End, pos, char_pos, line)
    }

    /// Length of an open tag at the current position, if any.
    fn open_tag_at(&self) -> Option<(usize, TokenKind)> {
        if !self.starts_with("<?") {
            return None;
        }
        if self.starts_with("<?=") {
            return Some((3, TokenKind::OpenTagWithEcho));
        }
        if self.starts_with_ignore_case("<?php") {
            match self.peek_byte(5) {
                None => return Some((5, TokenKind::OpenTag)),
                Some(c) if c.is_ascii_whitespace() => return Some((6, TokenKind::OpenTag)),
                _ => {}
            }
        }
        if self.short_tags && !self.starts_with_ignore_case("<?xml") {
            return Some((2, TokenKind::OpenTag));
        }
        None
    }

    fn scan_markup(&mut self) -> TokenKind {
        let (start, start_char, start_line) = (self.pos, self.char_pos, self.line);
        if self.pos >= self.source.len() {
            return self.finish_end();
        }
        if let Some((len, kind)) = self.open_tag_at() {
            self.bump_n(len);
            self.mode = Mode::Php;
            return self.finish(kind, start, start_char, start_line);
        }
        // consume a run of markup up to the next real open tag
        loop {
            self.bump();
            if self.pos >= self.source.len() || self.open_tag_at().is_some() {
                break;
            }
        }
        self.finish(TokenKind::InlineHtml, start, start_char, start_line)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_byte(0) {
            if c.is_ascii_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn scan_php(&mut self) -> TokenKind {
        self.skip_whitespace();
        let (start, start_char, start_line) = (self.pos, self.char_pos, self.line);
        let Some(c) = self.peek_byte(0) else {
            return self.finish_end();
        };

        if self.starts_with("?>") {
            self.bump_n(2);
            if self.starts_with("\r\n") {
                self.bump_n(2);
            } else if self.peek_byte(0) == Some(b'\n') {
                self.bump();
            }
            self.mode = Mode::Markup;
            return self.finish(TokenKind::CloseTag, start, start_char, start_line);
        }

        if c == b'$' && self.peek_byte(1).map_or(false, is_ident_start) {
            self.bump();
            self.eat_identifier();
            return self.finish(TokenKind::Variable, start, start_char, start_line);
        }

        if is_ident_start(c) {
            self.eat_identifier();
            let word = &self.source[start..self.pos];
            let kind = if self.name_expected {
                TokenKind::Identifier
            } else {
                keyword(&word.to_ascii_lowercase(), self.version).unwrap_or(TokenKind::Identifier)
            };
            return self.finish(kind, start, start_char, start_line);
        }

        if c.is_ascii_digit() || (c == b'.' && self.peek_byte(1).map_or(false, |d| d.is_ascii_digit())) {
            let kind = self.eat_number();
            return self.finish(kind, start, start_char, start_line);
        }

        match c {
            b'\'' => {
                let kind = self.eat_single_quoted();
                return self.finish(kind, start, start_char, start_line);
            }
            b'"' => {
                let kind = self.eat_double_quoted(b'"');
                return self.finish(kind, start, start_char, start_line);
            }
            b'`' => {
                let kind = match self.eat_double_quoted(b'`') {
                    TokenKind::Error => TokenKind::Error,
                    _ => TokenKind::ShellCommand,
                };
                return self.finish(kind, start, start_char, start_line);
            }
            _ => {}
        }

        if self.starts_with("<<<") {
            let kind = self.eat_heredoc();
            return self.finish(kind, start, start_char, start_line);
        }

        if self.starts_with("/**") && !self.starts_with("/**/") {
            self.eat_block_comment();
            return self.finish(TokenKind::DocComment, start, start_char, start_line);
        }
        if self.starts_with("/*") {
            self.eat_block_comment();
            return self.finish(TokenKind::Comment, start, start_char, start_line);
        }
        if self.starts_with("//") || (c == b'#' && self.peek_byte(1) != Some(b'[')) {
            self.eat_line_comment();
            return self.finish(TokenKind::Comment, start, start_char, start_line);
        }

        for (text, kind) in OPERATORS_3.iter().chain(OPERATORS_2.iter()) {
            if self.starts_with(text) {
                self.bump_n(text.len());
                return self.finish(*kind, start, start_char, start_line);
            }
        }
        if let Some(kind) = single_char_operator(c) {
            self.bump();
            return self.finish(kind, start, start_char, start_line);
        }

        self.bump();
        self.finish(TokenKind::Error, start, start_char, start_line)
    }

    fn eat_identifier(&mut self) {
        while let Some(c) = self.peek_byte(0) {
            if !is_ident_char(c) {
                break;
            }
            self.bump();
        }
    }

    fn eat_digits(&mut self, accept: fn(u8) -> bool) {
        while let Some(c) = self.peek_byte(0) {
            if accept(c) || c == b'_' {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn eat_number(&mut self) -> TokenKind {
        if self.peek_byte(0) == Some(b'0') {
            match self.peek_byte(1) {
                Some(b'x') | Some(b'X') => {
                    self.bump_n(2);
                    self.eat_digits(|c| c.is_ascii_hexdigit());
                    return TokenKind::IntegerLiteral;
                }
                Some(b'b') | Some(b'B') => {
                    self.bump_n(2);
                    self.eat_digits(|c| c == b'0' || c == b'1');
                    return TokenKind::IntegerLiteral;
                }
                Some(b'o') | Some(b'O') => {
                    self.bump_n(2);
                    self.eat_digits(|c| (b'0'..=b'7').contains(&c));
                    return TokenKind::IntegerLiteral;
                }
                _ => {}
            }
        }
        let mut kind = TokenKind::IntegerLiteral;
        self.eat_digits(|c| c.is_ascii_digit());
        if self.peek_byte(0) == Some(b'.') && self.peek_byte(1).map_or(true, |c| c != b'.') {
            kind = TokenKind::FloatLiteral;
            self.bump();
            self.eat_digits(|c| c.is_ascii_digit());
        }
        if matches!(self.peek_byte(0), Some(b'e') | Some(b'E')) {
            let sign = matches!(self.peek_byte(1), Some(b'+') | Some(b'-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_byte(digit_at).map_or(false, |c| c.is_ascii_digit()) {
                kind = TokenKind::FloatLiteral;
                self.bump_n(digit_at);
                self.eat_digits(|c| c.is_ascii_digit());
            }
        }
        kind
    }

    fn eat_single_quoted(&mut self) -> TokenKind {
        self.bump();
        loop {
            match self.peek_byte(0) {
                None => return TokenKind::Error,
                Some(b'\\') => self.bump_n(2),
                Some(b'\'') => {
                    self.bump();
                    return TokenKind::StringLiteral;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    /// Double-quoted strings and backtick commands. `{$expr}` interpolations
    /// may themselves contain quotes, so braces are balanced.
    fn eat_double_quoted(&mut self, quote: u8) -> TokenKind {
        self.bump();
        let mut interpolated = false;
        loop {
            match self.peek_byte(0) {
                None => return TokenKind::Error,
                Some(b'\\') => self.bump_n(2),
                Some(c) if c == quote => {
                    self.bump();
                    return if interpolated {
                        TokenKind::TemplateString
                    } else {
                        TokenKind::StringLiteral
                    };
                }
                Some(b'$') => {
                    if self.peek_byte(1).map_or(false, |c| is_ident_start(c) || c == b'{') {
                        interpolated = true;
                    }
                    self.bump();
                }
                Some(b'{') if self.peek_byte(1) == Some(b'$') => {
                    interpolated = true;
                    if !self.eat_interpolation() {
                        return TokenKind::Error;
                    }
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn eat_interpolation(&mut self) -> bool {
        let mut depth = 0usize;
        loop {
            match self.peek_byte(0) {
                None => return false,
                Some(b'{') => {
                    depth += 1;
                    self.bump();
                }
                Some(b'}') => {
                    self.bump();
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return true;
                    }
                }
                Some(b'\'') => {
                    if self.eat_single_quoted() == TokenKind::Error {
                        return false;
                    }
                }
                Some(b'"') => {
                    if self.eat_double_quoted(b'"') == TokenKind::Error {
                        return false;
                    }
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn eat_heredoc(&mut self) -> TokenKind {
        self.bump_n(3);
        while matches!(self.peek_byte(0), Some(b' ') | Some(b'\t')) {
            self.bump();
        }
        let quote = match self.peek_byte(0) {
            Some(q @ b'"') | Some(q @ b'\'') => {
                self.bump();
                Some(q)
            }
            _ => None,
        };
        let label_start = self.pos;
        self.eat_identifier();
        let label = self.source[label_start..self.pos].to_string();
        if label.is_empty() {
            self.bump_to_end();
            return TokenKind::Error;
        }
        if let Some(q) = quote {
            if self.peek_byte(0) != Some(q) {
                self.bump_to_end();
                return TokenKind::Error;
            }
            self.bump();
        }
        // body runs until a line whose first non-blank text is the label
        loop {
            match self.peek_byte(0) {
                None => return TokenKind::Error,
                Some(b'\n') => {
                    self.bump();
                    while matches!(self.peek_byte(0), Some(b' ') | Some(b'\t')) {
                        self.bump();
                    }
                    if self.starts_with(&label)
                        && !self.peek_byte(label.len()).map_or(false, is_ident_char)
                    {
                        self.bump_n(label.len());
                        return TokenKind::Heredoc;
                    }
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn eat_block_comment(&mut self) {
        self.bump_n(2);
        loop {
            if self.pos >= self.source.len() {
                return;
            }
            if self.starts_with("*/") {
                self.bump_n(2);
                return;
            }
            self.bump();
        }
    }

    fn eat_line_comment(&mut self) {
        while let Some(c) = self.peek_byte(0) {
            if c == b'\n' || self.starts_with("?>") {
                break;
            }
            self.bump();
        }
    }
}

impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        match self.next_token() {
            TokenKind::End => None,
            _ => Some(self.current.clone()),
        }
    }
}

/// Maps an offset in decoded characters to a UTF-8 byte offset.
pub fn utf8_offset(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

/// Maps a UTF-8 byte offset to an offset in decoded characters.
pub fn char_offset(text: &str, byte_offset: usize) -> usize {
    let mut end = byte_offset.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source).map(|t| t.kind).collect()
    }

    #[test]
    fn test_markup_and_php_modes() {
        let tokens: Vec<Token> = Lexer::new("<html><?php echo $a; ?>\n<b>").collect();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::InlineHtml,
                TokenKind::OpenTag,
                TokenKind::Echo,
                TokenKind::Variable,
                TokenKind::Semicolon,
                TokenKind::CloseTag,
                TokenKind::InlineHtml,
            ]
        );
        assert_eq!(tokens[0].text, "<html>");
        assert_eq!(tokens[3].text, "$a");
        assert_eq!(tokens[3].offset, 17);
        assert_eq!(tokens[6].text, "<b>");
        assert_eq!(tokens[6].line, 2);
    }

    #[test]
    fn test_line_numbers_and_offsets() {
        let mut lexer = Lexer::new("<?php\n\n$first = 1;\n$second = 2;");
        assert_eq!(lexer.next_token(), TokenKind::OpenTag);
        assert_eq!(lexer.next_token(), TokenKind::Variable);
        assert_eq!(lexer.lexeme(), "$first");
        assert_eq!(lexer.token().line, 3);
        assert_eq!(lexer.token().offset, 7);
        lexer.next_token();
        lexer.next_token();
        lexer.next_token();
        assert_eq!(lexer.next_token(), TokenKind::Variable);
        assert_eq!(lexer.token().line, 4);
    }

    #[test]
    fn test_char_and_byte_offsets_diverge_after_multibyte_text() {
        let mut lexer = Lexer::php("'héllo' $x");
        assert_eq!(lexer.next_token(), TokenKind::StringLiteral);
        assert_eq!(lexer.next_token(), TokenKind::Variable);
        assert_eq!(lexer.token().offset, 8);
        assert_eq!(lexer.token().byte_offset, 9);
        assert_eq!(utf8_offset("'héllo' $x", 8), 9);
        assert_eq!(char_offset("'héllo' $x", 9), 8);
    }

    #[test]
    fn test_keywords_after_member_access_are_identifiers() {
        assert_eq!(
            kinds("<?php $a->list; Foo::class; function new() {}"),
            vec![
                TokenKind::OpenTag,
                TokenKind::Variable,
                TokenKind::Arrow,
                TokenKind::Identifier,
                TokenKind::Semicolon,
                TokenKind::Identifier,
                TokenKind::DoubleColon,
                TokenKind::Identifier,
                TokenKind::Semicolon,
                TokenKind::Function,
                TokenKind::Identifier,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::RBrace,
            ]
        );
    }

    #[test]
    fn test_operators_prefer_longest_match() {
        let got = kinds("<?php $a ??= $b <=> $c?->d === 1 ... **");
        assert!(got.contains(&TokenKind::CompoundAssign));
        assert!(got.contains(&TokenKind::Spaceship));
        assert!(got.contains(&TokenKind::NullsafeArrow));
        assert!(got.contains(&TokenKind::Identical));
        assert!(got.contains(&TokenKind::Ellipsis));
        assert!(got.contains(&TokenKind::Pow));
    }

    #[test]
    fn test_strings_and_interpolation() {
        let tokens: Vec<Token> = Lexer::php(r#"'it\'s' "plain" "hi $name" "{$a["k"]}""#).collect();
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[1].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[2].kind, TokenKind::TemplateString);
        assert_eq!(tokens[3].kind, TokenKind::TemplateString);
        assert_eq!(tokens[3].text, r#""{$a["k"]}""#);
    }

    #[test]
    fn test_heredoc_is_one_token() {
        let source = "<?php $x = <<<EOT\nline $a\n  EOT;\n$y;";
        let tokens: Vec<Token> = Lexer::new(source).collect();
        let heredoc = tokens.iter().find(|t| t.kind == TokenKind::Heredoc).unwrap();
        assert!(heredoc.text.ends_with("EOT"));
        assert_eq!(tokens.last().unwrap().text, ";");
        assert_eq!(tokens[tokens.len() - 2].text, "$y");
        assert_eq!(tokens[tokens.len() - 2].line, 4);
    }

    #[test]
    fn test_comments() {
        let tokens: Vec<Token> = Lexer::php("/** doc */ /* c */ // line\n# hash\n#[Attr]").collect();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::DocComment,
                TokenKind::Comment,
                TokenKind::Comment,
                TokenKind::Comment,
                TokenKind::Attribute,
                TokenKind::Identifier,
                TokenKind::RBracket,
            ]
        );
    }

    #[test]
    fn test_line_comment_stops_at_close_tag() {
        assert_eq!(
            kinds("<?php // note ?>text"),
            vec![TokenKind::OpenTag, TokenKind::Comment, TokenKind::CloseTag, TokenKind::InlineHtml]
        );
    }

    #[test]
    fn test_unterminated_string_fails_closed() {
        let mut lexer = Lexer::php("'never closed");
        assert_eq!(lexer.next_token(), TokenKind::Error);
        assert_eq!(lexer.next_token(), TokenKind::End);
        assert_eq!(lexer.next_token(), TokenKind::End);
    }

    #[test]
    fn test_short_tags_only_when_enabled() {
        assert_eq!(kinds("<? echo 1;"), vec![TokenKind::InlineHtml]);
        let short: Vec<TokenKind> = Lexer::new("<? echo 1;").with_short_tags(true).map(|t| t.kind).collect();
        assert_eq!(short[0], TokenKind::OpenTag);
        assert_eq!(short[1], TokenKind::Echo);
    }

    #[test]
    fn test_version_dependent_keywords() {
        let old: Vec<TokenKind> = Lexer::php("fn match").with_version(PhpVersion::Php70).map(|t| t.kind).collect();
        assert_eq!(old, vec![TokenKind::Identifier, TokenKind::Identifier]);
        let new: Vec<TokenKind> = Lexer::php("fn match").with_version(PhpVersion::Php81).map(|t| t.kind).collect();
        assert_eq!(new, vec![TokenKind::Fn, TokenKind::Match]);
    }

    #[test]
    fn test_numbers() {
        let tokens: Vec<TokenKind> = Lexer::php("1 0x1F 1.5 1e3 1_000 .5").map(|t| t.kind).collect();
        assert_eq!(
            tokens,
            vec![
                TokenKind::IntegerLiteral,
                TokenKind::IntegerLiteral,
                TokenKind::FloatLiteral,
                TokenKind::FloatLiteral,
                TokenKind::IntegerLiteral,
                TokenKind::FloatLiteral,
            ]
        );
    }

    #[test]
    fn test_byte_order_mark_keeps_caller_offsets() {
        let source = "\u{feff}<?php $cart;";
        let tokens: Vec<Token> = Lexer::new(source).collect();
        assert_eq!(tokens[0].kind, TokenKind::OpenTag);
        assert_eq!(tokens[1].text, "$cart");
        assert_eq!(tokens[1].offset, 7);
        assert_eq!(tokens[1].byte_offset, 9);
        let start = tokens[1].byte_offset;
        assert_eq!(&source[start..start + tokens[1].text.len()], "$cart");
    }

    proptest! {
        #[test]
        fn prop_lexer_terminates_on_any_input(source in ".{0,200}") {
            let mut lexer = Lexer::new(format!("<?php {}", source));
            let mut steps = 0;
            while lexer.next_token() != TokenKind::End {
                steps += 1;
                prop_assert!(steps <= source.len() + 2);
            }
        }
    }
}
