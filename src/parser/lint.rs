//! Syntax check backed by the tree-sitter PHP grammar.
//!
//! Reports at most one error, the first one in document order, like
//! `php -l`. Documents without a PHP open tag are plain markup and always
//! pass.

use std::fmt;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use tree_sitter::{Node, Parser as TreeParser, Tree};

use crate::lexer::char_offset;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxError {
    pub message: String,
    /// 1-based
    pub line: usize,
    /// Offset in decoded characters from the start of the document
    pub offset: usize,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on line {}", self.message, self.line)
    }
}

impl std::error::Error for SyntaxError {}

fn has_open_tag(source: &str, short_open_tags: bool) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.contains("<?php") || lower.contains("<?=") || (short_open_tags && source.contains("<?"))
}

fn parse_tree(source: &str) -> anyhow::Result<Tree> {
    let mut parser = TreeParser::new();
    parser.set_language(&tree_sitter_php::LANGUAGE_PHP.into())?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| anyhow::anyhow!("Failed to parse PHP code"))?;

    Ok(tree)
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error(child) {
            return Some(found);
        }
    }
    None
}

fn describe(node: Node, source: &str) -> String {
    if node.is_missing() {
        return format!("syntax error, missing '{}'", node.kind());
    }
    let text = node.utf8_text(source.as_bytes()).unwrap_or("");
    match text.split_whitespace().next() {
        Some(word) => {
            let word: String = word.chars().take(30).collect();
            format!("syntax error, unexpected '{}'", word)
        }
        None => "syntax error, unexpected end of file".to_string(),
    }
}

/// Checks one buffer. `Ok(())` means the buffer is syntactically valid.
pub fn lint_string(source: &str, short_open_tags: bool) -> Result<(), SyntaxError> {
    if !has_open_tag(source, short_open_tags) {
        return Ok(());
    }
    // a byte order mark is not markup; offsets still count it
    let (body, skipped) = match source.strip_prefix('\u{feff}') {
        Some(body) => (body, 1),
        None => (source, 0),
    };
    let tree = match parse_tree(body) {
        Ok(tree) => tree,
        Err(e) => {
            tracing::warn!("Syntax check unavailable: {}", e);
            return Ok(());
        }
    };
    match first_error(tree.root_node()) {
        None => Ok(()),
        Some(node) => Err(SyntaxError {
            message: describe(node, body),
            line: node.start_position().row + 1,
            offset: char_offset(body, node.start_byte()) + skipped,
        }),
    }
}

/// Reads and checks a file. I/O failures are errors of the outer result.
pub fn lint_file(path: impl AsRef<Path>, short_open_tags: bool) -> anyhow::Result<Result<(), SyntaxError>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let source = String::from_utf8_lossy(&bytes);
    Ok(lint_string(&source, short_open_tags))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_code_passes() {
        assert!(lint_string("<?php\nclass A { function b() { return 1; } }\n", false).is_ok());
    }

    #[test]
    fn test_byte_order_mark_is_not_an_error() {
        assert!(lint_string("\u{feff}<?php\nclass A {}\n", false).is_ok());
        let err = lint_string("\u{feff}<?php function ( {", false).unwrap_err();
        assert!(err.offset >= 7);
    }

    #[test]
    fn test_markup_without_open_tag_passes() {
        assert!(lint_string("<html><body>{ unbalanced</body></html>", false).is_ok());
    }

    #[test]
    fn test_first_error_is_reported_with_position() {
        let err = lint_string("<?php\n$a = 1;\nfunction ( {\n", false).unwrap_err();
        assert!(err.line >= 2);
        assert!(err.message.starts_with("syntax error"));
        assert!(err.offset >= 6);
    }

    #[test]
    fn test_lint_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.php");
        std::fs::write(&path, "<?php echo 'hi';").unwrap();
        assert!(lint_file(&path, false).unwrap().is_ok());
        assert!(lint_file(dir.path().join("missing.php"), false).is_err());
    }
}
