// Lexical language at a cursor position in a mixed document

use serde::{Deserialize, Serialize};

use crate::lexer::{Lexer, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    Php,
    Html,
    JavaScript,
    Css,
}

/// Whether the last `open` tag in `markup` is still unclosed
fn inside_element(markup: &str, open: &str, close: &str) -> bool {
    match (markup.rfind(open), markup.rfind(close)) {
        (Some(o), Some(c)) => o > c,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Language at `offset`, counted in decoded characters.
pub fn language_at(text: &str, offset: usize, short_open_tags: bool) -> Language {
    let lexer = Lexer::new(text).with_short_tags(short_open_tags);
    let mut markup = String::new();
    let mut php = false;
    for token in lexer {
        if token.offset >= offset {
            break;
        }
        let end = token.offset + token.text.chars().count();
        match token.kind {
            TokenKind::InlineHtml => {
                php = false;
                markup.extend(token.text.chars().take(offset - token.offset));
            }
            TokenKind::OpenTag | TokenKind::OpenTagWithEcho => php = end <= offset,
            TokenKind::CloseTag => php = end > offset,
            _ => php = true,
        }
    }
    if php {
        return Language::Php;
    }
    let lower = markup.to_ascii_lowercase();
    if inside_element(&lower, "<script", "</script") {
        Language::JavaScript
    } else if inside_element(&lower, "<style", "</style") {
        Language::Css
    } else {
        Language::Html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_php_and_html_regions() {
        let text = "<p>hi</p><?php $a->b ?><div>";
        assert_eq!(language_at(text, 2, false), Language::Html);
        assert_eq!(language_at(text, 19, false), Language::Php);
        assert_eq!(language_at(text, text.len(), false), Language::Html);
    }

    #[test]
    fn test_unclosed_php_runs_to_end() {
        let text = "<?php\n$x = new Foo();\n$x->";
        assert_eq!(language_at(text, text.chars().count(), false), Language::Php);
    }

    #[test]
    fn test_script_and_style_elements() {
        let text = "<script>var a = 1;</script><style>p { color: red }</style>";
        assert_eq!(language_at(text, 12, false), Language::JavaScript);
        assert_eq!(language_at(text, 40, false), Language::Css);
        assert_eq!(language_at(text, 28, false), Language::Html);
    }
}
