// Call-arity check and parameter counting from raw signature text

use serde::Serialize;

use crate::index::Tag;
use crate::parser::{Argument, ExpressionKind, MemberKind, ParseEvent};

use super::{display_name, ArityMismatch, LintContext, LintEngine, LintResult};

/// One parameter as far as argument counting is concerned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SignatureParam {
    pub by_ref: bool,
    pub optional: bool,
    pub variadic: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub params: Vec<SignatureParam>,
}

/// Accepted argument counts; `maximum` is `None` for variadic signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Arity {
    pub required: usize,
    pub maximum: Option<usize>,
}

impl Signature {
    pub fn arity(&self) -> Arity {
        let variadic = self.params.iter().any(|p| p.variadic);
        Arity {
            required: self.params.iter().filter(|p| !p.optional && !p.variadic).count(),
            maximum: (!variadic).then_some(self.params.len()),
        }
    }

    /// Whether the argument at `position` is passed by reference. The last
    /// parameter covers every position past it when it is variadic.
    pub fn is_by_ref(&self, position: usize) -> bool {
        match self.params.get(position) {
            Some(param) => param.by_ref,
            None => self.params.last().map_or(false, |p| p.variadic && p.by_ref),
        }
    }
}

/// Splits a parameter list such as `(string $a, $b = now())` or the
/// bracketed `(string $a [, int $b])` form into counted parameters.
pub fn parse_signature(text: &str) -> Signature {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('(')
        .map(|rest| rest.strip_suffix(')').unwrap_or(rest))
        .unwrap_or(trimmed);

    let mut params = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    // everything after an optional `[` is optional
    let mut bracketed = false;
    let mut optional = false;
    let mut escaped = false;

    for c in inner.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '{' => {
                depth += 1;
                current.push(c);
            }
            '[' if depth == 0 && !current.contains('=') => {
                bracketed = true;
                if current.trim().is_empty() {
                    optional = true;
                }
            }
            '[' => {
                depth += 1;
                current.push(c);
            }
            ')' | '}' | ']' if depth > 0 => {
                depth -= 1;
                current.push(c);
            }
            ']' => {}
            ',' if depth == 0 => {
                params.extend(counted(&current, optional));
                current.clear();
                optional = bracketed;
            }
            _ => current.push(c),
        }
    }
    params.extend(counted(&current, optional));

    Signature { params }
}

fn counted(text: &str, optional: bool) -> Option<SignatureParam> {
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("void") {
        return None;
    }
    let head = text.split('=').next().unwrap_or(text);
    Some(SignatureParam {
        by_ref: head.contains('&'),
        optional: optional || text.contains('='),
        variadic: head.contains("..."),
    })
}

/// Arity all candidates agree on. Candidates that take any number of
/// arguments, or that disagree, make the call unknown.
fn agreed_arity(candidates: &[Tag]) -> Option<(usize, usize)> {
    let mut agreed = None;
    for tag in candidates {
        if tag.has_variable_args {
            return None;
        }
        let arity = parse_signature(&tag.signature).arity();
        let maximum = arity.maximum?;
        match agreed {
            None => agreed = Some((arity.required, maximum)),
            Some(found) if found != (arity.required, maximum) => return None,
            Some(_) => {}
        }
    }
    agreed
}

/// Flags calls passing fewer arguments than required or more than declared
#[derive(Debug, Default)]
pub struct CallArity {
    results: Vec<LintResult>,
}

impl CallArity {
    fn check(&mut self, identifier: String, candidates: &[Tag], args: &[Argument], line: usize, offset: usize) {
        if args.iter().any(|a| a.is_spread) {
            return;
        }
        let Some((required, maximum)) = agreed_arity(candidates) else {
            return;
        };
        let actual = args.len();
        let mismatch = if actual < required {
            ArityMismatch::TooFew
        } else if actual > maximum {
            ArityMismatch::TooMany
        } else {
            return;
        };
        self.results.push(LintResult::ArgumentCount {
            mismatch,
            identifier,
            expected: required,
            maximum,
            actual,
            line,
            offset,
        });
    }
}

impl LintEngine for CallArity {
    fn observe(&mut self, event: &ParseEvent, cx: &LintContext<'_, '_>) {
        let ParseEvent::Expression(expr) = event else {
            return;
        };
        match &expr.kind {
            ExpressionKind::FunctionCall {
                name,
                fqn,
                global_fallback,
                args,
            } => {
                let candidates = cx.functions(name, fqn, *global_fallback);
                self.check(display_name(name), &candidates, args, expr.line, expr.offset);
            }
            ExpressionKind::New { class_name, args } => {
                let candidates = cx.constructor(class_name);
                self.check(display_name(class_name), &candidates, args, expr.line, expr.offset);
            }
            ExpressionKind::MemberAccess { chain, .. } => {
                for (index, member) in chain.members.iter().enumerate() {
                    if member.kind != MemberKind::Method || member.name.is_empty() {
                        continue;
                    }
                    let candidates = cx.method_targets(chain, index, expr.offset);
                    let Some(first) = candidates.first() else {
                        continue;
                    };
                    let identifier = format!("{}::{}", display_name(&first.fully_qualified_class()), member.name);
                    // the nearest declaration in the hierarchy wins
                    let nearest = std::slice::from_ref(first);
                    self.check(identifier, nearest, &member.args, expr.line, expr.offset);
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
    use super::*;
    use std::sync::Arc;

    use crate::config::{LintConfig, TagConfig};
    use crate::index::NativeTags;
    use crate::lint::Linter;

    fn arity_only() -> Linter {
        let checks = LintConfig {
            check_uninitialized_variables: false,
            check_unknown_identifiers: false,
            check_call_arity: true,
            ..LintConfig::default()
        };
        Linter::new(TagConfig::default(), checks, Arc::new(NativeTags::bundled().unwrap()))
    }

    #[test]
    fn test_parse_signature() {
        let arity = parse_signature("(string $format, $timestamp = now())").arity();
        assert_eq!(arity, Arity { required: 1, maximum: Some(2) });

        let bracketed = parse_signature("(string $a [, int $b [, int $c]])").arity();
        assert_eq!(bracketed, Arity { required: 1, maximum: Some(3) });

        let defaults = parse_signature("(array $a = [1, 2], string $s = 'x,y')").arity();
        assert_eq!(defaults, Arity { required: 0, maximum: Some(2) });

        let variadic = parse_signature("(string $format, mixed ...$values)").arity();
        assert_eq!(variadic, Arity { required: 1, maximum: None });

        assert_eq!(parse_signature("()").params.len(), 0);
        assert_eq!(parse_signature("(void)").params.len(), 0);
    }

    #[test]
    fn test_by_ref_positions() {
        let signature = parse_signature("(string $pattern, string $subject, &$matches = null, int $flags = 0)");
        assert!(!signature.is_by_ref(1));
        assert!(signature.is_by_ref(2));
        assert!(!signature.is_by_ref(7));

        let push = parse_signature("(array &...$arrays)");
        assert!(push.is_by_ref(0));
        assert!(push.is_by_ref(3));
    }

    #[test]
    fn test_call_arity_boundaries() {
        let source = "<?php\nfunction stamp(string $format, $timestamp = now()) {}\nstamp();\nstamp('Y');\nstamp('Y', 1);\nstamp('Y', 1, 2);\n";
        let results = arity_only().lint_string(source, "/p/a.php");
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].status_code(), "TOO_FEW_ARGS");
        assert!(matches!(
            results[0],
            LintResult::ArgumentCount { expected: 1, actual: 0, line: 3, .. }
        ));
        assert_eq!(results[1].status_code(), "TOO_MANY_ARGS");
        assert!(matches!(
            results[1],
            LintResult::ArgumentCount { expected: 1, maximum: 2, actual: 3, line: 6, .. }
        ));
    }

    #[test]
    fn test_variadic_and_spread_calls_are_skipped() {
        let source = "<?php\nfunction one($a) {}\n$args = [1, 2];\none(...$args);\nsprintf('%s %s', 1, 2, 3, 4);\nfunction any() { return func_get_args(); }\nany(1, 2, 3);\n";
        assert!(arity_only().lint_string(source, "/p/a.php").is_empty());
    }

    #[test]
    fn test_native_and_method_calls() {
        let source = r#"<?php
class Box {
    public function __construct($size) {}
    public function put($item, $slot = 0) {}
}
strlen();
$box = new Box();
$box->put(1, 2, 3);
"#;
        let results = arity_only().lint_string(source, "/p/a.php");
        let found: Vec<(&str, &str)> = results.iter().map(|r| (r.status_code(), r.identifier())).collect();
        assert_eq!(
            found,
            vec![
                ("TOO_FEW_ARGS", "strlen"),
                ("TOO_FEW_ARGS", "Box"),
                ("TOO_MANY_ARGS", "Box::put"),
            ]
        );
    }

    #[test]
    fn test_conflicting_declarations_are_unknown() {
        let a = Tag {
            signature: "($a)".into(),
            ..Tag::new(crate::index::TagType::Function, "dup")
        };
        let b = Tag {
            signature: "($a, $b)".into(),
            ..a.clone()
        };
        assert_eq!(agreed_arity(&[a.clone(), a.clone()]), Some((1, 1)));
        assert_eq!(agreed_arity(&[a, b]), None);
        assert_eq!(agreed_arity(&[]), None);
    }
}
