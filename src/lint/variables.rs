// Uninitialized-variable check.
//
// Only function, method and closure bodies are checked; top-level code may
// see variables set by whatever included it. Within a body a variable is
// initialized by a parameter, an assignment (including destructuring and
// foreach), `global`, `static`, a catch clause, a by-reference closure
// `use`, or a by-reference argument. A call to `extract()` or an
// include turns the check off for the rest of the body.

use std::collections::HashSet;

use crate::index::Tag;
use crate::parser::{Argument, ExpressionKind, MemberKind, Param, ParseEvent};

use super::arity::parse_signature;
use super::{LintContext, LintEngine, LintResult};

/// Always defined inside a function body
const ALWAYS_SET: &[&str] = &[
    "$this",
    "$GLOBALS",
    "$_SERVER",
    "$_GET",
    "$_POST",
    "$_FILES",
    "$_COOKIE",
    "$_SESSION",
    "$_REQUEST",
    "$_ENV",
    "$http_response_header",
    "$argc",
    "$argv",
];

#[derive(Debug, Clone, Default)]
struct Frame {
    checked: bool,
    disabled: bool,
    declared: HashSet<String>,
    reported: HashSet<String>,
}

impl Frame {
    fn body(params: &[Param]) -> Self {
        Self {
            checked: true,
            declared: params.iter().map(|p| p.name.clone()).collect(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct UninitializedVariables {
    frames: Vec<Frame>,
    results: Vec<LintResult>,
}

impl UninitializedVariables {
    fn frame(&mut self) -> &mut Frame {
        if self.frames.is_empty() {
            self.frames.push(Frame::default());
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn declare(&mut self, name: &str) {
        self.frame().declared.insert(name.to_string());
    }

    fn read(&mut self, name: &str, line: usize, offset: usize) {
        if ALWAYS_SET.contains(&name) {
            return;
        }
        let frame = self.frame();
        if !frame.checked || frame.disabled || frame.declared.contains(name) {
            return;
        }
        if frame.reported.insert(name.to_string()) {
            self.results.push(LintResult::UninitializedVariable {
                variable: name.to_string(),
                line,
                offset,
            });
        }
    }

    /// Bare variables passed to a call. Arguments of calls whose target is
    /// unknown are taken as initialized.
    fn arguments(&mut self, targets: &[Tag], args: &[Argument], line: usize, offset: usize) {
        let signatures: Vec<_> = targets.iter().map(|t| parse_signature(&t.signature)).collect();
        for (position, arg) in args.iter().enumerate() {
            let Some(name) = &arg.variable else {
                continue;
            };
            let by_ref = signatures.iter().any(|s| s.is_by_ref(position));
            if signatures.is_empty() || by_ref {
                self.declare(name);
            } else {
                self.read(name, line, offset);
            }
        }
    }

    fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }
}

impl LintEngine for UninitializedVariables {
    fn observe(&mut self, event: &ParseEvent, cx: &LintContext<'_, '_>) {
        match event {
            ParseEvent::MethodFound(method) => {
                self.frame();
                self.frames.push(Frame::body(&method.params));
            }
            ParseEvent::FunctionFound(function) => {
                self.frame();
                self.frames.push(Frame::body(&function.params));
            }
            ParseEvent::ClosureStart(closure) => {
                let frame = if closure.is_arrow {
                    let mut inherited = self.frame().clone();
                    inherited.declared.extend(closure.params.iter().map(|p| p.name.clone()));
                    inherited
                } else {
                    let mut body = Frame::body(&closure.params);
                    body.declared.extend(closure.uses.iter().map(|u| u.name.clone()));
                    body
                };
                self.frames.push(frame);
            }
            ParseEvent::FunctionEnd { .. } | ParseEvent::ClosureEnd { .. } => self.pop(),
            ParseEvent::Expression(expr) => {
                let (line, offset) = (expr.line, expr.offset);
                match &expr.kind {
                    ExpressionKind::VariableRead { name } => self.read(name, line, offset),
                    ExpressionKind::VariableWrite { name, .. }
                    | ExpressionKind::Global { name }
                    | ExpressionKind::StaticVariable { name } => self.declare(name),
                    ExpressionKind::Isset { variables, .. } => {
                        for name in variables {
                            self.declare(name);
                        }
                    }
                    ExpressionKind::Include { .. } => self.frame().disabled = true,
                    ExpressionKind::FunctionCall {
                        name,
                        fqn,
                        global_fallback,
                        args,
                    } => {
                        let targets = cx.functions(name, fqn, *global_fallback);
                        self.arguments(&targets, args, line, offset);
                        match name.trim_start_matches('\\').to_ascii_lowercase().as_str() {
                            "extract" => self.frame().disabled = true,
                            "compact" => {
                                for literal in args.iter().filter_map(|a| a.string_literal.as_deref()) {
                                    self.read(&format!("${}", literal), line, offset);
                                }
                            }
                            _ => {}
                        }
                    }
                    ExpressionKind::New { class_name, args } => {
                        let targets = cx.constructor(class_name);
                        self.arguments(&targets, args, line, offset);
                    }
                    ExpressionKind::MemberAccess { chain, .. } => {
                        for (index, member) in chain.members.iter().enumerate() {
                            if member.kind == MemberKind::Method && !member.args.is_empty() {
                                let targets = cx.method_targets(chain, index, offset);
                                self.arguments(&targets, &member.args, line, offset);
                            }
                        }
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
