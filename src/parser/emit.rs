// Walks expression trees and emits `ExpressionKind` events in evaluation
// order: operands before the operation that consumes them, assigned values
// before the write.

use super::ast::{Arg, ClassRef, Expr, LiteralKind};
use super::expression::{chain_from_expr, to_argument, ExpressionChain};
use super::{
    Argument, AssignedValue, ConstantDecl, ExpressionKind, IncludeKind, LiteralType, ParseEvent,
    Parser, Visibility,
};

fn literal_type(kind: LiteralKind) -> LiteralType {
    match kind {
        LiteralKind::String => LiteralType::String,
        LiteralKind::Integer => LiteralType::Integer,
        LiteralKind::Float => LiteralType::Float,
        LiteralKind::Boolean => LiteralType::Boolean,
        LiteralKind::Null => LiteralType::Null,
    }
}

fn cast_type(op: &str) -> Option<LiteralType> {
    let kind = match op {
        "(int)" | "(integer)" => LiteralType::Integer,
        "(bool)" | "(boolean)" => LiteralType::Boolean,
        "(float)" | "(double)" | "(real)" => LiteralType::Float,
        "(string)" | "(binary)" => LiteralType::String,
        "(array)" => LiteralType::Array,
        _ => return None,
    };
    Some(kind)
}

/// Variable an `isset()` item ultimately tests
fn chain_root_variable(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Variable { name, .. } => Some(name),
        Expr::PropertyFetch { object, .. } | Expr::MethodCall { object, .. } => {
            chain_root_variable(object)
        }
        Expr::ArrayAccess { base, .. } => chain_root_variable(base),
        _ => None,
    }
}

fn is_member_access(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::PropertyFetch { .. }
            | Expr::MethodCall { .. }
            | Expr::StaticProperty { .. }
            | Expr::StaticCall { .. }
            | Expr::ClassConst { .. }
    )
}

/// True for chains with at least one member access, e.g. `$a->b[0]`
fn has_member_access(expr: &Expr) -> bool {
    match expr {
        Expr::ArrayAccess { base, .. } => has_member_access(base),
        other => is_member_access(other),
    }
}

impl Parser {
    pub(crate) fn emit_expr(&mut self, expr: Expr) {
        self.walk(expr);
    }

    /// `new X` class name with `self`, `static` and `parent` bound to the
    /// enclosing class
    fn resolve_new_class(&self, name: &str) -> String {
        let class = self.classes.last();
        match (name.to_ascii_lowercase().as_str(), class) {
            ("self" | "static", Some(class)) => class.fqn.clone(),
            ("parent", Some(class)) if !class.parent.is_empty() => class.parent.clone(),
            _ => self.names.resolve_class(name),
        }
    }

    fn classify(&self, expr: &Expr) -> AssignedValue {
        match expr {
            Expr::New {
                class: ClassRef::Named(name),
                ..
            } => AssignedValue::New(self.resolve_new_class(name)),
            Expr::New { .. } => AssignedValue::Unknown,
            Expr::Literal { kind, .. } => AssignedValue::Literal(literal_type(*kind)),
            Expr::Interpolated { .. } => AssignedValue::Literal(LiteralType::String),
            Expr::Array { .. } => AssignedValue::Literal(LiteralType::Array),
            Expr::Closure(_) | Expr::ArrowFn(_) => AssignedValue::Closure,
            Expr::Binary { op, .. } if op == "." => AssignedValue::Literal(LiteralType::String),
            Expr::Unary { op, .. } => match cast_type(op) {
                Some(kind) => AssignedValue::Literal(kind),
                None => AssignedValue::Unknown,
            },
            Expr::Assign { value, .. } => self.classify(value),
            Expr::Wrapped {
                keyword: "clone",
                inner: Some(inner),
                ..
            } => self.classify(inner),
            other => chain_from_expr(other, Some(&self.names))
                .map(AssignedValue::Chain)
                .unwrap_or(AssignedValue::Unknown),
        }
    }

    fn read(&mut self, name: String, line: usize, offset: usize) {
        self.emit_expression(ExpressionKind::VariableRead { name }, line, offset);
    }

    fn write(&mut self, name: String, value: AssignedValue, by_ref: bool, line: usize, offset: usize) {
        self.emit_expression(
            ExpressionKind::VariableWrite {
                name,
                value,
                by_ref,
            },
            line,
            offset,
        );
    }

    /// Converts call arguments, walking everything except bare variables.
    /// Those stay in the argument list so consumers can tell by-reference
    /// parameters apart from reads.
    fn call_arguments(&mut self, args: Vec<Arg>) -> Vec<Argument> {
        args.into_iter()
            .map(|arg| {
                let converted = to_argument(&arg);
                if converted.variable.is_none() {
                    self.walk(arg.value);
                }
                converted
            })
            .collect()
    }

    fn walk(&mut self, expr: Expr) {
        match expr {
            Expr::Variable { name, pos } => self.read(name, pos.line, pos.offset),
            Expr::VariableVariable { inner, .. } => self.walk(*inner),
            Expr::Name { .. } | Expr::Literal { .. } | Expr::Unknown { .. } => {}
            Expr::Interpolated { variables, pos } => {
                for name in variables {
                    self.read(name, pos.line, pos.offset);
                }
            }
            Expr::Array { items, pos } => {
                let count = items.len();
                for item in items {
                    if let Some(key) = item.key {
                        self.walk(key);
                    }
                    if item.by_ref {
                        self.assign_target(item.value, AssignedValue::Unknown, true);
                    } else {
                        self.walk(item.value);
                    }
                }
                self.emit_expression(ExpressionKind::ArrayLiteral { count }, pos.line, pos.offset);
            }
            Expr::New { class, args, pos } => {
                let class_name = match class {
                    ClassRef::Named(name) => self.resolve_new_class(&name),
                    ClassRef::Dynamic(inner) => {
                        self.walk(*inner);
                        String::new()
                    }
                    ClassRef::Anonymous => String::new(),
                };
                let args = self.call_arguments(args);
                self.emit_expression(ExpressionKind::New { class_name, args }, pos.line, pos.offset);
            }
            Expr::Call { callee, args, pos } => match *callee {
                Expr::Name { name, .. } => {
                    let args = self.call_arguments(args);
                    self.declare_define(&name, &args, pos.line, pos.offset);
                    let (fqn, global_fallback) = self.names.resolve_function(&name);
                    self.emit_expression(
                        ExpressionKind::FunctionCall {
                            name,
                            fqn,
                            global_fallback,
                            args,
                        },
                        pos.line,
                        pos.offset,
                    );
                }
                other => {
                    self.walk(other);
                    for arg in args {
                        self.walk(arg.value);
                    }
                }
            },
            chain @ (Expr::PropertyFetch { .. }
            | Expr::MethodCall { .. }
            | Expr::StaticProperty { .. }
            | Expr::StaticCall { .. }
            | Expr::ClassConst { .. }) => self.walk_chain(chain, false),
            Expr::ArrayAccess { base, index, pos } => {
                if has_member_access(&base) {
                    let whole = Expr::ArrayAccess { base, index, pos };
                    self.walk_chain(whole, false);
                } else {
                    self.walk(*base);
                    if let Some(index) = index {
                        self.walk(*index);
                    }
                }
            }
            Expr::Assign {
                target,
                value,
                compound,
                by_ref,
                ..
            } => {
                let assigned = if compound {
                    AssignedValue::Unknown
                } else {
                    self.classify(&value)
                };
                if compound {
                    if let Expr::Variable { name, pos } = target.as_ref() {
                        self.read(name.clone(), pos.line, pos.offset);
                    }
                }
                self.walk(*value);
                self.assign_target(*target, assigned, by_ref);
            }
            Expr::Binary {
                op,
                left,
                right,
                pos,
            } => {
                self.walk(*left);
                self.walk(*right);
                self.emit_expression(ExpressionKind::Operator { op }, pos.line, pos.offset);
            }
            Expr::Unary { op, operand, pos } => {
                self.walk(*operand);
                self.emit_expression(ExpressionKind::Operator { op }, pos.line, pos.offset);
            }
            Expr::IncDec { operand, .. } => self.walk(*operand),
            Expr::Ternary {
                condition,
                then,
                otherwise,
                pos,
            } => {
                self.walk(*condition);
                if let Some(then) = then {
                    self.walk(*then);
                }
                self.walk(*otherwise);
                self.emit_expression(
                    ExpressionKind::Operator {
                        op: "?:".to_string(),
                    },
                    pos.line,
                    pos.offset,
                );
            }
            Expr::Instanceof { expr, class, pos } => {
                self.walk(*expr);
                match *class {
                    Expr::Name { name, .. } => {
                        let class_name = self.resolve_new_class(&name);
                        self.emit_expression(
                            ExpressionKind::Instanceof { class_name },
                            pos.line,
                            pos.offset,
                        );
                    }
                    other => self.walk(other),
                }
            }
            Expr::Isset {
                items,
                is_empty,
                pos,
            } => {
                let variables = items
                    .iter()
                    .filter_map(chain_root_variable)
                    .map(str::to_string)
                    .collect();
                self.emit_expression(
                    ExpressionKind::Isset {
                        variables,
                        is_empty,
                    },
                    pos.line,
                    pos.offset,
                );
            }
            Expr::Include { kind, expr, pos } => {
                self.walk(*expr);
                self.emit_expression(ExpressionKind::Include { kind }, pos.line, pos.offset);
            }
            Expr::Eval { expr, pos } => {
                self.walk(*expr);
                self.emit_expression(
                    ExpressionKind::Include {
                        kind: IncludeKind::Eval,
                    },
                    pos.line,
                    pos.offset,
                );
            }
            Expr::Closure(closure) => {
                let closure = *closure;
                let (line, offset) = (closure.decl.line, closure.decl.offset);
                for used in &closure.decl.uses {
                    if used.by_ref {
                        self.write(used.name.clone(), AssignedValue::Unknown, true, line, offset);
                    } else {
                        self.read(used.name.clone(), line, offset);
                    }
                }
                self.emit(ParseEvent::ClosureStart(closure.decl));
                for event in closure.body {
                    self.emit(event);
                }
                self.emit(ParseEvent::ClosureEnd {
                    offset: closure.end_offset,
                });
            }
            Expr::ArrowFn(arrow) => {
                let arrow = *arrow;
                self.emit(ParseEvent::ClosureStart(arrow.decl));
                self.walk(arrow.body);
                self.emit(ParseEvent::ClosureEnd {
                    offset: arrow.end_offset,
                });
            }
            Expr::Match { subject, arms, .. } => {
                self.walk(*subject);
                for arm in arms {
                    self.walk(arm);
                }
            }
            Expr::Wrapped { inner, .. } => {
                if let Some(inner) = inner {
                    self.walk(*inner);
                }
            }
        }
    }

    /// Emits the subject and argument events of a member chain, then a
    /// single `MemberAccess` for the whole chain.
    fn walk_chain(&mut self, expr: Expr, is_write: bool) {
        let pos = expr.pos();
        let chain = chain_from_expr(&expr, Some(&self.names));
        self.walk_chain_parts(expr);
        if let Some(chain) = chain.filter(|c: &ExpressionChain| !c.members.is_empty()) {
            self.emit_expression(
                ExpressionKind::MemberAccess { chain, is_write },
                pos.line,
                pos.offset,
            );
        }
    }

    fn walk_chain_parts(&mut self, expr: Expr) {
        match expr {
            Expr::PropertyFetch { object, .. } => self.walk_chain_parts(*object),
            Expr::MethodCall { object, args, .. } => {
                self.walk_chain_parts(*object);
                self.call_arguments(args);
            }
            Expr::StaticProperty { class, .. } | Expr::ClassConst { class, .. } => {
                self.walk_class_ref(*class)
            }
            Expr::StaticCall { class, args, .. } => {
                self.walk_class_ref(*class);
                self.call_arguments(args);
            }
            Expr::ArrayAccess { base, index, .. } => {
                self.walk_chain_parts(*base);
                if let Some(index) = index {
                    self.walk(*index);
                }
            }
            other => self.walk(other),
        }
    }

    fn walk_class_ref(&mut self, class: Expr) {
        if !matches!(class, Expr::Name { .. }) {
            self.walk_chain_parts(class);
        }
    }

    /// Emits the writes for an assignment target.
    pub(crate) fn assign_target(&mut self, target: Expr, value: AssignedValue, by_ref: bool) {
        match target {
            Expr::Variable { name, pos } => self.write(name, value, by_ref, pos.line, pos.offset),
            Expr::VariableVariable { inner, .. } => self.walk(*inner),
            Expr::ArrayAccess { base, index, .. } => {
                if let Some(index) = index {
                    self.walk(*index);
                }
                self.assign_array_base(*base);
            }
            Expr::Array { items, .. } => {
                for item in items {
                    if let Some(key) = item.key {
                        self.walk(key);
                    }
                    self.assign_target(item.value, AssignedValue::Unknown, item.by_ref);
                }
            }
            chain @ (Expr::PropertyFetch { .. } | Expr::StaticProperty { .. }) => {
                self.walk_chain(chain, true)
            }
            other => self.walk(other),
        }
    }

    /// `$a[...] = v` initializes `$a` as an array
    fn assign_array_base(&mut self, base: Expr) {
        match base {
            Expr::Variable { name, pos } => self.write(
                name,
                AssignedValue::Literal(LiteralType::Array),
                false,
                pos.line,
                pos.offset,
            ),
            Expr::ArrayAccess { base, index, .. } => {
                if let Some(index) = index {
                    self.walk(*index);
                }
                self.assign_array_base(*base);
            }
            chain @ (Expr::PropertyFetch { .. } | Expr::StaticProperty { .. }) => {
                self.walk_chain(chain, true)
            }
            other => self.walk(other),
        }
    }

    /// `define('NAME', value)` declares a global constant.
    fn declare_define(&mut self, name: &str, args: &[Argument], line: usize, offset: usize) {
        if !name.trim_start_matches('\\').eq_ignore_ascii_case("define") {
            return;
        }
        let Some(constant) = args.first().and_then(|a| a.string_literal.clone()) else {
            return;
        };
        self.emit(ParseEvent::ConstantFound(ConstantDecl {
            class_name: String::new(),
            namespace_name: "\\".to_string(),
            name: constant.trim_start_matches('\\').to_string(),
            value: String::new(),
            visibility: Visibility::Public,
            comment: String::new(),
            line,
            offset,
        }));
    }
}
