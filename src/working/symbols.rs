//! Per-buffer scopes and variable assignments.
//!
//! Rebuilt wholesale from a buffer's event stream; there is no incremental
//! update. Each scope covers a char range, carries the namespace and
//! imports in effect where it starts, and records every assignment to each
//! of its variables in source order.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::parser::{AssignedValue, ExpressionKind, NameContext, Param, ParseEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScopeKind {
    Global,
    Class,
    Function,
    Method,
    Closure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub value: AssignedValue,
    pub line: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Scope {
    pub kind: ScopeKind,
    /// Char range, end inclusive
    pub start: usize,
    pub end: usize,
    pub names: NameContext,
    /// Fully qualified enclosing class, empty outside classes
    pub class_name: String,
    pub parent_class: String,
    pub function_name: String,
    pub is_static: bool,
    pub parent: Option<usize>,
    /// Keyed by name including the `$`
    pub variables: BTreeMap<String, Vec<Assignment>>,
}

impl Scope {
    fn new(kind: ScopeKind, start: usize, names: NameContext, parent: Option<usize>) -> Self {
        Self {
            kind,
            start,
            end: usize::MAX,
            names,
            class_name: String::new(),
            parent_class: String::new(),
            function_name: String::new(),
            is_static: false,
            parent,
            variables: BTreeMap::new(),
        }
    }

    fn assign(&mut self, name: &str, value: AssignedValue, line: usize, offset: usize) {
        self.variables
            .entry(name.to_string())
            .or_default()
            .push(Assignment { value, line, offset });
    }

    fn add_params(&mut self, params: &[Param], line: usize, offset: usize) {
        for param in params {
            let value = if param.type_hint.is_empty() {
                AssignedValue::Unknown
            } else {
                AssignedValue::TypeHint(param.type_hint.clone())
            };
            self.assign(&param.name, value, line, offset);
        }
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }

    /// Whether the scope is a function body, where variables are local
    pub fn is_function_like(&self) -> bool {
        matches!(self.kind, ScopeKind::Function | ScopeKind::Method | ScopeKind::Closure)
    }
}

/// All scopes of one buffer; index 0 is the file's global scope
#[derive(Debug, Clone, Serialize)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self {
            scopes: vec![Scope::new(ScopeKind::Global, 0, NameContext::default(), None)],
        }
    }
}

struct ClassFrame {
    fqn: String,
    parent: String,
    scope: usize,
}

impl SymbolTable {
    pub fn build(events: &[ParseEvent]) -> Self {
        let mut table = Self::default();
        let mut names = NameContext::default();
        let mut stack: Vec<usize> = vec![0];
        let mut classes: Vec<ClassFrame> = Vec::new();

        for event in events {
            let current = stack.last().copied().unwrap_or(0);
            match event {
                ParseEvent::Namespace { name, .. } => {
                    names.enter_namespace(name);
                    table.scopes[0].names = names.clone();
                }
                ParseEvent::Use(decl) => {
                    names.import(decl.kind, &decl.name, &decl.alias);
                    table.scopes[0].names = names.clone();
                }
                ParseEvent::ClassFound(class) => {
                    let mut scope = Scope::new(ScopeKind::Class, class.offset, names.clone(), Some(current));
                    scope.class_name = class.fully_qualified_name();
                    scope.parent_class = class.parent.clone();
                    let index = table.push(scope);
                    classes.push(ClassFrame {
                        fqn: class.fully_qualified_name(),
                        parent: class.parent.clone(),
                        scope: index,
                    });
                    stack.push(index);
                }
                ParseEvent::ClassEnd { offset, .. } => {
                    if let Some(frame) = classes.pop() {
                        table.scopes[frame.scope].end = *offset;
                        stack.retain(|&s| s != frame.scope);
                    }
                }
                ParseEvent::MethodFound(method) => {
                    let mut scope = Scope::new(ScopeKind::Method, method.offset, names.clone(), Some(current));
                    if let Some(frame) = classes.last() {
                        scope.class_name = frame.fqn.clone();
                        scope.parent_class = frame.parent.clone();
                    }
                    scope.function_name = method.name.clone();
                    scope.is_static = method.is_static;
                    scope.add_params(&method.params, method.line, method.offset);
                    stack.push(table.push(scope));
                }
                ParseEvent::FunctionFound(function) => {
                    let mut scope = Scope::new(ScopeKind::Function, function.offset, names.clone(), Some(current));
                    scope.function_name = function.name.clone();
                    scope.add_params(&function.params, function.line, function.offset);
                    stack.push(table.push(scope));
                }
                ParseEvent::FunctionEnd { offset } | ParseEvent::ClosureEnd { offset } => {
                    if stack.len() > 1 {
                        let index = current;
                        if table.scopes[index].is_function_like() {
                            table.scopes[index].end = *offset;
                            stack.pop();
                        }
                    }
                }
                ParseEvent::ClosureStart(closure) => {
                    let outer = &table.scopes[current];
                    let mut scope = Scope::new(ScopeKind::Closure, closure.offset, outer.names.clone(), Some(current));
                    scope.class_name = outer.class_name.clone();
                    scope.parent_class = outer.parent_class.clone();
                    scope.is_static = closure.is_static;
                    if closure.is_arrow {
                        scope.variables = outer.variables.clone();
                    } else {
                        for used in &closure.uses {
                            if let Some(assignments) = outer.variables.get(&used.name) {
                                scope.variables.insert(used.name.clone(), assignments.clone());
                            } else {
                                scope.assign(&used.name, AssignedValue::Unknown, closure.line, closure.offset);
                            }
                        }
                    }
                    scope.add_params(&closure.params, closure.line, closure.offset);
                    stack.push(table.push(scope));
                }
                ParseEvent::VariableDocType {
                    variable,
                    type_name,
                    line,
                } => {
                    // doc types apply from the statement they precede
                    let offset = table.scopes[current].start;
                    table.scopes[current].assign(variable, AssignedValue::DocType(type_name.clone()), *line, offset);
                }
                ParseEvent::Expression(expr) => match &expr.kind {
                    ExpressionKind::VariableWrite { name, value, .. } => {
                        table.scopes[current].assign(name, value.clone(), expr.line, expr.offset);
                    }
                    ExpressionKind::Global { name } | ExpressionKind::StaticVariable { name } => {
                        table.scopes[current].assign(name, AssignedValue::Unknown, expr.line, expr.offset);
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        table
    }

    fn push(&mut self, scope: Scope) -> usize {
        self.scopes.push(scope);
        self.scopes.len() - 1
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn global(&self) -> &Scope {
        &self.scopes[0]
    }

    /// Innermost scope containing `offset`
    pub fn scope_index_at(&self, offset: usize) -> usize {
        self.scopes
            .iter()
            .enumerate()
            .filter(|(_, s)| s.contains(offset))
            .max_by_key(|(i, s)| (s.start, *i))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    pub fn view_at(&self, offset: usize) -> ScopeView<'_> {
        ScopeView {
            table: self,
            scope: self.scope_index_at(offset),
            offset,
        }
    }
}

/// One scope of a table seen from a cursor position
#[derive(Debug, Clone, Copy)]
pub struct ScopeView<'a> {
    table: &'a SymbolTable,
    scope: usize,
    offset: usize,
}

impl<'a> ScopeView<'a> {
    pub fn scope(&self) -> &'a Scope {
        &self.table.scopes[self.scope]
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn names(&self) -> &'a NameContext {
        &self.scope().names
    }

    pub fn class_name(&self) -> &'a str {
        &self.scope().class_name
    }

    pub fn parent_class(&self) -> &'a str {
        &self.scope().parent_class
    }

    /// Value of the last assignment before the cursor, else the first one
    /// (loops may assign after use)
    pub fn variable_value(&self, name: &str) -> Option<&'a AssignedValue> {
        let assignments = self.scope().variables.get(name)?;
        assignments
            .iter()
            .rev()
            .find(|a| a.offset < self.offset)
            .or_else(|| assignments.first())
            .map(|a| &a.value)
    }

    /// Candidate assignments in the order type resolution should try them:
    /// `@var` annotations, then assignments from the cursor backwards,
    /// then later assignments.
    pub fn variable_assignments(&self, name: &str) -> Vec<&'a Assignment> {
        let Some(assignments) = self.scope().variables.get(name) else {
            return Vec::new();
        };
        let is_doc = |a: &&Assignment| matches!(a.value, AssignedValue::DocType(_));
        let docs = assignments.iter().rev().filter(is_doc);
        let before = assignments
            .iter()
            .rev()
            .filter(|a| a.offset < self.offset && !is_doc(a));
        let after = assignments
            .iter()
            .filter(|a| a.offset >= self.offset && !is_doc(a));
        docs.chain(before).chain(after).collect()
    }

    /// The same scope seen from another position
    pub fn with_offset(&self, offset: usize) -> ScopeView<'a> {
        ScopeView { offset, ..*self }
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.scope().variables.contains_key(name)
    }

    /// Variable names in scope starting with `prefix` (with `$`), sorted
    pub fn variables_with_prefix(&self, prefix: &str) -> Vec<String> {
        let lower = prefix.to_lowercase();
        let mut names: Vec<String> = self
            .scope()
            .variables
            .keys()
            .filter(|name| name.to_lowercase().starts_with(&lower))
            .cloned()
            .collect();
        if !self.class_name().is_empty() && !self.scope().is_static && "$this".starts_with(&lower) {
            names.push("$this".to_string());
        }
        names.sort();
        names.dedup();
        names
    }
}
