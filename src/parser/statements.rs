// Statement-level parsing: declarations, control flow and the events they
// produce.

use super::ast::Expr;
use super::expression::chain_from_expr;
use super::expressions::ParamList;
use super::names::split_qualified;
use super::{
    doc_return_type, doc_var_types, AssignedValue, ClassContext, ClassDecl, ClassKind, ConstantDecl,
    ExpressionKind, FunctionDecl, MethodDecl, ParseEvent, Parser, PropertyDecl, Tok, UseDecl,
    UseKind, Visibility,
};
use crate::lexer::TokenKind;

impl Parser {
    /// Parses one statement. Always consumes at least one token unless the
    /// input is exhausted.
    pub(crate) fn statement(&mut self) {
        let before = self.consumed;
        self.statement_kind();
        if self.consumed == before && !self.at(TokenKind::End) {
            self.bump();
        }
    }

    fn statement_kind(&mut self) {
        self.doc_variable_types();
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Semicolon => {
                self.bump();
            }
            TokenKind::LBrace => self.block(),
            TokenKind::Attribute => {
                let doc = self.skip_attributes();
                self.carry_doc(doc);
                self.statement_kind();
            }
            TokenKind::Namespace if self.nth_kind(1) != TokenKind::NsSeparator => {
                self.namespace_declaration()
            }
            TokenKind::Use => self.use_statement(),
            TokenKind::Abstract | TokenKind::Final | TokenKind::Class | TokenKind::Interface | TokenKind::Trait | TokenKind::Enum => {
                self.class_declaration()
            }
            TokenKind::Readonly
                if matches!(
                    self.nth_kind(1),
                    TokenKind::Class | TokenKind::Final | TokenKind::Abstract
                ) =>
            {
                self.class_declaration()
            }
            TokenKind::Function if self.is_function_declaration() => self.function_declaration(),
            TokenKind::Const => self.const_declaration(),
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::Do => self.do_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::Foreach => self.foreach_statement(),
            TokenKind::Switch => self.switch_statement(),
            TokenKind::Try => self.try_statement(),
            TokenKind::Return => {
                self.bump();
                if !matches!(
                    self.peek_kind(),
                    TokenKind::Semicolon | TokenKind::RBrace | TokenKind::End
                ) {
                    let expr = self.expression();
                    self.emit_expr(expr);
                }
                self.end_statement();
            }
            TokenKind::Echo => {
                self.bump();
                self.expression_list(&[TokenKind::Semicolon]);
                self.end_statement();
            }
            TokenKind::Global => {
                self.bump();
                while self.at(TokenKind::Variable) {
                    let var = self.bump();
                    self.emit_expression(
                        ExpressionKind::Global { name: var.text },
                        var.line,
                        var.offset,
                    );
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.end_statement();
            }
            TokenKind::Static if self.nth_kind(1) == TokenKind::Variable => self.static_variables(),
            TokenKind::Unset => {
                self.bump();
                if self.eat(TokenKind::LParen) {
                    while !self.at(TokenKind::RParen) && !self.at(TokenKind::End) {
                        let before = self.consumed;
                        let target = self.expression();
                        self.walk_unset(target);
                        if !self.eat(TokenKind::Comma) {
                            if self.consumed == before {
                                self.bump();
                            }
                            break;
                        }
                    }
                    self.eat(TokenKind::RParen);
                }
                self.end_statement();
            }
            TokenKind::Break | TokenKind::Continue => {
                self.bump();
                self.eat(TokenKind::IntegerLiteral);
                self.end_statement();
            }
            TokenKind::Goto => {
                self.bump();
                self.eat(TokenKind::Identifier);
                self.end_statement();
            }
            TokenKind::Identifier if self.nth_kind(1) == TokenKind::Colon => {
                // label
                self.bump();
                self.bump();
            }
            TokenKind::Declare => self.declare_statement(),
            TokenKind::HaltCompiler => {
                self.bump();
                self.halt();
            }
            TokenKind::End => {}
            _ => {
                let expr = self.expression();
                self.emit_expr(expr);
                self.end_statement();
            }
        }
    }

    /// Re-attaches a doc comment to the next token, e.g. past an attribute.
    fn carry_doc(&mut self, doc: Option<String>) {
        if let Some(doc) = doc {
            self.fill(0);
            if let Some(tok) = self.lookahead.front_mut() {
                if tok.doc.is_none() {
                    tok.doc = Some(doc);
                }
            }
        }
    }

    fn end_statement(&mut self) {
        self.eat(TokenKind::Semicolon);
    }

    fn is_function_declaration(&mut self) -> bool {
        match self.nth_kind(1) {
            TokenKind::Ampersand => self.peek_at(2).is_name_like(),
            _ => self.peek_at(1).is_name_like(),
        }
    }

    /// `/** @var Type $name */` in front of a statement
    fn doc_variable_types(&mut self) {
        let tok = self.peek().clone();
        let Some(doc) = tok.doc.as_deref() else {
            return;
        };
        for (variable, type_name) in doc_var_types(doc) {
            if variable.is_empty() {
                continue;
            }
            let type_name = self.names.resolve_type(&type_name);
            self.emit(ParseEvent::VariableDocType {
                variable,
                type_name,
                line: tok.line,
            });
        }
    }

    /// Comma-separated expressions up to one of `stops`
    fn expression_list(&mut self, stops: &[TokenKind]) {
        loop {
            let kind = self.peek_kind();
            if kind == TokenKind::End || stops.contains(&kind) {
                break;
            }
            let before = self.consumed;
            let expr = self.expression();
            self.emit_expr(expr);
            if !self.eat(TokenKind::Comma) {
                if self.consumed == before {
                    self.bump();
                }
                break;
            }
        }
    }

    /// `{ ... }` block; a missing brace leaves the input untouched.
    pub(crate) fn block(&mut self) {
        if !self.eat(TokenKind::LBrace) {
            return;
        }
        self.statements_until(&[TokenKind::RBrace]);
        self.eat(TokenKind::RBrace);
    }

    fn statements_until(&mut self, stops: &[TokenKind]) {
        loop {
            let kind = self.peek_kind();
            if kind == TokenKind::End || stops.contains(&kind) {
                break;
            }
            self.statement();
        }
    }

    /// Body of a control structure, in brace or `:` ... `endX;` form
    fn control_body(&mut self, end: TokenKind) {
        if self.eat(TokenKind::Colon) {
            self.statements_until(&[end]);
            self.eat(end);
            self.end_statement();
        } else {
            self.statement();
        }
    }

    fn condition(&mut self) {
        if self.eat(TokenKind::LParen) {
            self.expression_list(&[TokenKind::RParen]);
            self.eat(TokenKind::RParen);
        }
    }

    fn namespace_declaration(&mut self) {
        let tok = self.bump();
        let name = self.qualified_name().unwrap_or_default();
        self.names.enter_namespace(&name);
        self.emit(ParseEvent::Namespace {
            name: self.names.namespace.clone(),
            line: tok.line,
            offset: tok.offset,
        });
        if self.at(TokenKind::LBrace) {
            self.block();
            self.names.enter_namespace("");
            let offset = self.last_end();
            self.emit(ParseEvent::Namespace {
                name: self.names.namespace.clone(),
                line: self.lexer.line(),
                offset,
            });
        } else {
            self.end_statement();
        }
    }

    fn use_statement(&mut self) {
        let tok = self.bump();
        let kind = self.use_kind().unwrap_or(UseKind::Class);
        loop {
            let Some(prefix) = self.qualified_name() else {
                break;
            };
            if self.at(TokenKind::NsSeparator) && self.nth_kind(1) == TokenKind::LBrace {
                self.bump();
                self.bump();
                loop {
                    if self.at(TokenKind::RBrace) || self.at(TokenKind::End) {
                        break;
                    }
                    let item_kind = self.use_kind().unwrap_or(kind);
                    let Some(name) = self.qualified_name() else {
                        break;
                    };
                    let full = format!("{}\\{}", prefix, name);
                    let alias = self.use_alias(&full);
                    self.add_use(item_kind, &full, alias, tok.line);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.eat(TokenKind::RBrace);
            } else {
                let alias = self.use_alias(&prefix);
                self.add_use(kind, &prefix, alias, tok.line);
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.end_statement();
    }

    fn use_kind(&mut self) -> Option<UseKind> {
        if self.eat(TokenKind::Function) {
            Some(UseKind::Function)
        } else if self.eat(TokenKind::Const) {
            Some(UseKind::Constant)
        } else {
            None
        }
    }

    fn use_alias(&mut self, name: &str) -> String {
        if self.eat(TokenKind::As) && self.peek().is_name_like() {
            return self.bump().text;
        }
        split_qualified(name).1
    }

    fn add_use(&mut self, kind: UseKind, name: &str, alias: String, line: usize) {
        let fqn = format!("\\{}", name.trim_start_matches('\\'));
        self.names.import(kind, &fqn, &alias);
        self.emit(ParseEvent::Use(UseDecl {
            kind,
            name: fqn,
            alias,
            line,
        }));
    }

    /// Comma-separated class names, resolved
    fn name_list(&mut self) -> Vec<String> {
        let mut names = Vec::new();
        loop {
            if let Some(name) = self.qualified_name() {
                names.push(self.names.resolve_class(&name));
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        names
    }

    fn class_declaration(&mut self) {
        let first = self.peek().clone();
        let (mut is_abstract, mut is_final) = (false, false);
        loop {
            match self.peek_kind() {
                TokenKind::Abstract => is_abstract = true,
                TokenKind::Final => is_final = true,
                TokenKind::Readonly => {}
                _ => break,
            }
            self.bump();
        }
        let kind = match self.peek_kind() {
            TokenKind::Class => ClassKind::Class,
            TokenKind::Interface => ClassKind::Interface,
            TokenKind::Trait => ClassKind::Trait,
            TokenKind::Enum => ClassKind::Enum,
            _ => return,
        };
        self.bump();
        if !self.at(TokenKind::Identifier) {
            return;
        }
        let name = self.bump().text;
        if kind == ClassKind::Enum && self.eat(TokenKind::Colon) {
            self.parse_type();
        }

        let mut parent = String::new();
        let mut interfaces = Vec::new();
        if self.eat(TokenKind::Extends) {
            let names = self.name_list();
            if kind == ClassKind::Interface {
                interfaces.extend(names);
            } else if let Some(first) = names.into_iter().next() {
                parent = first;
            }
        }
        if self.eat(TokenKind::Implements) {
            interfaces.extend(self.name_list());
        }

        let decl = ClassDecl {
            name: name.clone(),
            namespace_name: self.names.namespace.clone(),
            kind,
            parent: parent.clone(),
            interfaces,
            is_abstract,
            is_final,
            comment: first.doc.clone().unwrap_or_default(),
            line: first.line,
            offset: first.offset,
        };
        let fqn = decl.fully_qualified_name();
        self.emit(ParseEvent::ClassFound(decl));
        self.classes.push(ClassContext {
            name,
            fqn: fqn.clone(),
            parent,
        });
        self.class_body();
        self.classes.pop();
        let offset = self.last_end();
        self.emit(ParseEvent::ClassEnd { name: fqn, offset });
    }

    fn current_class(&self) -> ClassContext {
        self.classes.last().cloned().unwrap_or(ClassContext {
            name: String::new(),
            fqn: String::new(),
            parent: String::new(),
        })
    }

    fn class_body(&mut self) {
        if !self.eat(TokenKind::LBrace) {
            return;
        }
        loop {
            let before = self.consumed;
            match self.peek_kind() {
                TokenKind::RBrace => {
                    self.bump();
                    return;
                }
                TokenKind::End => return,
                TokenKind::Semicolon => {
                    self.bump();
                }
                TokenKind::Use => self.trait_use(),
                TokenKind::Attribute => {
                    let doc = self.skip_attributes();
                    self.carry_doc(doc);
                }
                TokenKind::Case => self.enum_case(),
                _ => self.class_member(),
            }
            if self.consumed == before {
                self.bump();
            }
        }
    }

    fn trait_use(&mut self) {
        let tok = self.bump();
        let class_name = self.current_class().fqn;
        for trait_name in self.name_list() {
            self.emit(ParseEvent::TraitUsed {
                class_name: class_name.clone(),
                trait_name,
                line: tok.line,
            });
        }
        if self.at(TokenKind::LBrace) {
            self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
        } else {
            self.end_statement();
        }
    }

    /// Source text of an initializer expression, whitespace collapsed
    fn initializer(&mut self) -> String {
        let start = self.peek().byte_offset;
        let _ = self.expression();
        let end = self.last_end_byte;
        super::normalize_signature(self.source_slice(start, end))
    }

    fn enum_case(&mut self) {
        let first = self.bump();
        if !self.peek().is_name_like() {
            return;
        }
        let name = self.bump().text;
        let value = if self.eat(TokenKind::Assign) {
            self.initializer()
        } else {
            String::new()
        };
        self.end_statement();
        let class = self.current_class();
        self.emit(ParseEvent::ConstantFound(ConstantDecl {
            class_name: class.name,
            namespace_name: self.names.namespace.clone(),
            name,
            value,
            visibility: Visibility::Public,
            comment: first.doc.unwrap_or_default(),
            line: first.line,
            offset: first.offset,
        }));
    }

    fn class_member(&mut self) {
        let first = self.peek().clone();
        let mut visibility = Visibility::Public;
        let (mut is_static, mut is_abstract) = (false, false);
        while self.peek_kind().is_modifier() {
            match self.bump().kind {
                TokenKind::Public => visibility = Visibility::Public,
                TokenKind::Protected => visibility = Visibility::Protected,
                TokenKind::Private => visibility = Visibility::Private,
                TokenKind::Static => is_static = true,
                TokenKind::Abstract => is_abstract = true,
                _ => {}
            }
        }
        match self.peek_kind() {
            TokenKind::Const => self.class_constants(visibility, &first),
            TokenKind::Function => self.method(visibility, is_static, is_abstract, &first),
            _ => self.properties(visibility, is_static, &first),
        }
    }

    fn class_constants(&mut self, visibility: Visibility, first: &Tok) {
        self.bump();
        if self.nth_kind(1) != TokenKind::Assign {
            self.parse_type();
        }
        let class = self.current_class();
        loop {
            if !self.peek().is_name_like() {
                break;
            }
            let tok = self.bump();
            let value = if self.eat(TokenKind::Assign) {
                self.initializer()
            } else {
                String::new()
            };
            self.emit(ParseEvent::ConstantFound(ConstantDecl {
                class_name: class.name.clone(),
                namespace_name: self.names.namespace.clone(),
                name: tok.text,
                value,
                visibility,
                comment: first.doc.clone().unwrap_or_default(),
                line: tok.line,
                offset: tok.offset,
            }));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.end_statement();
    }

    fn properties(&mut self, visibility: Visibility, is_static: bool, first: &Tok) {
        let declared = if self.at(TokenKind::Variable) {
            String::new()
        } else {
            match self.parse_type() {
                Some((_, resolved)) => resolved,
                None => return,
            }
        };
        let class = self.current_class();
        let doc = first.doc.clone().unwrap_or_default();
        while self.at(TokenKind::Variable) {
            let tok = self.bump();
            if self.eat(TokenKind::Assign) {
                let _ = self.expression();
            }
            let type_hint = if declared.is_empty() {
                doc_var_types(&doc)
                    .into_iter()
                    .find(|(variable, _)| variable.is_empty() || *variable == tok.text)
                    .map(|(_, t)| self.names.resolve_type(&t))
                    .unwrap_or_default()
            } else {
                declared.clone()
            };
            self.emit(ParseEvent::PropertyFound(PropertyDecl {
                class_name: class.name.clone(),
                namespace_name: self.names.namespace.clone(),
                name: tok.text.trim_start_matches('$').to_string(),
                type_hint,
                visibility,
                is_static,
                comment: doc.clone(),
                line: tok.line,
                offset: tok.offset,
            }));
            if self.at(TokenKind::LBrace) {
                // property hooks
                self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
                return;
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.end_statement();
    }

    /// Declared return type, else the doc comment's `@return`, resolved.
    /// `self`, `static` and `$this` become the enclosing class.
    fn return_type(&mut self, doc: Option<&str>, class_fqn: Option<&str>) -> String {
        let written = if self.eat(TokenKind::Colon) {
            self.parse_type().map(|(raw, _)| raw)
        } else {
            doc.and_then(doc_return_type)
        };
        let Some(written) = written else {
            return String::new();
        };
        if let Some(fqn) = class_fqn {
            let bare = written.trim_start_matches('?');
            if ["self", "static", "$this"]
                .iter()
                .any(|k| bare.eq_ignore_ascii_case(k))
            {
                return fqn.to_string();
            }
        }
        self.names.resolve_type(&written)
    }

    fn method(&mut self, visibility: Visibility, is_static: bool, is_abstract: bool, first: &Tok) {
        self.bump();
        self.eat(TokenKind::Ampersand);
        if !self.peek().is_name_like() {
            return;
        }
        let name = self.bump().text;
        let ParamList {
            params,
            signature,
            promoted,
        } = self.parameter_list();
        let class = self.current_class();
        let return_type = self.return_type(first.doc.as_deref(), Some(&class.fqn));
        self.emit(ParseEvent::MethodFound(MethodDecl {
            class_name: class.name.clone(),
            namespace_name: self.names.namespace.clone(),
            name,
            params,
            signature,
            return_type,
            comment: first.doc.clone().unwrap_or_default(),
            visibility,
            is_static,
            is_abstract,
            line: first.line,
            offset: first.offset,
        }));
        for promoted in promoted {
            self.emit(ParseEvent::PropertyFound(PropertyDecl {
                class_name: class.name.clone(),
                namespace_name: self.names.namespace.clone(),
                name: promoted.param.name.trim_start_matches('$').to_string(),
                type_hint: promoted.param.type_hint,
                visibility: promoted.visibility,
                is_static: false,
                comment: promoted.comment,
                line: promoted.line,
                offset: promoted.offset,
            }));
        }
        if self.at(TokenKind::LBrace) {
            self.block();
        } else {
            self.end_statement();
        }
        let offset = self.last_end();
        self.emit(ParseEvent::FunctionEnd { offset });
    }

    fn function_declaration(&mut self) {
        let first = self.bump();
        self.eat(TokenKind::Ampersand);
        let name = self.bump().text;
        let ParamList {
            params, signature, ..
        } = self.parameter_list();
        let return_type = self.return_type(first.doc.as_deref(), None);
        self.emit(ParseEvent::FunctionFound(FunctionDecl {
            name,
            namespace_name: self.names.namespace.clone(),
            params,
            signature,
            return_type,
            comment: first.doc.clone().unwrap_or_default(),
            line: first.line,
            offset: first.offset,
        }));
        self.block();
        let offset = self.last_end();
        self.emit(ParseEvent::FunctionEnd { offset });
    }

    fn const_declaration(&mut self) {
        let first = self.bump();
        loop {
            if !self.peek().is_name_like() {
                break;
            }
            let tok = self.bump();
            let value = if self.eat(TokenKind::Assign) {
                self.initializer()
            } else {
                String::new()
            };
            self.emit(ParseEvent::ConstantFound(ConstantDecl {
                class_name: String::new(),
                namespace_name: self.names.namespace.clone(),
                name: tok.text,
                value,
                visibility: Visibility::Public,
                comment: first.doc.clone().unwrap_or_default(),
                line: tok.line,
                offset: tok.offset,
            }));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.end_statement();
    }

    fn if_statement(&mut self) {
        self.bump();
        self.condition();
        if self.eat(TokenKind::Colon) {
            let stops = [TokenKind::ElseIf, TokenKind::Else, TokenKind::EndIf];
            self.statements_until(&stops);
            loop {
                match self.peek_kind() {
                    TokenKind::ElseIf => {
                        self.bump();
                        self.condition();
                        self.eat(TokenKind::Colon);
                        self.statements_until(&stops);
                    }
                    TokenKind::Else => {
                        self.bump();
                        self.eat(TokenKind::Colon);
                        self.statements_until(&[TokenKind::EndIf]);
                    }
                    _ => break,
                }
            }
            self.eat(TokenKind::EndIf);
            self.end_statement();
            return;
        }
        self.statement();
        loop {
            if self.eat(TokenKind::ElseIf) {
                self.condition();
                self.statement();
            } else if self.eat(TokenKind::Else) {
                self.statement();
                break;
            } else {
                break;
            }
        }
    }

    fn while_statement(&mut self) {
        self.bump();
        self.condition();
        self.control_body(TokenKind::EndWhile);
    }

    fn do_statement(&mut self) {
        self.bump();
        self.statement();
        if self.eat(TokenKind::While) {
            self.condition();
        }
        self.end_statement();
    }

    fn for_statement(&mut self) {
        self.bump();
        if self.eat(TokenKind::LParen) {
            self.expression_list(&[TokenKind::Semicolon, TokenKind::RParen]);
            self.eat(TokenKind::Semicolon);
            self.expression_list(&[TokenKind::Semicolon, TokenKind::RParen]);
            self.eat(TokenKind::Semicolon);
            self.expression_list(&[TokenKind::RParen]);
            self.eat(TokenKind::RParen);
        }
        self.control_body(TokenKind::EndFor);
    }

    fn foreach_statement(&mut self) {
        self.bump();
        if self.eat(TokenKind::LParen) {
            let subject = self.expression();
            let element = chain_from_expr(&subject, Some(&self.names))
                .map(AssignedValue::Element)
                .unwrap_or(AssignedValue::Unknown);
            self.emit_expr(subject);
            if self.eat(TokenKind::As) {
                let first_by_ref = self.eat(TokenKind::Ampersand);
                let first = self.expression();
                if self.eat(TokenKind::DoubleArrow) {
                    let by_ref = self.eat(TokenKind::Ampersand);
                    let value = self.expression();
                    self.assign_target(first, AssignedValue::Unknown, false);
                    self.assign_target(value, element, by_ref);
                } else {
                    self.assign_target(first, element, first_by_ref);
                }
            }
            self.eat(TokenKind::RParen);
        }
        self.control_body(TokenKind::EndForeach);
    }

    fn switch_statement(&mut self) {
        self.bump();
        self.condition();
        let alternative = if self.eat(TokenKind::Colon) {
            true
        } else {
            self.eat(TokenKind::LBrace);
            false
        };
        loop {
            match self.peek_kind() {
                TokenKind::Case => {
                    self.bump();
                    let expr = self.expression();
                    self.emit_expr(expr);
                    if !self.eat(TokenKind::Colon) {
                        self.eat(TokenKind::Semicolon);
                    }
                }
                TokenKind::Default => {
                    self.bump();
                    if !self.eat(TokenKind::Colon) {
                        self.eat(TokenKind::Semicolon);
                    }
                }
                TokenKind::RBrace if !alternative => {
                    self.bump();
                    break;
                }
                TokenKind::EndSwitch if alternative => {
                    self.bump();
                    self.end_statement();
                    break;
                }
                TokenKind::End => break,
                _ => self.statement(),
            }
        }
    }

    fn try_statement(&mut self) {
        self.bump();
        self.block();
        while self.at(TokenKind::Catch) {
            self.bump();
            if self.eat(TokenKind::LParen) {
                let mut types = Vec::new();
                loop {
                    let tok = self.peek().clone();
                    if let Some(name) = self.qualified_name() {
                        let class_name = self.names.resolve_class(&name);
                        self.emit_expression(
                            ExpressionKind::TypeReference {
                                class_name: class_name.clone(),
                            },
                            tok.line,
                            tok.offset,
                        );
                        types.push(class_name);
                    }
                    if !self.eat(TokenKind::Pipe) {
                        break;
                    }
                }
                if self.at(TokenKind::Variable) {
                    let var = self.bump();
                    let value = types
                        .into_iter()
                        .next()
                        .map(AssignedValue::TypeHint)
                        .unwrap_or(AssignedValue::Unknown);
                    self.emit_expression(
                        ExpressionKind::VariableWrite {
                            name: var.text,
                            value,
                            by_ref: false,
                        },
                        var.line,
                        var.offset,
                    );
                }
                self.eat(TokenKind::RParen);
            }
            self.block();
        }
        if self.eat(TokenKind::Finally) {
            self.block();
        }
    }

    fn static_variables(&mut self) {
        self.bump();
        while self.at(TokenKind::Variable) {
            let var = self.bump();
            if self.eat(TokenKind::Assign) {
                let expr = self.expression();
                self.emit_expr(expr);
            }
            self.emit_expression(
                ExpressionKind::StaticVariable { name: var.text },
                var.line,
                var.offset,
            );
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.end_statement();
    }

    /// `unset($a['k'])` reads the index but not the variable itself
    fn walk_unset(&mut self, target: Expr) {
        if let Expr::ArrayAccess {
            index: Some(index), ..
        } = target
        {
            self.emit_expr(*index);
        }
    }

    fn declare_statement(&mut self) {
        self.bump();
        self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
        if self.eat(TokenKind::Colon) {
            self.statements_until(&[TokenKind::EndDeclare]);
            self.eat(TokenKind::EndDeclare);
            self.end_statement();
        } else if self.at(TokenKind::LBrace) {
            self.block();
        } else {
            self.end_statement();
        }
    }
}
