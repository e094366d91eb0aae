//! Static checks over one file's event stream.
//!
//! Each check is a [`LintEngine`] that watches the events of a file in
//! source order and hands back what it found once the stream ends. A file
//! that fails the syntax check is reported with that one error and no
//! engine runs on it. Lookups go through the current file, the global
//! store and the native set, never duck typed.

pub mod arity;
pub mod identifiers;
pub mod variables;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{LintConfig, TagConfig};
use crate::index::{NativeTags, SearchScope, Tag, TagStore, TagType};
use crate::indexer::tags::build_tags;
use crate::parser::lint::lint_string as check_syntax;
use crate::parser::{scan_string, ExpressionChain, ParseEvent};
use crate::query::{GlobalTags, Layer, MemberLookup, MemoryTags, NativeLayer, Resolver};
use crate::working::{ScopeView, SymbolTable};

pub use arity::{parse_signature, Arity, Signature};
pub use identifiers::UnknownIdentifiers;
pub use variables::UninitializedVariables;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    Class,
    Interface,
    Method,
    Property,
    Function,
    Constant,
}

impl IdentifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierKind::Class => "class",
            IdentifierKind::Interface => "interface",
            IdentifierKind::Method => "method",
            IdentifierKind::Property => "property",
            IdentifierKind::Function => "function",
            IdentifierKind::Constant => "constant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArityMismatch {
    TooFew,
    TooMany,
}

/// One problem found in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum LintResult {
    SyntaxError {
        message: String,
        line: usize,
        offset: usize,
    },
    UninitializedVariable {
        variable: String,
        line: usize,
        offset: usize,
    },
    UnknownIdentifier {
        kind: IdentifierKind,
        identifier: String,
        line: usize,
        offset: usize,
    },
    ArgumentCount {
        mismatch: ArityMismatch,
        identifier: String,
        /// Required parameter count
        expected: usize,
        /// Total parameter count
        maximum: usize,
        actual: usize,
        line: usize,
        offset: usize,
    },
}

impl LintResult {
    /// Stable identifier for programmatic handling
    pub fn status_code(&self) -> &'static str {
        match self {
            LintResult::SyntaxError { .. } => "SYNTAX_ERROR",
            LintResult::UninitializedVariable { .. } => "UNINITIALIZED_VARIABLE",
            LintResult::UnknownIdentifier { kind, .. } => match kind {
                IdentifierKind::Class => "UNKNOWN_CLASS",
                IdentifierKind::Interface => "UNKNOWN_INTERFACE",
                IdentifierKind::Method => "UNKNOWN_METHOD",
                IdentifierKind::Property => "UNKNOWN_PROPERTY",
                IdentifierKind::Function => "UNKNOWN_FUNCTION",
                IdentifierKind::Constant => "UNKNOWN_CONSTANT",
            },
            LintResult::ArgumentCount { mismatch, .. } => match mismatch {
                ArityMismatch::TooFew => "TOO_FEW_ARGS",
                ArityMismatch::TooMany => "TOO_MANY_ARGS",
            },
        }
    }

    pub fn line(&self) -> usize {
        match self {
            LintResult::SyntaxError { line, .. }
            | LintResult::UninitializedVariable { line, .. }
            | LintResult::UnknownIdentifier { line, .. }
            | LintResult::ArgumentCount { line, .. } => *line,
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            LintResult::SyntaxError { offset, .. }
            | LintResult::UninitializedVariable { offset, .. }
            | LintResult::UnknownIdentifier { offset, .. }
            | LintResult::ArgumentCount { offset, .. } => *offset,
        }
    }

    /// The name the result is about; empty for syntax errors
    pub fn identifier(&self) -> &str {
        match self {
            LintResult::SyntaxError { .. } => "",
            LintResult::UninitializedVariable { variable, .. } => variable,
            LintResult::UnknownIdentifier { identifier, .. } | LintResult::ArgumentCount { identifier, .. } => {
                identifier
            }
        }
    }
}

impl fmt::Display for LintResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LintResult::SyntaxError { message, line, .. } => write!(f, "{}: {}", line, message),
            LintResult::UninitializedVariable { variable, line, .. } => {
                write!(f, "{}: Variable {} may be used before it is initialized", line, variable)
            }
            LintResult::UnknownIdentifier {
                kind, identifier, line, ..
            } => write!(f, "{}: Unknown {} {}", line, kind.as_str(), identifier),
            LintResult::ArgumentCount {
                mismatch,
                identifier,
                expected,
                maximum,
                actual,
                line,
                ..
            } => match mismatch {
                ArityMismatch::TooFew => write!(
                    f,
                    "{}: Too few arguments to {}(): {} passed, at least {} expected",
                    line, identifier, actual, expected
                ),
                ArityMismatch::TooMany => write!(
                    f,
                    "{}: Too many arguments to {}(): {} passed, at most {} expected",
                    line, identifier, actual, maximum
                ),
            },
        }
    }
}

/// Results for one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LintReport {
    pub path: String,
    pub results: Vec<LintResult>,
}

impl LintReport {
    pub fn has_error(&self) -> bool {
        !self.results.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileLint {
    Checked(LintReport),
    /// Larger than the configured ceiling
    Skipped { path: PathBuf, size: u64 },
}

/// Per-file counters of a multi-file run
#[derive(Debug, Clone, Default, Serialize)]
pub struct LintSummary {
    pub with_errors: usize,
    pub with_no_errors: usize,
    pub with_skip: usize,
    /// Reports of the files with errors
    pub reports: Vec<LintReport>,
}

/// A check fed with the events of one file
pub trait LintEngine {
    fn observe(&mut self, event: &ParseEvent, cx: &LintContext<'_, '_>);

    fn finish(self: Box<Self>) -> Vec<LintResult>;
}

/// Lookups shared by the engines of one file, cached until the file is done
pub struct LintContext<'r, 'a> {
    resolver: &'r Resolver<'a>,
    symbols: &'r SymbolTable,
    classes: RefCell<HashMap<String, bool>>,
    functions: RefCell<HashMap<(String, bool), Vec<Tag>>>,
    members: RefCell<HashMap<(String, String), MemberLookup>>,
}

impl<'r, 'a> LintContext<'r, 'a> {
    pub fn new(resolver: &'r Resolver<'a>, symbols: &'r SymbolTable) -> Self {
        Self {
            resolver,
            symbols,
            classes: RefCell::new(HashMap::new()),
            functions: RefCell::new(HashMap::new()),
            members: RefCell::new(HashMap::new()),
        }
    }

    pub fn resolver(&self) -> &'r Resolver<'a> {
        self.resolver
    }

    pub fn view_at(&self, offset: usize) -> ScopeView<'r> {
        self.symbols.view_at(offset)
    }

    pub fn class_exists(&self, fqn: &str) -> bool {
        let key = fqn.to_lowercase();
        if let Some(known) = self.classes.borrow().get(&key) {
            return *known;
        }
        let known = self.resolver.class(fqn).is_some();
        self.classes.borrow_mut().insert(key, known);
        known
    }

    /// Functions a call resolved by the scanner may reach
    pub fn functions(&self, name: &str, fqn: &str, global_fallback: bool) -> Vec<Tag> {
        let key = (fqn.to_lowercase(), global_fallback);
        if let Some(found) = self.functions.borrow().get(&key) {
            return found.clone();
        }
        let found = self.resolver.resolved_functions(name, fqn, global_fallback);
        self.functions.borrow_mut().insert(key, found.clone());
        found
    }

    /// Members named exactly `member` along the hierarchy of `class_fqn`
    pub fn members(&self, class_fqn: &str, member: &str) -> MemberLookup {
        let key = (class_fqn.to_lowercase(), member.to_lowercase());
        if let Some(found) = self.members.borrow().get(&key) {
            return found.clone();
        }
        let found = self.resolver.members(class_fqn, member, true);
        self.members.borrow_mut().insert(key, found.clone());
        found
    }

    /// Class of the first `upto` members of a chain
    pub fn receiver_class(&self, chain: &ExpressionChain, upto: usize, offset: usize) -> Option<String> {
        let mut prefix = chain.clone();
        prefix.members.truncate(upto);
        let view = self.view_at(offset);
        self.resolver
            .receiver(&prefix, &view)
            .map(|r| r.class_name)
            .ok()
    }

    /// Method declarations the `index`th member of a chain calls
    pub fn method_targets(&self, chain: &ExpressionChain, index: usize, offset: usize) -> Vec<Tag> {
        let Some(member) = chain.members.get(index) else {
            return Vec::new();
        };
        match self.receiver_class(chain, index, offset) {
            Some(class) => methods(self.members(&class, &member.name)),
            None => Vec::new(),
        }
    }

    /// The constructor `new class_fqn` runs
    pub fn constructor(&self, class_fqn: &str) -> Vec<Tag> {
        if class_fqn.is_empty() {
            return Vec::new();
        }
        methods(self.members(class_fqn, "__construct"))
    }
}

fn methods(lookup: MemberLookup) -> Vec<Tag> {
    lookup
        .tags
        .into_iter()
        .filter(|t| t.tag_type == TagType::Method)
        .collect()
}

/// `\Util\MyClass` as `Util\MyClass`
pub(crate) fn display_name(fqn: &str) -> String {
    fqn.trim_start_matches('\\').to_string()
}

/// Runs the configured checks over files and strings
pub struct Linter {
    config: TagConfig,
    checks: LintConfig,
    store: Option<TagStore>,
    native: Arc<NativeTags>,
}

impl Linter {
    pub fn new(config: TagConfig, checks: LintConfig, native: Arc<NativeTags>) -> Self {
        Self {
            config,
            checks,
            store: None,
            native,
        }
    }

    /// Resolves names against an indexed project as well
    pub fn with_store(mut self, store: TagStore) -> Self {
        self.store = Some(store);
        self
    }

    fn engines(&self) -> Vec<Box<dyn LintEngine>> {
        let mut engines: Vec<Box<dyn LintEngine>> = Vec::new();
        if self.checks.check_uninitialized_variables {
            engines.push(Box::new(UninitializedVariables::default()));
        }
        if self.checks.check_unknown_identifiers {
            engines.push(Box::new(UnknownIdentifiers::default()));
        }
        if self.checks.check_call_arity {
            engines.push(Box::new(arity::CallArity::default()));
        }
        engines
    }

    /// Checks one buffer. `full_path` names the file the buffer stands for.
    pub fn lint_string(&self, source: &str, full_path: &str) -> Vec<LintResult> {
        if let Err(error) = check_syntax(source, self.config.short_open_tags) {
            return vec![LintResult::SyntaxError {
                message: error.message,
                line: error.line,
                offset: error.offset,
            }];
        }

        let events = scan_string(source, &self.config);
        let tags = build_tags(&events, full_path);
        let symbols = SymbolTable::build(&events);

        let mut resolver = Resolver::new(SearchScope::with_limit(self.config.max_results), false)
            .with_layer(MemoryTags::new(Layer::CurrentFile, tags.clone()));
        if let Some(store) = &self.store {
            let overlay = HashMap::from([(full_path.to_string(), tags)]);
            resolver = resolver.with_layer(GlobalTags::new(store.clone(), overlay));
        }
        let resolver = resolver.with_layer(NativeLayer::new(&self.native));

        let cx = LintContext::new(&resolver, &symbols);
        let mut engines = self.engines();
        for event in &events {
            for engine in engines.iter_mut() {
                engine.observe(event, &cx);
            }
        }

        let mut results: Vec<LintResult> = engines.into_iter().flat_map(|e| e.finish()).collect();
        results.sort_by_key(|r| (r.line(), r.offset()));
        debug!("{}: {} lint results", full_path, results.len());
        results
    }

    /// Checks a file on disk, skipping it when it is too large
    pub fn lint_file(&self, path: &Path) -> anyhow::Result<FileLint> {
        let size = std::fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();
        if size > self.checks.max_file_size {
            debug!("Skipping {} ({} bytes)", path.display(), size);
            return Ok(FileLint::Skipped {
                path: path.to_path_buf(),
                size,
            });
        }
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let source = String::from_utf8_lossy(&bytes);
        let full_path = path.to_string_lossy().into_owned();
        Ok(FileLint::Checked(LintReport {
            results: self.lint_string(&source, &full_path),
            path: full_path,
        }))
    }

    /// Checks every file. One bad file never stops the run; unreadable
    /// files count as skipped.
    pub fn lint_paths<I, P>(&self, paths: I) -> LintSummary
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut summary = LintSummary::default();
        for path in paths {
            let path = path.as_ref();
            match self.lint_file(path) {
                Ok(FileLint::Checked(report)) if report.has_error() => {
                    summary.with_errors += 1;
                    summary.reports.push(report);
                }
                Ok(FileLint::Checked(_)) => summary.with_no_errors += 1,
                Ok(FileLint::Skipped { .. }) => summary.with_skip += 1,
                Err(e) => {
                    warn!("Could not lint {}: {:#}", path.display(), e);
                    summary.with_skip += 1;
                }
            }
        }
        info!(
            "Lint finished: {} with errors, {} clean, {} skipped",
            summary.with_errors, summary.with_no_errors, summary.with_skip
        );
        summary
    }
}
