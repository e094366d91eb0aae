//! Type resolution of expression chains over an ordered list of tag layers.

use std::collections::{HashSet, VecDeque};

use crate::error::{LookupError, StoreResult};
use crate::index::{SearchScope, Tag, TagType, Visibility};
use crate::parser::names::{is_reserved_type, NameContext};
use crate::parser::{AssignedValue, ChainMember, ChainSubject, ExpressionChain, MemberKind};
use crate::working::ScopeView;

use super::{declaration_key, query_layer, Layer, TagSource};

/// Nesting limit for variables assigned from other variables
const MAX_DEPTH: usize = 8;

/// Accessors that make any member name valid
const MAGIC_ACCESSORS: &[&str] = &["__call", "__callstatic", "__get", "__set"];

/// Members found along a class hierarchy
#[derive(Debug, Clone, Default)]
pub struct MemberLookup {
    pub tags: Vec<Tag>,
    /// Every class of the hierarchy is known to some layer
    pub complete: bool,
    /// Magic accessors declared in the hierarchy, lower case
    pub magic: Vec<String>,
}

impl MemberLookup {
    pub fn has_magic(&self, name: &str) -> bool {
        self.magic.iter().any(|m| m == name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompletionMatches {
    pub variables: Vec<String>,
    pub tags: Vec<Tag>,
    /// Matches are by member name across all classes
    pub duck_typed: bool,
    pub error: Option<LookupError>,
}

impl CompletionMatches {
    pub fn failed(error: LookupError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceMatches {
    pub tags: Vec<Tag>,
    pub duck_typed: bool,
    pub error: Option<LookupError>,
}

impl ResourceMatches {
    pub fn failed(error: LookupError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }
}

/// The class a chain evaluates to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receiver {
    pub class_name: String,
    /// Accessed from its own class body, so non-public members are visible
    pub internal: bool,
}

/// Resolves names and chains against layers in the order they were added
pub struct Resolver<'a> {
    layers: Vec<Box<dyn TagSource + 'a>>,
    scope: SearchScope,
    duck_typing: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(scope: SearchScope, duck_typing: bool) -> Self {
        Self {
            layers: Vec::new(),
            scope,
            duck_typing,
        }
    }

    pub fn with_layer(mut self, layer: impl TagSource + 'a) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    pub fn layers(&self) -> Vec<Layer> {
        self.layers.iter().map(|l| l.layer()).collect()
    }

    /// Results of all layers. A declaration found by an earlier layer hides
    /// the same declaration in later ones.
    fn collect(&self, what: &str, query: impl Fn(&dyn TagSource) -> StoreResult<Vec<Tag>>) -> Vec<Tag> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for layer in &self.layers {
            let found = query_layer(layer.as_ref(), what, &query);
            let keys: Vec<_> = found.iter().map(declaration_key).collect();
            for (tag, key) in found.into_iter().zip(&keys) {
                if !seen.contains(key) {
                    out.push(tag);
                }
            }
            seen.extend(keys);
        }
        out
    }

    /// Ordered prefix search across all layers, capped at the scope limit
    pub fn near_match(&self, prefix: &str) -> Vec<Tag> {
        let mut tags = self.collect(prefix, |l| l.near_match(prefix, &self.scope));
        tags.sort_by_key(|t| t.key.to_lowercase());
        tags.truncate(self.scope.limit);
        tags
    }

    pub fn exact(&self, key: &str) -> Vec<Tag> {
        self.collect(key, |l| l.exact(key, &self.scope))
    }

    /// The declaration of a class from the first layer that knows it
    pub fn class(&self, fqn: &str) -> Option<Tag> {
        self.layers.iter().find_map(|layer| {
            query_layer(layer.as_ref(), fqn, |l| l.class_by_fqn(fqn, &self.scope))
                .into_iter()
                .next()
        })
    }

    /// Every declaration of a class
    pub fn classes(&self, fqn: &str) -> Vec<Tag> {
        self.collect(fqn, |l| l.class_by_fqn(fqn, &self.scope))
    }

    /// Functions a call to `name` may reach, trying the global function
    /// when an unqualified namespaced name is unknown
    pub fn functions(&self, name: &str, names: &NameContext) -> Vec<Tag> {
        let (fqn, fallback) = names.resolve_function(name);
        self.resolved_functions(name, &fqn, fallback)
    }

    /// Same as [`Resolver::functions`] for a call the scanner already resolved
    pub fn resolved_functions(&self, name: &str, fqn: &str, global_fallback: bool) -> Vec<Tag> {
        let found = self.tags_of_type(fqn, TagType::Function);
        if found.is_empty() && global_fallback {
            return self.tags_of_type(&global(name), TagType::Function);
        }
        found
    }

    /// `const` and `define()` constants, with the same global fallback
    pub fn constants(&self, name: &str, names: &NameContext) -> Vec<Tag> {
        if name.starts_with('\\') {
            return self.tags_of_type(name, TagType::Define);
        }
        let imported = names.constants.get(&name.to_lowercase()).cloned();
        let fqn = imported.unwrap_or_else(|| names.qualify(name));
        let found = self.tags_of_type(&fqn, TagType::Define);
        if found.is_empty() && !name.contains('\\') {
            return self.tags_of_type(&format!("\\{}", name), TagType::Define);
        }
        found
    }

    fn tags_of_type(&self, key: &str, tag_type: TagType) -> Vec<Tag> {
        self.exact(key).into_iter().filter(|t| t.tag_type == tag_type).collect()
    }

    /// Members of a class and its traits, ancestors and interfaces, nearest
    /// declaration first. With `exact` false, `member` is a name prefix.
    pub fn members(&self, class_fqn: &str, member: &str, exact: bool) -> MemberLookup {
        let mut lookup = MemberLookup {
            complete: true,
            ..MemberLookup::default()
        };
        let mut visited = HashSet::new();
        let mut names = HashSet::new();
        let mut queue = VecDeque::from([class_fqn.to_string()]);

        while let Some(class) = queue.pop_front() {
            if !visited.insert(class.to_lowercase()) {
                continue;
            }
            let Some(tag) = self.class(&class) else {
                lookup.complete = false;
                continue;
            };

            for magic in self.collect(&class, |l| l.class_members(&class, "__", false, &self.scope)) {
                let name = magic.identifier.to_lowercase();
                if magic.tag_type == TagType::Method && MAGIC_ACCESSORS.contains(&name.as_str()) {
                    lookup.magic.push(name);
                }
            }
            let own = self.collect(&class, |l| l.class_members(&class, member, exact, &self.scope));
            for found in own {
                if names.insert((found.tag_type, found.identifier.to_lowercase())) {
                    lookup.tags.push(found);
                }
            }

            queue.extend(tag.traits.iter().cloned());
            if !tag.parent_class.is_empty() {
                queue.push_back(tag.parent_class.clone());
            }
            queue.extend(tag.interfaces.iter().cloned());
        }

        lookup
    }

    /// Members with a given name on any known class
    pub fn members_named(&self, member: &str, exact: bool) -> Vec<Tag> {
        self.collect(member, |l| l.members_named(member, exact, &self.scope))
    }

    /// Type text of a whole chain: the subject's type pushed through each
    /// member's declared type
    pub fn chain_type(&self, chain: &ExpressionChain, view: &ScopeView<'_>) -> Result<String, LookupError> {
        self.chain_type_at(chain, view, 0)
    }

    fn chain_type_at(
        &self,
        chain: &ExpressionChain,
        view: &ScopeView<'_>,
        depth: usize,
    ) -> Result<String, LookupError> {
        let mut current = self.subject_type(chain, view, depth)?;
        for member in &chain.members {
            let class = class_of(&current, view)?;
            let lookup = self.members(&class, &member.name, true);
            let tag = lookup
                .tags
                .iter()
                .find(|t| kind_matches(t, member))
                .ok_or_else(|| LookupError::TypeResolution(format!("{}::{}", class, member.name)))?;
            if tag.return_type.is_empty() {
                return Err(LookupError::TypeResolution(format!("{}::{}", class, member.name)));
            }
            current = rebase(&tag.return_type, &class);
            if member.array_access {
                current = element_type(&current)
                    .ok_or_else(|| LookupError::ArrayKeyNotFoundVariable(member.name.clone()))?;
            }
        }
        Ok(current)
    }

    fn subject_type(&self, chain: &ExpressionChain, view: &ScopeView<'_>, depth: usize) -> Result<String, LookupError> {
        let subject_type = match &chain.subject {
            ChainSubject::None => return Err(LookupError::EmptyExpression),
            ChainSubject::Variable(name) if name == "$this" => enclosing_class(view, name)?,
            ChainSubject::Variable(name) => self.variable_type(name, view, depth)?,
            ChainSubject::Class(name) | ChainSubject::New(name) => view.names().resolve_class(name),
            ChainSubject::SelfClass | ChainSubject::Static => enclosing_class(view, "self")?,
            ChainSubject::Parent => self.parent_of(view)?,
            ChainSubject::Function(name) => {
                let functions = self.functions(name, view.names());
                functions
                    .iter()
                    .find(|f| !f.return_type.is_empty())
                    .map(|f| f.return_type.clone())
                    .ok_or_else(|| LookupError::TypeResolution(format!("{}()", name)))?
            }
            ChainSubject::Name(name) => return Err(LookupError::TypeResolution(name.clone())),
        };
        if chain.subject_array_access {
            let what = chain.variable().unwrap_or("expression").to_string();
            return element_type(&subject_type).ok_or(LookupError::ArrayKeyNotFoundVariable(what));
        }
        Ok(subject_type)
    }

    /// Type of a variable from its assignments, most trustworthy first
    fn variable_type(&self, name: &str, view: &ScopeView<'_>, depth: usize) -> Result<String, LookupError> {
        if depth > MAX_DEPTH {
            return Err(LookupError::TypeResolution(name.to_string()));
        }
        let assignments = view.variable_assignments(name);
        if assignments.is_empty() {
            return Err(LookupError::UnknownVariable(name.to_string()));
        }

        let mut first_error = None;
        for assignment in assignments {
            let at = view.with_offset(assignment.offset);
            let result = match &assignment.value {
                AssignedValue::New(class) if !class.is_empty() => Ok(class.clone()),
                AssignedValue::TypeHint(t) | AssignedValue::DocType(t) if !t.is_empty() => Ok(t.clone()),
                AssignedValue::Chain(chain) => self.chain_type_at(chain, &at, depth + 1),
                AssignedValue::Element(chain) => self.chain_type_at(chain, &at, depth + 1).and_then(|t| {
                    element_type(&t).ok_or_else(|| LookupError::ArrayKeyNotFoundVariable(name.to_string()))
                }),
                AssignedValue::Literal(literal) => Ok(literal.type_name().to_string()),
                AssignedValue::Closure => Ok("\\Closure".to_string()),
                _ => Err(LookupError::TypeResolution(name.to_string())),
            };
            match result {
                Ok(found) => return Ok(found),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        Err(first_error.unwrap_or_else(|| LookupError::TypeResolution(name.to_string())))
    }

    fn parent_of(&self, view: &ScopeView<'_>) -> Result<String, LookupError> {
        let class = enclosing_class(view, "parent")?;
        let parent = if view.parent_class().is_empty() {
            self.class(&class).map(|t| t.parent_class).unwrap_or_default()
        } else {
            view.parent_class().to_string()
        };
        if parent.is_empty() {
            Err(LookupError::ParentNotFound(class))
        } else {
            Ok(parent)
        }
    }

    /// The class `chain` evaluates to
    pub fn receiver(&self, chain: &ExpressionChain, view: &ScopeView<'_>) -> Result<Receiver, LookupError> {
        let class_name = class_of(&self.chain_type(chain, view)?, view)?;
        let from_inside = chain.members.is_empty()
            && matches!(
                &chain.subject,
                ChainSubject::SelfClass | ChainSubject::Static | ChainSubject::Parent
            )
            || chain.variable() == Some("$this") && chain.members.is_empty();
        let internal = from_inside || class_name.eq_ignore_ascii_case(view.class_name());
        Ok(Receiver { class_name, internal })
    }

    /// Completion candidates for the chain in front of the cursor
    pub fn completion(&self, chain: &ExpressionChain, view: &ScopeView<'_>) -> CompletionMatches {
        if chain.is_empty() {
            return CompletionMatches::failed(LookupError::EmptyExpression);
        }
        let Some(last) = chain.last_member() else {
            return match &chain.subject {
                ChainSubject::Variable(prefix) => CompletionMatches {
                    variables: view.variables_with_prefix(prefix),
                    ..CompletionMatches::default()
                },
                ChainSubject::Name(prefix) => CompletionMatches {
                    tags: self.names_matching(prefix, view),
                    ..CompletionMatches::default()
                },
                _ => CompletionMatches::default(),
            };
        };

        match self.receiver(&chain.prefix(), view) {
            Ok(receiver) => CompletionMatches {
                tags: self
                    .members(&receiver.class_name, &last.name, false)
                    .tags
                    .into_iter()
                    .filter(|t| accessible(t, last.is_static, &receiver))
                    .collect(),
                ..CompletionMatches::default()
            },
            Err(e) if self.duck_typing && duck_fallback(&e) => CompletionMatches {
                tags: self.duck_matches(last, false),
                duck_typed: true,
                ..CompletionMatches::default()
            },
            Err(e) => CompletionMatches::failed(e),
        }
    }

    /// Declarations the chain refers to, without partial-name suggestions
    pub fn resource(&self, chain: &ExpressionChain, view: &ScopeView<'_>) -> ResourceMatches {
        if chain.is_empty() {
            return ResourceMatches::failed(LookupError::EmptyExpression);
        }
        let Some(last) = chain.last_member() else {
            let tags = match &chain.subject {
                ChainSubject::Name(name) => {
                    let mut tags = self.classes(&view.names().resolve_class(name));
                    tags.extend(self.functions(name, view.names()));
                    tags.extend(self.constants(name, view.names()));
                    tags
                }
                ChainSubject::Class(name) | ChainSubject::New(name) => {
                    self.classes(&view.names().resolve_class(name))
                }
                ChainSubject::Function(name) => self.functions(name, view.names()),
                ChainSubject::SelfClass | ChainSubject::Static => match enclosing_class(view, "self") {
                    Ok(class) => self.classes(&class),
                    Err(e) => return ResourceMatches::failed(e),
                },
                ChainSubject::Parent => match self.parent_of(view) {
                    Ok(parent) => self.classes(&parent),
                    Err(e) => return ResourceMatches::failed(e),
                },
                ChainSubject::Variable(_) | ChainSubject::None => Vec::new(),
            };
            return ResourceMatches {
                tags,
                ..ResourceMatches::default()
            };
        };
        if last.name.is_empty() {
            return ResourceMatches::default();
        }

        match self.receiver(&chain.prefix(), view) {
            Ok(receiver) => ResourceMatches {
                tags: self
                    .members(&receiver.class_name, &last.name, true)
                    .tags
                    .into_iter()
                    .filter(|t| loosely_matches(t, last))
                    .collect(),
                ..ResourceMatches::default()
            },
            Err(e) if self.duck_typing && duck_fallback(&e) => ResourceMatches {
                tags: self.duck_matches(last, true),
                duck_typed: true,
                ..ResourceMatches::default()
            },
            Err(e) => ResourceMatches::failed(e),
        }
    }

    fn duck_matches(&self, last: &ChainMember, exact: bool) -> Vec<Tag> {
        self.members_named(&last.name, exact)
            .into_iter()
            .filter(|t| t.visibility == Visibility::Public && static_fits(t, last.is_static, false))
            .collect()
    }

    /// Classes, functions, constants and namespaces starting with a bare or
    /// qualified name prefix
    fn names_matching(&self, prefix: &str, view: &ScopeView<'_>) -> Vec<Tag> {
        let key = if prefix.contains('\\') {
            view.names().resolve_class(prefix)
        } else {
            prefix.to_string()
        };
        self.near_match(&key)
            .into_iter()
            .filter(|t| !t.tag_type.is_class_member() && t.tag_type != TagType::File)
            .collect()
    }
}

fn enclosing_class(view: &ScopeView<'_>, what: &str) -> Result<String, LookupError> {
    if view.class_name().is_empty() {
        Err(LookupError::TypeResolution(what.to_string()))
    } else {
        Ok(view.class_name().to_string())
    }
}

fn global(name: &str) -> String {
    if name.starts_with('\\') {
        name.to_string()
    } else {
        format!("\\{}", name)
    }
}

pub(crate) fn type_parts(type_text: &str) -> impl Iterator<Item = &str> {
    type_text
        .split(|c: char| c == '|' || c == '&')
        .map(|p| p.trim().trim_start_matches('?').trim_matches(|c: char| c == '(' || c == ')'))
        .filter(|p| !p.is_empty())
}

/// The first class named by a type, which may be nullable or a union
pub fn class_of(type_text: &str, view: &ScopeView<'_>) -> Result<String, LookupError> {
    for part in type_parts(type_text) {
        if part.ends_with("[]") {
            continue;
        }
        match part.to_ascii_lowercase().as_str() {
            "self" | "static" | "$this" => return enclosing_class(view, part),
            "parent" if !view.parent_class().is_empty() => return Ok(view.parent_class().to_string()),
            _ => {}
        }
        if !is_reserved_type(part) {
            return Ok(global(part));
        }
    }
    Err(LookupError::PrimitiveType(type_text.to_string()))
}

/// Element type of a `Foo[]` type
pub fn element_type(type_text: &str) -> Option<String> {
    type_parts(type_text)
        .find_map(|p| p.strip_suffix("[]"))
        .map(str::to_string)
}

/// Replaces `self`/`static`/`$this` in a declared type with the class it
/// was declared on
fn rebase(type_text: &str, class: &str) -> String {
    type_parts(type_text)
        .map(|part| match part.to_ascii_lowercase().as_str() {
            "self" | "static" | "$this" => class.to_string(),
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join("|")
}

pub(crate) fn kind_matches(tag: &Tag, member: &ChainMember) -> bool {
    match member.kind {
        MemberKind::Method => tag.tag_type == TagType::Method,
        MemberKind::Property => tag.tag_type == TagType::Member,
        MemberKind::Constant => tag.tag_type == TagType::ClassConstant,
    }
}

/// Like [`kind_matches`], except a name under the cursor without call
/// parentheses may still be a method
fn loosely_matches(tag: &Tag, member: &ChainMember) -> bool {
    match member.kind {
        MemberKind::Method => tag.tag_type == TagType::Method,
        _ => static_fits(tag, member.is_static, true),
    }
}

fn static_fits(tag: &Tag, static_access: bool, internal: bool) -> bool {
    if static_access {
        tag.tag_type == TagType::ClassConstant || tag.is_static || (internal && tag.tag_type == TagType::Method)
    } else {
        tag.tag_type == TagType::Method || (tag.tag_type == TagType::Member && !tag.is_static)
    }
}

fn accessible(tag: &Tag, static_access: bool, receiver: &Receiver) -> bool {
    let visible = match tag.visibility {
        Visibility::Public => true,
        Visibility::Protected => receiver.internal,
        Visibility::Private => {
            receiver.internal && tag.fully_qualified_class().eq_ignore_ascii_case(&receiver.class_name)
        }
    };
    visible && static_fits(tag, static_access, receiver.internal)
}

fn duck_fallback(error: &LookupError) -> bool {
    matches!(
        error,
        LookupError::TypeResolution(_) | LookupError::UnknownVariable(_) | LookupError::PrimitiveType(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TagConfig;
    use crate::index::NativeTags;
    use crate::indexer::tags::build_tags;
    use crate::parser::{parse_expression, scan_string};
    use crate::query::{Layer, MemoryTags, NativeLayer};
    use crate::working::SymbolTable;

    const LIBRARY: &str = r#"<?php
namespace Util;

class Base {
    protected $shared;
    public function baseWork() {}
}

class MyClass extends Base {
    const MAX = 10;
    public static $instances;
    private $secret;
    /** @var Item[] */
    public $items;
    public function work(): self {}
    public static function make(): static {}
    private function hidden() {}
    public function connection(): \PDO {}
}

class Item {
    public function label(): string {}
}

function helper(): MyClass {}
"#;

    const SOURCE: &str = r#"<?php
namespace App;

use Util\MyClass as UtilClass;

class Runner extends \Util\MyClass {
    public function run(\Util\Item $item, $plain) {
        $x = new UtilClass();
        $s = 'text';
        $list = [1, 2];
        foreach ($x->items as $entry) {
            $entry->label();
        }
        $x->work()->wo;
        $this->se;
        $x->connection()->prepare('q')->fe;
        $s->foo;
        $list[0]->foo;
        $nobody->wo;
        parent::MA;
        $entry->la;
        \Util\helper()->ma;
    }
}

function outside() {
    parent::foo;
}
"#;

    struct Fixture {
        current: Vec<Tag>,
        library: Vec<Tag>,
        symbols: SymbolTable,
        native: NativeTags,
    }

    fn fixture() -> Fixture {
        let config = TagConfig::default();
        let events = scan_string(SOURCE, &config);
        Fixture {
            current: build_tags(&events, "/p/app/Runner.php"),
            library: build_tags(&scan_string(LIBRARY, &config), "/p/lib/Util.php"),
            symbols: SymbolTable::build(&events),
            native: NativeTags::bundled().unwrap(),
        }
    }

    fn resolver(fixture: &Fixture, duck_typing: bool) -> Resolver<'_> {
        Resolver::new(SearchScope::default(), duck_typing)
            .with_layer(MemoryTags::new(Layer::CurrentFile, fixture.current.clone()))
            .with_layer(MemoryTags::new(Layer::OtherWorking, fixture.library.clone()))
            .with_layer(NativeLayer::new(&fixture.native))
    }

    /// Chain and scope for the text ending at `needle`
    fn at<'a>(fixture: &'a Fixture, needle: &str) -> (ExpressionChain, ScopeView<'a>) {
        let end = SOURCE.find(needle).unwrap() + needle.len();
        (parse_expression(&SOURCE[..end]), fixture.symbols.view_at(end))
    }

    fn identifiers(tags: &[Tag]) -> Vec<&str> {
        tags.iter().map(|t| t.identifier.as_str()).collect()
    }

    #[test]
    fn test_aliased_class_resolves_like_fully_qualified() {
        let fixture = fixture();
        let resolver = resolver(&fixture, false);
        let (chain, view) = at(&fixture, "$x->work()->wo");

        let found = resolver.completion(&chain, &view);
        assert_eq!(found.error, None);
        assert_eq!(identifiers(&found.tags), vec!["work"]);
        assert_eq!(found.tags[0].fully_qualified_class(), "\\Util\\MyClass");
    }

    #[test]
    fn test_visibility_depends_on_receiver() {
        let fixture = fixture();
        let resolver = resolver(&fixture, false);

        let (chain, view) = at(&fixture, "$this->se");
        let inside = resolver.completion(&chain, &view);
        assert_eq!(identifiers(&inside.tags), Vec::<&str>::new());

        let partial = parse_expression("$this->");
        let all = resolver.completion(&partial, &view);
        let names = identifiers(&all.tags);
        assert!(names.contains(&"work"));
        assert!(names.contains(&"shared"));
        assert!(names.contains(&"baseWork"));
        // private to the parent class
        assert!(!names.contains(&"hidden"));
        assert!(!names.contains(&"instances"));

        let outside = resolver.completion(&parse_expression("$x->"), &view);
        let names = identifiers(&outside.tags);
        assert!(names.contains(&"work"));
        assert!(!names.contains(&"shared"));
        assert!(!names.contains(&"secret"));
    }

    #[test]
    fn test_chains_through_native_return_types() {
        let fixture = fixture();
        let resolver = resolver(&fixture, false);
        let (chain, view) = at(&fixture, "prepare('q')->fe");

        let found = resolver.completion(&chain, &view);
        assert_eq!(found.error, None);
        assert_eq!(identifiers(&found.tags), vec!["fetch", "fetchAll", "fetchColumn"]);
    }

    #[test]
    fn test_errors_are_values() {
        let fixture = fixture();
        let resolver = resolver(&fixture, false);

        let (chain, view) = at(&fixture, "$s->foo");
        assert_eq!(
            resolver.completion(&chain, &view).error,
            Some(LookupError::PrimitiveType("string".into()))
        );

        let (chain, view) = at(&fixture, "$list[0]->foo");
        assert_eq!(
            resolver.completion(&chain, &view).error,
            Some(LookupError::ArrayKeyNotFoundVariable("$list".into()))
        );

        let (chain, view) = at(&fixture, "$nobody->wo");
        assert_eq!(
            resolver.completion(&chain, &view).error,
            Some(LookupError::UnknownVariable("$nobody".into()))
        );

        let (chain, view) = at(&fixture, "    parent::foo");
        assert_eq!(
            resolver.resource(&chain, &view).error,
            Some(LookupError::TypeResolution("parent".into()))
        );

        let empty = parse_expression("");
        assert_eq!(
            resolver.completion(&empty, &view).error,
            Some(LookupError::EmptyExpression)
        );
    }

    #[test]
    fn test_duck_typing_is_flagged() {
        let fixture = fixture();
        let (chain, view) = at(&fixture, "$nobody->wo");

        let found = resolver(&fixture, true).completion(&chain, &view);
        assert!(found.duck_typed);
        assert_eq!(found.error, None);
        assert!(identifiers(&found.tags).contains(&"work"));
    }

    #[test]
    fn test_parent_and_static_access() {
        let fixture = fixture();
        let resolver = resolver(&fixture, false);
        let (chain, view) = at(&fixture, "parent::MA");

        let found = resolver.completion(&chain, &view);
        assert_eq!(identifiers(&found.tags), vec!["make", "MAX"]);

        let statics = resolver.completion(&parse_expression("UtilClass::"), &view);
        let names = identifiers(&statics.tags);
        assert!(names.contains(&"make"));
        assert!(names.contains(&"instances"));
        assert!(names.contains(&"MAX"));
        assert!(!names.contains(&"work"));
    }

    #[test]
    fn test_element_types_and_functions() {
        let fixture = fixture();
        let resolver = resolver(&fixture, false);

        let (chain, view) = at(&fixture, "$entry->la");
        assert_eq!(identifiers(&resolver.completion(&chain, &view).tags), vec!["label"]);

        let (chain, view) = at(&fixture, "helper()->ma");
        assert_eq!(identifiers(&resolver.completion(&chain, &view).tags), vec!["make"]);
    }

    #[test]
    fn test_resource_lookups() {
        let fixture = fixture();
        let resolver = resolver(&fixture, false);
        let (_, view) = at(&fixture, "$x->work()->wo");

        let class = resolver.resource(&parse_expression("new UtilClass"), &view);
        assert_eq!(class.tags.len(), 1);
        assert_eq!(class.tags[0].fully_qualified_name(), "\\Util\\MyClass");

        let direct = resolver.resource(&parse_expression("new \\Util\\MyClass"), &view);
        assert_eq!(direct.tags, class.tags);

        // namespaced call falls back to the global function
        let strlen = resolver.resource(&parse_expression("strlen"), &view);
        assert_eq!(strlen.tags.len(), 1);
        assert!(strlen.tags[0].is_native);

        let method = resolver.resource(&parse_expression("$x->work"), &view);
        assert_eq!(identifiers(&method.tags), vec!["work"]);
    }

    #[test]
    fn test_variable_names_complete() {
        let fixture = fixture();
        let resolver = resolver(&fixture, false);
        let (_, view) = at(&fixture, "$x->work()->wo");

        let found = resolver.completion(&parse_expression("$pl"), &view);
        assert_eq!(found.variables, vec!["$plain"]);
        assert!(found.tags.is_empty());
    }

    #[test]
    fn test_earlier_layer_shadows_later() {
        let shadow = build_tags(
            &scan_string("<?php namespace Util; class MyClass { function fresh() {} }", &TagConfig::default()),
            "/p/open.php",
        );
        let fixture = fixture();
        let resolver = Resolver::new(SearchScope::default(), false)
            .with_layer(MemoryTags::new(Layer::CurrentFile, shadow))
            .with_layer(MemoryTags::new(Layer::OtherWorking, fixture.library.clone()));

        let class = resolver.class("\\Util\\MyClass").unwrap();
        assert_eq!(class.full_path, "/p/open.php");
        assert_eq!(resolver.classes("\\Util\\MyClass").len(), 1);
        assert_eq!(resolver.layers(), vec![Layer::CurrentFile, Layer::OtherWorking]);
    }
}
