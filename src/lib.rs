//! phptags: PHP tag indexing and symbol lookup.
//!
//! Source is lexed and scanned into declaration events, the declarations
//! ("tags") are persisted per source root in a SQLite store, and queries are
//! answered through layers: the open buffers, the store, and the bundled
//! native function and class set. Completion, jump to definition and the
//! lint checks are all built on those layered lookups.

pub mod config;
pub mod error;
pub mod index;
pub mod indexer;
pub mod lexer;
pub mod lint;
pub mod parser;
pub mod query;
pub mod working;

pub use config::{Config, TagConfig};
pub use error::{LookupError, StoreError};
pub use index::{NativeTags, Tag, TagStore, TagType};
pub use indexer::{TagExtractor, WalkOutcome, WalkStats};
pub use lint::{LintResult, Linter};
pub use query::TagCache;
