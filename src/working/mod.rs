//! Open editor buffers layered over the persistent index.
//!
//! Each registered buffer keeps the tags and symbol table of its last
//! syntactically valid text. An update that fails the syntax check leaves
//! the previous snapshot in place, so completion keeps working while the
//! user is halfway through typing a statement.

pub mod symbols;

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::TagConfig;
use crate::index::Tag;
use crate::indexer::tags::build_tags;
use crate::parser::lint::{lint_string, SyntaxError};
use crate::parser::scan_string;

pub use symbols::{Assignment, Scope, ScopeKind, ScopeView, SymbolTable};

/// Snapshot of one open buffer
#[derive(Debug, Clone, Default)]
pub struct WorkingFile {
    pub file_id: String,
    /// On-disk location, if the buffer has been saved before
    pub full_path: Option<String>,
    pub is_new: bool,
    pub tags: Vec<Tag>,
    pub symbols: SymbolTable,
    /// Whether any text has been accepted yet
    pub parsed: bool,
    /// Ticket of this registration
    registration: u64,
    /// Ticket of the update the snapshot was built from
    generation: u64,
}

impl WorkingFile {
    /// Path tags of this buffer are recorded under
    pub fn tag_path(&self) -> &str {
        self.full_path.as_deref().unwrap_or(&self.file_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated { tags: usize },
    KeptPrevious(SyntaxError),
    /// A newer update or registration landed while this one was parsing
    Superseded,
    Unregistered,
}

/// Stamp taken when an update starts
#[derive(Debug, Clone, Copy)]
struct UpdateTicket {
    registration: u64,
    generation: u64,
}

/// Parsed text waiting to be swapped in
struct ParsedBuffer {
    tags: Vec<Tag>,
    symbols: SymbolTable,
}

/// All open buffers behind one lock
pub struct WorkingOverlay {
    config: TagConfig,
    files: Mutex<HashMap<String, WorkingFile>>,
    tickets: AtomicU64,
}

impl WorkingOverlay {
    pub fn new(config: TagConfig) -> Self {
        Self {
            config,
            files: Mutex::new(HashMap::new()),
            tickets: AtomicU64::new(0),
        }
    }

    fn next_ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Registers a buffer; registering again resets its snapshot.
    pub fn register(&self, file_id: &str, full_path: Option<&Path>, is_new: bool) {
        let file = WorkingFile {
            file_id: file_id.to_string(),
            full_path: full_path.map(|p| p.to_string_lossy().into_owned()),
            is_new,
            registration: self.next_ticket(),
            ..WorkingFile::default()
        };
        debug!("Registered working file {}", file_id);
        self.files.lock().insert(file_id.to_string(), file);
    }

    pub fn unregister(&self, file_id: &str) -> bool {
        self.files.lock().remove(file_id).is_some()
    }

    pub fn is_registered(&self, file_id: &str) -> bool {
        self.files.lock().contains_key(file_id)
    }

    pub fn clear(&self) {
        self.files.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }

    /// Re-scans a buffer. Parsing happens outside the lock; only the swap
    /// of the finished snapshot holds it. Each update takes a ticket first,
    /// so a slow parse never replaces the result of a later update.
    pub fn update(&self, file_id: &str, text: &str) -> UpdateOutcome {
        let Some((ticket, tag_path)) = self.begin_update(file_id) else {
            return UpdateOutcome::Unregistered;
        };
        match self.parse(file_id, text, &tag_path) {
            Ok(parsed) => self.finish_update(file_id, ticket, parsed),
            Err(error) => UpdateOutcome::KeptPrevious(error),
        }
    }

    fn begin_update(&self, file_id: &str) -> Option<(UpdateTicket, String)> {
        let files = self.files.lock();
        let file = files.get(file_id)?;
        let ticket = UpdateTicket {
            registration: file.registration,
            generation: self.next_ticket(),
        };
        Some((ticket, file.tag_path().to_string()))
    }

    fn parse(&self, file_id: &str, text: &str, tag_path: &str) -> Result<ParsedBuffer, SyntaxError> {
        if let Err(error) = lint_string(text, self.config.short_open_tags) {
            info!("Keeping previous snapshot of {}: {}", file_id, error);
            return Err(error);
        }
        let events = scan_string(text, &self.config);
        Ok(ParsedBuffer {
            tags: build_tags(&events, tag_path),
            symbols: SymbolTable::build(&events),
        })
    }

    fn finish_update(&self, file_id: &str, ticket: UpdateTicket, parsed: ParsedBuffer) -> UpdateOutcome {
        let mut files = self.files.lock();
        let Some(file) = files.get_mut(file_id) else {
            // unregistered while we were parsing
            return UpdateOutcome::Unregistered;
        };
        if file.registration != ticket.registration || file.generation > ticket.generation {
            debug!("Dropping stale update of {}", file_id);
            return UpdateOutcome::Superseded;
        }
        let count = parsed.tags.len();
        file.tags = parsed.tags;
        file.symbols = parsed.symbols;
        file.generation = ticket.generation;
        file.parsed = true;
        debug!("Working file {} now has {} tags", file_id, count);
        UpdateOutcome::Updated { tags: count }
    }

    pub fn snapshot(&self, file_id: &str) -> Option<WorkingFile> {
        self.files.lock().get(file_id).cloned()
    }

    /// Snapshots of every buffer except `file_id`
    pub fn others(&self, file_id: &str) -> Vec<WorkingFile> {
        self.files
            .lock()
            .values()
            .filter(|f| f.file_id != file_id)
            .cloned()
            .collect()
    }

    /// Tags of every parsed buffer keyed by the path they shadow
    pub fn tags_by_path(&self) -> HashMap<String, Vec<Tag>> {
        self.files
            .lock()
            .values()
            .filter(|f| f.parsed)
            .map(|f| (f.tag_path().to_string(), f.tags.clone()))
            .collect()
    }
}
