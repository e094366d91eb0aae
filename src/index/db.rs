use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::schema::{init_schema, SCHEMA_VERSION};
use super::{dir_prefix, file_name, FileItem, SearchScope, Source, Tag, TagType, Visibility};
use crate::error::{StoreError, StoreResult};

/// Type alias for connection pool
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Appended to a prefix to close an ordered range scan
pub const HIGH_SENTINEL: char = '\u{10FFFF}';

const TAG_COLUMNS: &str = "id, source_id, file_item_id, key, identifier, class_name, namespace_name,
    type, signature, return_type, comment, visibility, is_static, has_variable_args,
    parent_class, interfaces, traits, full_path, line";

const FILE_COLUMNS: &str = "id, source_id, full_path, content_hash, last_indexed, is_parsed";

const MEMBER_TYPES: &str = "('method', 'member', 'class_constant')";

const CONNECTION_PRAGMAS: &str = "PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;";

fn open_connection(db_path: &Path) -> StoreResult<Connection> {
    let conn = Connection::open(db_path).map_err(|source| StoreError::Open {
        path: db_path.to_path_buf(),
        source,
    })?;
    conn.execute_batch(CONNECTION_PRAGMAS)?;
    Ok(conn)
}

/// Handle to the persistent tag store.
///
/// Readers share an r2d2 pool and may run while the single [`TagWriter`]
/// commits; WAL mode means they see the last committed state of each file
/// rather than waiting.
#[derive(Clone)]
pub struct TagStore {
    pool: ConnectionPool,
    db_path: PathBuf,
    writer_active: Arc<AtomicBool>,
}

impl TagStore {
    /// Create or open a store
    pub fn open(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        info!("Opening tag store at: {}", db_path.display());

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        {
            let conn = open_connection(&db_path)?;
            let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
            debug!("Journal mode: {}", mode);
            init_schema(&conn).map_err(|source| StoreError::Migration {
                version: SCHEMA_VERSION,
                source,
            })?;
        }

        let manager = SqliteConnectionManager::file(&db_path).with_init(|c| c.execute_batch(CONNECTION_PRAGMAS));
        let pool = Pool::builder().max_size(8).build(manager)?;

        Ok(Self {
            pool,
            db_path,
            writer_active: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Get a reader connection from the pool
    pub fn get_conn(&self) -> StoreResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Takes the writer capability. Fails with `WriterBusy` while another
    /// writer is alive.
    pub fn writer(&self) -> StoreResult<TagWriter> {
        if self
            .writer_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(StoreError::WriterBusy);
        }
        let guard = WriterGuard(Arc::clone(&self.writer_active));
        let conn = open_connection(&self.db_path)?;
        Ok(TagWriter { conn, _guard: guard })
    }

    pub fn sources(&self) -> StoreResult<Vec<Source>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT id, directory, php_extensions, misc_extensions FROM sources ORDER BY directory")?;
        let sources = stmt
            .query_map([], row_to_source)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    pub fn file_item(&self, full_path: &str) -> StoreResult<Option<FileItem>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM file_items WHERE full_path = ?1", FILE_COLUMNS);
        let item = conn.query_row(&sql, [full_path], row_to_file_item).optional()?;
        Ok(item)
    }

    /// Case-insensitive prefix search over tag keys, ordered by key
    pub fn near_match(&self, prefix: &str, scope: &SearchScope) -> StoreResult<Vec<Tag>> {
        let lower = prefix.to_lowercase();
        let mut values = vec![
            Value::Text(lower.clone()),
            Value::Text(format!("{}{}", lower, HIGH_SENTINEL)),
        ];
        let dirs = dir_clause(scope, &mut values);
        let sql = format!(
            "SELECT {} FROM tags WHERE key_lower BETWEEN ? AND ?{} ORDER BY key_lower, id LIMIT ?",
            TAG_COLUMNS, dirs
        );
        self.query_tags(&sql, values, scope.limit)
    }

    /// Tags whose key equals `key`, ignoring case
    pub fn exact(&self, key: &str, scope: &SearchScope) -> StoreResult<Vec<Tag>> {
        let mut values = vec![Value::Text(key.to_lowercase())];
        let dirs = dir_clause(scope, &mut values);
        let sql = format!(
            "SELECT {} FROM tags WHERE key_lower = ?{} ORDER BY full_path, line LIMIT ?",
            TAG_COLUMNS, dirs
        );
        self.query_tags(&sql, values, scope.limit)
    }

    /// Class tags declared under a fully qualified name
    pub fn class_by_fqn(&self, fqn: &str, scope: &SearchScope) -> StoreResult<Vec<Tag>> {
        let mut values = vec![Value::Text(fqn.to_lowercase())];
        let dirs = dir_clause(scope, &mut values);
        let sql = format!(
            "SELECT {} FROM tags WHERE key_lower = ? AND type = 'class' AND alias_row = 1{}
             ORDER BY full_path LIMIT ?",
            TAG_COLUMNS, dirs
        );
        self.query_tags(&sql, values, scope.limit)
    }

    /// Methods, properties and constants declared directly on a class. With
    /// `exact` the member name must match; otherwise it is a prefix.
    pub fn class_members(
        &self,
        class_fqn: &str,
        member: &str,
        exact: bool,
        scope: &SearchScope,
    ) -> StoreResult<Vec<Tag>> {
        let (namespace, short) = crate::parser::names::split_qualified(class_fqn);
        let key = super::member_key(&short, member).to_lowercase();
        let mut values = vec![Value::Text(key.clone())];
        let key_clause = if exact {
            "key_lower = ?"
        } else {
            values.push(Value::Text(format!("{}{}", key, HIGH_SENTINEL)));
            "key_lower BETWEEN ? AND ?"
        };
        values.push(Value::Text(namespace.to_lowercase()));
        let dirs = dir_clause(scope, &mut values);
        let sql = format!(
            "SELECT {} FROM tags WHERE {} AND lower(namespace_name) = ? AND type IN {}{}
             ORDER BY key_lower, id LIMIT ?",
            TAG_COLUMNS, key_clause, MEMBER_TYPES, dirs
        );
        self.query_tags(&sql, values, scope.limit)
    }

    /// Members with a given name (or name prefix) on any class
    pub fn members_named(&self, member: &str, exact: bool, scope: &SearchScope) -> StoreResult<Vec<Tag>> {
        let lower = member.to_lowercase();
        let mut values = vec![Value::Text(lower.clone())];
        let name_clause = if exact {
            "identifier_lower = ?"
        } else {
            values.push(Value::Text(format!("{}{}", lower, HIGH_SENTINEL)));
            "identifier_lower BETWEEN ? AND ?"
        };
        let dirs = dir_clause(scope, &mut values);
        let sql = format!(
            "SELECT {} FROM tags WHERE type IN {} AND {}{} ORDER BY identifier_lower, key_lower LIMIT ?",
            TAG_COLUMNS, MEMBER_TYPES, name_clause, dirs
        );
        self.query_tags(&sql, values, scope.limit)
    }

    /// Every declaration of one file, in source order
    pub fn tags_for_file(&self, full_path: &str) -> StoreResult<Vec<Tag>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM tags
             WHERE file_item_id = (SELECT id FROM file_items WHERE full_path = ?1) AND alias_row = 0
             ORDER BY line, id",
            TAG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let tags = stmt
            .query_map([full_path], row_to_tag)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    /// Prefix search over file names, for "go to file"
    pub fn near_match_files(&self, prefix: &str, scope: &SearchScope) -> StoreResult<Vec<Tag>> {
        let lower = prefix.to_lowercase();
        let mut values = vec![
            Value::Text(lower.clone()),
            Value::Text(format!("{}{}", lower, HIGH_SENTINEL)),
        ];
        let dirs = dir_clause(scope, &mut values);
        values.push(Value::Integer(scope.limit as i64));
        let sql = format!(
            "SELECT {} FROM file_items WHERE name_lower BETWEEN ? AND ?{} ORDER BY name_lower, full_path LIMIT ?",
            FILE_COLUMNS, dirs
        );

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(values), row_to_file_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items.iter().map(FileItem::to_tag).collect())
    }

    /// Get store statistics
    pub fn stats(&self) -> StoreResult<StoreStats> {
        let conn = self.get_conn()?;

        let sources: i64 = conn.query_row("SELECT COUNT(*) FROM sources", [], |row| row.get(0))?;
        let files: i64 = conn.query_row("SELECT COUNT(*) FROM file_items", [], |row| row.get(0))?;
        let parsed_files: i64 =
            conn.query_row("SELECT COUNT(*) FROM file_items WHERE is_parsed = 1", [], |row| row.get(0))?;

        let mut tags_by_type = BTreeMap::new();
        let mut stmt = conn.prepare("SELECT type, COUNT(*) FROM tags WHERE alias_row = 0 GROUP BY type")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (tag_type, count) = row?;
            tags_by_type.insert(tag_type, count as usize);
        }

        Ok(StoreStats {
            sources: sources as usize,
            files: files as usize,
            parsed_files: parsed_files as usize,
            tags: tags_by_type.values().sum(),
            tags_by_type,
        })
    }

    fn query_tags(&self, sql: &str, mut values: Vec<Value>, limit: usize) -> StoreResult<Vec<Tag>> {
        values.push(Value::Integer(limit as i64));
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let tags = stmt
            .query_map(params_from_iter(values), row_to_tag)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }
}

/// Store statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub sources: usize,
    pub files: usize,
    pub parsed_files: usize,
    pub tags: usize,
    pub tags_by_type: BTreeMap<String, usize>,
}

struct WriterGuard(Arc<AtomicBool>);

impl Drop for WriterGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The single write handle of a store. Every per-file replacement runs in
/// one transaction, so readers see either the old or the new tag set.
pub struct TagWriter {
    conn: Connection,
    _guard: WriterGuard,
}

impl TagWriter {
    /// Returns the source row for `directory`, creating it on first use.
    /// Extension lists are refreshed on an existing row.
    pub fn begin_source(
        &mut self,
        directory: &str,
        php_extensions: &[String],
        misc_extensions: &[String],
    ) -> StoreResult<Source> {
        self.conn.execute(
            "INSERT INTO sources (directory, php_extensions, misc_extensions) VALUES (?1, ?2, ?3)
             ON CONFLICT(directory) DO UPDATE SET
                php_extensions = excluded.php_extensions,
                misc_extensions = excluded.misc_extensions",
            params![directory, join_list(php_extensions), join_list(misc_extensions)],
        )?;
        let source = self.conn.query_row(
            "SELECT id, directory, php_extensions, misc_extensions FROM sources WHERE directory = ?1",
            [directory],
            row_to_source,
        )?;
        Ok(source)
    }

    /// Replaces the file's row and all of its tags atomically. Returns the
    /// file item id.
    pub fn replace_file(
        &mut self,
        source_id: i64,
        full_path: &str,
        content_hash: &str,
        is_parsed: bool,
        tags: &[Tag],
    ) -> StoreResult<i64> {
        let operation = format!("indexing {}", full_path);
        let tx = self.transaction(&operation)?;

        let file_item_id = upsert_file_item(&tx, source_id, full_path, content_hash, is_parsed)
            .map_err(|source| transaction_error(&operation, source))?;
        tx.execute("DELETE FROM tags WHERE file_item_id = ?1", [file_item_id])
            .map_err(|source| transaction_error(&operation, source))?;
        for tag in tags {
            insert_tag(&tx, source_id, file_item_id, full_path, tag)
                .map_err(|source| transaction_error(&operation, source))?;
        }

        tx.commit().map_err(|source| transaction_error(&operation, source))?;
        debug!("Stored {} tags for {}", tags.len(), full_path);
        Ok(file_item_id)
    }

    /// Deletes every file and tag of a source, keeping the source row
    pub fn wipe(&mut self, source_id: i64) -> StoreResult<usize> {
        let operation = format!("wiping source {}", source_id);
        let tx = self.transaction(&operation)?;
        let removed = tx
            .execute("DELETE FROM tags WHERE source_id = ?1", [source_id])
            .and_then(|n| {
                tx.execute("DELETE FROM file_items WHERE source_id = ?1", [source_id])?;
                Ok(n)
            })
            .map_err(|source| transaction_error(&operation, source))?;
        tx.commit().map_err(|source| transaction_error(&operation, source))?;
        info!("Wiped {} tags of source {}", removed, source_id);
        Ok(removed)
    }

    /// Drops a source row together with its files and tags
    pub fn remove_source(&mut self, directory: &str) -> StoreResult<bool> {
        let id: Option<i64> = self
            .conn
            .query_row("SELECT id FROM sources WHERE directory = ?1", [directory], |row| row.get(0))
            .optional()?;
        let Some(id) = id else {
            return Ok(false);
        };
        self.wipe(id)?;
        self.conn.execute("DELETE FROM sources WHERE id = ?1", [id])?;
        Ok(true)
    }

    /// Forgets one file. Returns the number of tag rows removed.
    pub fn delete_file(&mut self, full_path: &str) -> StoreResult<usize> {
        let operation = format!("deleting {}", full_path);
        let tx = self.transaction(&operation)?;
        let removed = tx
            .execute(
                "DELETE FROM tags WHERE file_item_id IN (SELECT id FROM file_items WHERE full_path = ?1)",
                [full_path],
            )
            .and_then(|n| {
                tx.execute("DELETE FROM file_items WHERE full_path = ?1", [full_path])?;
                Ok(n)
            })
            .map_err(|source| transaction_error(&operation, source))?;
        tx.commit().map_err(|source| transaction_error(&operation, source))?;
        Ok(removed)
    }

    /// Forgets every file under a directory. Returns the number of files.
    pub fn delete_dir(&mut self, dir: &str) -> StoreResult<usize> {
        let prefix = dir_prefix(dir);
        let upper = format!("{}{}", prefix, HIGH_SENTINEL);
        let operation = format!("deleting {}", dir);
        let tx = self.transaction(&operation)?;
        let removed = tx
            .execute(
                "DELETE FROM tags WHERE file_item_id IN
                    (SELECT id FROM file_items WHERE full_path BETWEEN ?1 AND ?2)",
                params![prefix, upper],
            )
            .and_then(|_| {
                tx.execute(
                    "DELETE FROM file_items WHERE full_path BETWEEN ?1 AND ?2",
                    params![prefix, upper],
                )
            })
            .map_err(|source| transaction_error(&operation, source))?;
        tx.commit().map_err(|source| transaction_error(&operation, source))?;
        Ok(removed)
    }

    /// Points a known file's rows at a new path without re-parsing.
    /// Returns false when `old` is not in the store.
    pub fn rename_file(&mut self, old: &str, new: &str) -> StoreResult<bool> {
        let operation = format!("renaming {} to {}", old, new);
        let tx = self.transaction(&operation)?;
        let renamed = rename_file_rows(&tx, old, new).map_err(|source| transaction_error(&operation, source))?;
        tx.commit().map_err(|source| transaction_error(&operation, source))?;
        Ok(renamed)
    }

    /// Rewrites the path prefix of every file under `old`. Returns the
    /// number of files moved.
    pub fn rename_dir(&mut self, old: &str, new: &str) -> StoreResult<usize> {
        let old_prefix = dir_prefix(old);
        let new_prefix = dir_prefix(new);
        let upper = format!("{}{}", old_prefix, HIGH_SENTINEL);
        let keep_from = old_prefix.chars().count() as i64 + 1;

        let operation = format!("renaming {} to {}", old, new);
        let tx = self.transaction(&operation)?;
        let moved = tx
            .execute(
                "UPDATE tags SET full_path = ?1 || substr(full_path, ?2)
                 WHERE file_item_id IN (SELECT id FROM file_items WHERE full_path BETWEEN ?3 AND ?4)",
                params![new_prefix, keep_from, old_prefix, upper],
            )
            .and_then(|_| {
                tx.execute(
                    "UPDATE file_items SET full_path = ?1 || substr(full_path, ?2)
                     WHERE full_path BETWEEN ?3 AND ?4",
                    params![new_prefix, keep_from, old_prefix, upper],
                )
            })
            .map_err(|source| transaction_error(&operation, source))?;
        tx.commit().map_err(|source| transaction_error(&operation, source))?;
        info!("Moved {} files from {} to {}", moved, old, new);
        Ok(moved)
    }

    fn transaction(&mut self, operation: &str) -> StoreResult<Transaction<'_>> {
        self.conn
            .transaction()
            .map_err(|source| transaction_error(operation, source))
    }
}

fn transaction_error(operation: &str, source: rusqlite::Error) -> StoreError {
    StoreError::Transaction {
        operation: operation.to_string(),
        source,
    }
}

fn upsert_file_item(
    tx: &Transaction,
    source_id: i64,
    full_path: &str,
    content_hash: &str,
    is_parsed: bool,
) -> rusqlite::Result<i64> {
    tx.execute(
        "INSERT INTO file_items (source_id, full_path, name_lower, content_hash, last_indexed, is_parsed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(full_path) DO UPDATE SET
            source_id = excluded.source_id,
            content_hash = excluded.content_hash,
            last_indexed = excluded.last_indexed,
            is_parsed = excluded.is_parsed",
        params![
            source_id,
            full_path,
            file_name(full_path).to_lowercase(),
            content_hash,
            now(),
            is_parsed
        ],
    )?;
    tx.query_row("SELECT id FROM file_items WHERE full_path = ?1", [full_path], |row| row.get(0))
}

fn insert_tag(tx: &Transaction, source_id: i64, file_item_id: i64, full_path: &str, tag: &Tag) -> rusqlite::Result<()> {
    let mut stmt = tx.prepare_cached(
        "INSERT INTO tags (
            source_id, file_item_id, key, key_lower, identifier, identifier_lower, class_name,
            namespace_name, type, signature, return_type, comment, visibility, is_static,
            has_variable_args, parent_class, interfaces, traits, full_path, line, alias_row
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
    )?;

    let mut keys = vec![(tag.key.clone(), false)];
    if let Some(qualified) = tag.qualified_key() {
        keys.push((qualified, true));
    }
    for (key, alias_row) in keys {
        stmt.execute(params![
            source_id,
            file_item_id,
            key,
            key.to_lowercase(),
            tag.identifier,
            tag.identifier.to_lowercase(),
            tag.class_name,
            tag.namespace_name,
            tag.tag_type.as_str(),
            tag.signature,
            tag.return_type,
            tag.comment,
            tag.visibility.as_str(),
            tag.is_static,
            tag.has_variable_args,
            tag.parent_class,
            join_list(&tag.interfaces),
            join_list(&tag.traits),
            full_path,
            tag.line as i64,
            alias_row,
        ])?;
    }
    Ok(())
}

fn rename_file_rows(tx: &Transaction, old: &str, new: &str) -> rusqlite::Result<bool> {
    let id: Option<i64> = tx
        .query_row("SELECT id FROM file_items WHERE full_path = ?1", [old], |row| row.get(0))
        .optional()?;
    let Some(id) = id else {
        return Ok(false);
    };

    // a stale row for the target would violate the unique path
    tx.execute(
        "DELETE FROM tags WHERE file_item_id IN (SELECT id FROM file_items WHERE full_path = ?1)",
        [new],
    )?;
    tx.execute("DELETE FROM file_items WHERE full_path = ?1", [new])?;

    tx.execute(
        "UPDATE file_items SET full_path = ?1, name_lower = ?2 WHERE id = ?3",
        params![new, file_name(new).to_lowercase(), id],
    )?;
    tx.execute("UPDATE tags SET full_path = ?1 WHERE file_item_id = ?2", params![new, id])?;
    Ok(true)
}

/// `AND (full_path BETWEEN ? AND ? OR ...)` for the scope's directories
fn dir_clause(scope: &SearchScope, values: &mut Vec<Value>) -> String {
    if scope.dirs.is_empty() {
        return String::new();
    }
    let mut ranges = Vec::with_capacity(scope.dirs.len());
    for dir in &scope.dirs {
        let prefix = dir_prefix(dir);
        let upper = format!("{}{}", prefix, HIGH_SENTINEL);
        values.push(Value::Text(prefix));
        values.push(Value::Text(upper));
        ranges.push("full_path BETWEEN ? AND ?");
    }
    format!(" AND ({})", ranges.join(" OR "))
}

fn join_list(items: &[String]) -> String {
    items.join(",")
}

fn split_list(text: String) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn conversion_error(column: usize, reason: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, reason.into())
}

/// Convert database row to Tag
fn row_to_tag(row: &Row) -> rusqlite::Result<Tag> {
    let type_str: String = row.get(7)?;
    let tag_type =
        TagType::from_str(&type_str).ok_or_else(|| conversion_error(7, format!("unknown tag type '{}'", type_str)))?;
    let visibility_str: String = row.get(11)?;
    let visibility = Visibility::from_str(&visibility_str)
        .ok_or_else(|| conversion_error(11, format!("unknown visibility '{}'", visibility_str)))?;

    Ok(Tag {
        id: row.get(0)?,
        source_id: row.get(1)?,
        file_item_id: row.get(2)?,
        key: row.get(3)?,
        identifier: row.get(4)?,
        class_name: row.get(5)?,
        namespace_name: row.get(6)?,
        tag_type,
        signature: row.get(8)?,
        return_type: row.get(9)?,
        comment: row.get(10)?,
        visibility,
        is_static: row.get(12)?,
        is_native: false,
        has_variable_args: row.get(13)?,
        parent_class: row.get(14)?,
        interfaces: split_list(row.get(15)?),
        traits: split_list(row.get(16)?),
        full_path: row.get(17)?,
        line: row.get::<_, i64>(18)? as usize,
    })
}

fn row_to_source(row: &Row) -> rusqlite::Result<Source> {
    Ok(Source {
        id: row.get(0)?,
        directory: row.get(1)?,
        php_extensions: split_list(row.get(2)?),
        misc_extensions: split_list(row.get(3)?),
    })
}

fn row_to_file_item(row: &Row) -> rusqlite::Result<FileItem> {
    Ok(FileItem {
        id: row.get(0)?,
        source_id: row.get(1)?,
        full_path: row.get(2)?,
        content_hash: row.get(3)?,
        last_indexed: row.get(4)?,
        is_parsed: row.get(5)?,
    })
}

/// Current timestamp in seconds
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn class_tag(name: &str, namespace: &str, line: usize) -> Tag {
        Tag {
            namespace_name: namespace.to_string(),
            line,
            ..Tag::new(TagType::Class, name)
        }
    }

    fn method_tag(class: &str, namespace: &str, name: &str) -> Tag {
        Tag {
            signature: "()".into(),
            ..Tag::member(TagType::Method, class, namespace, name)
        }
    }

    fn store_with_source() -> (tempfile::TempDir, TagStore, TagWriter, Source) {
        let dir = tempdir().unwrap();
        let store = TagStore::open(dir.path().join("tags.db")).unwrap();
        let mut writer = store.writer().unwrap();
        let source = writer
            .begin_source("/p", &["*.php".to_string()], &["*.js".to_string()])
            .unwrap();
        (dir, store, writer, source)
    }

    #[test]
    fn test_create_store() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("tags.db");

        let store = TagStore::open(&db_path).unwrap();
        assert!(db_path.exists());
        assert_eq!(store.stats().unwrap().tags, 0);
    }

    #[test]
    fn test_near_match_is_ordered_prefix_scan() {
        let (_dir, store, mut writer, source) = store_with_source();
        for name in ["ActionYou", "ActionMy", "Other", "ActionThey"] {
            let path = format!("/p/{}.php", name);
            writer
                .replace_file(source.id, &path, "h", true, &[class_tag(name, "\\", 2)])
                .unwrap();
        }

        let found = store.near_match("action", &SearchScope::default()).unwrap();
        let names: Vec<&str> = found.iter().map(|t| t.identifier.as_str()).collect();
        assert_eq!(names, vec!["ActionMy", "ActionThey", "ActionYou"]);

        let capped = store.near_match("Action", &SearchScope::with_limit(2)).unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[test]
    fn test_exact_and_qualified_keys() {
        let (_dir, store, mut writer, source) = store_with_source();
        writer
            .replace_file(
                source.id,
                "/p/MyClass.php",
                "h",
                true,
                &[class_tag("MyClass", "\\Util", 3), method_tag("MyClass", "\\Util", "work")],
            )
            .unwrap();

        let scope = SearchScope::default();
        assert_eq!(store.exact("myclass", &scope).unwrap().len(), 1);
        assert_eq!(store.exact("\\Util\\MyClass", &scope).unwrap().len(), 1);
        assert_eq!(store.class_by_fqn("\\util\\myclass", &scope).unwrap().len(), 1);
        assert!(store.class_by_fqn("\\MyClass", &scope).unwrap().is_empty());

        let methods = store.exact("MyClass::work", &scope).unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].identifier, "work");
        assert_eq!(methods[0].class_name, "MyClass");
    }

    #[test]
    fn test_replace_file_is_idempotent() {
        let (_dir, store, mut writer, source) = store_with_source();
        let tags = vec![class_tag("A", "\\", 1), method_tag("A", "\\", "run")];
        writer.replace_file(source.id, "/p/a.php", "h1", true, &tags).unwrap();
        let first = store.tags_for_file("/p/a.php").unwrap();
        writer.replace_file(source.id, "/p/a.php", "h1", true, &tags).unwrap();
        let second = store.tags_for_file("/p/a.php").unwrap();

        assert_eq!(first.len(), 2);
        let keys = |tags: &[Tag]| tags.iter().map(|t| t.key.clone()).collect::<Vec<_>>();
        assert_eq!(keys(&first), keys(&second));
        assert_eq!(store.stats().unwrap().files, 1);
    }

    #[test]
    fn test_class_members_and_duck_typing() {
        let (_dir, store, mut writer, source) = store_with_source();
        writer
            .replace_file(
                source.id,
                "/p/a.php",
                "h",
                true,
                &[
                    class_tag("A", "\\One", 1),
                    method_tag("A", "\\One", "save"),
                    method_tag("A", "\\One", "search"),
                ],
            )
            .unwrap();
        writer
            .replace_file(
                source.id,
                "/p/b.php",
                "h",
                true,
                &[class_tag("A", "\\Two", 1), method_tag("A", "\\Two", "save")],
            )
            .unwrap();

        let scope = SearchScope::default();
        let prefixed = store.class_members("\\One\\A", "s", false, &scope).unwrap();
        assert_eq!(prefixed.len(), 2);
        let exact = store.class_members("\\Two\\A", "save", true, &scope).unwrap();
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].full_path, "/p/b.php");

        let duck = store.members_named("save", true, &scope).unwrap();
        assert_eq!(duck.len(), 2);
    }

    #[test]
    fn test_search_scope_restricts_directories() {
        let (_dir, store, mut writer, source) = store_with_source();
        writer
            .replace_file(source.id, "/p/src/a.php", "h", true, &[class_tag("Alpha", "\\", 1)])
            .unwrap();
        writer
            .replace_file(source.id, "/p/vendor/b.php", "h", true, &[class_tag("Alps", "\\", 1)])
            .unwrap();

        let scope = SearchScope::in_dirs(vec!["/p/src".into()], 10);
        let found = store.near_match("Al", &scope).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].identifier, "Alpha");
    }

    #[test]
    fn test_rename_file_and_dir() {
        let (_dir, store, mut writer, source) = store_with_source();
        writer
            .replace_file(source.id, "/p/old/a.php", "h", true, &[class_tag("A", "\\", 1)])
            .unwrap();

        assert!(writer.rename_file("/p/old/a.php", "/p/old/b.php").unwrap());
        assert!(!writer.rename_file("/p/missing.php", "/p/x.php").unwrap());
        let tags = store.exact("A", &SearchScope::default()).unwrap();
        assert_eq!(tags[0].full_path, "/p/old/b.php");

        assert_eq!(writer.rename_dir("/p/old", "/p/new").unwrap(), 1);
        assert!(store.file_item("/p/new/b.php").unwrap().is_some());
        let tags = store.exact("A", &SearchScope::default()).unwrap();
        assert_eq!(tags[0].full_path, "/p/new/b.php");
    }

    #[test]
    fn test_delete_and_wipe() {
        let (_dir, store, mut writer, source) = store_with_source();
        writer
            .replace_file(source.id, "/p/a/x.php", "h", true, &[class_tag("X", "\\", 1)])
            .unwrap();
        writer
            .replace_file(source.id, "/p/a/y.php", "h", true, &[class_tag("Y", "\\", 1)])
            .unwrap();
        writer
            .replace_file(source.id, "/p/z.php", "h", true, &[class_tag("Z", "\\", 1)])
            .unwrap();

        assert_eq!(writer.delete_file("/p/z.php").unwrap(), 2);
        assert_eq!(writer.delete_dir("/p/a").unwrap(), 2);
        assert_eq!(store.stats().unwrap().files, 0);

        writer
            .replace_file(source.id, "/p/z.php", "h", true, &[class_tag("Z", "\\", 1)])
            .unwrap();
        writer.wipe(source.id).unwrap();
        assert!(store.near_match("z", &SearchScope::default()).unwrap().is_empty());
        assert!(writer.remove_source("/p").unwrap());
        assert!(store.sources().unwrap().is_empty());
    }

    #[test]
    fn test_near_match_files_and_stats() {
        let (_dir, store, mut writer, source) = store_with_source();
        writer
            .replace_file(source.id, "/p/index.php", "h", true, &[class_tag("Index", "\\", 1)])
            .unwrap();
        writer.replace_file(source.id, "/p/index.js", "h", false, &[]).unwrap();

        let files = store.near_match_files("INDEX", &SearchScope::default()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|t| t.tag_type == TagType::File));

        let stats = store.stats().unwrap();
        assert_eq!(stats.files, 2);
        assert_eq!(stats.parsed_files, 1);
        assert_eq!(stats.tags, 1);
        assert_eq!(stats.tags_by_type.get("class"), Some(&1));
    }

    #[test]
    fn test_single_writer() {
        let dir = tempdir().unwrap();
        let store = TagStore::open(dir.path().join("tags.db")).unwrap();
        let writer = store.writer().unwrap();
        assert!(matches!(store.clone().writer(), Err(StoreError::WriterBusy)));
        drop(writer);
        assert!(store.writer().is_ok());
    }

    #[test]
    fn test_begin_source_reuses_row() {
        let (_dir, store, mut writer, source) = store_with_source();
        let again = writer.begin_source("/p", &["*.inc".to_string()], &[]).unwrap();
        assert_eq!(again.id, source.id);
        assert_eq!(again.php_extensions, vec!["*.inc".to_string()]);
        assert_eq!(store.sources().unwrap().len(), 1);
    }
}
