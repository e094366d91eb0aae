use rusqlite::{Connection, Result};
use tracing::{debug, info};

/// SQLite schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version = current_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version < SCHEMA_VERSION {
        info!("Upgrading tag schema from v{} to v{}", current_version, SCHEMA_VERSION);
        apply_migrations(conn, current_version)?;
    }

    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<i32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
}

/// Apply migrations from current version to latest. Each step runs in its
/// own transaction together with its version record.
fn apply_migrations(conn: &Connection, from_version: i32) -> Result<()> {
    for version in (from_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration v{}", version);
        let tx = conn.unchecked_transaction()?;
        match version {
            1 => create_v1_schema(&tx)?,
            2 => create_v2_schema(&tx)?,
            _ => return Err(rusqlite::Error::InvalidQuery),
        }
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
        tx.commit()?;
    }

    Ok(())
}

/// Sources, tracked files and tags
fn create_v1_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            directory TEXT NOT NULL UNIQUE,
            php_extensions TEXT NOT NULL DEFAULT '',
            misc_extensions TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS file_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id INTEGER NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
            full_path TEXT NOT NULL UNIQUE,
            name_lower TEXT NOT NULL,
            content_hash TEXT NOT NULL DEFAULT '',
            last_indexed INTEGER NOT NULL DEFAULT 0,
            is_parsed INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_file_items_name ON file_items(name_lower)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_file_items_source ON file_items(source_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id INTEGER NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
            file_item_id INTEGER NOT NULL REFERENCES file_items(id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            key_lower TEXT NOT NULL,
            identifier TEXT NOT NULL,
            class_name TEXT NOT NULL DEFAULT '',
            namespace_name TEXT NOT NULL DEFAULT '\\',
            type TEXT NOT NULL,
            signature TEXT NOT NULL DEFAULT '',
            return_type TEXT NOT NULL DEFAULT '',
            comment TEXT NOT NULL DEFAULT '',
            visibility TEXT NOT NULL DEFAULT 'public',
            is_static INTEGER NOT NULL DEFAULT 0,
            full_path TEXT NOT NULL,
            line INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_tags_key ON tags(key_lower)", [])?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_tags_source ON tags(source_id)", [])?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_tags_file ON tags(file_item_id)", [])?;

    Ok(())
}

/// Class hierarchy columns, alias rows and the duck-typing index
fn create_v2_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "ALTER TABLE tags ADD COLUMN identifier_lower TEXT NOT NULL DEFAULT '';
         ALTER TABLE tags ADD COLUMN has_variable_args INTEGER NOT NULL DEFAULT 0;
         ALTER TABLE tags ADD COLUMN parent_class TEXT NOT NULL DEFAULT '';
         ALTER TABLE tags ADD COLUMN interfaces TEXT NOT NULL DEFAULT '';
         ALTER TABLE tags ADD COLUMN traits TEXT NOT NULL DEFAULT '';
         ALTER TABLE tags ADD COLUMN alias_row INTEGER NOT NULL DEFAULT 0;
         UPDATE tags SET identifier_lower = lower(identifier);
         CREATE INDEX IF NOT EXISTS idx_tags_type_identifier ON tags(type, identifier_lower);",
    )?;

    Ok(())
}

/// Drop all tables (for testing/rebuilding)
pub fn drop_schema(conn: &Connection) -> Result<()> {
    info!("Dropping all schema tables");

    conn.execute("DROP TABLE IF EXISTS tags", [])?;
    conn.execute("DROP TABLE IF EXISTS file_items", [])?;
    conn.execute("DROP TABLE IF EXISTS sources", [])?;
    conn.execute("DROP TABLE IF EXISTS schema_version", [])?;

    Ok(())
}
