//! Error types for the tag store and symbol resolution
//!
//! Store failures are typed with thiserror so callers can decide whether to
//! disable indexing for the session. Resolution failures form a closed set
//! and are always returned as values; "no match" is an empty result.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the persistent tag store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open tag store at '{path}': {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("Failed to create directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Schema migration to v{version} failed: {source}")]
    Migration { version: i32, source: rusqlite::Error },

    #[error("Query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Transaction failed while {operation}: {source}")]
    Transaction {
        operation: String,
        source: rusqlite::Error,
    },

    /// Only one writer may exist per store
    #[error("Another writer already holds the tag store")]
    WriterBusy,

    #[error("Corrupt row in table '{table}': {reason}")]
    CorruptRow { table: &'static str, reason: String },
}

impl StoreError {
    /// Stable identifier for programmatic handling
    pub fn status_code(&self) -> String {
        match self {
            Self::Open { .. } => "STORE_OPEN_FAILED",
            Self::CreateDir { .. } => "STORE_DIR_FAILED",
            Self::Migration { .. } => "STORE_MIGRATION_FAILED",
            Self::Query(_) => "STORE_QUERY_FAILED",
            Self::Pool(_) => "STORE_POOL_FAILED",
            Self::Transaction { .. } => "STORE_TRANSACTION_FAILED",
            Self::WriterBusy => "STORE_WRITER_BUSY",
            Self::CorruptRow { .. } => "STORE_CORRUPT_ROW",
        }
        .to_string()
    }

    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Open { .. } | Self::CorruptRow { .. } | Self::Migration { .. } => vec![
                "Delete the tag database and run 'phptags index' to rebuild it",
                "Check disk space and permissions in the project directory",
            ],
            Self::WriterBusy => vec!["Wait for the running index or watch task to finish"],
            Self::Transaction { .. } => {
                vec!["The file was left at its previous state; index it again"]
            }
            _ => vec![],
        }
    }
}

/// Closed set of resolution failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("File {0} is not registered in the working overlay")]
    UnregisteredFile(String),

    #[error("Expression is empty")]
    EmptyExpression,

    #[error("Variable {0} is not defined in the current scope")]
    UnknownVariable(String),

    #[error("Class {0} has no parent class")]
    ParentNotFound(String),

    #[error("Could not resolve the type of {0}")]
    TypeResolution(String),

    #[error("Variable {0} holds a primitive type")]
    PrimitiveType(String),

    #[error("Array key of {0} could not be resolved")]
    ArrayKeyNotFoundVariable(String),
}

impl LookupError {
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::UnregisteredFile(_) => "UNREGISTERED_FILE",
            Self::EmptyExpression => "EMPTY_EXPRESSION",
            Self::UnknownVariable(_) => "UNKNOWN_VARIABLE",
            Self::ParentNotFound(_) => "PARENT_NOT_FOUND",
            Self::TypeResolution(_) => "TYPE_RESOLUTION",
            Self::PrimitiveType(_) => "PRIMITIVE_TYPE",
            Self::ArrayKeyNotFoundVariable(_) => "ARRAY_KEY_NOT_FOUND_VARIABLE",
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
