//! Migration error types

use std::path::PathBuf;

use mongodb::error::{ErrorKind, IndexedWriteError, WriteFailure};
use thiserror::Error;

/// Server error code for a unique index violation
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Errors that can occur while migrating documents
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Duplicate _id {id} in collection {collection}")]
    DuplicateKey { collection: String, id: String },

    #[error("Document written to {collection} has no _id")]
    MissingId { collection: String },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid extended JSON: {0}")]
    ExtendedJson(#[from] mongodb::bson::extjson::de::Error),

    #[error("Element {index} of {} is not a JSON object", path.display())]
    NotADocument { path: PathBuf, index: usize },

    #[error("{} holds an empty array; nothing to insert", path.display())]
    EmptySeedArray { path: PathBuf },

    #[error("{} must contain a JSON object or an array of objects", path.display())]
    UnexpectedSeedValue { path: PathBuf },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MigrateError {
    /// Check if this error is an `_id` collision
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            MigrateError::DuplicateKey { .. } => true,
            MigrateError::Database(e) => duplicate_key_index(e).is_some(),
            _ => false,
        }
    }
}

/// Position of the document that violated a unique index, if `err` is a
/// duplicate-key failure. Single-document writes report position 0.
pub(crate) fn duplicate_key_index(err: &mongodb::error::Error) -> Option<usize> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY_CODE => Some(0),
        ErrorKind::InsertMany(e) => first_duplicate(e.write_errors.as_deref()?),
        _ => None,
    }
}

/// Position of the first duplicate-key failure in an ordered bulk insert
fn first_duplicate(errors: &[IndexedWriteError]) -> Option<usize> {
    errors.iter().find(|w| w.code == DUPLICATE_KEY_CODE).map(|w| w.index)
}
