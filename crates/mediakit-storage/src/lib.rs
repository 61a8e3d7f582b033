//! Secure storage gateway: path-validated persistence, listing, and
//! streaming download of artifact files.
//!
//! Every path derived from user input goes through the same
//! validate-then-canonicalize-then-containment pipeline; a hostile filename
//! never reaches the filesystem layer, not even to fail.

mod local;

pub use local::LocalStorage;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use utoipa::ToSchema;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Lexically unsafe or out-of-root filename; surfaced as a client error.
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Failed to store file: {0}")]
    StoreFailed(String),

    #[error("Failed to read file: {0}")]
    ReadFailed(String),

    #[error("Storage configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata for a file under the storage root.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StoredFile {
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// Internal absolute location; never exposed to callers.
    #[serde(skip)]
    #[schema(ignore)]
    pub path: PathBuf,
    /// Externally addressable locator built from `filename`.
    pub download_url: String,
}

/// Reject unsafe filenames before any filesystem call is attempted.
///
/// Traversal sequences, absolute-path markers, backslashes, and control
/// characters are refused independent of filesystem outcome; containment of
/// the resolved path is checked separately after canonicalization.
pub fn validate_filename(filename: &str) -> StorageResult<()> {
    if filename.is_empty() {
        return Err(StorageError::InvalidFilename("empty filename".to_string()));
    }
    if filename.contains("..") {
        return Err(StorageError::InvalidFilename(
            "filename contains a path traversal sequence".to_string(),
        ));
    }
    if filename.contains('/') || filename.contains('\\') {
        return Err(StorageError::InvalidFilename(
            "filename contains a path separator".to_string(),
        ));
    }
    // Windows drive markers (e.g. "C:") double as alternate data stream syntax
    if filename.contains(':') {
        return Err(StorageError::InvalidFilename(
            "filename contains a drive or stream marker".to_string(),
        ));
    }
    if filename.chars().any(|c| c.is_control()) {
        return Err(StorageError::InvalidFilename(
            "filename contains control characters".to_string(),
        ));
    }
    Ok(())
}
