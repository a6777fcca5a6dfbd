//! Document source abstraction and content fingerprinting.

use std::path::Path;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{Result, SyncError};
use crate::models::{Document, DocumentInfo};

/// Read-only view of a corpus of documents.
///
/// The filesystem implementation lives in the `docsync` app crate; tests
/// use in-memory sources.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Enumerate every candidate document with its fingerprint.
    ///
    /// The outer error means the corpus itself could not be listed. Each
    /// inner error belongs to one file and must not stop the caller from
    /// using the remaining entries.
    async fn list_document_info(&self) -> Result<Vec<Result<DocumentInfo>>>;

    /// Load and parse one document. Unknown ids yield [`SyncError::NotFound`].
    async fn load_document(&self, id: &str) -> Result<Document>;

    /// Fingerprint of the raw bytes currently stored for `id`.
    async fn fingerprint(&self, id: &str) -> Result<String>;

    /// Document id a changed or removed `path` stands for.
    ///
    /// Sources where several paths can share an id return
    /// [`SyncError::DuplicateId`] for every path but the one that owns it.
    async fn id_for_path(&self, path: &Path) -> Result<String> {
        doc_id_from_path(path)
    }
}

/// SHA-256 of `bytes`, lower-case hex.
///
/// Depends on content only, never on path or modification time.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Document id for a path: its file name without the extension.
pub fn doc_id_from_path(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| SyncError::InvalidPath(path.to_path_buf()))
}
