//! Error taxonomy shared by every docsync component.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by sources, stores, embedding providers and the
/// reconciliation engine.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A document file could not be read.
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A document was explicitly requested but does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// A watcher path has no usable file name.
    #[error("cannot derive a document id from {}", .0.display())]
    InvalidPath(PathBuf),

    /// Two files map to the same document id; only `owner` is indexed.
    #[error("document id {id} of {} is already taken by {}", path.display(), owner.display())]
    DuplicateId {
        id: String,
        path: PathBuf,
        owner: PathBuf,
    },

    /// The front-matter block of a document is malformed.
    #[error("invalid front matter in {id}: {message}")]
    FrontMatter { id: String, message: String },

    /// An index store was used before `initialize` was called.
    #[error("index store used before initialization")]
    StoreUninitialized,

    /// The index store backend failed.
    #[error("store error: {0}")]
    Store(String),

    /// The embedding provider failed.
    #[error("embedding provider error: {0}")]
    Embedding(String),
}

impl SyncError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }

    /// Errors that make every further store call pointless; a scan stops
    /// on these instead of skipping the document.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::StoreUninitialized)
    }
}

/// Result alias for docsync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_display_includes_path() {
        let err = SyncError::io(
            "/posts/hello.md",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/posts/hello.md"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_not_found_display() {
        let err = SyncError::NotFound("hello-world".to_string());
        assert_eq!(err.to_string(), "document not found: hello-world");
    }

    #[test]
    fn test_duplicate_id_names_both_paths() {
        let err = SyncError::DuplicateId {
            id: "index".into(),
            path: PathBuf::from("b/index.md"),
            owner: PathBuf::from("a/index.md"),
        };
        let msg = err.to_string();
        assert!(msg.contains("b/index.md"));
        assert!(msg.contains("a/index.md"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_uninitialized_display() {
        assert_eq!(
            SyncError::StoreUninitialized.to_string(),
            "index store used before initialization"
        );
    }

    #[test]
    fn test_only_uninitialized_is_fatal() {
        assert!(SyncError::StoreUninitialized.is_fatal());
        assert!(!SyncError::NotFound("x".into()).is_fatal());
        assert!(!SyncError::Embedding("timeout".into()).is_fatal());
        assert!(!SyncError::FrontMatter {
            id: "x".into(),
            message: "bad".into()
        }
        .is_fatal());
    }
}
