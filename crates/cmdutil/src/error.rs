//! Error types for unpacking, environment tables and downloads.

use crate::types::EntryType;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for unpack operations.
#[derive(Debug, Error)]
pub enum UnpackError {
    /// Archive file not found at the specified path.
    #[error("Archive not found: {0}")]
    NotFound(PathBuf),

    /// The archive format could not be inferred from the file name.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// An entry name failed path validation. Always aborts the unpack.
    #[error("Security violation: {0}")]
    Security(#[from] SecurityError),

    /// The compressed stream could not be opened.
    #[error("Decompression failed: {0}")]
    Decompress(std::io::Error),

    /// The archive structure is unreadable (bad header, truncated stream).
    #[error("Corrupted archive: {0}")]
    Corrupted(String),

    /// Returned by an [`EntryObserver`](crate::observer::EntryObserver).
    #[error("Hook failed: {0}")]
    Hook(Box<dyn std::error::Error + Send + Sync>),

    /// The number of bytes copied does not match the size recorded in the archive.
    #[error("Size mismatch for {path}: wrote {written} bytes, want {expected}")]
    SizeMismatch {
        /// Destination file
        path: PathBuf,
        /// Bytes actually written
        written: u64,
        /// Size declared by the entry header
        expected: u64,
    },

    /// The entry is neither a regular file nor a directory.
    #[error("Entry {path} contained unsupported file type {entry_type:?}")]
    UnsupportedType {
        /// Entry name as stored in the archive
        path: String,
        /// Type found in the header
        entry_type: EntryType,
    },

    /// An I/O error while materializing a single entry.
    #[error("Error writing to {path}: {source}")]
    Write {
        /// Destination path being written
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// An I/O error outside of any single entry.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UnpackError {
    /// Wraps an arbitrary error raised by a caller-supplied hook.
    pub fn hook<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Hook(err.into())
    }

    /// Whether this error aborts an unpack even with `ignore_failed` set.
    ///
    /// Per-entry failures (`SizeMismatch`, `UnsupportedType`, `Write`) are the
    /// only recoverable kinds. Whatever an after-hook returns is judged by
    /// `ignore_failed` alone, so a `Hook` error from there is still skippable.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::SizeMismatch { .. } | Self::UnsupportedType { .. } | Self::Write { .. }
        )
    }
}

/// Path validation failures for archive entry names.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecurityError {
    /// The entry name is empty.
    #[error("Empty entry name")]
    EmptyName,

    /// The entry name contains a backslash.
    #[error("Backslash in entry name: {0}")]
    Backslash(String),

    /// Absolute path not allowed in archive entries.
    #[error("Absolute path not allowed: {0}")]
    AbsolutePath(String),

    /// Path traversal attempt detected (e.g., "../../../etc/passwd").
    #[error("Path traversal attempt: {0}")]
    PathTraversal(String),
}

/// Errors reported by [`EnvTable`](crate::env::EnvTable) mutators.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    /// Mutators require a non-empty key.
    #[error("empty key")]
    EmptyKey,
}

/// Errors reported by the [`Downloader`](crate::download::Downloader).
#[derive(Debug, Error)]
pub enum DownloadError {
    /// No destination path was given.
    #[error("empty output path")]
    EmptyPath,

    /// The HTTP client could not be built or the request failed.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with anything other than 200.
    #[error("invalid status code: {0}")]
    Status(reqwest::StatusCode),

    /// The body length differs from the declared Content-Length.
    #[error("copied {copied} bytes; expected {expected}")]
    LengthMismatch {
        /// Bytes received
        copied: u64,
        /// Content-Length from the response
        expected: u64,
    },

    /// Local I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_entry_errors_are_not_fatal() {
        let err = UnpackError::SizeMismatch {
            path: PathBuf::from("a"),
            written: 1,
            expected: 2,
        };
        assert!(!err.is_fatal());

        let err = UnpackError::UnsupportedType {
            path: "link".to_string(),
            entry_type: EntryType::Symlink,
        };
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_structural_errors_are_fatal() {
        assert!(UnpackError::from(SecurityError::EmptyName).is_fatal());
        assert!(UnpackError::hook("stop").is_fatal());
        assert!(UnpackError::Corrupted("bad header".into()).is_fatal());
    }
}
