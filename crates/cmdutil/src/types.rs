//! Type definitions shared by the unpackers.

use crate::error::UnpackError;
use crate::observer::EntryObserver;
use serde::Serialize;
use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Entry type as recorded in the archive header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link
    Symlink,
    /// Hard link
    Hardlink,
    /// Other special file types (device, fifo, ...)
    Other,
}

/// Read-only view of one archive record.
///
/// Only valid while its archive is being iterated; the content stream is
/// handed to the engine separately.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Path as stored in the archive, forward-slash separated
    pub path: String,

    /// Type from the header
    pub entry_type: EntryType,

    /// Declared uncompressed size in bytes
    pub size: u64,

    /// Modification time, when the archive records a non-zero one
    pub modified: Option<SystemTime>,

    /// Unix permission bits, when recorded
    pub mode: Option<u32>,
}

impl ArchiveEntry {
    /// Whether this entry is a regular file.
    pub fn is_file(&self) -> bool {
        self.entry_type == EntryType::File
    }

    /// Whether this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Directory
    }
}

/// Why an entry produced no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Dropped by the min/max size bounds
    Filtered,
    /// No path left after stripping leading components
    EmptyAfterStrip,
    /// The observer asked to skip it
    Observer,
}

/// Result of materializing one entry.
#[derive(Debug)]
pub enum Outcome {
    /// A regular file was written.
    Written {
        /// Destination path
        path: PathBuf,
        /// Bytes copied
        bytes: u64,
    },
    /// A directory exists at the destination.
    Directory {
        /// Destination path
        path: PathBuf,
    },
    /// Nothing was written.
    Skipped(SkipReason),
    /// Materializing failed.
    Failed(UnpackError),
}

impl Outcome {
    /// The error carried by a failed outcome.
    pub fn error(&self) -> Option<&UnpackError> {
        match self {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Custom decompression step applied to an archive file before tar parsing.
pub type Decompressor =
    Arc<dyn Fn(Box<dyn Read>) -> std::io::Result<Box<dyn Read>> + Send + Sync>;

/// Options for unpacking an archive.
///
/// Built once by the caller and only read while an unpack runs.
#[derive(Clone, Default)]
pub struct UnpackOptions {
    /// Number of leading path components to strip from every entry
    pub strip_components: u32,

    /// Skip regular files smaller than this many bytes
    pub min_size: Option<u64>,

    /// Skip regular files larger than this many bytes
    pub max_size: Option<u64>,

    /// Keep going after per-entry failures
    pub ignore_failed: bool,

    /// Replaces suffix-based decompression for tar archives
    pub decompress: Option<Decompressor>,

    /// Before/after callbacks for each entry
    pub observer: Option<Arc<dyn EntryObserver>>,
}

impl UnpackOptions {
    /// Creates default options: no stripping, no filters, fail fast.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of leading components to strip.
    pub fn strip_components(mut self, count: u32) -> Self {
        self.strip_components = count;
        self
    }

    /// Sets the minimum regular-file size. Zero means unbounded.
    pub fn min_size(mut self, bytes: u64) -> Self {
        self.min_size = (bytes > 0).then_some(bytes);
        self
    }

    /// Sets the maximum regular-file size. Zero means unbounded.
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.max_size = (bytes > 0).then_some(bytes);
        self
    }

    /// Chooses best-effort (`true`) or fail-fast (`false`) extraction.
    pub fn ignore_failed(mut self, ignore: bool) -> Self {
        self.ignore_failed = ignore;
        self
    }

    /// Installs a custom decompressor for tar archives.
    pub fn decompress<F>(mut self, f: F) -> Self
    where
        F: Fn(Box<dyn Read>) -> std::io::Result<Box<dyn Read>> + Send + Sync + 'static,
    {
        self.decompress = Some(Arc::new(f));
        self
    }

    /// Installs an entry observer.
    pub fn observer<O>(mut self, observer: O) -> Self
    where
        O: EntryObserver + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }
}

impl fmt::Debug for UnpackOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnpackOptions")
            .field("strip_components", &self.strip_components)
            .field("min_size", &self.min_size)
            .field("max_size", &self.max_size)
            .field("ignore_failed", &self.ignore_failed)
            .field("decompress", &self.decompress.is_some())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// Statistics about a completed unpack.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UnpackStats {
    /// Number of regular files written
    pub files_written: u64,

    /// Number of directory entries materialized
    pub dirs_created: u64,

    /// Total bytes written to disk
    pub bytes_written: u64,

    /// Entries skipped by stripping, filters or the observer
    pub skipped: u64,

    /// Per-entry failures tolerated because `ignore_failed` was set
    pub failed: u64,

    /// Wall time of the unpack (in milliseconds)
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

// Helper module for Duration serialization
mod duration_millis {
    use serde::{Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_bounds_mean_unbounded() {
        let options = UnpackOptions::new().min_size(0).max_size(0);
        assert_eq!(options.min_size, None);
        assert_eq!(options.max_size, None);

        let options = UnpackOptions::new().min_size(10).max_size(100);
        assert_eq!(options.min_size, Some(10));
        assert_eq!(options.max_size, Some(100));
    }

    #[test]
    fn test_stats_serialize_duration_as_millis() {
        let stats = UnpackStats {
            files_written: 2,
            duration: Duration::from_millis(1500),
            ..Default::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["files_written"], 2);
        assert_eq!(json["duration"], 1500);
    }
}
