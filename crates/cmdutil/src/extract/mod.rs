//! The per-entry unpack engine shared by the tar and zip backends.
//!
//! Each backend walks its archive in stored order and hands every entry to
//! [`Engine::process`], which applies the path policy, the observer, the size
//! filter and finally writes the entry below the destination directory.

pub mod tar;
pub mod zip;

pub use self::tar::TarUnpacker;
pub use self::zip::ZipUnpacker;

use crate::error::UnpackError;
use crate::observer::Decision;
use crate::safety::{resolve_target, EntryFilter};
use crate::types::{ArchiveEntry, EntryType, Outcome, SkipReason, UnpackOptions, UnpackStats};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Archive formats understood by [`unpack_archive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Tape archive, plain or gzip-compressed
    Tar,
    /// Zip archive
    Zip,
}

/// Picks the archive format from the file name.
pub fn detect_format(path: &Path) -> Result<ArchiveFormat, UnpackError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();

    if name.ends_with(".zip") {
        Ok(ArchiveFormat::Zip)
    } else if name.ends_with(".tar") || name.ends_with(".tgz") || name.ends_with(".gz") {
        Ok(ArchiveFormat::Tar)
    } else {
        Err(UnpackError::UnsupportedFormat(format!(
            "cannot infer archive format from {}",
            path.display()
        )))
    }
}

/// Unpacks an archive file, choosing the backend by file name.
pub fn unpack_archive(
    archive_path: &Path,
    output_dir: &Path,
    options: &UnpackOptions,
) -> Result<UnpackStats, UnpackError> {
    if !archive_path.exists() {
        return Err(UnpackError::NotFound(archive_path.to_path_buf()));
    }

    match detect_format(archive_path)? {
        ArchiveFormat::Tar => TarUnpacker::new(options.clone()).unpack(archive_path, output_dir),
        ArchiveFormat::Zip => ZipUnpacker::new(options.clone()).unpack(archive_path, output_dir),
    }
}

/// Directories already created during one unpack call.
#[derive(Debug, Default)]
pub struct MadeDirSet {
    made: HashSet<PathBuf>,
}

impl MadeDirSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes sure `dir` exists, creating it and its parents if needed.
    ///
    /// An existing directory is not an error. Returns `true` if the filesystem
    /// was touched, `false` if `dir` was already recorded.
    pub fn ensure(&mut self, dir: &Path) -> io::Result<bool> {
        if self.made.contains(dir) {
            return Ok(false);
        }

        match fs::create_dir_all(dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => {}
            Err(e) => return Err(e),
        }

        self.made.insert(dir.to_path_buf());
        Ok(true)
    }

    /// Whether `dir` has been recorded.
    pub fn contains(&self, dir: &Path) -> bool {
        self.made.contains(dir)
    }

    /// Number of recorded directories.
    pub fn len(&self) -> usize {
        self.made.len()
    }

    /// Whether no directory has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.made.is_empty()
    }
}

/// Copies `from` into `to` and checks the byte count against `want`.
///
/// `want` is the size declared by the archive, `None` when unknown.
pub fn copy_exact<R, W>(from: &mut R, to: W, want: Option<u64>, path: &Path) -> Result<u64, UnpackError>
where
    R: Read + ?Sized,
    W: Write,
{
    let write_err = |source| UnpackError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = BufWriter::new(to);
    let written = io::copy(from, &mut writer).map_err(write_err)?;

    if let Some(expected) = want {
        if written != expected {
            return Err(UnpackError::SizeMismatch {
                path: path.to_path_buf(),
                written,
                expected,
            });
        }
    }

    writer.flush().map_err(write_err)?;
    Ok(written)
}

/// State for one unpack call.
pub(crate) struct Engine<'a> {
    options: &'a UnpackOptions,
    filter: EntryFilter,
    output_dir: &'a Path,
    made_dirs: MadeDirSet,
    stats: UnpackStats,
    started: Instant,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(output_dir: &'a Path, options: &'a UnpackOptions) -> Self {
        Self {
            options,
            filter: EntryFilter::from_options(options),
            output_dir,
            made_dirs: MadeDirSet::new(),
            stats: UnpackStats::default(),
            started: Instant::now(),
        }
    }

    /// Runs one entry through the pipeline.
    ///
    /// An `Err` aborts the unpack; per-entry failures only come back as `Err`
    /// when `ignore_failed` is off.
    pub(crate) fn process<R>(&mut self, entry: &ArchiveEntry, content: &mut R) -> Result<(), UnpackError>
    where
        R: Read + ?Sized,
    {
        let options = self.options;

        let Some(relative) = resolve_target(&entry.path, options.strip_components)? else {
            tracing::debug!(entry = %entry.path, "no target after stripping components");
            self.record_skip(SkipReason::EmptyAfterStrip);
            return Ok(());
        };

        if let Some(observer) = &options.observer {
            if observer.before(entry)? == Decision::Skip {
                self.record_skip(SkipReason::Observer);
                return Ok(());
            }
        }

        if self.filter.should_skip(entry.entry_type, entry.size) {
            tracing::debug!(entry = %entry.path, size = entry.size, "filtered by size");
            self.record_skip(SkipReason::Filtered);
            return Ok(());
        }

        let target = self.output_dir.join(relative);
        let mut outcome = self.materialize(entry, &target, content);

        if let Some(observer) = &options.observer {
            outcome = observer.after(entry, outcome);
        }

        match outcome {
            Outcome::Written { bytes, .. } => {
                self.stats.files_written += 1;
                self.stats.bytes_written += bytes;
            }
            Outcome::Directory { .. } => self.stats.dirs_created += 1,
            Outcome::Skipped(reason) => self.record_skip(reason),
            Outcome::Failed(err) => {
                if !options.ignore_failed {
                    return Err(err);
                }
                tracing::warn!(entry = %entry.path, error = %err, "ignoring failed entry");
                self.stats.failed += 1;
            }
        }

        Ok(())
    }

    pub(crate) fn finish(mut self) -> UnpackStats {
        self.stats.duration = self.started.elapsed();
        tracing::info!(
            files = self.stats.files_written,
            bytes = self.stats.bytes_written,
            skipped = self.stats.skipped,
            failed = self.stats.failed,
            "unpack finished"
        );
        self.stats
    }

    fn record_skip(&mut self, reason: SkipReason) {
        tracing::trace!(?reason, "entry skipped");
        self.stats.skipped += 1;
    }

    fn materialize<R>(&mut self, entry: &ArchiveEntry, target: &Path, content: &mut R) -> Outcome
    where
        R: Read + ?Sized,
    {
        match entry.entry_type {
            EntryType::Directory => match self.made_dirs.ensure(target) {
                Ok(_) => Outcome::Directory {
                    path: target.to_path_buf(),
                },
                Err(source) => Outcome::Failed(UnpackError::Write {
                    path: target.to_path_buf(),
                    source,
                }),
            },
            EntryType::File => match self.write_file(entry, target, content) {
                Ok(bytes) => Outcome::Written {
                    path: target.to_path_buf(),
                    bytes,
                },
                Err(err) => Outcome::Failed(err),
            },
            other => Outcome::Failed(UnpackError::UnsupportedType {
                path: entry.path.clone(),
                entry_type: other,
            }),
        }
    }

    fn write_file<R>(&mut self, entry: &ArchiveEntry, target: &Path, content: &mut R) -> Result<u64, UnpackError>
    where
        R: Read + ?Sized,
    {
        if let Some(parent) = target.parent() {
            self.made_dirs.ensure(parent).map_err(|source| UnpackError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let write_err = |source| UnpackError::Write {
            path: target.to_path_buf(),
            source,
        };

        let mut file = create_options(entry.mode).open(target).map_err(write_err)?;
        let written = copy_exact(content, &mut file, Some(entry.size), target)?;

        if let Some(modified) = entry.modified {
            file.set_modified(modified).map_err(write_err)?;
        }

        Ok(written)
    }
}

fn create_options(mode: Option<u32>) -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if let Some(mode) = mode {
            options.mode(mode & 0o777);
        }
    }
    #[cfg(not(unix))]
    let _ = mode;

    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(Path::new("a.zip")).unwrap(), ArchiveFormat::Zip);
        assert_eq!(detect_format(Path::new("a.ZIP")).unwrap(), ArchiveFormat::Zip);
        assert_eq!(detect_format(Path::new("a.tar")).unwrap(), ArchiveFormat::Tar);
        assert_eq!(detect_format(Path::new("a.tar.gz")).unwrap(), ArchiveFormat::Tar);
        assert_eq!(detect_format(Path::new("a.tgz")).unwrap(), ArchiveFormat::Tar);
        assert!(matches!(
            detect_format(Path::new("a.7z")),
            Err(UnpackError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_made_dir_set_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("a/b");
        let mut made = MadeDirSet::new();

        assert!(made.ensure(&dir).unwrap());
        assert!(dir.is_dir());
        assert!(!made.ensure(&dir).unwrap());
        assert_eq!(made.len(), 1);
        assert!(made.contains(&dir));
    }

    #[test]
    fn test_made_dir_set_tolerates_existing_dir() {
        let temp_dir = TempDir::new().unwrap();
        let mut made = MadeDirSet::new();

        assert!(made.ensure(temp_dir.path()).unwrap());
        assert_eq!(made.len(), 1);
    }

    #[test]
    fn test_made_dir_set_rejects_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("plain");
        fs::write(&file, b"x").unwrap();

        let mut made = MadeDirSet::new();
        assert!(made.ensure(&file).is_err());
        assert!(made.is_empty());
    }

    #[test]
    fn test_copy_exact_matches() {
        let mut out = Vec::new();
        let written = copy_exact(&mut &b"hello"[..], &mut out, Some(5), Path::new("f")).unwrap();
        assert_eq!(written, 5);
        assert_eq!(out, b"hello");
    }

    #[test]
    fn test_copy_exact_size_mismatch() {
        let mut out = Vec::new();
        let result = copy_exact(&mut &b"short"[..], &mut out, Some(10), Path::new("f"));
        match result {
            Err(UnpackError::SizeMismatch {
                written, expected, ..
            }) => {
                assert_eq!(written, 5);
                assert_eq!(expected, 10);
            }
            other => panic!("Expected SizeMismatch, got: {:?}", other),
        }
    }

    #[test]
    fn test_copy_exact_unknown_size() {
        let mut out = Vec::new();
        let written = copy_exact(&mut &b"anything"[..], &mut out, None, Path::new("f")).unwrap();
        assert_eq!(written, 8);
    }
}
