//! # cmdutil
//!
//! Helpers for command-line tools: archive unpacking, environment tables,
//! directory navigation, a bounded worker group and an HTTP downloader.
//!
//! ## Unpacking
//!
//! Tar (plain or gzip) and zip archives are unpacked entry by entry. Every
//! entry name is validated before anything touches the disk, leading path
//! components can be stripped, regular files can be filtered by size, and an
//! [`EntryObserver`] can skip, fail or rewrite the outcome of each entry.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cmdutil::{unpack, UnpackOptions};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = UnpackOptions::new().strip_components(1).max_size(512 << 20);
//! let stats = unpack(
//!     Path::new("go1.22.0.linux-amd64.tar.gz"),
//!     Path::new("sdk/go1.22.0"),
//!     &options,
//! )?;
//!
//! println!("Unpacked {} files ({} bytes)", stats.files_written, stats.bytes_written);
//! # Ok(())
//! # }
//! ```

pub mod color;
pub mod dir;
pub mod download;
pub mod env;
pub mod error;
pub mod extract;
pub mod observer;
pub mod safety;
pub mod types;
pub mod worker;

// Re-export main types
pub use color::clean_color;
pub use dir::{Chdir, DirStack};
pub use download::{DownloadOptions, Downloader, ProxySetting};
pub use env::{EnvPlatform, EnvTable};
pub use error::{DownloadError, EnvError, SecurityError, UnpackError};
pub use extract::{MadeDirSet, TarUnpacker, ZipUnpacker};
pub use observer::{Decision, EntryObserver, Hooks, LogObserver};
pub use types::{ArchiveEntry, EntryType, Outcome, SkipReason, UnpackOptions, UnpackStats};
pub use worker::WorkerGroup;

use std::path::Path;

/// Unpacks an archive into `output_dir`, picking the format from its name.
///
/// # Arguments
///
/// * `archive_path` - Path to the archive file (`.zip`, `.tar`, `.tar.gz`, `.tgz`)
/// * `output_dir` - Directory the entries are written below
/// * `options` - Stripping, size bounds, failure policy and observer
///
/// # Returns
///
/// Returns `UnpackStats` describing what was written and skipped.
///
/// # Errors
///
/// Returns an error if:
/// - The archive file doesn't exist or its suffix is not recognized
/// - An entry name is unsafe (absolute, backslash, `..`)
/// - The stream cannot be decompressed or parsed
/// - An entry fails to materialize and `ignore_failed` is off
pub fn unpack(archive_path: &Path, output_dir: &Path, options: &UnpackOptions) -> Result<UnpackStats, UnpackError> {
    extract::unpack_archive(archive_path, output_dir, options)
}

/// Platform suffix for executables: `.exe` on Windows, empty elsewhere.
pub fn exe_suffix() -> &'static str {
    std::env::consts::EXE_SUFFIX
}
