//! Zip backend.

use super::Engine;
use crate::error::UnpackError;
use crate::types::{ArchiveEntry, EntryType, UnpackOptions, UnpackStats};
use chrono::NaiveDate;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use std::time::SystemTime;
use zip::ZipArchive;

const S_IFMT: u32 = 0o170000;
const S_IFREG: u32 = 0o100000;
const S_IFDIR: u32 = 0o040000;
const S_IFLNK: u32 = 0o120000;

/// Unpacks zip archives.
#[derive(Debug, Clone, Default)]
pub struct ZipUnpacker {
    options: UnpackOptions,
}

impl ZipUnpacker {
    /// Creates an unpacker with the given options.
    pub fn new(options: UnpackOptions) -> Self {
        Self { options }
    }

    /// Options this unpacker was built with.
    pub fn options(&self) -> &UnpackOptions {
        &self.options
    }

    /// Opens `archive_path` and unpacks it into `output_dir`.
    pub fn unpack(&self, archive_path: &Path, output_dir: &Path) -> Result<UnpackStats, UnpackError> {
        if !archive_path.exists() {
            return Err(UnpackError::NotFound(archive_path.to_path_buf()));
        }

        let file = File::open(archive_path)?;
        let mut archive = ZipArchive::new(BufReader::new(file)).map_err(corrupted)?;
        self.unpack_from_reader(&mut archive, output_dir)
    }

    /// Unpacks an already opened zip archive in central-directory order.
    pub fn unpack_from_reader<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        output_dir: &Path,
    ) -> Result<UnpackStats, UnpackError> {
        let mut engine = Engine::new(output_dir, &self.options);

        for index in 0..archive.len() {
            let mut file = archive.by_index(index).map_err(corrupted)?;

            let unix_mode = file.unix_mode();
            let info = ArchiveEntry {
                path: file.name().to_string(),
                entry_type: entry_type(file.is_dir(), unix_mode),
                size: file.size(),
                modified: file.last_modified().and_then(dos_time_to_system),
                mode: unix_mode.map(|mode| mode & 0o7777),
            };

            engine.process(&info, &mut file)?;
        }

        Ok(engine.finish())
    }
}

fn entry_type(is_dir: bool, unix_mode: Option<u32>) -> EntryType {
    if is_dir {
        return EntryType::Directory;
    }
    match unix_mode.map(|mode| mode & S_IFMT) {
        None | Some(0) | Some(S_IFREG) => EntryType::File,
        Some(S_IFDIR) => EntryType::Directory,
        Some(S_IFLNK) => EntryType::Symlink,
        Some(_) => EntryType::Other,
    }
}

/// Converts a zip (DOS) timestamp, taken as UTC, to a `SystemTime`.
fn dos_time_to_system(stamp: zip::DateTime) -> Option<SystemTime> {
    let naive = NaiveDate::from_ymd_opt(stamp.year().into(), stamp.month().into(), stamp.day().into())?
        .and_hms_opt(stamp.hour().into(), stamp.minute().into(), stamp.second().into())?;
    Some(SystemTime::from(naive.and_utc()))
}

fn corrupted(e: zip::result::ZipError) -> UnpackError {
    UnpackError::Corrupted(e.to_string())
}
