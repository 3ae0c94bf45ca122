//! Tar backend, with optional gzip decompression.

use super::Engine;
use crate::error::UnpackError;
use crate::types::{ArchiveEntry, EntryType, UnpackOptions, UnpackStats};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Unpacks tar archives.
///
/// # Example
///
/// ```rust,no_run
/// use cmdutil::{TarUnpacker, UnpackOptions};
/// use std::path::Path;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let unpacker = TarUnpacker::new(UnpackOptions::new().strip_components(1));
/// let stats = unpacker.unpack(Path::new("go1.22.0.linux-amd64.tar.gz"), Path::new("sdk"))?;
/// println!("{} files", stats.files_written);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct TarUnpacker {
    options: UnpackOptions,
}

impl TarUnpacker {
    /// Creates an unpacker with the given options.
    pub fn new(options: UnpackOptions) -> Self {
        Self { options }
    }

    /// Options this unpacker was built with.
    pub fn options(&self) -> &UnpackOptions {
        &self.options
    }

    /// Opens `archive_path`, decompresses it and unpacks it into `output_dir`.
    ///
    /// Without a custom decompressor, names ending in `.gz` or `.tgz` are read
    /// as gzip and everything else as a plain tar stream.
    pub fn unpack(&self, archive_path: &Path, output_dir: &Path) -> Result<UnpackStats, UnpackError> {
        if !archive_path.exists() {
            return Err(UnpackError::NotFound(archive_path.to_path_buf()));
        }

        let file = File::open(archive_path)?;
        let name = archive_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let reader = self.open_stream(Box::new(BufReader::new(file)), &name)?;

        self.unpack_from_reader(tar::Archive::new(reader), output_dir)
    }

    /// Unpacks an already opened tar stream. No decompression is applied.
    pub fn unpack_from_reader<R: Read>(
        &self,
        mut archive: tar::Archive<R>,
        output_dir: &Path,
    ) -> Result<UnpackStats, UnpackError> {
        let mut engine = Engine::new(output_dir, &self.options);

        let entries = archive.entries().map_err(corrupted)?;
        for item in entries {
            let mut entry = item.map_err(corrupted)?;

            let header_type = entry.header().entry_type();
            if header_type == tar::EntryType::XGlobalHeader {
                continue;
            }

            let info = ArchiveEntry {
                path: String::from_utf8_lossy(&entry.path_bytes()).into_owned(),
                entry_type: entry_type(header_type),
                size: entry.size(),
                modified: entry
                    .header()
                    .mtime()
                    .ok()
                    .filter(|&secs| secs > 0)
                    .map(|secs| UNIX_EPOCH + Duration::from_secs(secs)),
                mode: entry.header().mode().ok(),
            };

            engine.process(&info, &mut entry)?;
        }

        Ok(engine.finish())
    }

    fn open_stream(&self, reader: Box<dyn Read>, name: &str) -> Result<Box<dyn Read>, UnpackError> {
        if let Some(decompress) = &self.options.decompress {
            return decompress(reader).map_err(UnpackError::Decompress);
        }

        if name.ends_with(".gz") || name.ends_with(".tgz") {
            return gzip_reader(reader).map_err(UnpackError::Decompress);
        }

        Ok(reader)
    }
}

/// Wraps `reader` in a gzip decoder after checking the stream header.
///
/// A stream that does not start with the gzip magic bytes fails here,
/// before any entry is read. Concatenated gzip members are decoded as one
/// stream.
pub fn gzip_reader(mut reader: Box<dyn Read>) -> io::Result<Box<dyn Read>> {
    let mut magic = [0u8; 2];
    reader.read_exact(&mut magic)?;
    if magic != GZIP_MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "invalid gzip header"));
    }

    Ok(Box::new(MultiGzDecoder::new(io::Cursor::new(magic).chain(reader))))
}

fn entry_type(header_type: tar::EntryType) -> EntryType {
    match header_type {
        tar::EntryType::Regular | tar::EntryType::Continuous => EntryType::File,
        tar::EntryType::Directory => EntryType::Directory,
        tar::EntryType::Symlink => EntryType::Symlink,
        tar::EntryType::Link => EntryType::Hardlink,
        _ => EntryType::Other,
    }
}

fn corrupted(e: io::Error) -> UnpackError {
    UnpackError::Corrupted(e.to_string())
}
