//! Bounded file access for the binaries under analysis.
//!
//! [`BinaryFile`] memory-maps the input read-only and refuses files larger
//! than the configured [`IOLimits`]. In-memory buffers are supported too so
//! the pipeline can run on bytes that never touched the disk.

pub mod error;

use crate::io::error::{IoError, Result};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Default maximum file size (512MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 512 * 1024 * 1024;

/// Defines the resource limits for I/O operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IOLimits {
    /// The absolute maximum file size that can be opened.
    pub max_file_size: u64,
}

impl Default for IOLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

enum Storage {
    Mapped(Mmap),
    Owned(Vec<u8>),
    // memmap cannot map empty files.
    Empty,
}

/// A read-only view over the whole binary.
pub struct BinaryFile {
    path: Option<PathBuf>,
    storage: Storage,
}

impl BinaryFile {
    /// Opens a file and memory-maps it.
    ///
    /// This function will fail if the file size exceeds `limits.max_file_size`.
    pub fn open<P: AsRef<Path>>(path: P, limits: &IOLimits) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| IoError::Open {
            path: path.display().to_string(),
            source,
        })?;
        let file_size = file.metadata()?.len();

        debug!(
            path = %path.display(),
            size = file_size,
            limits.max_file_size = limits.max_file_size,
            "Opening binary"
        );

        if file_size > limits.max_file_size {
            warn!(
                path = %path.display(),
                size = file_size,
                limit = limits.max_file_size,
                "File is too large"
            );
            return Err(IoError::FileTooLarge {
                limit: limits.max_file_size,
                found: file_size,
            });
        }

        let storage = if file_size == 0 {
            Storage::Empty
        } else {
            // Safety: read-only map of a regular file; the map lives as long as `self`.
            Storage::Mapped(unsafe { Mmap::map(&file)? })
        };

        Ok(Self {
            path: Some(path.to_path_buf()),
            storage,
        })
    }

    /// Wraps an in-memory buffer.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let storage = if data.is_empty() {
            Storage::Empty
        } else {
            Storage::Owned(data)
        };
        Self {
            path: None,
            storage,
        }
    }

    /// Path the file was opened from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The complete file contents.
    pub fn data(&self) -> &[u8] {
        match &self.storage {
            Storage::Mapped(map) => &map[..],
            Storage::Owned(bytes) => &bytes[..],
            Storage::Empty => &[],
        }
    }

    /// Returns the total size of the file in bytes.
    pub fn size(&self) -> u64 {
        self.data().len() as u64
    }

    /// Reads the first machine word (little-endian) used for format detection.
    ///
    /// Returns `None` when the file is shorter than four bytes.
    pub fn read_magic(&self) -> Option<u32> {
        let prefix: [u8; 4] = self.data().get(..4)?.try_into().ok()?;
        let magic = u32::from_le_bytes(prefix);
        trace!(magic = format_args!("{:#010x}", magic), "Read format magic");
        Some(magic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_file(content: &[u8]) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content).unwrap();
        temp_file
    }

    #[test]
    fn open_file_successfully() {
        let file = create_temp_file(b"hello world");
        let reader = BinaryFile::open(file.path(), &IOLimits::default()).unwrap();
        assert_eq!(reader.size(), 11);
        assert_eq!(reader.data(), b"hello world");
        assert_eq!(reader.path(), Some(file.path()));
    }

    #[test]
    fn open_file_too_large() {
        let file = create_temp_file(&[0; 100]);
        let limits = IOLimits { max_file_size: 50 };
        let result = BinaryFile::open(file.path(), &limits);
        assert!(matches!(result, Err(IoError::FileTooLarge { .. })));
    }

    #[test]
    fn open_missing_file() {
        let result = BinaryFile::open("/nonexistent/ropscope/input.bin", &IOLimits::default());
        assert!(matches!(result, Err(IoError::Open { .. })));
    }

    #[test]
    fn empty_file_has_no_data() {
        let file = create_temp_file(b"");
        let reader = BinaryFile::open(file.path(), &IOLimits::default()).unwrap();
        assert_eq!(reader.size(), 0);
        assert!(reader.data().is_empty());
        assert_eq!(reader.read_magic(), None);
    }

    #[test]
    fn magic_is_little_endian_word() {
        let reader = BinaryFile::from_bytes(b"\x7fELF\x02\x01".to_vec());
        assert_eq!(reader.read_magic(), Some(0x464c_457f));

        let short = BinaryFile::from_bytes(vec![0x4d, 0x5a]);
        assert_eq!(short.read_magic(), None);
    }
}
