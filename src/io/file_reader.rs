//! Range reader over a local file.
//!
//! Each pyramid handle owns one `FileRangeReader`, so the file descriptor
//! lives exactly as long as the handle and is closed when it is dropped.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use bytes::Bytes;

use super::range_reader::{check_range, RangeReader};
use crate::error::IoError;

/// Range reader backed by an open file.
#[derive(Debug)]
pub struct FileRangeReader {
    file: Mutex<File>,
    size: u64,
    identifier: String,
}

impl FileRangeReader {
    /// Open `path` for range reads.
    ///
    /// The size is captured once at open time.
    pub fn open(path: &Path) -> Result<Self, IoError> {
        let identifier = path.display().to_string();
        let file = File::open(path).map_err(|e| map_io_error(&identifier, e))?;
        let size = file
            .metadata()
            .map_err(|e| map_io_error(&identifier, e))?
            .len();

        Ok(Self {
            file: Mutex::new(file),
            size,
            identifier,
        })
    }
}

impl RangeReader for FileRangeReader {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.size)?;

        let mut buf = vec![0u8; len];
        let mut file = self.file.lock().map_err(|_| IoError::Read {
            identifier: self.identifier.clone(),
            message: "file lock poisoned".to_string(),
        })?;
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| file.read_exact(&mut buf))
            .map_err(|e| map_io_error(&self.identifier, e))?;

        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

fn map_io_error(identifier: &str, err: io::Error) -> IoError {
    match err.kind() {
        io::ErrorKind::NotFound => IoError::NotFound(identifier.to_string()),
        _ => IoError::Read {
            identifier: identifier.to_string(),
            message: err.to_string(),
        },
    }
}
