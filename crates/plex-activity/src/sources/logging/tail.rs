//! Follow an append-only file across rotations

use crate::error::Result;
use futures::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use std::fs::Metadata;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Identity of the file backing a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    #[cfg(unix)]
    device: u64,
    #[cfg(unix)]
    inode: u64,
    #[cfg(not(unix))]
    created: Option<std::time::SystemTime>,
}

impl FileIdentity {
    /// Identity described by file metadata
    pub fn of(metadata: &Metadata) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Self {
                device: metadata.dev(),
                inode: metadata.ino(),
            }
        }
        #[cfg(not(unix))]
        {
            Self {
                created: metadata.created().ok(),
            }
        }
    }
}

struct FileCursor {
    reader: BufReader<async_fs::File>,
    identity: FileIdentity,
    position: u64,
}

/// Reader over the lines appended to a file after it was opened
///
/// The file is opened lazily and positioned at its end, so existing content
/// is never replayed. Incomplete trailing lines are held back until their
/// newline arrives.
pub struct LogTail {
    path: PathBuf,
    cursor: Option<FileCursor>,
    pending: Vec<u8>,
    opened_once: bool,
}

impl LogTail {
    /// Tail the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cursor: None,
            pending: Vec::new(),
            opened_once: false,
        }
    }

    /// Path being followed
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a file handle is currently open
    pub fn is_open(&self) -> bool {
        self.cursor.is_some()
    }

    /// Read the next complete line, without its line terminator
    ///
    /// Returns `Ok(None)` when no complete line is available yet. Failing to
    /// open the file is an error only for the very first open; a reopen after
    /// rotation that fails (the new file may not exist yet) counts as "no line
    /// yet".
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        if self.cursor.is_none() {
            match self.open().await {
                Ok(cursor) => self.cursor = Some(cursor),
                Err(err) if self.opened_once => {
                    debug!("Unable to reopen {}: {}", self.path.display(), err);
                    return Ok(None);
                }
                Err(err) => return Err(err),
            }
        }

        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        let read = cursor.reader.read_until(b'\n', &mut self.pending).await?;
        cursor.position += read as u64;

        if !self.pending.ends_with(b"\n") {
            return Ok(None);
        }

        let line = String::from_utf8_lossy(&self.pending)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        self.pending.clear();

        Ok(Some(line))
    }

    /// Whether the path now refers to a different (or truncated) file
    pub async fn rotated(&self) -> bool {
        let Some(cursor) = &self.cursor else {
            return false;
        };

        match async_fs::metadata(&self.path).await {
            Ok(metadata) => {
                FileIdentity::of(&metadata) != cursor.identity || metadata.len() < cursor.position
            }
            Err(_) => true,
        }
    }

    /// Release the open handle, dropping any unterminated line; idempotent
    pub fn close(&mut self) {
        if self.cursor.take().is_some() {
            debug!("Closed {}", self.path.display());
        }
        self.pending.clear();
    }

    async fn open(&mut self) -> Result<FileCursor> {
        let mut file = async_fs::File::open(&self.path).await?;
        let metadata = file.metadata().await?;
        let position = file.seek(SeekFrom::End(0)).await?;

        info!("Opened file path: {:?} (at byte {})", self.path, position);
        self.opened_once = true;

        Ok(FileCursor {
            reader: BufReader::new(file),
            identity: FileIdentity::of(&metadata),
            position,
        })
    }
}

impl std::fmt::Debug for LogTail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogTail")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .field("pending", &self.pending.len())
            .finish()
    }
}
