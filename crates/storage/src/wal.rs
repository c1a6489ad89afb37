// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log of raw events
//!
//! One JSON-serialized [`Event`] per line, append-only. The WAL is the source
//! of truth for events that have not yet been folded into segments; the
//! offset cursor records how much of it has been.
//!
//! ```text
//! Event → WalWriter → disk (events.wal) → WalTail(offset) → replay
//! ```

use crate::error::StorageError;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tally_core::Event;
use thiserror::Error;
use tracing::{error, warn};

/// An event read from (or just appended to) the WAL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    pub event: Event,
    /// Byte position just past this record's line
    pub end: u64,
}

/// WAL writer for durable append operations
///
/// Exactly one writer may exist per WAL file.
pub struct WalWriter {
    path: PathBuf,
    file: File,
    len: u64,
    /// Set when a failed append could not be rolled back
    poisoned: bool,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// A file whose last byte is not a newline ends in a torn write from a
    /// crash. A newline is appended so the fragment stays on its own line,
    /// which replay skips as malformed.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;
        let mut len = file.metadata()?.len();

        if len > 0 && last_byte(&mut file)? != b'\n' {
            warn!(path = %path.display(), len, "WAL ends in a torn record, isolating it");
            file.write_all(b"\n")?;
            file.sync_data()?;
            len += 1;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
            poisoned: false,
        })
    }

    /// Append an event to the log
    ///
    /// Returns the WAL length after the append. The record is durably
    /// persisted (fsync'd) before this method returns. On failure the file is
    /// truncated back to its previous length so a partial line cannot merge
    /// with the next record. If that truncation also fails the writer refuses
    /// every later append; reopening isolates the partial line.
    pub fn append(&mut self, event: &Event) -> Result<u64, StorageError> {
        if self.poisoned {
            return Err(StorageError::WalPoisoned {
                path: self.path.clone(),
            });
        }

        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let written = self
            .file
            .write_all(&line)
            .and_then(|()| self.file.sync_data());
        if let Err(e) = written {
            self.rollback();
            return Err(e.into());
        }

        self.len += line.len() as u64;
        Ok(self.len)
    }

    fn rollback(&mut self) {
        if let Err(e) = self.file.set_len(self.len) {
            error!(
                path = %self.path.display(),
                len = self.len,
                error = %e,
                "failed to truncate WAL after a failed append, refusing further appends"
            );
            self.poisoned = true;
        }
    }

    /// True once a failed append could not be rolled back
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Current length of the WAL in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn last_byte(file: &mut File) -> io::Result<u8> {
    let mut byte = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut byte)?;
    Ok(byte[0])
}

/// Length of the WAL in bytes; a missing WAL is empty
pub fn wal_len(path: &Path) -> Result<u64, StorageError> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Errors that can occur when reading the WAL tail
#[derive(Debug, Error)]
pub enum WalReadError {
    #[error("malformed record at byte {offset}: {reason}")]
    Malformed { offset: u64, reason: String },
    #[error("offset {offset} is beyond the end of the WAL ({len} bytes)")]
    OffsetBeyondEnd { offset: u64, len: u64 },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Iterator over the WAL from a byte offset to end-of-file
///
/// Yields `Err(WalReadError::Malformed)` for lines that do not parse; the
/// caller decides whether to skip them. Blank lines are skipped silently.
pub struct WalTail {
    reader: Option<BufReader<File>>,
    position: u64,
}

impl WalTail {
    /// Open the WAL positioned at `offset`
    pub fn open(path: &Path, offset: u64) -> Result<Self, WalReadError> {
        let file = match File::open(path) {
            Ok(f) => Some(f),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let len = match &file {
            Some(f) => f.metadata()?.len(),
            None => 0,
        };
        if offset > len {
            return Err(WalReadError::OffsetBeyondEnd { offset, len });
        }

        let reader = match file {
            Some(mut f) => {
                f.seek(SeekFrom::Start(offset))?;
                Some(BufReader::new(f))
            }
            None => None,
        };

        Ok(Self {
            reader,
            position: offset,
        })
    }

    /// Byte position just past everything consumed so far
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl Iterator for WalTail {
    type Item = Result<WalRecord, WalReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;

        loop {
            let start = self.position;
            let mut line = Vec::new();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) => return None,
                Ok(bytes_read) => {
                    self.position += bytes_read as u64;

                    let trimmed = line.trim_ascii();
                    if trimmed.is_empty() {
                        continue;
                    }

                    return Some(match serde_json::from_slice::<Event>(trimmed) {
                        Ok(event) => Ok(WalRecord {
                            event,
                            end: self.position,
                        }),
                        Err(e) => Err(WalReadError::Malformed {
                            offset: start,
                            reason: e.to_string(),
                        }),
                    });
                }
                Err(e) => return Some(Err(WalReadError::Io(e))),
            }
        }
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
