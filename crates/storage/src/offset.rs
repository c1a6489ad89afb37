// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable WAL offset cursor
//!
//! The cursor is the byte length of the WAL prefix already folded into
//! segments, stored as a fixed-width little-endian `u64`. An empty file reads
//! as zero; any other length is corruption.

use crate::atomic::replace_file;
use crate::error::StorageError;
use std::path::Path;

const OFFSET_LEN: usize = std::mem::size_of::<u64>();

/// Read the cursor
pub fn read_offset(path: &Path) -> Result<u64, StorageError> {
    let bytes = std::fs::read(path)?;
    match <[u8; OFFSET_LEN]>::try_from(bytes.as_slice()) {
        Ok(raw) => Ok(u64::from_le_bytes(raw)),
        Err(_) if bytes.is_empty() => Ok(0),
        Err(_) => Err(StorageError::CorruptOffset {
            path: path.to_path_buf(),
            len: bytes.len(),
        }),
    }
}

/// Atomically replace the cursor
pub fn write_offset(path: &Path, offset: u64) -> Result<(), StorageError> {
    replace_file(path, &offset.to_le_bytes())?;
    Ok(())
}
