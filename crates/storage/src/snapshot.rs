// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rolling snapshot file
//!
//! A single JSON object mapping video id to total views over the rolling
//! window, replaced wholesale on every rebuild.

use crate::atomic::replace_file;
use crate::error::StorageError;
use crate::segment::ViewCounts;
use std::path::Path;

/// Atomically replace the snapshot at `path`
pub fn write_snapshot(path: &Path, views: &ViewCounts) -> Result<(), StorageError> {
    let mut json = serde_json::to_vec(views)?;
    json.push(b'\n');
    replace_file(path, &json)?;
    Ok(())
}

/// Read the snapshot at `path`
///
/// Fails when the snapshot has never been built or does not parse.
pub fn read_snapshot(path: &Path) -> Result<ViewCounts, StorageError> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_a_plain_json_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("views.rolling30.snapshot");
        let views: ViewCounts = [("v1".to_string(), 3), ("v2".to_string(), 1)].into();

        write_snapshot(&path, &views).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.trim(), r#"{"v1":3,"v2":1}"#);
        assert_eq!(read_snapshot(&path).unwrap(), views);
    }

    #[test]
    fn rebuild_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("views.rolling30.snapshot");

        write_snapshot(&path, &[("old".to_string(), 9)].into()).unwrap();
        write_snapshot(&path, &[("new".to_string(), 1)].into()).unwrap();

        let views = read_snapshot(&path).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views.get("new"), Some(&1));
    }

    #[test]
    fn missing_or_corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("views.rolling30.snapshot");
        assert!(matches!(read_snapshot(&path), Err(StorageError::Io(_))));

        std::fs::write(&path, "{\"v1\":").unwrap();
        assert!(matches!(read_snapshot(&path), Err(StorageError::Json(_))));
    }
}
