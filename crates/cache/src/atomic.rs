// SPDX-License-Identifier: MIT

//! Atomic write-then-rename, generalized from the template's snapshot
//! backup rotation (`crates/daemon/src/storage/snapshot.rs::rotate_bak_path`
//! in the architectural template this workspace follows) so that a crash
//! mid-write never leaves a half-written cursor or handler state file.

use crate::error::CacheError;
use std::fs;
use std::path::{Path, PathBuf};

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out. Keeps
/// up to [`MAX_BAK_FILES`] backups.
pub fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }
    bak(1)
}

fn io_err(path: &Path, source: std::io::Error) -> CacheError {
    CacheError::Io { path: path.to_path_buf(), source }
}

/// Write `bytes` to `path` via a sibling temp file + rename, so readers
/// never observe a partially-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

/// Same as [`write_atomic`], but rotates the previous contents of `path`
/// into a `.bak` file first. Used for the master cursor, which is small
/// and important enough to keep a short backup history of.
pub fn write_atomic_with_backup(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    if path.exists() {
        let bak = rotate_bak_path(path);
        let _ = fs::copy(path, bak);
    }
    write_atomic(path, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_atomic_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deep/file.json");
        write_atomic(&path, b"{}").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{}");
    }

    #[test]
    fn backup_rotation_keeps_bounded_history() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cursor.json");
        for i in 0..5u32 {
            write_atomic_with_backup(&path, i.to_string().as_bytes()).unwrap();
        }
        assert!(path.with_extension("bak").exists());
        assert!(path.with_extension("bak.2").exists());
        assert!(path.with_extension("bak.3").exists());
        assert!(!path.with_extension("bak.4").exists());
    }
}
