//! One-JSON-file-per-entry persistence shared by the revision store and the
//! cursor registry.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::StorageError;

/// Path of the file holding `key` under `dir`.
pub(crate) fn entry_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.json", file_stem(key)))
}

/// Write `value` next to `path` and rename it into place, so readers see
/// either the previous file or the complete new one.
pub(crate) fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Remove `path`; a file that is already gone is not an error.
pub(crate) fn remove_if_present(path: &Path) -> Result<(), StorageError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Create `dir` if needed and decode every `*.json` file in it.
/// Unreadable files are logged and skipped.
pub(crate) fn load_dir<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>, StorageError> {
    fs::create_dir_all(dir)?;
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e != "json").unwrap_or(true) {
            continue;
        }
        match read_json(&path) {
            Ok(value) => entries.push(value),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable file"),
        }
    }
    Ok(entries)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Alphanumerics, `-` and `_` pass through; every other byte is written as
/// `%XX`, so distinct keys never collide.
pub(crate) fn file_stem(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stem_escapes_separators() {
        assert_eq!(file_stem("clang-x86_64"), "clang-x86_64");
        assert_eq!(file_stem("lld/arm"), "lld%2Farm");
        assert_ne!(file_stem("a.b"), file_stem("a_b"));
    }

    #[test]
    fn test_load_dir_skips_garbage_and_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        write_atomic(&entry_path(dir.path(), "ok"), &vec![1u32, 2]).unwrap();
        fs::write(dir.path().join("broken.json"), "not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loaded: Vec<Vec<u32>> = load_dir(dir.path()).unwrap();
        assert_eq!(loaded, [vec![1, 2]]);
    }

    #[test]
    fn test_remove_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_if_present(&dir.path().join("gone.json")).is_ok());
    }
}
