//! On-disk layout of a namespace's index directory
//!
//! ```text
//! <index_dir>/<namespace>/
//!   CURRENT               name of the published generation
//!   gen-<index id>/       vectors.index, index_store.json, docstore.json, manifest.json
//!   .staging-<uuid>/      generation being written
//! ```
//!
//! Directories written before generations existed keep the artifacts directly
//! in `<namespace>/` and have no `CURRENT`; they are still readable.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const VECTORS_FILE: &str = "vectors.index";
pub const LEGACY_VECTORS_FILE: &str = "default__vector_store.bin";
pub const INDEX_STORE_FILE: &str = "index_store.json";
pub const DOCSTORE_FILE: &str = "docstore.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const CURRENT_FILE: &str = "CURRENT";
pub const CURRENT_TMP_FILE: &str = "CURRENT.tmp";
pub const GENERATION_PREFIX: &str = "gen-";
pub const STAGING_PREFIX: &str = ".staging-";

/// Files that make up a flat (pre-generation) layout
pub const LEGACY_ARTIFACTS: &[&str] = &[
    VECTORS_FILE,
    LEGACY_VECTORS_FILE,
    INDEX_STORE_FILE,
    DOCSTORE_FILE,
    MANIFEST_FILE,
];

/// Directory holding the published artifacts of a namespace
///
/// Errors carry a human-readable reason; callers turn them into
/// `IndexNotFound`.
pub fn resolve_generation(namespace_dir: &Path) -> Result<PathBuf, String> {
    if !namespace_dir.is_dir() {
        return Err("index directory does not exist".to_string());
    }

    match read_current(namespace_dir)? {
        Some(name) => {
            let dir = namespace_dir.join(&name);
            if dir.is_dir() {
                Ok(dir)
            } else {
                Err(format!("published generation '{}' is missing", name))
            }
        }
        None if has_legacy_layout(namespace_dir) => Ok(namespace_dir.to_path_buf()),
        None => {
            let empty = fs::read_dir(namespace_dir)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(true);
            if empty {
                Err("index directory is empty".to_string())
            } else {
                Err("no published index".to_string())
            }
        }
    }
}

/// Generation name recorded in `CURRENT`, if the file exists
pub fn read_current(namespace_dir: &Path) -> Result<Option<String>, String> {
    let path = namespace_dir.join(CURRENT_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let contents =
        fs::read_to_string(&path).map_err(|e| format!("failed to read CURRENT: {}", e))?;
    let name = contents.trim();
    if !is_generation_name(name) {
        return Err(format!("CURRENT holds an invalid generation name '{}'", name));
    }
    Ok(Some(name.to_string()))
}

pub fn is_generation_name(name: &str) -> bool {
    name.len() > GENERATION_PREFIX.len()
        && name.starts_with(GENERATION_PREFIX)
        && !name.contains(['/', '\\'])
        && name != "."
        && name != ".."
}

pub fn has_legacy_layout(namespace_dir: &Path) -> bool {
    [VECTORS_FILE, LEGACY_VECTORS_FILE, INDEX_STORE_FILE]
        .iter()
        .any(|name| namespace_dir.join(name).is_file())
}

/// Whether the namespace has something a reader could load
pub fn has_published_index(namespace_dir: &Path) -> bool {
    resolve_generation(namespace_dir).is_ok()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Write `bytes` to `path` and fsync, returning the SHA-256 of the contents
pub fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<String> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(sha256_hex(bytes))
}

/// Best-effort directory fsync so renames inside it are durable
pub fn sync_dir(dir: &Path) {
    if let Ok(handle) = fs::File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_directory() {
        let err = resolve_generation(Path::new("/nonexistent/ns")).unwrap_err();
        assert!(err.contains("does not exist"));
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        let err = resolve_generation(dir.path()).unwrap_err();
        assert!(err.contains("empty"));
        assert!(!has_published_index(dir.path()));
    }

    #[test]
    fn test_current_points_at_generation() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("gen-abc")).unwrap();
        fs::write(dir.path().join(CURRENT_FILE), "gen-abc\n").unwrap();
        assert_eq!(
            resolve_generation(dir.path()).unwrap(),
            dir.path().join("gen-abc")
        );
    }

    #[test]
    fn test_current_with_missing_generation() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CURRENT_FILE), "gen-gone").unwrap();
        assert!(resolve_generation(dir.path()).unwrap_err().contains("missing"));
    }

    #[test]
    fn test_current_rejects_path_escape() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CURRENT_FILE), "../other").unwrap();
        assert!(resolve_generation(dir.path()).unwrap_err().contains("invalid"));
        assert!(!is_generation_name("gen-a/../../b"));
        assert!(!is_generation_name("gen-"));
    }

    #[test]
    fn test_legacy_layout() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(LEGACY_VECTORS_FILE), b"x").unwrap();
        assert_eq!(resolve_generation(dir.path()).unwrap(), dir.path());
    }

    #[test]
    fn test_unrelated_files_are_not_an_index() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        assert_eq!(resolve_generation(dir.path()).unwrap_err(), "no published index");
    }

    #[test]
    fn test_write_synced_returns_checksum() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.bin");
        let sum = write_synced(&path, b"abc").unwrap();
        assert_eq!(
            sum,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(fs::read(path).unwrap(), b"abc");
    }
}
