//! Loading and persisting artifacts.
//!
//! An artifact is read whole, patched in memory and written back whole.
//! There is no locking: the store assumes a single writer that runs to
//! completion. `FsStore` does notice when a file changed on disk between
//! load and save and refuses to clobber it, which catches the common case
//! of two invocations racing on the same file.

use crate::safety::{RootGuard, SafetyError};
use filetime::FileTime;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The full text of one file, identified by its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    key: String,
    text: String,
    /// Modification time observed at load, when loaded from disk.
    loaded_mtime: Option<FileTime>,
}

impl Artifact {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
            loaded_mtime: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Same artifact, new contents.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            key: self.key.clone(),
            text: text.into(),
            loaded_mtime: self.loaded_mtime,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("{path} is not valid UTF-8")]
    NotUtf8 { path: PathBuf },

    #[error("{path} changed on disk since it was loaded; refusing to overwrite")]
    ModifiedSinceLoad { path: PathBuf },

    #[error("artifact '{key}' does not exist")]
    Missing { key: String },

    #[error(transparent)]
    Safety(#[from] SafetyError),
}

/// Load/save seam between the patch engine and wherever artifacts live.
pub trait ArtifactStore {
    fn load(&self, key: &str) -> Result<Artifact, StoreError>;

    /// Overwrite the artifact in full.
    fn save(&self, artifact: &Artifact) -> Result<(), StoreError>;
}

/// Artifacts as files under a project root.
#[derive(Debug, Clone)]
pub struct FsStore {
    guard: RootGuard,
}

impl FsStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self {
            guard: RootGuard::new(root)?,
        })
    }

    pub fn root(&self) -> &Path {
        self.guard.root()
    }

    /// Canonical path for `key`, which must exist inside the root.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        Ok(self.guard.resolve(key)?)
    }
}

impl ArtifactStore for FsStore {
    fn load(&self, key: &str) -> Result<Artifact, StoreError> {
        let path = self.path_for(key)?;
        let bytes = fs::read(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;
        let metadata = fs::metadata(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;
        let text = String::from_utf8(bytes).map_err(|_| StoreError::NotUtf8 { path: path.clone() })?;

        tracing::debug!(key, path = %path.display(), bytes = text.len(), "loaded artifact");
        Ok(Artifact {
            key: key.to_string(),
            text,
            loaded_mtime: Some(FileTime::from_last_modification_time(&metadata)),
        })
    }

    fn save(&self, artifact: &Artifact) -> Result<(), StoreError> {
        let path = self.guard.revalidate(&self.path_for(artifact.key())?)?;

        if let Some(loaded) = artifact.loaded_mtime {
            let metadata = fs::metadata(&path).map_err(|source| StoreError::Read {
                path: path.clone(),
                source,
            })?;
            if FileTime::from_last_modification_time(&metadata) != loaded {
                return Err(StoreError::ModifiedSinceLoad { path });
            }
        }

        atomic_write(&path, artifact.text().as_bytes()).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::info!(key = artifact.key(), path = %path.display(), "saved artifact");
        Ok(())
    }
}

/// In-memory store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, text: impl Into<String>) {
        self.files.borrow_mut().insert(key.into(), text.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.files.borrow().get(key).cloned()
    }
}

impl ArtifactStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Artifact, StoreError> {
        self.get(key)
            .map(|text| Artifact::new(key, text))
            .ok_or_else(|| StoreError::Missing {
                key: key.to_string(),
            })
    }

    fn save(&self, artifact: &Artifact) -> Result<(), StoreError> {
        self.insert(artifact.key(), artifact.text());
        Ok(())
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write lands or the original file is untouched. The
/// original file's permissions carry over to the replacement.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory")
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;

    if let Ok(metadata) = fs::metadata(path) {
        temp.as_file().set_permissions(metadata.permissions())?;
    }

    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_store_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("schema.sql"), "avatar_url TEXT,\n").unwrap();

        let store = FsStore::new(dir.path()).unwrap();
        let artifact = store.load("schema.sql").unwrap();
        assert_eq!(artifact.text(), "avatar_url TEXT,\n");

        store
            .save(&artifact.with_text("avatar_url TEXT,\n  username TEXT,\n"))
            .unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("schema.sql")).unwrap(),
            "avatar_url TEXT,\n  username TEXT,\n"
        );
    }

    #[test]
    fn test_fs_store_rejects_non_utf8() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bin.dat"), [0xff, 0xfe, 0x00]).unwrap();
        let store = FsStore::new(dir.path()).unwrap();
        assert!(matches!(
            store.load("bin.dat"),
            Err(StoreError::NotUtf8 { .. })
        ));
    }

    #[test]
    fn test_fs_store_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path()).unwrap();
        assert!(matches!(
            store.load("nope.tsx"),
            Err(StoreError::Safety(SafetyError::Canonicalize { .. }))
        ));
    }

    #[test]
    fn test_fs_store_detects_concurrent_modification() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("page.tsx");
        fs::write(&file, "v1").unwrap();

        let store = FsStore::new(dir.path()).unwrap();
        let artifact = store.load("page.tsx").unwrap();

        // Another writer touches the file after our load.
        fs::write(&file, "v2 from elsewhere").unwrap();
        filetime::set_file_mtime(&file, FileTime::from_unix_time(1, 0)).unwrap();

        assert!(matches!(
            store.save(&artifact.with_text("v1 patched")),
            Err(StoreError::ModifiedSinceLoad { .. })
        ));
        assert_eq!(fs::read_to_string(&file).unwrap(), "v2 from elsewhere");
    }

    #[test]
    #[cfg(unix)]
    fn test_atomic_write_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("script.sh");
        fs::write(&file, "echo hi").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o755)).unwrap();

        atomic_write(&file, b"echo bye").unwrap();

        let mode = fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(fs::read_to_string(&file).unwrap(), "echo bye");
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        store.insert("a.tsx", "one");
        let artifact = store.load("a.tsx").unwrap();
        store.save(&artifact.with_text("two")).unwrap();
        assert_eq!(store.get("a.tsx").as_deref(), Some("two"));
        assert!(matches!(
            store.load("b.tsx"),
            Err(StoreError::Missing { .. })
        ));
    }
}
