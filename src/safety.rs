use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Directories under the root that patch sets must never touch.
const FORBIDDEN_DIRS: &[&str] = &[".git", ".text-patcher"];

/// Keeps artifact keys inside the project root.
///
/// Keys are relative paths. They are joined to the root, canonicalized to
/// resolve symlinks and `..`, then checked against the root and the
/// forbidden directories.
#[derive(Debug, Clone)]
pub struct RootGuard {
    root: PathBuf,
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("artifact key must be a relative path: {0}")]
    AbsoluteKey(PathBuf),

    #[error("artifact key is empty")]
    EmptyKey,

    #[error("path is outside the project root: {path} (root: {root})")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("path is in a forbidden directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("failed to canonicalize {path}: {source}")]
    Canonicalize {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl RootGuard {
    /// Create a guard for `root`, which must exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let root = canonicalize(root.as_ref())?;
        let forbidden_paths = FORBIDDEN_DIRS.iter().map(|dir| root.join(dir)).collect();
        Ok(Self {
            root,
            forbidden_paths,
        })
    }

    /// Resolve an artifact key to a canonical path inside the root.
    pub fn resolve(&self, key: &str) -> Result<PathBuf, SafetyError> {
        let relative = Path::new(key);
        if key.trim().is_empty() {
            return Err(SafetyError::EmptyKey);
        }
        if relative.is_absolute() || relative.components().any(|c| matches!(c, Component::Prefix(_))) {
            return Err(SafetyError::AbsoluteKey(relative.to_path_buf()));
        }

        let canonical = canonicalize(&self.root.join(relative))?;
        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    /// Re-validate a previously resolved path right before writing to it.
    pub fn revalidate(&self, path: &Path) -> Result<PathBuf, SafetyError> {
        let canonical = canonicalize(path)?;
        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        if !canonical.starts_with(&self.root) {
            return Err(SafetyError::OutsideRoot {
                path: canonical.to_path_buf(),
                root: self.root.clone(),
            });
        }

        for forbidden in &self.forbidden_paths {
            if canonical.starts_with(forbidden) {
                return Err(SafetyError::ForbiddenPath {
                    path: canonical.to_path_buf(),
                    forbidden: forbidden.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf, SafetyError> {
    path.canonicalize()
        .map_err(|source| SafetyError::Canonicalize {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_resolve_inside_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src/app")).unwrap();
        fs::write(root.join("src/app/page.tsx"), b"").unwrap();

        let guard = RootGuard::new(root).unwrap();
        let resolved = guard.resolve("src/app/page.tsx").unwrap();
        assert!(resolved.ends_with("src/app/page.tsx"));
    }

    #[test]
    fn test_resolve_rejects_parent_escape() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("project");
        fs::create_dir_all(&root).unwrap();
        fs::write(temp_dir.path().join("outside.txt"), b"").unwrap();

        let guard = RootGuard::new(&root).unwrap();
        assert!(matches!(
            guard.resolve("../outside.txt"),
            Err(SafetyError::OutsideRoot { .. })
        ));
    }

    #[test]
    fn test_resolve_rejects_absolute_key() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = RootGuard::new(temp_dir.path()).unwrap();
        let absolute = temp_dir.path().join("file.txt");
        fs::write(&absolute, b"").unwrap();

        assert!(matches!(
            guard.resolve(absolute.to_str().unwrap()),
            Err(SafetyError::AbsoluteKey(_))
        ));
        assert!(matches!(guard.resolve(" "), Err(SafetyError::EmptyKey)));
    }

    #[test]
    fn test_resolve_rejects_forbidden_dirs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/config"), b"").unwrap();

        let guard = RootGuard::new(root).unwrap();
        assert!(matches!(
            guard.resolve(".git/config"),
            Err(SafetyError::ForbiddenPath { .. })
        ));
    }

    #[test]
    fn test_resolve_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = RootGuard::new(temp_dir.path()).unwrap();
        assert!(matches!(
            guard.resolve("missing.tsx"),
            Err(SafetyError::Canonicalize { .. })
        ));
    }

    #[test]
    #[cfg(unix)]
    fn test_resolve_symlink_escape() {
        use std::os::unix::fs::symlink;

        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("project");
        fs::create_dir_all(&root).unwrap();

        let outside = temp_dir.path().join("outside.tsx");
        fs::write(&outside, b"").unwrap();
        symlink(&outside, root.join("escape.tsx")).unwrap();

        let guard = RootGuard::new(&root).unwrap();
        assert!(matches!(
            guard.resolve("escape.tsx"),
            Err(SafetyError::OutsideRoot { .. })
        ));
    }
}
