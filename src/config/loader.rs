//! Reading patch-set files from disk or memory.

use crate::config::schema::{PatchSetFile, ValidationError};
use crate::set::BuildError;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read patch set from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse patch set TOML{}: {source}", origin(.path))]
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    #[error("invalid patch set{}: {source}", origin(.path))]
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
    /// A step that validated structurally but could not be built, e.g. a
    /// malformed structural pattern or an undefined template variable.
    #[error("cannot build patch set{}: {source}", origin(.path))]
    Compile {
        path: Option<PathBuf>,
        source: BuildError,
    },
}

fn origin(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|path| format!(" ({})", path.display()))
        .unwrap_or_default()
}

impl ConfigError {
    /// Attach the file a path-less error came from.
    pub fn with_path(mut self, file: &Path) -> Self {
        match &mut self {
            ConfigError::Io { .. } => {}
            ConfigError::Toml { path, .. }
            | ConfigError::Validation { path, .. }
            | ConfigError::Compile { path, .. } => {
                path.get_or_insert_with(|| file.to_path_buf());
            }
        }
        self
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Io { path, .. } => Some(path),
            ConfigError::Toml { path, .. }
            | ConfigError::Validation { path, .. }
            | ConfigError::Compile { path, .. } => path.as_deref(),
        }
    }
}

/// Parse and validate a patch-set file held in memory.
pub fn load_from_str(input: &str) -> Result<PatchSetFile, ConfigError> {
    let file: PatchSetFile = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    file.validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(file)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatchSetFile, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "loading patch set");
    load_from_str(&contents).map_err(|error| error.with_path(path))
}
