//! Resolvable reference to the local file an upload reads its payload from.

use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum FileReferenceError {
    #[error("Storage location '{0}' is not a file URL or absolute path")]
    Unresolvable(String),
}

/// A local file, given either as a `file://` URL or an absolute path.
///
/// Resolution is syntactic only; whether the file is readable is decided by the
/// platform when the task starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    path: PathBuf,
}

impl FileReference {
    pub fn parse(location: &str) -> Result<Self, FileReferenceError> {
        if location.starts_with("file:") {
            let url = Url::parse(location)
                .map_err(|_| FileReferenceError::Unresolvable(location.to_string()))?;
            let path = url
                .to_file_path()
                .map_err(|_| FileReferenceError::Unresolvable(location.to_string()))?;
            return Ok(Self { path });
        }

        let path = PathBuf::from(location);
        if path.is_absolute() {
            Ok(Self { path })
        } else {
            Err(FileReferenceError::Unresolvable(location.to_string()))
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the referenced file currently exists and is a regular file
    pub fn is_readable(&self) -> bool {
        std::fs::metadata(&self.path)
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }
}

impl std::fmt::Display for FileReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
