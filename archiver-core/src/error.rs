//! Error types for archive pipelines and the format registry.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a Make/Open/List call. Every variant names the path to act on.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("{}: failed to open archive: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("error creating {}: {source}", .path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("{}: corrupt or truncated archive data: {source}", .path.display())]
    Decode { path: PathBuf, source: io::Error },

    #[error("{}: illegal entry path {} escapes the destination", .archive.display(), .entry.display())]
    Traversal { archive: PathBuf, entry: PathBuf },

    #[error("{}: writing archive: {source}", .path.display())]
    Writer { path: PathBuf, source: io::Error },

    #[error("{}: extracting entry: {source}", .path.display())]
    Extract { path: PathBuf, source: io::Error },
}

/// Discriminant of [`ArchiveError`] for callers that only need to branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Open,
    Create,
    Decode,
    Traversal,
    Writer,
    Extract,
}

impl ArchiveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Open { .. } => ErrorKind::Open,
            Self::Create { .. } => ErrorKind::Create,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Traversal { .. } => ErrorKind::Traversal,
            Self::Writer { .. } => ErrorKind::Writer,
            Self::Extract { .. } => ErrorKind::Extract,
        }
    }

    pub(crate) fn open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Open { path: path.into(), source }
    }

    pub(crate) fn create(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Create { path: path.into(), source }
    }

    pub(crate) fn decode(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Decode { path: path.into(), source }
    }

    pub(crate) fn writer(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Writer { path: path.into(), source }
    }

    pub(crate) fn extract(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Extract { path: path.into(), source }
    }
}

pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("format {0:?} is already registered")]
    Duplicate(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_path() {
        let err = ArchiveError::open("/tmp/missing.tar.zst", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.kind(), ErrorKind::Open);
        assert!(err.to_string().starts_with("/tmp/missing.tar.zst: failed to open archive"));

        let err = ArchiveError::Traversal {
            archive: PathBuf::from("a.tzst"),
            entry: PathBuf::from("../evil"),
        };
        assert_eq!(err.kind(), ErrorKind::Traversal);
        assert!(err.to_string().contains("../evil"));
    }
}
