//! File storage collaborator for category icons.
//!
//! # Responsibility
//! - Persist uploaded payloads and hand back an opaque relative path.
//! - Supersede a previous file when a replacement is stored.
//! - Remove files whose database row was never written or was replaced.
//!
//! # Invariants
//! - Returned paths are relative to the store root and use `/` separators.
//! - Storing never overwrites an existing file; each call gets a new name.

pub mod local;

use std::error::Error;
use std::fmt::{Display, Formatter};

pub use local::LocalFileStore;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug)]
pub enum StorageError {
    EmptyPayload,
    InvalidExtension(String),
    /// Folder or previous path escapes the store root.
    InvalidPath(String),
    Io(std::io::Error),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "refusing to store an empty payload"),
            Self::InvalidExtension(ext) => write!(f, "invalid file extension `{ext}`"),
            Self::InvalidPath(path) => write!(f, "invalid storage path `{path}`"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::EmptyPayload | Self::InvalidExtension(_) | Self::InvalidPath(_) => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Storage backend for uploaded files.
pub trait FileStore {
    /// Stores `payload` under `folder` and returns its relative path.
    ///
    /// When `previous` is given, that file is removed after the new one is
    /// written; a previous file that no longer exists is not an error.
    fn store(
        &self,
        folder: &str,
        extension: &str,
        payload: &[u8],
        previous: Option<&str>,
    ) -> StorageResult<String>;

    /// Removes a file previously returned by `store`. A file that no longer
    /// exists is not an error.
    fn remove(&self, path: &str) -> StorageResult<()>;
}

impl<S: FileStore + ?Sized> FileStore for &S {
    fn store(
        &self,
        folder: &str,
        extension: &str,
        payload: &[u8],
        previous: Option<&str>,
    ) -> StorageResult<String> {
        (**self).store(folder, extension, payload, previous)
    }

    fn remove(&self, path: &str) -> StorageResult<()> {
        (**self).remove(path)
    }
}
