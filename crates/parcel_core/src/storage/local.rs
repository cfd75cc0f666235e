//! Local filesystem file store.

use crate::storage::{FileStore, StorageError, StorageResult};
use log::{info, warn};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

/// File store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root_dir: PathBuf,
}

impl LocalFileStore {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Absolute path for a relative path returned by `store`.
    pub fn resolve(&self, relative: &str) -> StorageResult<PathBuf> {
        let relative = checked_relative(relative)?;
        Ok(self.root_dir.join(relative))
    }
}

impl FileStore for LocalFileStore {
    fn store(
        &self,
        folder: &str,
        extension: &str,
        payload: &[u8],
        previous: Option<&str>,
    ) -> StorageResult<String> {
        if payload.is_empty() {
            return Err(StorageError::EmptyPayload);
        }
        if extension.is_empty() || !extension.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(StorageError::InvalidExtension(extension.to_string()));
        }

        let folder = folder.trim_matches('/');
        let folder_path = checked_relative(folder)?;
        let dir = self.root_dir.join(folder_path);
        std::fs::create_dir_all(&dir)?;

        let file_name = format!("{}.{extension}", Uuid::new_v4());
        // `create_new` keeps an existing file untouched.
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(&file_name))?;
        file.write_all(payload)?;
        file.sync_all()?;

        let relative = if folder.is_empty() {
            file_name
        } else {
            format!("{folder}/{file_name}")
        };

        if let Some(previous) = previous.filter(|value| !value.trim().is_empty()) {
            self.remove(previous)?;
        }

        info!(
            "event=file_store module=storage status=ok bytes={} superseded={}",
            payload.len(),
            previous.is_some()
        );
        Ok(relative)
    }

    fn remove(&self, path: &str) -> StorageResult<()> {
        let resolved = self.resolve(path)?;
        match std::fs::remove_file(&resolved) {
            Ok(()) => {
                info!("event=file_remove module=storage status=ok");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!("event=file_remove module=storage status=skip reason=missing");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn checked_relative(value: &str) -> StorageResult<&Path> {
    let path = Path::new(value);
    let escapes = path
        .components()
        .any(|component| !matches!(component, Component::Normal(_)));
    if escapes {
        return Err(StorageError::InvalidPath(value.to_string()));
    }
    Ok(path)
}
