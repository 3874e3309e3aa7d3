//! Where export documents are written and import documents are read from.

use crate::{Error, Result};

use async_trait::async_trait;
use std::{collections, io, path, sync};

/// Byte-level document storage.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Reads the whole file.
    async fn read(&self, path: &path::Path) -> Result<Vec<u8>>;

    /// Replaces the file with `bytes`, creating missing parent directories.
    async fn write(&self, path: &path::Path, bytes: &[u8]) -> Result<()>;
}

/// The local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFs;

#[async_trait]
impl FileSystem for LocalFs {
    async fn read(&self, path: &path::Path) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|source| Error::io(path, source))
    }

    async fn write(&self, path: &path::Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| Error::io(parent, source))?;
        }
        tokio::fs::write(path, bytes)
            .await
            .map_err(|source| Error::io(path, source))
    }
}

/// Files kept in memory, for tests.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: sync::Mutex<collections::BTreeMap<path::PathBuf, Vec<u8>>>,
}

impl MemoryFs {
    /// Empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> sync::MutexGuard<'_, collections::BTreeMap<path::PathBuf, Vec<u8>>> {
        self.files.lock().unwrap_or_else(sync::PoisonError::into_inner)
    }

    /// Stores a file directly.
    pub fn insert(&self, path: impl Into<path::PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.files().insert(path.into(), bytes.into());
    }

    /// Contents of a file, if it exists.
    pub fn get(&self, path: impl AsRef<path::Path>) -> Option<Vec<u8>> {
        self.files().get(path.as_ref()).cloned()
    }

    /// Paths of all files, sorted.
    pub fn paths(&self) -> Vec<path::PathBuf> {
        self.files().keys().cloned().collect()
    }
}

#[async_trait]
impl FileSystem for MemoryFs {
    async fn read(&self, path: &path::Path) -> Result<Vec<u8>> {
        self.get(path).ok_or_else(|| {
            Error::io(
                path,
                io::Error::new(io::ErrorKind::NotFound, "no such file"),
            )
        })
    }

    async fn write(&self, path: &path::Path, bytes: &[u8]) -> Result<()> {
        self.insert(path, bytes);
        Ok(())
    }
}
