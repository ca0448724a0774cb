//! Directory-Backed Block Store
//!
//! Blobs live as plain files in one flat directory. This is the storage
//! behind a node server process.

use crate::error::{Error, Result};
use crate::storage::{validate_blob_name, BlockStore};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A flat directory of blobs, one file per name.
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Open (and create if needed) the storage directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The storage directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, name: &str) -> Result<PathBuf> {
        validate_blob_name(name)?;
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl BlockStore for DirectoryStore {
    async fn put(&self, name: &str, data: Bytes) -> Result<()> {
        let path = self.blob_path(name)?;
        tokio::fs::write(&path, &data).await?;
        debug!("wrote {} bytes to {:?}", data.len(), path);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Bytes>> {
        let path = self.blob_path(name)?;
        match tokio::fs::read(&path).await {
            Ok(contents) => Ok(Some(Bytes::from(contents))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let path = self.blob_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("deleted {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::BlobNotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn is_online(&self) -> bool {
        true
    }
}

// =============================================================================
// Tests
// =============================================================================
