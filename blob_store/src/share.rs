use anyhow::Result;
use bytes::Bytes;
use object_store::path::Path;
use tracing::info;

use crate::{decoded_file_name, Container, PutResult, StorageAccount};

/// A file share: a container holding a hierarchy of directories and files.
#[derive(Debug, Clone)]
pub struct FileShare {
    container: Container,
}

impl FileShare {
    pub fn new(account: &StorageAccount, share_name: &str) -> Result<Self> {
        Ok(Self {
            container: account.container(share_name)?,
        })
    }

    pub fn name(&self) -> &str {
        self.container.name()
    }

    pub async fn create_if_not_exists(&self) -> Result<bool> {
        self.container.create_if_not_exists().await
    }

    /// Returns a handle to `directory`, which may be nested (`a/b`).
    pub fn directory(&self, directory: &str) -> ShareDirectory {
        ShareDirectory {
            path: self.container.location(directory),
            name: directory.to_string(),
            container: self.container.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShareDirectory {
    container: Container,
    name: String,
    path: Path,
}

impl ShareDirectory {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn create_if_not_exists(&self) -> Result<bool> {
        let created = self.container.ensure_prefix(&self.path).await?;
        if created {
            info!(
                share = self.container.name(),
                directory = %self.name,
                "created share directory"
            );
        }
        Ok(created)
    }

    /// Writes the whole file in one range, replacing any file of the same
    /// name.
    pub async fn upload_file(&self, file_name: &str, data: Bytes) -> Result<PutResult> {
        self.container
            .put(&self.path.child(file_name), data)
            .await
    }

    pub async fn read_file(&self, file_name: &str) -> Result<Option<Bytes>> {
        Ok(self
            .container
            .get(&self.path.child(file_name))
            .await?
            .map(|(_, bytes)| bytes))
    }

    /// Names of the files directly inside this directory, as they were
    /// uploaded. Sub-directories are not reported; a directory that was never
    /// created lists as empty.
    pub async fn list_files(&self) -> Result<Vec<String>> {
        let objects = self.container.list_direct(&self.path).await?;
        Ok(objects
            .into_iter()
            .filter_map(|meta| decoded_file_name(&meta.location))
            .collect())
    }
}
