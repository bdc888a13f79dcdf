use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use azure_storage_blobs::prelude::ContainerClient;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::{path::Path, ObjectMeta, ObjectStore, PutMode, PutPayload};
use percent_encoding::percent_decode_str;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

mod account;
mod share;

pub use account::StorageAccount;
pub use share::{FileShare, ShareDirectory};

/// Name of the zero-byte object that records that a container, share or
/// directory has been created. Listings never report it.
pub const MARKER_OBJECT: &str = ".created";

#[derive(Debug, Clone)]
pub struct PutResult {
    pub size_bytes: u64,
    pub sha256_hash: String,
    pub e_tag: Option<String>,
}

/// A named container inside a [`StorageAccount`].
///
/// All locations handed to a container are relative to its root path.
/// Account containers also carry a client that can create the container
/// itself.
#[derive(Debug, Clone)]
pub struct Container {
    name: String,
    object_store: Arc<dyn ObjectStore>,
    path: Path,
    account_container: Option<ContainerClient>,
}

impl Container {
    pub(crate) fn new(
        name: &str,
        object_store: Arc<dyn ObjectStore>,
        path: Path,
        account_container: Option<ContainerClient>,
    ) -> Self {
        Self {
            name: name.to_string(),
            object_store,
            path,
            account_container,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves a relative location such as `customers/CUSTOMER/<row>` to a
    /// path inside this container. Every segment is encoded as a single
    /// path part, so `..` cannot escape the container.
    pub fn location(&self, relative: &str) -> Path {
        relative
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.path.clone(), |path, part| path.child(part))
    }

    /// Writes the marker object under `prefix` unless it is already there.
    /// Returns `true` when this call created it.
    pub async fn ensure_prefix(&self, prefix: &Path) -> Result<bool> {
        let marker = prefix.child(MARKER_OBJECT);
        match self
            .object_store
            .put_opts(&marker, PutPayload::default(), PutMode::Create.into())
            .await
        {
            Ok(_) => {
                debug!(container = %self.name, %prefix, "created prefix marker");
                Ok(true)
            }
            Err(object_store::Error::AlreadyExists { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Creates the account container when there is one, then writes the
    /// root marker. Returns `true` when either did not exist before.
    pub async fn create_if_not_exists(&self) -> Result<bool> {
        let account_created = match &self.account_container {
            Some(client) => create_account_container(client)
                .await
                .with_context(|| format!("unable to create container {}", self.name))?,
            None => false,
        };
        let created = self.ensure_prefix(&self.path).await? || account_created;
        if created {
            info!(container = %self.name, "created container");
        }
        Ok(created)
    }

    /// Writes `data` to `location`, replacing whatever was stored there.
    pub async fn put(&self, location: &Path, data: Bytes) -> Result<PutResult> {
        self.put_with_mode(location, data, PutMode::Overwrite).await
    }

    /// Writes `data` to `location` only if nothing is stored there yet.
    pub async fn put_if_absent(&self, location: &Path, data: Bytes) -> Result<PutResult> {
        self.put_with_mode(location, data, PutMode::Create)
            .await
            .map_err(|err| match err.downcast_ref::<object_store::Error>() {
                Some(object_store::Error::AlreadyExists { .. }) => {
                    anyhow!("object already exists: {}", location)
                }
                _ => err,
            })
    }

    async fn put_with_mode(&self, location: &Path, data: Bytes, mode: PutMode) -> Result<PutResult> {
        let mut hasher = Sha256::new();
        hasher.update(&data);
        let size_bytes = data.len() as u64;

        let result = self
            .object_store
            .put_opts(location, PutPayload::from(data), mode.into())
            .await?;

        Ok(PutResult {
            size_bytes,
            sha256_hash: format!("{:x}", hasher.finalize()),
            e_tag: result.e_tag,
        })
    }

    /// Reads the object at `location` together with its metadata.
    pub async fn get(&self, location: &Path) -> Result<Option<(ObjectMeta, Bytes)>> {
        match self.object_store.get(location).await {
            Ok(result) => {
                let meta = result.meta.clone();
                let bytes = result
                    .bytes()
                    .await
                    .map_err(|e| anyhow!("error reading object {:?}: {:?}", location, e))?;
                Ok(Some((meta, bytes)))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(err) => Err(anyhow!("can't get object {:?}: {:?}", location, err)),
        }
    }

    /// Lists every object below `prefix`, recursively, sorted by location.
    /// Marker objects are left out.
    pub async fn list(&self, prefix: &Path) -> Result<Vec<ObjectMeta>> {
        let mut objects: Vec<ObjectMeta> = match self
            .object_store
            .list(Some(prefix))
            .try_collect()
            .await
        {
            Ok(objects) => objects,
            Err(object_store::Error::NotFound { .. }) => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        objects.retain(|meta| !is_marker(meta));
        objects.sort_by(|a, b| a.location.cmp(&b.location));
        Ok(objects)
    }

    /// Lists the objects directly below `prefix`, without descending into
    /// nested prefixes. Marker objects are left out.
    pub async fn list_direct(&self, prefix: &Path) -> Result<Vec<ObjectMeta>> {
        let mut objects = match self.object_store.list_with_delimiter(Some(prefix)).await {
            Ok(result) => result.objects,
            Err(object_store::Error::NotFound { .. }) => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        objects.retain(|meta| !is_marker(meta));
        objects.sort_by(|a, b| a.location.cmp(&b.location));
        Ok(objects)
    }
}

async fn create_account_container(client: &ContainerClient) -> Result<bool> {
    if client.exists().await? {
        return Ok(false);
    }
    match client.create().await {
        Ok(_) => Ok(true),
        Err(err) => {
            // another instance may have created it in the meantime
            if client.exists().await? {
                Ok(false)
            } else {
                Err(err.into())
            }
        }
    }
}

fn is_marker(meta: &ObjectMeta) -> bool {
    meta.location.filename() == Some(MARKER_OBJECT)
}

/// Decodes the last segment of `location` back to the name it was stored
/// under. object_store percent-encodes characters such as `%`, `#` and `/`
/// inside a path segment.
pub(crate) fn decoded_file_name(location: &Path) -> Option<String> {
    location
        .filename()
        .map(|name| percent_decode_str(name).decode_utf8_lossy().into_owned())
}

/// The container that receives uploaded blobs.
#[derive(Debug, Clone)]
pub struct BlobStorage {
    container: Container,
}

impl BlobStorage {
    /// Opens the named blob container and creates it when it is missing.
    pub async fn new(account: &StorageAccount, container_name: &str) -> Result<Self> {
        let container = account.container(container_name)?;
        container.create_if_not_exists().await?;
        Ok(Self { container })
    }

    pub fn container_name(&self) -> &str {
        self.container.name()
    }

    pub async fn upload(&self, blob_name: &str, data: Bytes) -> Result<PutResult> {
        let location = self.container.path().child(blob_name);
        self.container.put(&location, data).await
    }

    pub async fn list_blobs(&self) -> Result<Vec<String>> {
        let objects = self.container.list_direct(self.container.path()).await?;
        Ok(objects
            .into_iter()
            .filter_map(|meta| decoded_file_name(&meta.location))
            .collect())
    }

    pub async fn read_bytes(&self, blob_name: &str) -> Result<Bytes> {
        let location = self.container.path().child(blob_name);
        let (_, bytes) = self
            .container
            .get(&location)
            .await?
            .ok_or_else(|| anyhow!("blob not found: {}", blob_name))?;
        Ok(bytes)
    }
}
