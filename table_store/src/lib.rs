//! Entity tables kept in object storage.
//!
//! Rows live at `<table>/<partition>/<row>` inside the account's `tables`
//! container, one JSON document per row. The row's `Timestamp` and `ETag`
//! come from the object's last-modified time and entity tag.

use anyhow::{anyhow, Context, Result};
use blob_store::{Container, StorageAccount};
use bytes::Bytes;
use data_model::TableEntity;
use object_store::{path::Path, ObjectMeta};
use tracing::debug;

pub const TABLES_CONTAINER: &str = "tables";

#[derive(Debug, Clone)]
pub struct TableServiceClient {
    container: Container,
}

impl TableServiceClient {
    pub fn new(account: &StorageAccount) -> Result<Self> {
        Ok(Self {
            container: account.container(TABLES_CONTAINER)?,
        })
    }

    pub fn get_table_client(&self, table_name: &str) -> Result<TableClient> {
        if table_name.is_empty() || !table_name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(anyhow!("invalid table name: {:?}", table_name));
        }
        Ok(TableClient {
            name: table_name.to_string(),
            path: self.container.path().child(table_name),
            container: self.container.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct TableClient {
    name: String,
    container: Container,
    path: Path,
}

impl TableClient {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates the shared tables container if needed, then this table.
    pub async fn create_if_not_exists(&self) -> Result<bool> {
        self.container.create_if_not_exists().await?;
        self.container.ensure_prefix(&self.path).await
    }

    fn row_path(&self, partition_key: &str, row_key: &str) -> Path {
        self.path.child(partition_key).child(row_key)
    }

    /// Inserts a new row. Fails if a row with the same partition and row key
    /// already exists.
    pub async fn add_entity<E: TableEntity>(&self, entity: &E) -> Result<()> {
        if entity.partition_key().is_empty() || entity.row_key().is_empty() {
            return Err(anyhow!(
                "entity in table {} needs both a partition key and a row key",
                self.name
            ));
        }
        let location = self.row_path(entity.partition_key(), entity.row_key());
        let body = serde_json::to_vec(entity)?;
        self.container
            .put_if_absent(&location, Bytes::from(body))
            .await
            .with_context(|| {
                format!(
                    "unable to add entity {}/{} to table {}",
                    entity.partition_key(),
                    entity.row_key(),
                    self.name
                )
            })?;
        debug!(table = %self.name, row_key = entity.row_key(), "added entity");
        Ok(())
    }

    pub async fn get_entity<E: TableEntity>(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<E>> {
        let location = self.row_path(partition_key, row_key);
        match self.container.get(&location).await? {
            Some((meta, bytes)) => Ok(Some(decode_entity(meta, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Every row of the table, ordered by partition key then row key.
    pub async fn query<E: TableEntity>(&self) -> Result<Vec<E>> {
        self.query_prefix(&self.path).await
    }

    /// Every row of one partition, ordered by row key.
    pub async fn query_partition<E: TableEntity>(&self, partition_key: &str) -> Result<Vec<E>> {
        self.query_prefix(&self.path.child(partition_key)).await
    }

    async fn query_prefix<E: TableEntity>(&self, prefix: &Path) -> Result<Vec<E>> {
        let mut entities = Vec::new();
        for meta in self.container.list(prefix).await? {
            if let Some((meta, bytes)) = self.container.get(&meta.location).await? {
                entities.push(decode_entity(meta, &bytes)?);
            }
        }
        Ok(entities)
    }
}

fn decode_entity<E: TableEntity>(meta: ObjectMeta, bytes: &[u8]) -> Result<E> {
    let mut entity: E = serde_json::from_slice(bytes)
        .with_context(|| format!("unable to decode entity at {}", meta.location))?;
    entity.set_read_properties(meta.last_modified, meta.e_tag);
    Ok(entity)
}
