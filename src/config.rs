use std::net::SocketAddr;

use anyhow::{anyhow, Result};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

const LOCAL_ENV: &str = "local";

/// Environment variables holding the storage connection string, in lookup
/// order.
pub const CONNECTION_STRING_VARS: [&str; 2] = ["StorageConnectionString", "AzureWebJobsStorage"];

/// Prefix for environment overrides of the config file, e.g.
/// `RETAIL_LISTEN_ADDR` or `RETAIL_FILE_SHARE__DIRECTORY`.
const ENV_PREFIX: &str = "RETAIL_";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueBackend {
    InMemory,
    AmazonSqs { queue_url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub name: String,
    pub backend: QueueBackend,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "order".to_string(),
            backend: QueueBackend::InMemory,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileShareConfig {
    pub share_name: String,
    pub directory: String,
}

impl Default for FileShareConfig {
    fn default() -> Self {
        Self {
            share_name: "contracts".to_string(),
            directory: "uploaded".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    pub customers: String,
    pub orders: String,
    pub products: String,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            customers: "customers".to_string(),
            orders: "orders".to_string(),
            products: "products".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    // Optional path to write local logs to a daily rotating file.
    pub local_log_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub env: String,
    pub listen_addr: String,
    pub blob_container: String,
    pub file_share: FileShareConfig,
    pub tables: TablesConfig,
    pub order_queue: QueueConfig,
    pub telemetry: TelemetryConfig,
    /// Never read from the config file, only from [`CONNECTION_STRING_VARS`].
    #[serde(skip)]
    pub storage_connection_string: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            env: LOCAL_ENV.to_string(),
            listen_addr: "0.0.0.0:7071".to_string(),
            blob_container: "uploads".to_string(),
            file_share: Default::default(),
            tables: Default::default(),
            order_queue: Default::default(),
            telemetry: Default::default(),
            storage_connection_string: None,
        }
    }
}

impl ServerConfig {
    /// Loads the config from built-in defaults, the optional YAML file and
    /// `RETAIL_` environment overrides, then resolves the storage connection
    /// string from the process environment.
    pub fn load(path: Option<&str>) -> Result<ServerConfig> {
        let mut figment = Figment::from(Serialized::defaults(ServerConfig::default()));
        if let Some(path) = path {
            let config_str = std::fs::read_to_string(path)?;
            figment = figment.merge(Yaml::string(&config_str));
        }
        let mut config =
            Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))?;
        config.storage_connection_string =
            Some(resolve_connection_string(|key| std::env::var(key).ok())?);
        Ok(config)
    }

    #[cfg(test)]
    fn from_yaml_str(config_str: &str) -> Result<ServerConfig> {
        Self::from_figment(
            Figment::from(Serialized::defaults(ServerConfig::default()))
                .merge(Yaml::string(config_str)),
        )
    }

    fn from_figment(figment: Figment) -> Result<ServerConfig> {
        let config: ServerConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(anyhow!("invalid listen address: {}", self.listen_addr));
        }
        let names = [
            ("blob_container", &self.blob_container),
            ("file_share.share_name", &self.file_share.share_name),
            ("file_share.directory", &self.file_share.directory),
            ("tables.customers", &self.tables.customers),
            ("tables.orders", &self.tables.orders),
            ("tables.products", &self.tables.products),
            ("order_queue.name", &self.order_queue.name),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(anyhow!("{} must not be empty", field));
            }
        }
        Ok(())
    }

    pub fn structured_logging(&self) -> bool {
        self.env != LOCAL_ENV
    }
}

/// Returns the first non-empty value of [`CONNECTION_STRING_VARS`].
pub fn resolve_connection_string(lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
    CONNECTION_STRING_VARS
        .iter()
        .filter_map(|key| lookup(key))
        .find(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            anyhow!(
                "storage connection string not found, set '{}' or '{}'",
                CONNECTION_STRING_VARS[0],
                CONNECTION_STRING_VARS[1]
            )
        })
}
