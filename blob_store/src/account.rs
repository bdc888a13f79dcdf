use std::{collections::HashMap, fmt, sync::Arc};

use anyhow::{anyhow, Result};
use azure_storage::{CloudLocation, StorageCredentials};
use azure_storage_blobs::prelude::{BlobServiceClient, ClientBuilder};
use object_store::{
    azure::MicrosoftAzureBuilder,
    parse_url_opts,
    path::Path,
    ObjectStore,
    ObjectStoreScheme,
};
use tracing::info;
use url::Url;

use crate::Container;

const DEFAULT_ENDPOINTS_PROTOCOL: &str = "https";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";
const EMULATOR_ACCOUNT: &str = "devstoreaccount1";

/// A storage account resolved from a single connection string.
///
/// Two forms are accepted:
/// - an object store URL (`file:///data`, `memory:///`, `s3://bucket/prefix`,
///   `az://container/prefix`). Every container is a prefix below the URL's
///   path inside one shared object store.
/// - an account connection string made of `key=value;` pairs
///   (`AccountName`, `AccountKey`, `BlobEndpoint`, ...), or
///   `UseDevelopmentStorage=true`. Every container is an account container
///   of the same name.
#[derive(Debug, Clone)]
pub struct StorageAccount {
    backend: AccountBackend,
}

#[derive(Debug, Clone)]
enum AccountBackend {
    Rooted {
        object_store: Arc<dyn ObjectStore>,
        root: Path,
    },
    Azure(AzureAccount),
}

#[derive(Clone, PartialEq, Eq)]
pub struct AzureAccount {
    pub account_name: Option<String>,
    pub account_key: Option<String>,
    pub blob_endpoint: Option<String>,
    pub use_emulator: bool,
}

impl fmt::Debug for AzureAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureAccount")
            .field("account_name", &self.account_name)
            .field("blob_endpoint", &self.blob_endpoint)
            .field("use_emulator", &self.use_emulator)
            .finish()
    }
}

impl StorageAccount {
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let connection_string = connection_string.trim();
        if connection_string.is_empty() {
            return Err(anyhow!("storage connection string is empty"));
        }

        if is_key_value_connection_string(connection_string) {
            let account = AzureAccount::parse(connection_string)?;
            info!(
                account = account.account_name.as_deref().unwrap_or(EMULATOR_ACCOUNT),
                emulator = account.use_emulator,
                "using storage account connection string"
            );
            return Ok(Self {
                backend: AccountBackend::Azure(account),
            });
        }

        let (object_store, root) = Self::build_object_store(connection_string)?;
        info!("using object store at {}", redact_url(connection_string));
        Ok(Self {
            backend: AccountBackend::Rooted {
                object_store: Arc::from(object_store),
                root,
            },
        })
    }

    pub fn build_object_store(url_str: &str) -> Result<(Box<dyn ObjectStore>, Path)> {
        let url = &url_str.parse::<Url>()?;
        let (scheme, _) = ObjectStoreScheme::parse(url)?;
        // inject provider environment variables so keys take priority over instance
        // metadata credentials.
        let opts = match scheme {
            ObjectStoreScheme::AmazonS3 => env_options("AWS_"),
            ObjectStoreScheme::MicrosoftAzure => env_options("AZURE_"),
            _ => Vec::new(),
        };
        Ok(parse_url_opts(url, opts)?)
    }

    /// Opens the named container. Nothing is written until the container is
    /// used; call [`Container::create_if_not_exists`] to materialize it.
    pub fn container(&self, name: &str) -> Result<Container> {
        validate_container_name(name)?;
        match &self.backend {
            AccountBackend::Rooted { object_store, root } => Ok(Container::new(
                name,
                object_store.clone(),
                root.child(name),
                None,
            )),
            AccountBackend::Azure(account) => {
                let object_store = account.build_container_store(name)?;
                let container_client = account.blob_service_client().container_client(name);
                Ok(Container::new(
                    name,
                    Arc::new(object_store),
                    Path::default(),
                    Some(container_client),
                ))
            }
        }
    }
}

impl AzureAccount {
    pub fn parse(connection_string: &str) -> Result<Self> {
        let settings: HashMap<String, String> = connection_string
            .split(';')
            .filter(|pair| !pair.trim().is_empty())
            .map(|pair| {
                pair.split_once('=')
                    .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim().to_string()))
                    .ok_or_else(|| anyhow!("malformed connection string segment: {}", pair))
            })
            .collect::<Result<_>>()?;

        let use_emulator = settings
            .get("usedevelopmentstorage")
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));
        if use_emulator {
            return Ok(Self {
                account_name: None,
                account_key: None,
                blob_endpoint: settings.get("blobendpoint").cloned(),
                use_emulator,
            });
        }

        let account_name = settings
            .get("accountname")
            .cloned()
            .ok_or_else(|| anyhow!("connection string is missing AccountName"))?;
        let account_key = settings.get("accountkey").cloned();
        let blob_endpoint = match settings.get("blobendpoint") {
            Some(endpoint) => Some(endpoint.clone()),
            None => {
                let protocol = settings
                    .get("defaultendpointsprotocol")
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_ENDPOINTS_PROTOCOL);
                let suffix = settings
                    .get("endpointsuffix")
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
                Some(format!("{protocol}://{account_name}.blob.{suffix}"))
            }
        };

        Ok(Self {
            account_name: Some(account_name),
            account_key,
            blob_endpoint,
            use_emulator,
        })
    }

    fn build_container_store(&self, container: &str) -> Result<impl ObjectStore> {
        let mut builder = MicrosoftAzureBuilder::new().with_container_name(container);
        if self.use_emulator {
            builder = builder.with_use_emulator(true);
        }
        if let Some(account_name) = &self.account_name {
            builder = builder.with_account(account_name);
        }
        if let Some(account_key) = &self.account_key {
            builder = builder.with_access_key(account_key);
        }
        if let Some(endpoint) = &self.blob_endpoint {
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(endpoint.starts_with("http://"));
        }
        Ok(builder.build()?)
    }

    /// Client used for account-level operations object_store does not
    /// cover, such as creating a container.
    fn blob_service_client(&self) -> BlobServiceClient {
        let account_name = self
            .account_name
            .clone()
            .unwrap_or_else(|| EMULATOR_ACCOUNT.to_string());
        let credentials = match (&self.account_key, self.use_emulator) {
            (Some(key), _) => StorageCredentials::access_key(account_name.clone(), key.clone()),
            (None, true) => StorageCredentials::emulator(),
            (None, false) => StorageCredentials::anonymous(),
        };
        let builder = match &self.blob_endpoint {
            Some(endpoint) => ClientBuilder::with_location(
                CloudLocation::Custom {
                    account: account_name,
                    uri: endpoint.trim_end_matches('/').to_string(),
                },
                credentials,
            ),
            None if self.use_emulator => ClientBuilder::emulator(),
            None => ClientBuilder::new(account_name, credentials),
        };
        builder.blob_service_client()
    }
}

fn is_key_value_connection_string(connection_string: &str) -> bool {
    connection_string
        .split(';')
        .next()
        .and_then(|segment| segment.split_once('='))
        .is_some_and(|(key, _)| !key.contains(':') && !key.contains('/'))
}

fn env_options(prefix: &str) -> Vec<(String, String)> {
    std::env::vars_os()
        .filter_map(|(os_key, os_value)| {
            let (key, value) = (os_key.to_str()?, os_value.to_str()?);
            key.starts_with(prefix)
                .then(|| (key.to_ascii_lowercase(), value.to_string()))
        })
        .collect()
}

fn validate_container_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(anyhow!("invalid container name: {:?}", name));
    }
    Ok(())
}

fn redact_url(url_str: &str) -> String {
    match Url::parse(url_str) {
        Ok(mut url) => {
            url.set_query(None);
            let _ = url.set_password(None);
            url.to_string()
        }
        Err(_) => "<unparsable url>".to_string(),
    }
}
