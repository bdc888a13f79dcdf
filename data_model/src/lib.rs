pub mod test_objects;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

pub const CUSTOMER_PARTITION: &str = "CUSTOMER";
pub const ORDER_PARTITION: &str = "ORDER";
pub const PRODUCT_PARTITION: &str = "PRODUCT";

pub const DEFAULT_ORDER_STATUS: &str = "PENDING";

/// Key and bookkeeping columns every table row carries.
///
/// `timestamp` and `etag` are owned by the table store: they are filled in
/// when a row is read back and never written by callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SystemProperties {
    #[serde(default)]
    pub partition_key: String,
    #[serde(default)]
    pub row_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, rename = "ETag", skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl SystemProperties {
    fn new(partition_key: &str) -> Self {
        Self {
            partition_key: partition_key.to_string(),
            row_key: Uuid::new_v4().to_string(),
            timestamp: None,
            etag: None,
        }
    }
}

/// A record stored in a table under a fixed partition.
pub trait TableEntity: Serialize + DeserializeOwned + Send + Sync {
    const PARTITION_KEY: &'static str;

    fn system_properties(&self) -> &SystemProperties;

    fn system_properties_mut(&mut self) -> &mut SystemProperties;

    fn partition_key(&self) -> &str {
        &self.system_properties().partition_key
    }

    fn row_key(&self) -> &str {
        &self.system_properties().row_key
    }

    /// Replaces whatever keys the record came with by the type's partition
    /// and a freshly generated row key, and clears the read-only columns.
    fn assign_new_keys(&mut self) {
        *self.system_properties_mut() = SystemProperties::new(Self::PARTITION_KEY);
    }

    fn set_read_properties(&mut self, timestamp: DateTime<Utc>, etag: Option<String>) {
        let properties = self.system_properties_mut();
        properties.timestamp = Some(timestamp);
        properties.etag = etag;
    }
}

macro_rules! table_entity {
    ($entity:ty, $partition:expr) => {
        impl TableEntity for $entity {
            const PARTITION_KEY: &'static str = $partition;

            fn system_properties(&self) -> &SystemProperties {
                &self.system
            }

            fn system_properties_mut(&mut self) -> &mut SystemProperties {
                &mut self.system
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Customer {
    #[serde(flatten)]
    pub system: SystemProperties,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub address: String,
}

impl Default for Customer {
    fn default() -> Self {
        Self {
            system: SystemProperties::new(CUSTOMER_PARTITION),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            phone_number: String::new(),
            address: String::new(),
        }
    }
}

impl Customer {
    /// Case-insensitive substring match against first name, last name and
    /// email.
    pub fn matches_search_term(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        [&self.first_name, &self.last_name, &self.email]
            .iter()
            .any(|field| field.to_lowercase().contains(&term))
    }
}

table_entity!(Customer, CUSTOMER_PARTITION);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Order {
    #[serde(flatten)]
    pub system: SystemProperties,
    // customer the order belongs to, free text
    pub first_name: String,
    pub product_name: String,
    pub quantity: i32,
    pub order_date: DateTime<Utc>,
    pub status: String,
    pub shipping_address: String,
    pub total_price: f64,
}

impl Default for Order {
    fn default() -> Self {
        Self {
            system: SystemProperties::new(ORDER_PARTITION),
            first_name: String::new(),
            product_name: String::new(),
            quantity: 0,
            order_date: Utc::now(),
            status: DEFAULT_ORDER_STATUS.to_string(),
            shipping_address: String::new(),
            total_price: 0.0,
        }
    }
}

table_entity!(Order, ORDER_PARTITION);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Product {
    #[serde(flatten)]
    pub system: SystemProperties,
    pub product_name: String,
    pub description: String,
    pub price: f64,
    pub stock_quantity: i32,
    pub image_url: String,
}

impl Default for Product {
    fn default() -> Self {
        Self {
            system: SystemProperties::new(PRODUCT_PARTITION),
            product_name: String::new(),
            description: String::new(),
            price: 0.0,
            stock_quantity: 0,
            image_url: String::new(),
        }
    }
}

table_entity!(Product, PRODUCT_PARTITION);
