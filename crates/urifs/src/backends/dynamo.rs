//! Key-value table mapping.
//!
//! `dynamodb://table` opens a [`DynamoMap`]: keys are values of the table's
//! partition key, values are whole items as JSON objects.
//!
//! | Operation            | Table call                                      |
//! |----------------------|-------------------------------------------------|
//! | `get`                | item lookup by partition key                    |
//! | `keys` / [`items`]   | full scan, following the continuation key       |
//! | `len`                | the table's reported item count                 |
//! | `insert`             | read, merge the new fields, write back          |
//! | `remove`             | delete by partition key                         |
//!
//! [`items`]: DynamoMap::items

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, TryStreamExt};
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::logging_impl::redact_uri;
use crate::map::{Mapping, Value};
use crate::options::{Credentials, OpenOptions};
use crate::uri::Uri;

/// One table item: attribute name to value.
pub type Item = serde_json::Map<String, Value>;

/// Lazy sequence of scanned items.
pub type ItemStream = BoxStream<'static, Result<Item>>;

/// Type of a table's partition key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyKind {
    /// String keys.
    #[default]
    String,
    /// Numeric keys; mapping keys are parsed as numbers.
    Number,
}

/// What the mapping needs to know about a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    /// Partition key attribute name.
    pub key_attribute: String,
    /// Partition key type.
    pub key_kind: KeyKind,
    /// Item count as reported by the service (may lag behind writes).
    pub item_count: u64,
}

/// One page of a scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPage {
    /// Items on this page.
    pub items: Vec<Item>,
    /// Where the next page starts; `None` on the last page.
    pub last_evaluated_key: Option<Item>,
}

/// Table primitives the mapping calls into.
///
/// A missing table is reported as [`Error::Io`] with
/// [`std::io::ErrorKind::NotFound`]; every other failure is passed through.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Key schema and item count of `table`.
    async fn describe(&self, table: &str) -> Result<TableInfo>;

    /// Item stored under `key`, if any.
    async fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>>;

    /// Create or replace an item.
    async fn put_item(&self, table: &str, item: Item) -> Result<()>;

    /// Delete the item under `key`. Deleting a missing item succeeds.
    async fn delete_item(&self, table: &str, key: &Item) -> Result<()>;

    /// One page of items, starting after `start` (from the beginning when
    /// `None`).
    async fn scan(&self, table: &str, start: Option<Item>) -> Result<ScanPage>;
}

/// Builds a [`KeyValueStore`] client from normalized credentials.
#[async_trait]
pub trait KeyValueConnector: Send + Sync {
    /// Create a client.
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn KeyValueStore>>;
}

#[cfg(feature = "dynamodb")]
pub(crate) fn default_connector() -> Arc<dyn KeyValueConnector> {
    Arc::new(super::dynamo_sdk::DynamoConnector)
}

#[cfg(not(feature = "dynamodb"))]
pub(crate) fn default_connector() -> Arc<dyn KeyValueConnector> {
    Arc::new(DisabledConnector)
}

#[cfg(not(feature = "dynamodb"))]
struct DisabledConnector;

#[cfg(not(feature = "dynamodb"))]
#[async_trait]
impl KeyValueConnector for DisabledConnector {
    async fn connect(&self, _credentials: &Credentials) -> Result<Arc<dyn KeyValueStore>> {
        Err(Error::NotImplemented(
            "key-value table client not built in (enable the `dynamodb` feature or register a connector)"
                .into(),
        ))
    }
}

/// Mapping over a key-value table.
///
/// The client is created on first use and reused afterwards; the partition
/// key schema is looked up once.
pub struct DynamoMap {
    connector: Arc<dyn KeyValueConnector>,
    uri: Uri,
    table: String,
    credentials: Credentials,
    store: Option<Arc<dyn KeyValueStore>>,
    key: Option<(String, KeyKind)>,
}

impl DynamoMap {
    /// Mapping over the table named by the URI host. No connection is made.
    pub fn new(connector: Arc<dyn KeyValueConnector>, uri: Uri, options: OpenOptions) -> Result<Self> {
        let table = uri
            .host()
            .ok_or_else(|| Error::invalid_uri(redact_uri(uri.as_str()), "missing table name"))?
            .to_string();
        Ok(Self {
            connector,
            uri,
            table,
            credentials: options.credentials,
            store: None,
            key: None,
        })
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    async fn store(&mut self) -> Result<Arc<dyn KeyValueStore>> {
        if let Some(store) = &self.store {
            return Ok(Arc::clone(store));
        }
        self.credentials.rename("access_key", "aws_access_key_id");
        self.credentials.rename("secret_key", "aws_secret_access_key");
        tracing::debug!(uri = %redact_uri(self.uri.as_str()), "connecting to table");
        let store = self.connector.connect(&self.credentials).await?;
        self.store = Some(Arc::clone(&store));
        Ok(store)
    }

    async fn key_schema(&mut self) -> Result<(String, KeyKind)> {
        if let Some(key) = &self.key {
            return Ok(key.clone());
        }
        let info = self.store().await?.describe(&self.table).await?;
        let key = (info.key_attribute, info.key_kind);
        self.key = Some(key.clone());
        Ok(key)
    }

    /// Single-attribute item addressing `key`.
    async fn item_key(&mut self, key: &str) -> Result<Item> {
        let (attribute, kind) = self.key_schema().await?;
        let value = match kind {
            KeyKind::String => Value::String(key.to_string()),
            KeyKind::Number => serde_json::from_str::<serde_json::Number>(key)
                .map(Value::Number)
                .map_err(|_| Error::Parse(format!("key '{key}' is not a number")))?,
        };
        Ok(Item::from_iter([(attribute, value)]))
    }

    /// Every item in the table, one scan page at a time.
    ///
    /// Connecting happens here; scan failures come out of the stream.
    pub async fn items(&mut self) -> Result<ItemStream> {
        let store = self.store().await?;
        Ok(scan_items(store, self.table.clone()))
    }
}

/// Position of a scan between pages.
enum Cursor {
    Start,
    After(Item),
    Done,
}

fn scan_items(store: Arc<dyn KeyValueStore>, table: String) -> ItemStream {
    let pages = stream::try_unfold(
        (store, table, Cursor::Start),
        |(store, table, cursor)| async move {
            let start = match cursor {
                Cursor::Done => return Ok(None),
                Cursor::Start => None,
                Cursor::After(key) => Some(key),
            };
            let page = store.scan(&table, start).await?;
            tracing::trace!(table = %table, items = page.items.len(), "scanned page");
            let next = match page.last_evaluated_key {
                Some(key) => Cursor::After(key),
                None => Cursor::Done,
            };
            Ok::<_, Error>(Some((page.items, (store, table, next))))
        },
    );
    Box::pin(
        pages
            .map_ok(|items| stream::iter(items.into_iter().map(Ok::<Item, Error>)))
            .try_flatten(),
    )
}

/// Partition key value as a mapping key.
pub(crate) fn key_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Mapping for DynamoMap {
    async fn get(&mut self, key: &str) -> Result<Value> {
        let item_key = self.item_key(key).await?;
        let store = self.store().await?;
        match store.get_item(&self.table, &item_key).await? {
            Some(item) => Ok(Value::Object(item)),
            None => Err(Error::KeyNotFound(key.to_string())),
        }
    }

    async fn keys(&mut self) -> Result<Vec<String>> {
        let (attribute, _) = self.key_schema().await?;
        let items: Vec<Item> = self.items().await?.try_collect().await?;
        Ok(items
            .iter()
            .filter_map(|item| item.get(&attribute))
            .map(key_string)
            .collect())
    }

    async fn len(&mut self) -> Result<usize> {
        let info = self.store().await?.describe(&self.table).await?;
        usize::try_from(info.item_count)
            .map_err(|_| Error::Parse(format!("item count {} overflows", info.item_count)))
    }

    /// Merge the fields of `value` (an object) into the item under `key`,
    /// creating it when missing. The partition key itself is never changed.
    async fn insert(&mut self, key: &str, value: Value) -> Result<()> {
        let Value::Object(fields) = value else {
            return Err(Error::Parse(format!("value for '{key}' must be a mapping")));
        };
        let item_key = self.item_key(key).await?;
        let store = self.store().await?;
        let mut item = store
            .get_item(&self.table, &item_key)
            .await?
            .unwrap_or_default();
        item.extend(fields);
        item.extend(item_key);
        store.put_item(&self.table, item).await
    }

    async fn remove(&mut self, key: &str) -> Result<()> {
        let item_key = self.item_key(key).await?;
        let store = self.store().await?;
        store.delete_item(&self.table, &item_key).await
    }
}

impl fmt::Debug for DynamoMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamoMap")
            .field("uri", &redact_uri(self.uri.as_str()))
            .field("connected", &self.store.is_some())
            .finish_non_exhaustive()
    }
}
