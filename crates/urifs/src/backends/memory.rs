//! In-process service implementations.
//!
//! [`MemoryObjectStore`], [`MemorySftp`] and [`MemoryKeyValueStore`] satisfy
//! the object-storage, SFTP and key-value table service interfaces without
//! any network. Clones share state, so a test can keep one clone to seed and
//! inspect while the registry holds another.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use urifs::{FileHandle, OpenOptions, SchemeRegistry, Uri};
//! use urifs::backends::{MemoryObjectStore, S3Backend, S3File};
//!
//! # #[tokio::main]
//! # async fn main() -> urifs::Result<()> {
//! let store = MemoryObjectStore::new();
//! store.put_object("bucket", "greeting.txt", "hi");
//!
//! let registry = SchemeRegistry::new();
//! let backend = S3Backend::new(Arc::new(store.clone()));
//! registry.register_file("s3", move |uri: Uri, options: OpenOptions| {
//!     Ok(Box::new(S3File::new(backend.clone(), uri, options)))
//! });
//!
//! let mut file = registry.open("s3://bucket/greeting.txt", OpenOptions::new())?;
//! assert_eq!(file.read_to_string().await?, "hi");
//! # Ok(())
//! # }
//! ```

#![allow(clippy::unwrap_used)] // RwLock poisoning only

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::ops::Bound;
use std::path::Path;
use std::sync::{Arc, RwLock};

use super::dynamo::{
    Item, KeyKind, KeyValueConnector, KeyValueStore, ScanPage, TableInfo, key_string,
};
use super::s3::{ObjectStore, ObjectStoreConnector};
use super::sftp::{RemoteEntry, SftpConnector, SftpSession};
use crate::error::{Error, Result};
use crate::map::Value;
use crate::options::Credentials;

fn not_found(what: &str) -> Error {
    std::io::Error::new(ErrorKind::NotFound, format!("{what} not found")).into()
}

#[derive(Debug, Default)]
struct StoreState {
    buckets: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    last_credentials: Option<Credentials>,
}

/// Object store held in memory.
///
/// Buckets must exist before objects are written through the
/// [`ObjectStore`] interface; [`put_object`](Self::put_object) creates them
/// on the fly for seeding.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    state: Arc<RwLock<StoreState>>,
}

impl MemoryObjectStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty bucket (no-op when it exists).
    pub fn create_bucket(&self, bucket: &str) {
        let mut state = self.state.write().unwrap();
        state.buckets.entry(bucket.to_string()).or_default();
    }

    /// Seed an object, creating its bucket if needed.
    pub fn put_object(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        let mut state = self.state.write().unwrap();
        state
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), body.into());
    }

    /// Stored object body.
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let state = self.state.read().unwrap();
        state.buckets.get(bucket)?.get(key).cloned()
    }

    /// Credentials received by the most recent connect.
    pub fn last_credentials(&self) -> Option<Credentials> {
        self.state.read().unwrap().last_credentials.clone()
    }

    fn with_bucket<T>(
        &self,
        bucket: &str,
        f: impl FnOnce(&BTreeMap<String, Vec<u8>>) -> Result<T>,
    ) -> Result<T> {
        let state = self.state.read().unwrap();
        match state.buckets.get(bucket) {
            Some(objects) => f(objects),
            None => Err(Error::backend(
                "s3",
                format!("NoSuchBucket: the bucket '{bucket}' does not exist"),
            )),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn head(&self, bucket: &str, key: &str) -> Result<()> {
        self.with_bucket(bucket, |objects| {
            if objects.contains_key(key) {
                Ok(())
            } else {
                Err(not_found(key))
            }
        })
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.with_bucket(bucket, |objects| {
            objects.get(key).cloned().ok_or_else(|| not_found(key))
        })
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let Some(objects) = state.buckets.get_mut(bucket) else {
            return Err(Error::backend(
                "s3",
                format!("NoSuchBucket: the bucket '{bucket}' does not exist"),
            ));
        };
        objects.insert(key.to_string(), body);
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        self.with_bucket(bucket, |objects| {
            Ok(objects
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect())
        })
    }
}

#[async_trait]
impl ObjectStoreConnector for MemoryObjectStore {
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn ObjectStore>> {
        self.state.write().unwrap().last_credentials = Some(credentials.clone());
        Ok(Arc::new(self.clone()))
    }
}

#[derive(Debug, Default)]
struct SftpState {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    last_host: Option<String>,
    last_credentials: Option<Credentials>,
}

/// SFTP server held in memory.
///
/// Paths are stored as given; `.` is the session's working directory and
/// `/` the root, both always exist. A trailing `/` on a looked-up directory
/// is ignored.
#[derive(Debug, Clone, Default)]
pub struct MemorySftp {
    state: Arc<RwLock<SftpState>>,
}

impl MemorySftp {
    /// Empty server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, creating its parent directories.
    pub fn add_file(&self, path: &str, body: impl Into<Vec<u8>>) {
        let mut state = self.state.write().unwrap();
        let mut parent = path;
        while let Some((head, _)) = parent.rsplit_once('/') {
            if head.is_empty() || head == "." {
                break;
            }
            state.dirs.insert(head.to_string());
            parent = head;
        }
        state.files.insert(path.to_string(), body.into());
    }

    /// Host named by the most recent connect.
    pub fn last_host(&self) -> Option<String> {
        self.state.read().unwrap().last_host.clone()
    }

    /// Credentials received by the most recent connect.
    pub fn last_credentials(&self) -> Option<Credentials> {
        self.state.read().unwrap().last_credentials.clone()
    }
}

fn normalize(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" if path.starts_with('/') => "/",
        trimmed => trimmed,
    }
}

fn child_of<'a>(dir: &str, path: &'a str) -> Option<&'a str> {
    let rest = if dir == "." {
        path.strip_prefix("./").unwrap_or(path)
    } else if dir == "/" {
        path.strip_prefix('/')?
    } else {
        path.strip_prefix(dir)?.strip_prefix('/')?
    };
    (!rest.is_empty() && !rest.contains('/')).then_some(rest)
}

#[async_trait]
impl SftpSession for MemorySftp {
    async fn exists(&self, path: &str) -> Result<bool> {
        let state = self.state.read().unwrap();
        if state.files.contains_key(path) {
            return Ok(true);
        }
        let path = normalize(path);
        Ok(path == "." || path == "/" || state.dirs.contains(path))
    }

    async fn get(&self, remote: &str, local: &Path) -> Result<()> {
        let body = {
            let state = self.state.read().unwrap();
            state.files.get(remote).cloned().ok_or_else(|| not_found(remote))?
        };
        tokio::fs::write(local, body).await?;
        Ok(())
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let state = self.state.read().unwrap();
        let path = normalize(path);
        if path != "." && path != "/" && !state.dirs.contains(path) {
            return Err(not_found(path));
        }
        let dirs = state
            .dirs
            .iter()
            .filter_map(|dir| child_of(path, dir))
            .map(|name| RemoteEntry::dir(name));
        let files = state
            .files
            .keys()
            .filter_map(|file| child_of(path, file))
            .map(|name| RemoteEntry::file(name));
        Ok(dirs.chain(files).collect())
    }
}

#[async_trait]
impl SftpConnector for MemorySftp {
    async fn connect(&self, host: &str, credentials: &Credentials) -> Result<Box<dyn SftpSession>> {
        {
            let mut state = self.state.write().unwrap();
            state.last_host = Some(host.to_string());
            state.last_credentials = Some(credentials.clone());
        }
        Ok(Box::new(self.clone()))
    }
}

#[derive(Debug)]
struct Table {
    key_attribute: String,
    key_kind: KeyKind,
    items: BTreeMap<String, Item>,
}

#[derive(Debug, Default)]
struct TableState {
    tables: BTreeMap<String, Table>,
    page_size: Option<usize>,
    scans: usize,
    describes: usize,
    last_credentials: Option<Credentials>,
}

/// Key-value tables held in memory.
///
/// Items are kept in partition key order. Scans return every remaining item
/// in one page unless [`with_page_size`](Self::with_page_size) limits them.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    state: Arc<RwLock<TableState>>,
}

fn rejected(reason: String) -> Error {
    Error::backend("dynamodb", reason)
}

impl MemoryKeyValueStore {
    /// No tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit every scan page to `items` items.
    pub fn with_page_size(self, items: usize) -> Self {
        self.state.write().unwrap().page_size = Some(items.max(1));
        self
    }

    /// Create a table with a string partition key (no-op when it exists).
    pub fn create_table(&self, table: &str, key_attribute: &str) {
        self.create_table_with(table, key_attribute, KeyKind::String);
    }

    /// Create a table with the given partition key type (no-op when it exists).
    pub fn create_table_with(&self, table: &str, key_attribute: &str, key_kind: KeyKind) {
        self.state
            .write()
            .unwrap()
            .tables
            .entry(table.to_string())
            .or_insert_with(|| Table {
                key_attribute: key_attribute.to_string(),
                key_kind,
                items: BTreeMap::new(),
            });
    }

    /// Seed an item; `item` must be an object holding the partition key.
    pub fn put(&self, table: &str, item: Value) -> Result<()> {
        let Value::Object(item) = item else {
            return Err(rejected(format!("{table}: items must be objects")));
        };
        self.with_table(table, |found| {
            let key = found.key_of(&item)?;
            found.items.insert(key, item);
            Ok(())
        })
    }

    /// Item stored under the rendered partition key.
    pub fn item(&self, table: &str, key: &str) -> Option<Item> {
        let state = self.state.read().unwrap();
        state.tables.get(table)?.items.get(key).cloned()
    }

    /// Scan pages served so far.
    pub fn scan_count(&self) -> usize {
        self.state.read().unwrap().scans
    }

    /// Schema lookups served so far.
    pub fn describe_count(&self) -> usize {
        self.state.read().unwrap().describes
    }

    /// Credentials received by the most recent connect.
    pub fn last_credentials(&self) -> Option<Credentials> {
        self.state.read().unwrap().last_credentials.clone()
    }

    fn with_table<T>(&self, table: &str, f: impl FnOnce(&mut Table) -> Result<T>) -> Result<T> {
        let mut state = self.state.write().unwrap();
        let found = state.tables.get_mut(table).ok_or_else(|| not_found(table))?;
        f(found)
    }
}

impl Table {
    fn key_of(&self, key: &Item) -> Result<String> {
        key.get(&self.key_attribute)
            .map(key_string)
            .ok_or_else(|| rejected(format!("item lacks partition key {}", self.key_attribute)))
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn describe(&self, table: &str) -> Result<TableInfo> {
        self.state.write().unwrap().describes += 1;
        self.with_table(table, |found| {
            Ok(TableInfo {
                key_attribute: found.key_attribute.clone(),
                key_kind: found.key_kind,
                item_count: found.items.len() as u64,
            })
        })
    }

    async fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>> {
        self.with_table(table, |found| {
            let key = found.key_of(key)?;
            Ok(found.items.get(&key).cloned())
        })
    }

    async fn put_item(&self, table: &str, item: Item) -> Result<()> {
        self.with_table(table, |found| {
            let key = found.key_of(&item)?;
            found.items.insert(key, item);
            Ok(())
        })
    }

    async fn delete_item(&self, table: &str, key: &Item) -> Result<()> {
        self.with_table(table, |found| {
            let key = found.key_of(key)?;
            found.items.remove(&key);
            Ok(())
        })
    }

    async fn scan(&self, table: &str, start: Option<Item>) -> Result<ScanPage> {
        let page_size = {
            let mut state = self.state.write().unwrap();
            state.scans += 1;
            state.page_size
        };
        self.with_table(table, |found| {
            let lower = match &start {
                Some(start) => Bound::Excluded(found.key_of(start)?),
                None => Bound::Unbounded,
            };
            let mut remaining = found.items.range((lower, Bound::Unbounded)).peekable();
            let mut items = Vec::new();
            while page_size.is_none_or(|limit| items.len() < limit) {
                match remaining.next() {
                    Some((_, item)) => items.push(item.clone()),
                    None => break,
                }
            }
            let last_evaluated_key = match (remaining.peek(), items.last()) {
                (Some(_), Some(last)) => Some(Item::from_iter(
                    last.get(&found.key_attribute)
                        .map(|value| (found.key_attribute.clone(), value.clone())),
                )),
                _ => None,
            };
            Ok(ScanPage {
                items,
                last_evaluated_key,
            })
        })
    }
}

#[async_trait]
impl KeyValueConnector for MemoryKeyValueStore {
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn KeyValueStore>> {
        self.state.write().unwrap().last_credentials = Some(credentials.clone());
        Ok(Arc::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn object_store_lists_by_prefix() {
        let store = MemoryObjectStore::new();
        for key in ["foo/a", "foo/b/c", "foobar/x", "other"] {
            store.put_object("bucket", key, "x");
        }
        let keys = store.list("bucket", "foo/").await.unwrap();
        assert_eq!(keys, vec!["foo/a", "foo/b/c"]);
    }

    #[tokio::test]
    async fn object_store_missing_key_is_not_found() {
        let store = MemoryObjectStore::new();
        store.create_bucket("bucket");
        assert!(store.head("bucket", "nope").await.unwrap_err().is_not_found());
        assert!(store.get("bucket", "nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn object_store_put_requires_bucket() {
        let store = MemoryObjectStore::new();
        let err = store.put("missing", "k", b"v".to_vec()).await.unwrap_err();
        assert!(!err.is_not_found());
        store.create_bucket("present");
        store.put("present", "k", b"v".to_vec()).await.unwrap();
        assert_eq!(store.object("present", "k"), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn sftp_lists_one_level() {
        let server = MemorySftp::new();
        server.add_file("/srv/a.txt", "a");
        server.add_file("/srv/sub/b.txt", "b");
        server.add_file("/srv/sub/deeper/c.txt", "c");

        let mut entries = server.list_dir("/srv").await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(entries, vec![RemoteEntry::file("a.txt"), RemoteEntry::dir("sub")]);
        assert!(server.exists("/srv/sub/deeper").await.unwrap());
        assert!(!server.exists("/srv/nope").await.unwrap());
    }

    #[tokio::test]
    async fn sftp_relative_paths_live_under_working_directory() {
        let server = MemorySftp::new();
        server.add_file("top.txt", "t");
        server.add_file("dir/inner.txt", "i");

        let mut entries = server.list_dir(".").await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(entries, vec![RemoteEntry::dir("dir"), RemoteEntry::file("top.txt")]);
    }

    #[tokio::test]
    async fn sftp_trailing_slash_names_the_same_directory() {
        let server = MemorySftp::new();
        server.add_file("/srv/a.txt", "a");
        server.add_file("/srv/sub/b.txt", "b");

        assert!(server.exists("/srv/").await.unwrap());
        assert!(server.exists("/srv/sub/").await.unwrap());
        assert!(!server.exists("/srv/a.txt/").await.unwrap());

        let mut entries = server.list_dir("/srv/").await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(entries, vec![RemoteEntry::file("a.txt"), RemoteEntry::dir("sub")]);
        assert!(server.list_dir("/nope/").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn sftp_root_is_listable() {
        let server = MemorySftp::new();
        server.add_file("/srv/a.txt", "a");
        server.add_file("/top.txt", "t");

        assert!(server.exists("/").await.unwrap());
        let mut entries = server.list_dir("/").await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(entries, vec![RemoteEntry::dir("srv"), RemoteEntry::file("top.txt")]);
    }

    #[tokio::test]
    async fn key_value_scan_pages_follow_the_continuation_key() {
        let store = MemoryKeyValueStore::new().with_page_size(2);
        store.create_table("users", "name");
        for name in ["carol", "alice", "bob"] {
            store.put("users", serde_json::json!({ "name": name })).unwrap();
        }

        let first = store.scan("users", None).await.unwrap();
        let names: Vec<_> = first.items.iter().map(|item| item["name"].clone()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
        let start = first.last_evaluated_key.unwrap();
        assert_eq!(start["name"], "bob");

        let second = store.scan("users", Some(start)).await.unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0]["name"], "carol");
        assert_eq!(second.last_evaluated_key, None);
        assert_eq!(store.scan_count(), 2);
    }

    #[tokio::test]
    async fn key_value_missing_table_and_key() {
        let store = MemoryKeyValueStore::new();
        assert!(store.describe("nope").await.unwrap_err().is_not_found());

        store.create_table("users", "name");
        let err = store.put_item("users", Item::new()).await.unwrap_err();
        assert!(matches!(err, Error::Backend { backend: "dynamodb", .. }));
    }
}
