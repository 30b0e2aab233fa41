//! Object-storage backend.
//!
//! `s3://bucket/path/to/key`: the URI host is the bucket, the path (minus its
//! leading `/`) is the key.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::handle::{RemoteBackend, RemoteFile};
use crate::logging_impl::redact_uri;
use crate::options::{Credentials, WalkOptions};
use crate::uri::Uri;
use crate::walk::{DirTree, WalkStream, walk_stream};

/// Object-storage primitives the backend calls into.
///
/// A missing object is reported as [`Error::Io`] with
/// [`std::io::ErrorKind::NotFound`]; every other failure is passed through.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Metadata-only existence probe.
    async fn head(&self, bucket: &str, key: &str) -> Result<()>;

    /// Object body.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Create or replace an object.
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;

    /// Every key in `bucket` starting with `prefix`.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

    /// Fetch an object straight to a local file.
    async fn download(&self, bucket: &str, key: &str, target: &Path) -> Result<()> {
        let body = self.get(bucket, key).await?;
        tokio::fs::write(target, body).await?;
        Ok(())
    }
}

/// Builds an [`ObjectStore`] client from normalized credentials.
#[async_trait]
pub trait ObjectStoreConnector: Send + Sync {
    /// Create a client.
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn ObjectStore>>;
}

/// Object-storage adapter.
#[derive(Clone)]
pub struct S3Backend {
    connector: Arc<dyn ObjectStoreConnector>,
}

/// Object-storage file handle.
pub type S3File = RemoteFile<S3Backend>;

impl S3Backend {
    /// Adapter over a custom connector.
    pub fn new(connector: Arc<dyn ObjectStoreConnector>) -> Self {
        Self { connector }
    }
}

impl Default for S3Backend {
    /// Adapter over the crate's default connector: the AWS SDK client when
    /// built with the `s3` feature, otherwise one that refuses to connect.
    fn default() -> Self {
        Self::new(default_connector())
    }
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend").finish_non_exhaustive()
    }
}

#[cfg(feature = "s3")]
fn default_connector() -> Arc<dyn ObjectStoreConnector> {
    Arc::new(super::aws::AwsConnector)
}

#[cfg(not(feature = "s3"))]
fn default_connector() -> Arc<dyn ObjectStoreConnector> {
    Arc::new(DisabledConnector)
}

#[cfg(not(feature = "s3"))]
struct DisabledConnector;

#[cfg(not(feature = "s3"))]
#[async_trait]
impl ObjectStoreConnector for DisabledConnector {
    async fn connect(&self, _credentials: &Credentials) -> Result<Arc<dyn ObjectStore>> {
        Err(Error::NotImplemented(
            "object storage client not built in (enable the `s3` feature or register a connector)"
                .into(),
        ))
    }
}

fn bucket(uri: &Uri) -> Result<&str> {
    uri.host()
        .ok_or_else(|| Error::invalid_uri(redact_uri(uri.as_str()), "missing bucket name"))
}

fn key(uri: &Uri) -> &str {
    uri.path().trim_start_matches('/')
}

#[async_trait]
impl RemoteBackend for S3Backend {
    type Connection = Arc<dyn ObjectStore>;

    const WRITABLE: bool = true;

    fn name(&self) -> &'static str {
        "s3"
    }

    async fn connect(&self, _uri: &Uri, credentials: &mut Credentials) -> Result<Self::Connection> {
        // Short key names are accepted as aliases of the SDK's.
        credentials.rename("access_key", "aws_access_key_id");
        credentials.rename("secret_key", "aws_secret_access_key");
        self.connector.connect(credentials).await
    }

    async fn exists(&self, conn: &Self::Connection, uri: &Uri) -> Result<bool> {
        match conn.head(bucket(uri)?, key(uri)).await {
            Ok(()) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn read(&self, conn: &Self::Connection, uri: &Uri) -> Result<Vec<u8>> {
        conn.get(bucket(uri)?, key(uri)).await
    }

    async fn write(&self, conn: &Self::Connection, uri: &Uri, content: Vec<u8>) -> Result<()> {
        conn.put(bucket(uri)?, key(uri), content).await
    }

    async fn download(&self, conn: &Self::Connection, uri: &Uri, target: &Path) -> Result<()> {
        conn.download(bucket(uri)?, key(uri), target).await
    }

    async fn walk(
        &self,
        conn: &Self::Connection,
        uri: &Uri,
        options: &WalkOptions,
    ) -> Result<WalkStream> {
        let bucket = bucket(uri)?;
        let mut tree = DirTree::new(uri.path());
        let keys = conn.list(bucket, tree.root()).await?;
        tree.extend(keys.iter().map(String::as_str));
        let entries = tree.into_entries(&format!("s3://{}/", bucket), options.max_depth);
        Ok(walk_stream(entries))
    }
}
