//! Tests for custom backend implementations
//!
//! These tests verify that everything needed to plug in a new scheme is
//! exported from the crate's public API.

use futures_util::TryStreamExt;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use urifs::{
    Credentials, Error, Mode, OpenOptions, RemoteBackend, Result, SchemeRegistry, Uri, WalkEntry,
    WalkOptions, WalkStream, async_trait, walk_stream,
};

/// Flat key/value service addressed as `kv://namespace/key`.
#[derive(Clone, Default)]
struct KvBackend {
    data: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

struct KvConnection {
    namespace: String,
}

impl KvBackend {
    fn slot(conn: &KvConnection, uri: &Uri) -> String {
        format!("{}{}", conn.namespace, uri.path())
    }
}

#[async_trait]
impl RemoteBackend for KvBackend {
    type Connection = KvConnection;

    const WRITABLE: bool = true;

    fn name(&self) -> &'static str {
        "kv"
    }

    async fn connect(&self, uri: &Uri, credentials: &mut Credentials) -> Result<KvConnection> {
        if credentials.get("token") != Some("letmein") {
            return Err(Error::backend("kv", "invalid token"));
        }
        Ok(KvConnection {
            namespace: uri.host().unwrap_or("default").to_string(),
        })
    }

    async fn exists(&self, conn: &KvConnection, uri: &Uri) -> Result<bool> {
        Ok(self.data.read().unwrap().contains_key(&Self::slot(conn, uri)))
    }

    async fn read(&self, conn: &KvConnection, uri: &Uri) -> Result<Vec<u8>> {
        self.data
            .read()
            .unwrap()
            .get(&Self::slot(conn, uri))
            .cloned()
            .ok_or_else(|| Error::FileNotFound(uri.to_string()))
    }

    async fn write(&self, conn: &KvConnection, uri: &Uri, content: Vec<u8>) -> Result<()> {
        self.data
            .write()
            .unwrap()
            .insert(Self::slot(conn, uri), content);
        Ok(())
    }

    async fn download(&self, conn: &KvConnection, uri: &Uri, target: &Path) -> Result<()> {
        let body = self.read(conn, uri).await?;
        tokio::fs::write(target, body).await?;
        Ok(())
    }

    async fn walk(
        &self,
        conn: &KvConnection,
        _uri: &Uri,
        _options: &WalkOptions,
    ) -> Result<WalkStream> {
        let prefix = format!("{}/", conn.namespace);
        let files: Vec<String> = self
            .data
            .read()
            .unwrap()
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .collect();
        Ok(walk_stream(vec![WalkEntry::new(
            format!("kv://{}/", conn.namespace),
            Vec::<String>::new(),
            files,
        )]))
    }
}

fn registry(backend: &KvBackend) -> SchemeRegistry {
    let registry = SchemeRegistry::new();
    registry.register_backend("kv", backend.clone());
    registry
}

fn authorized() -> OpenOptions {
    OpenOptions::new().credential("token", "letmein")
}

#[tokio::test]
async fn custom_backend_round_trip() {
    let backend = KvBackend::default();
    let registry = registry(&backend);

    let mut file = registry
        .open("kv://ns/greeting", authorized().mode(Mode::WritePlus))
        .unwrap();
    assert!(!file.exists().await.unwrap());
    file.write("hi there".into()).await.unwrap();
    assert!(file.exists().await.unwrap());
    assert_eq!(file.read_to_string().await.unwrap(), "hi there");
    file.close().await.unwrap();

    let entries: Vec<WalkEntry> = registry
        .walk("kv://ns/", authorized(), &WalkOptions::new())
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(entries[0].dir, "kv://ns/");
    assert_eq!(entries[0].files, vec!["greeting"]);
}

#[tokio::test]
async fn custom_backend_connect_failure_is_passed_through() {
    let registry = registry(&KvBackend::default());
    let err = registry
        .exists("kv://ns/x", OpenOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Backend { backend: "kv", .. }));
    assert_eq!(err.to_string(), "kv error: invalid token");
}

#[tokio::test]
async fn custom_backend_download() {
    let backend = KvBackend::default();
    let registry = registry(&backend);
    let mut file = registry
        .open("kv://ns/report", authorized().mode(Mode::Write))
        .unwrap();
    file.write("quarterly".into()).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("report.txt");
    let mut local = registry
        .download(
            "kv://ns/report",
            Some(target.to_str().unwrap()),
            Some(Credentials::new().with("token", "letmein")),
        )
        .await
        .unwrap();
    assert_eq!(local.read_to_string().await.unwrap(), "quarterly");
}

#[tokio::test]
async fn download_via_handle_requires_local_target() {
    let backend = KvBackend::default();
    let registry = registry(&backend);
    let mut source = registry.open("kv://ns/a", authorized()).unwrap();
    let target = registry.open("kv://ns/b", authorized()).unwrap();

    let remote = source.as_remote().unwrap();
    let err = remote.download(target).await.unwrap_err();
    assert!(matches!(err, Error::Download(_)));
}
