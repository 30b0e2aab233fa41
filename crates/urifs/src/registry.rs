//! Scheme registry.
//!
//! Maps a URI scheme to the constructor that builds a handle for it. Two
//! independent tables exist, one for file handles and one for mappings,
//! because a scheme may support both.
//!
//! Registration overwrites: the last constructor registered for a scheme wins.
//! An empty scheme (bare local path) dispatches to `file`.
//!
//! Default bindings:
//!
//! | Scheme     | File handle            | Mapping       |
//! |------------|------------------------|---------------|
//! | `file`     | [`LocalFile`]          | [`FileMap`]   |
//! | `s3`       | [`S3File`]             | [`FileMap`]   |
//! | `sftp`     | [`SftpFile`]           | -             |
//! | `dynamodb` | -                      | [`DynamoMap`] |
//!
//! [`S3File`]: crate::backends::S3File
//! [`SftpFile`]: crate::backends::SftpFile
//! [`DynamoMap`]: crate::backends::DynamoMap

// RwLock.read()/write().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, RwLock};

use crate::backends::{
    DynamoMap, KeyValueConnector, S3Backend, SftpBackend, default_table_connector,
};
use crate::error::{Error, Result};
use crate::handle::{FileHandle, LocalFile, RemoteBackend, RemoteFile};
use crate::map::{FileMap, Mapping};
use crate::options::OpenOptions;
use crate::uri::{LOCAL_SCHEME, Uri};

/// Builds a file handle for a parsed URI.
pub type FileConstructor =
    Arc<dyn Fn(Uri, OpenOptions) -> Result<Box<dyn FileHandle>> + Send + Sync>;

/// Builds a mapping for a parsed URI. Receives the registry it was resolved
/// from so it can open its source through the same bindings.
pub type MapConstructor =
    Arc<dyn Fn(Uri, OpenOptions, &SchemeRegistry) -> Result<Box<dyn Mapping>> + Send + Sync>;

/// Scheme to constructor tables.
///
/// # Example
///
/// ```rust
/// use urifs::{OpenOptions, SchemeRegistry, UnimplementedBackend};
///
/// let registry = SchemeRegistry::new();
/// registry.register_backend("ftp", UnimplementedBackend);
///
/// assert!(registry.open("ftp://host/file", OpenOptions::new()).is_ok());
/// assert!(registry.open("gopher://host/file", OpenOptions::new()).is_err());
/// ```
pub struct SchemeRegistry {
    files: RwLock<HashMap<String, FileConstructor>>,
    maps: RwLock<HashMap<String, MapConstructor>>,
}

fn dispatch(scheme: &str) -> &str {
    if scheme.is_empty() { LOCAL_SCHEME } else { scheme }
}

impl SchemeRegistry {
    /// Registry with no bindings.
    pub fn empty() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            maps: RwLock::new(HashMap::new()),
        }
    }

    /// Registry with the default bindings.
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register_file(LOCAL_SCHEME, |uri, options| {
            Ok(Box::new(LocalFile::new(uri, options)))
        });
        registry.register_backend("s3", S3Backend::default());
        registry.register_backend("sftp", SftpBackend::default());

        for scheme in [LOCAL_SCHEME, "s3"] {
            registry.register_map(scheme, |uri, options, registry| {
                Ok(Box::new(FileMap::new(registry.construct_file(uri, options)?)))
            });
        }
        registry.register_table("dynamodb", default_table_connector());
        registry
    }

    /// Bind `scheme` to a file-handle constructor, replacing any previous one.
    pub fn register_file<F>(&self, scheme: &str, constructor: F)
    where
        F: Fn(Uri, OpenOptions) -> Result<Box<dyn FileHandle>> + Send + Sync + 'static,
    {
        self.files
            .write()
            .unwrap()
            .insert(dispatch(scheme).to_string(), Arc::new(constructor));
    }

    /// Bind `scheme` to a mapping constructor, replacing any previous one.
    pub fn register_map<F>(&self, scheme: &str, constructor: F)
    where
        F: Fn(Uri, OpenOptions, &SchemeRegistry) -> Result<Box<dyn Mapping>>
            + Send
            + Sync
            + 'static,
    {
        self.maps
            .write()
            .unwrap()
            .insert(dispatch(scheme).to_string(), Arc::new(constructor));
    }

    /// Bind `scheme` to [`RemoteFile`] handles over `backend`.
    pub fn register_backend<B>(&self, scheme: &str, backend: B)
    where
        B: RemoteBackend + Clone,
    {
        self.register_file(scheme, move |uri, options| {
            Ok(Box::new(RemoteFile::new(backend.clone(), uri, options)))
        });
    }

    /// Bind `scheme` to [`DynamoMap`] mappings over tables from `connector`.
    pub fn register_table(&self, scheme: &str, connector: Arc<dyn KeyValueConnector>) {
        self.register_map(scheme, move |uri, options, _| {
            Ok(Box::new(DynamoMap::new(Arc::clone(&connector), uri, options)?))
        });
    }

    /// File-handle constructor for `scheme`.
    pub fn resolve_file(&self, scheme: &str) -> Result<FileConstructor> {
        let scheme = dispatch(scheme);
        self.files
            .read()
            .unwrap()
            .get(scheme)
            .cloned()
            .ok_or_else(|| Error::Scheme(scheme.to_string()))
    }

    /// Mapping constructor for `scheme`.
    pub fn resolve_map(&self, scheme: &str) -> Result<MapConstructor> {
        let scheme = dispatch(scheme);
        self.maps
            .read()
            .unwrap()
            .get(scheme)
            .cloned()
            .ok_or_else(|| Error::Scheme(scheme.to_string()))
    }

    /// Schemes with a file-handle binding, sorted.
    pub fn file_schemes(&self) -> Vec<String> {
        let mut schemes: Vec<_> = self.files.read().unwrap().keys().cloned().collect();
        schemes.sort();
        schemes
    }

    /// Schemes with a mapping binding, sorted.
    pub fn map_schemes(&self) -> Vec<String> {
        let mut schemes: Vec<_> = self.maps.read().unwrap().keys().cloned().collect();
        schemes.sort();
        schemes
    }

    /// Build a file handle for an already parsed URI.
    pub fn construct_file(&self, uri: Uri, options: OpenOptions) -> Result<Box<dyn FileHandle>> {
        let constructor = self.resolve_file(uri.dispatch_scheme())?;
        constructor(uri, options)
    }

    /// Build a mapping for an already parsed URI.
    pub fn construct_map(&self, uri: Uri, options: OpenOptions) -> Result<Box<dyn Mapping>> {
        let constructor = self.resolve_map(uri.dispatch_scheme())?;
        constructor(uri, options, self)
    }
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SchemeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeRegistry")
            .field("files", &self.file_schemes())
            .field("maps", &self.map_schemes())
            .finish()
    }
}

static GLOBAL: LazyLock<SchemeRegistry> = LazyLock::new(SchemeRegistry::new);

/// Process-wide registry used by the crate-level free functions.
pub fn global() -> &'static SchemeRegistry {
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::UnimplementedBackend;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_bindings() {
        let registry = SchemeRegistry::new();
        assert_eq!(registry.file_schemes(), vec!["file", "s3", "sftp"]);
        assert_eq!(registry.map_schemes(), vec!["dynamodb", "file", "s3"]);
    }

    #[test]
    fn empty_scheme_dispatches_to_file() {
        let registry = SchemeRegistry::new();
        assert!(registry.resolve_file("").is_ok());
        assert!(registry.resolve_map("").is_ok());
    }

    #[test]
    fn unknown_scheme_is_scheme_error() {
        let registry = SchemeRegistry::empty();
        match registry.resolve_file("gopher") {
            Err(Error::Scheme(scheme)) => assert_eq!(scheme, "gopher"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("gopher should not resolve"),
        }
        assert!(matches!(registry.resolve_map("file"), Err(Error::Scheme(_))));
    }

    #[test]
    fn last_registration_wins() {
        let registry = SchemeRegistry::new();
        registry.register_backend("file", UnimplementedBackend);
        let handle = registry
            .construct_file(Uri::parse("/tmp/x").unwrap(), OpenOptions::new())
            .unwrap();
        assert!(handle.is_remote());
    }

    #[test]
    fn table_scheme_is_map_only() {
        let registry = SchemeRegistry::new();
        assert!(registry.resolve_map("dynamodb").is_ok());
        assert!(matches!(registry.resolve_file("dynamodb"), Err(Error::Scheme(_))));
        let mapping = registry
            .construct_map(Uri::parse("dynamodb://users").unwrap(), OpenOptions::new())
            .unwrap();
        assert!(format!("{mapping:?}").starts_with("DynamoMap"));
    }

    #[test]
    fn file_and_map_tables_are_independent() {
        let registry = SchemeRegistry::empty();
        registry.register_backend("ftp", UnimplementedBackend);
        assert!(registry.resolve_file("ftp").is_ok());
        assert!(registry.resolve_map("ftp").is_err());
    }
}
