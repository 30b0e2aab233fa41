//! Key/value mappings over structured files.
//!
//! A [`FileMap`] reads a whole document through a [`FileHandle`] and parses it
//! with the parser registered for the path's extension:
//!
//! | Extension        | Parser       |
//! |------------------|--------------|
//! | `.json`          | `serde_json` |
//! | `.yaml`, `.yml`  | `serde_yaml` |
//!
//! More extensions can be added at runtime with [`register_extension`].
//! [`ChainedMap`] layers several mappings, e.g. a local override in front of
//! a shared remote config. Table-backed mappings live with their service
//! clients, see [`DynamoMap`](crate::backends::DynamoMap).

#![allow(clippy::unwrap_used)] // RwLock poisoning only

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{LazyLock, RwLock};

use crate::error::{Error, Result};
use crate::handle::FileHandle;
use crate::logging_impl::redact_uri;

/// Mapping values.
pub type Value = serde_json::Value;

/// Turns raw file content into a value.
pub type ExtensionParser = fn(&[u8]) -> Result<Value>;

static EXTENSIONS: LazyLock<RwLock<HashMap<String, ExtensionParser>>> = LazyLock::new(|| {
    let mut parsers: HashMap<String, ExtensionParser> = HashMap::new();
    parsers.insert(".json".into(), parse_json);
    parsers.insert(".yaml".into(), parse_yaml);
    parsers.insert(".yml".into(), parse_yaml);
    RwLock::new(parsers)
});

fn parse_json(content: &[u8]) -> Result<Value> {
    serde_json::from_slice(content).map_err(|err| Error::Parse(err.to_string()))
}

fn parse_yaml(content: &[u8]) -> Result<Value> {
    serde_yaml::from_slice(content).map_err(|err| Error::Parse(err.to_string()))
}

fn normalize_extension(extension: &str) -> String {
    if extension.starts_with('.') {
        extension.to_string()
    } else {
        format!(".{extension}")
    }
}

/// Register (or replace) the parser for `extension` (`"toml"` or `".toml"`).
pub fn register_extension(extension: &str, parser: ExtensionParser) {
    EXTENSIONS
        .write()
        .unwrap()
        .insert(normalize_extension(extension), parser);
}

/// Parser registered for `extension`.
pub fn extension_parser(extension: &str) -> Result<ExtensionParser> {
    let extension = normalize_extension(extension);
    EXTENSIONS
        .read()
        .unwrap()
        .get(&extension)
        .copied()
        .ok_or(Error::Extension(extension))
}

/// Extension of the last path segment, dot included. Leading dots of hidden
/// files do not count.
fn extension_of(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    let stem_start = name.len() - name.trim_start_matches('.').len();
    match name[stem_start..].rfind('.') {
        Some(idx) => &name[stem_start + idx..],
        None => "",
    }
}

/// Key/value view.
///
/// Reads are required; writes are optional and fail with
/// [`Error::NotImplemented`] unless the mapping supports them.
#[async_trait]
pub trait Mapping: Send + fmt::Debug {
    /// Value stored under `key`.
    async fn get(&mut self, key: &str) -> Result<Value>;

    /// Top-level keys.
    async fn keys(&mut self) -> Result<Vec<String>>;

    /// Number of top-level keys.
    async fn len(&mut self) -> Result<usize> {
        Ok(self.keys().await?.len())
    }

    /// Whether the mapping has no keys.
    async fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Store `value` under `key`.
    async fn insert(&mut self, key: &str, _value: Value) -> Result<()> {
        Err(Error::NotImplemented(format!("insert '{key}': mapping is read-only")))
    }

    /// Delete `key`.
    async fn remove(&mut self, key: &str) -> Result<()> {
        Err(Error::NotImplemented(format!("remove '{key}': mapping is read-only")))
    }
}

/// Mapping backed by a JSON or YAML document.
///
/// The document is re-read on every access, so edits to the source are seen
/// immediately.
#[derive(Debug)]
pub struct FileMap {
    source: Box<dyn FileHandle>,
}

impl FileMap {
    /// Wrap an opened handle.
    pub fn new(source: Box<dyn FileHandle>) -> Self {
        Self { source }
    }

    /// Underlying handle.
    pub fn source(&self) -> &dyn FileHandle {
        self.source.as_ref()
    }

    /// Parse the whole document.
    pub async fn document(&mut self) -> Result<Value> {
        let parser = extension_parser(extension_of(self.source.uri().path()))?;
        let content = self.source.read(None).await?;
        parser(&content)
    }

    async fn object(&mut self) -> Result<serde_json::Map<String, Value>> {
        match self.document().await? {
            Value::Object(map) => Ok(map),
            other => Err(Error::Parse(format!(
                "{} holds a {} instead of a mapping",
                redact_uri(self.source.uri().as_str()),
                kind(&other)
            ))),
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

#[async_trait]
impl Mapping for FileMap {
    async fn get(&mut self, key: &str) -> Result<Value> {
        let mut object = self.object().await?;
        object
            .remove(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    async fn keys(&mut self) -> Result<Vec<String>> {
        Ok(self.object().await?.into_iter().map(|(key, _)| key).collect())
    }
}

/// Ordered list of mappings; the first one that answers wins.
///
/// Failures of earlier candidates are logged at WARN and, when every
/// candidate fails, returned together as [`Error::Chain`].
#[derive(Debug, Default)]
pub struct ChainedMap {
    maps: Vec<Box<dyn Mapping>>,
}

impl ChainedMap {
    /// Chain `maps` in lookup order.
    pub fn new(maps: Vec<Box<dyn Mapping>>) -> Self {
        Self { maps }
    }

    /// Append a fallback.
    pub fn push(&mut self, map: Box<dyn Mapping>) {
        self.maps.push(map);
    }
}

impl FromIterator<Box<dyn Mapping>> for ChainedMap {
    fn from_iter<I: IntoIterator<Item = Box<dyn Mapping>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[async_trait]
impl Mapping for ChainedMap {
    async fn get(&mut self, key: &str) -> Result<Value> {
        let mut failures = Vec::new();
        for map in &mut self.maps {
            match map.get(key).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::warn!(mapping = ?map, error = %err, "chained lookup failed");
                    failures.push(err);
                }
            }
        }
        Err(Error::Chain(failures))
    }

    async fn keys(&mut self) -> Result<Vec<String>> {
        let mut failures = Vec::new();
        for map in &mut self.maps {
            match map.keys().await {
                Ok(keys) => return Ok(keys),
                Err(err) => {
                    tracing::warn!(mapping = ?map, error = %err, "chained listing failed");
                    failures.push(err);
                }
            }
        }
        Err(Error::Chain(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_detection() {
        assert_eq!(extension_of("/etc/app/config.yaml"), ".yaml");
        assert_eq!(extension_of("archive.tar.json"), ".json");
        assert_eq!(extension_of("/home/u/.hidden"), "");
        assert_eq!(extension_of("/dir.d/noext"), "");
        assert_eq!(extension_of("/home/u/.env.json"), ".json");
    }

    #[test]
    fn default_parsers() {
        let json = extension_parser(".json").unwrap();
        assert_eq!(json(br#"{"a": 1}"#).unwrap()["a"], 1);

        let yaml = extension_parser("yml").unwrap();
        assert_eq!(yaml(b"a: b\n").unwrap()["a"], "b");
    }

    #[test]
    fn unknown_extension() {
        let err = extension_parser(".unknown-ext").unwrap_err();
        assert!(matches!(err, Error::Extension(ext) if ext == ".unknown-ext"));
    }

    #[test]
    fn malformed_content_is_parse_error() {
        let json = extension_parser(".json").unwrap();
        assert!(matches!(json(b"{not json").unwrap_err(), Error::Parse(_)));
    }

    #[tokio::test]
    async fn empty_chain_fails_with_no_candidates() {
        let mut chain = ChainedMap::default();
        match chain.get("key").await.unwrap_err() {
            Error::Chain(failures) => assert!(failures.is_empty()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn writes_are_refused_by_default() {
        let mut chain = ChainedMap::default();
        assert!(matches!(
            chain.insert("key", Value::Null).await,
            Err(Error::NotImplemented(_))
        ));
        assert!(matches!(chain.remove("key").await, Err(Error::NotImplemented(_))));
    }
}
