//! Configuration for opening and walking handles.
//!
//! Everything a caller can tune goes through these builders. Backend client
//! settings (region, endpoint, timeouts, keys) travel inside [`Credentials`]
//! and are interpreted by the backend that receives them.

use std::collections::BTreeMap;
use std::fmt;

use crate::mode::Mode;

/// Key/value credential bag handed to a backend's `connect`.
///
/// Values are never printed: `Debug` shows keys only.
///
/// # Example
///
/// ```rust
/// use urifs::Credentials;
///
/// let mut creds = Credentials::new().with("access_key", "AKIDEXAMPLE");
/// creds.set_default("access_key", "ignored");
/// assert_eq!(creds.get("access_key"), Some("AKIDEXAMPLE"));
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    values: BTreeMap<String, String>,
}

impl Credentials {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or overwrite a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Insert only if `key` is absent.
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_insert_with(|| value.into());
    }

    /// Move the value stored under `alias` to `key`.
    ///
    /// An existing value under `key` is overwritten.
    pub fn rename(&mut self, alias: &str, key: &str) {
        if let Some(value) = self.values.remove(alias) {
            self.values.insert(key.to_string(), value);
        }
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Remove a value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// Whether the bag holds `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut creds = Credentials::new();
        for (key, value) in iter {
            creds.insert(key, value);
        }
        creds
    }
}

/// Options forwarded verbatim to a handler constructor.
///
/// # Example
///
/// ```rust
/// use urifs::{Mode, OpenOptions};
///
/// let options = OpenOptions::new()
///     .mode(Mode::WritePlus)
///     .credential("username", "deploy");
/// assert_eq!(options.get_mode(), Mode::WritePlus);
/// ```
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    pub(crate) mode: Mode,
    pub(crate) credentials: Credentials,
}

impl OpenOptions {
    /// Read mode, no credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the access mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Add a single credential.
    pub fn credential(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.credentials.insert(key, value);
        self
    }

    /// Replace the credential bag.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Access mode.
    pub fn get_mode(&self) -> Mode {
        self.mode
    }

    /// Credential bag.
    pub fn get_credentials(&self) -> &Credentials {
        &self.credentials
    }
}

/// Options for directory walks.
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Deepest directory level to emit; the walk root is depth 0.
    /// `None` walks the whole tree.
    pub max_depth: Option<usize>,
    /// Descend into symlinked directories (local backend only).
    pub follow_links: bool,
}

impl WalkOptions {
    /// Unbounded walk, symlinks not followed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the walk depth.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Follow symlinked directories.
    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Whether children of a directory at `depth` should be visited.
    pub(crate) fn descend(&self, depth: usize) -> bool {
        self.max_depth.is_none_or(|max| depth < max)
    }
}
