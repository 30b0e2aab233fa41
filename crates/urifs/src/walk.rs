//! Directory walks.
//!
//! Every backend produces the same output shape: one [`WalkEntry`] per
//! directory, carrying the directory's full address plus its immediate
//! subdirectory and file names.
//!
//! Object stores have no directories, only flat keys. [`DirTree`]
//! reconstructs the hierarchy from a flat key listing:
//!
//! ```text
//! keys under "foo/"            tree
//! ─────────────────            ──────────────────────────────────
//! foo/ban                      foo/           dirs {baq, bar}  files {ban}
//! foo/baq/bug          ──►     foo/baq/       dirs {}          files {bug}
//! foo/bar/bizz/buzz            foo/bar/       dirs {bizz}      files {}
//! foo/bar/bizz/fizz            foo/bar/bizz/  dirs {}          files {buzz, fizz}
//! ```
//!
//! Intermediate directories that own no keys of their own (`foo/bar/` above)
//! still get a node, and directory-marker keys (`foo/bar/`) create a node
//! without adding a file.
//!
//! Walks are handed out as a [`WalkStream`]: entries are produced as the
//! consumer polls, and restarting a walk means asking for a new stream.

use futures_util::stream::{self, BoxStream};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::logging_impl::sanitize_for_log;

/// Path separator used by every remote backend.
pub const SEPARATOR: char = '/';

/// Lazy sequence of walk entries.
pub type WalkStream = BoxStream<'static, Result<WalkEntry>>;

/// Stream over already computed entries.
pub fn walk_stream(entries: Vec<WalkEntry>) -> WalkStream {
    Box::pin(stream::iter(entries.into_iter().map(Ok)))
}

/// One directory of a walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalkEntry {
    /// Full address of the directory, ending with `/`.
    pub dir: String,
    /// Immediate subdirectory names, ascending.
    pub dirs: Vec<String>,
    /// Immediate file names, ascending.
    pub files: Vec<String>,
}

impl WalkEntry {
    /// Build an entry.
    pub fn new<D, F>(dir: impl Into<String>, dirs: D, files: F) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        Self {
            dir: dir.into(),
            dirs: dirs.into_iter().map(Into::into).collect(),
            files: files.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Default)]
struct DirNode {
    dirs: BTreeSet<String>,
    files: BTreeSet<String>,
}

/// Directory tree rebuilt from a flat key listing.
///
/// Nodes are keyed by their path relative to the bucket (always ending with
/// `/` except for the bucket root, which is the empty string).
#[derive(Debug)]
pub struct DirTree {
    root: String,
    nodes: BTreeMap<String, DirNode>,
}

impl DirTree {
    /// Start a tree rooted at `prefix`.
    ///
    /// A leading separator is stripped and a trailing one added, so `"/foo"`,
    /// `"foo"` and `"foo/"` all root the tree at `"foo/"`. An empty prefix
    /// roots the tree at the bucket itself.
    pub fn new(prefix: &str) -> Self {
        let trimmed = prefix.trim_start_matches(SEPARATOR);
        let root = if trimmed.is_empty() || trimmed.ends_with(SEPARATOR) {
            trimmed.to_string()
        } else {
            format!("{}{}", trimmed, SEPARATOR)
        };
        let mut nodes = BTreeMap::new();
        nodes.insert(root.clone(), DirNode::default());
        Self { root, nodes }
    }

    /// Normalized root; also the listing prefix to request from the store.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Record one object key. Keys outside the root are ignored.
    pub fn insert_key(&mut self, key: &str) {
        let Some(relative) = key.strip_prefix(self.root.as_str()) else {
            tracing::trace!(key = %sanitize_for_log(key), "key outside walk root");
            return;
        };
        let (remainder, filename) = relative.rsplit_once(SEPARATOR).unwrap_or(("", relative));

        let mut current = self.root.clone();
        for segment in remainder.split(SEPARATOR).filter(|s| !s.is_empty()) {
            self.nodes
                .entry(current.clone())
                .or_default()
                .dirs
                .insert(segment.to_string());
            current.push_str(segment);
            current.push(SEPARATOR);
            self.nodes.entry(current.clone()).or_default();
        }

        if !filename.is_empty() {
            self.nodes
                .entry(current)
                .or_default()
                .files
                .insert(filename.to_string());
        }
    }

    /// Number of directories discovered so far (root included).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds no directories at all.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Emit one entry per directory in ascending path order.
    ///
    /// `address` is prepended to every node path (e.g. `"s3://bucket/"`).
    /// Directories deeper than `max_depth` below the root are skipped.
    pub fn into_entries(self, address: &str, max_depth: Option<usize>) -> Vec<WalkEntry> {
        let root_len = self.root.len();
        self.nodes
            .into_iter()
            .filter(|(path, _)| {
                let depth = path[root_len..].matches(SEPARATOR).count();
                max_depth.is_none_or(|max| depth <= max)
            })
            .map(|(path, node)| {
                WalkEntry::new(format!("{}{}", address, path), node.dirs, node.files)
            })
            .collect()
    }
}

impl<'a> Extend<&'a str> for DirTree {
    fn extend<I: IntoIterator<Item = &'a str>>(&mut self, keys: I) {
        for key in keys {
            self.insert_key(key);
        }
    }
}
