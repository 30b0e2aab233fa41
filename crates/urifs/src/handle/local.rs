//! Local filesystem handle.

use async_trait::async_trait;
use futures_util::stream;
use std::collections::BTreeMap;
use std::fmt;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use super::{ContentStream, FileHandle, WriteSource};
use crate::error::{Error, Result};
use crate::logging_impl::redact_uri;
use crate::mode::Mode;
use crate::options::{OpenOptions, WalkOptions};
use crate::uri::Uri;
use crate::walk::{SEPARATOR, WalkEntry, WalkStream};

/// File on the local filesystem.
///
/// Handles `file:///abs/path` as well as bare paths.
///
/// # Example
///
/// ```rust
/// use urifs::{FileHandle, Mode, OpenOptions, Uri, LocalFile};
///
/// # #[tokio::main]
/// # async fn main() -> urifs::Result<()> {
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("nested/hello.txt");
/// let uri = Uri::parse(path.to_str().unwrap())?;
///
/// let mut file = LocalFile::new(uri, OpenOptions::new().mode(Mode::WritePlus));
/// file.write("hello".into()).await?;
/// assert_eq!(file.read_to_string().await?, "hello");
/// file.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct LocalFile {
    uri: Uri,
    mode: Mode,
    path: PathBuf,
    stream: Option<ContentStream>,
}

impl LocalFile {
    /// Create a handle. Nothing is touched on disk until the first operation.
    pub fn new(uri: Uri, options: OpenOptions) -> Self {
        let path = uri.local_path();
        Self {
            uri,
            mode: options.mode,
            path,
            stream: None,
        }
    }

    /// Filesystem path of this handle.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open_stream(&mut self) -> Result<ContentStream> {
        if !self.mode.is_write_capable() && !self.exists().await? {
            return Err(Error::FileNotFound(redact_uri(self.uri.as_str()).into_owned()));
        }
        let file = self.mode.open_options().open(&self.path).await?;
        Ok(Box::new(file))
    }

    async fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !tokio::fs::try_exists(parent).await? {
                tracing::debug!(path = %parent.display(), "creating parent directories");
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for LocalFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalFile")
            .field("uri", &self.uri.as_str())
            .field("mode", &self.mode)
            .field("open", &self.stream.is_some())
            .finish()
    }
}

#[async_trait]
impl FileHandle for LocalFile {
    fn uri(&self) -> &Uri {
        &self.uri
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    async fn exists(&mut self) -> Result<bool> {
        Ok(tokio::fs::try_exists(&self.path).await?)
    }

    async fn write(&mut self, content: WriteSource<'_>) -> Result<()> {
        if self.mode.is_write_capable() {
            self.ensure_parent_dir().await?;
        }
        let stream = self.stream().await?;
        match content {
            WriteSource::Bytes(bytes) => stream.write_all(bytes).await?,
            WriteSource::Reader(reader) => {
                tokio::io::copy(reader, stream).await?;
            }
        }
        stream.flush().await?;
        Ok(())
    }

    async fn stream(&mut self) -> Result<&mut ContentStream> {
        let stream = match self.stream.take() {
            Some(mut stream) => {
                stream.seek(SeekFrom::Start(0)).await?;
                stream
            }
            None => self.open_stream().await?,
        };
        Ok(self.stream.insert(stream))
    }

    async fn walk(&mut self, options: &WalkOptions) -> Result<WalkStream> {
        tracing::debug!(uri = %redact_uri(self.uri.as_str()), "local walk");
        Ok(walk_dir(self.path.clone(), options.clone()))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.flush().await?;
        }
        Ok(())
    }

    fn local_path(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}

/// Walk in ascending order of the rendered directory path.
///
/// Pending directories are keyed by their rendered path and the smallest is
/// listed next. A child's path extends its parent's, so every directory still
/// pending sorts after the one being emitted.
fn walk_dir(root: PathBuf, options: WalkOptions) -> WalkStream {
    let mut pending = BTreeMap::new();
    pending.insert(render_dir(&root), (root, 0usize));

    Box::pin(stream::try_unfold(
        (pending, options),
        |(mut pending, options)| async move {
            let Some((rendered, (dir, depth))) = pending.pop_first() else {
                return Ok(None);
            };
            let (dirs, files) = list_dir(&dir, options.follow_links).await?;
            if options.descend(depth) {
                for name in &dirs {
                    let child = dir.join(name);
                    pending.insert(render_dir(&child), (child, depth + 1));
                }
            }
            let entry = WalkEntry::new(rendered, dirs, files);
            Ok::<_, Error>(Some((entry, (pending, options))))
        },
    ))
}

/// Sorted subdirectory and file names directly under `dir`.
async fn list_dir(dir: &Path, follow_links: bool) -> Result<(Vec<String>, Vec<String>)> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    let mut listing = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = listing.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type().await?;
        let is_dir = if file_type.is_symlink() && follow_links {
            tokio::fs::metadata(entry.path())
                .await
                .map(|meta| meta.is_dir())
                .unwrap_or(false)
        } else {
            file_type.is_dir()
        };
        if is_dir {
            dirs.push(name);
        } else {
            files.push(name);
        }
    }
    dirs.sort();
    files.sort();
    Ok((dirs, files))
}

fn render_dir(dir: &Path) -> String {
    let text = dir.to_string_lossy();
    let trimmed = text.trim_end_matches(SEPARATOR);
    format!("{}{}", trimmed, SEPARATOR)
}
