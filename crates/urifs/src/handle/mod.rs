//! File handles.
//!
//! Provides the handle contract and its implementations:
//! - [`LocalFile`]: files on the local filesystem
//! - [`RemoteFile`]: any [`RemoteBackend`] wrapped with lazy connection and
//!   stream caching
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 FileHandle trait                │
//! │     exists / read / write / stream / walk       │
//! └───────────────────────┬─────────────────────────┘
//!            ┌────────────┴─────────────┐
//!     ┌──────▼──────┐           ┌───────▼───────┐
//!     │  LocalFile  │           │ RemoteFile<B> │  + RemoteHandle
//!     └─────────────┘           └───────┬───────┘  (connect, download)
//!                                       │ wraps
//!                          ┌────────────┴────────────┐
//!                   ┌──────▼──────┐           ┌──────▼──────┐
//!                   │  S3Backend  │           │ SftpBackend │
//!                   └─────────────┘           └─────────────┘
//! ```

mod local;
mod remote;

pub use local::LocalFile;
pub use remote::{RemoteBackend, RemoteFile, UnimplementedBackend};

use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncWrite};

use crate::error::Result;
use crate::mode::Mode;
use crate::options::{Credentials, WalkOptions};
use crate::uri::Uri;
use crate::walk::WalkStream;

/// Readable, writable, seekable byte stream.
pub trait StreamIo: AsyncRead + AsyncWrite + AsyncSeek + Send + Sync + Unpin {}

impl<T: AsyncRead + AsyncWrite + AsyncSeek + Send + Sync + Unpin> StreamIo for T {}

/// Content stream cached by a handle.
pub type ContentStream = Box<dyn StreamIo>;

/// Content accepted by [`FileHandle::write`].
pub enum WriteSource<'a> {
    /// Raw bytes.
    Bytes(&'a [u8]),
    /// Anything readable, consumed to EOF (e.g. another handle's stream).
    Reader(&'a mut (dyn AsyncRead + Send + Unpin)),
}

impl<'a> WriteSource<'a> {
    /// Wrap a reader.
    pub fn reader<R: AsyncRead + Send + Unpin>(reader: &'a mut R) -> Self {
        WriteSource::Reader(reader)
    }

    /// Collect the content into memory.
    pub async fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            WriteSource::Bytes(bytes) => Ok(bytes.to_vec()),
            WriteSource::Reader(reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Ok(buf)
            }
        }
    }
}

impl<'a> From<&'a [u8]> for WriteSource<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        WriteSource::Bytes(bytes)
    }
}

impl<'a> From<&'a str> for WriteSource<'a> {
    fn from(text: &'a str) -> Self {
        WriteSource::Bytes(text.as_bytes())
    }
}

impl<'a> From<&'a String> for WriteSource<'a> {
    fn from(text: &'a String) -> Self {
        WriteSource::Bytes(text.as_bytes())
    }
}

impl<'a> From<&'a Vec<u8>> for WriteSource<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        WriteSource::Bytes(bytes)
    }
}

impl<'a> From<&'a mut ContentStream> for WriteSource<'a> {
    fn from(stream: &'a mut ContentStream) -> Self {
        WriteSource::Reader(stream)
    }
}

impl fmt::Debug for WriteSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            WriteSource::Reader(_) => f.write_str("Reader"),
        }
    }
}

/// A handle on one addressable resource.
///
/// Handles cache their content stream (and, for remote backends, their
/// connection) with a check-then-create that is not atomic; every stateful
/// operation therefore takes `&mut self`.
#[async_trait]
pub trait FileHandle: Send + fmt::Debug {
    /// Parsed URI.
    fn uri(&self) -> &Uri;

    /// Access mode.
    fn mode(&self) -> Mode;

    /// Directory part of the path.
    fn workdir(&self) -> &str {
        self.uri().workdir()
    }

    /// Leaf filename.
    fn filename(&self) -> &str {
        self.uri().filename()
    }

    /// Whether the filename matches `pattern`, anchored at its start.
    fn matches(&self, pattern: &Regex) -> bool {
        pattern.find(self.filename()).is_some_and(|m| m.start() == 0)
    }

    /// Whether the resource exists.
    async fn exists(&mut self) -> Result<bool>;

    /// Read up to `size` bytes (everything when `None`) from the start.
    async fn read(&mut self, size: Option<usize>) -> Result<Vec<u8>> {
        let stream = self.stream().await?;
        let mut buf = Vec::new();
        match size {
            Some(limit) => {
                stream.take(limit as u64).read_to_end(&mut buf).await?;
            }
            None => {
                stream.read_to_end(&mut buf).await?;
            }
        }
        Ok(buf)
    }

    /// Read the whole content as UTF-8.
    async fn read_to_string(&mut self) -> Result<String> {
        let bytes = self.read(None).await?;
        String::from_utf8(bytes)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err).into())
    }

    /// Write content.
    async fn write(&mut self, content: WriteSource<'_>) -> Result<()>;

    /// Content stream, rewound to offset zero.
    ///
    /// The stream is created on first use and cached until [`close`].
    ///
    /// [`close`]: FileHandle::close
    async fn stream(&mut self) -> Result<&mut ContentStream>;

    /// Walk the directory tree rooted at this handle's path.
    ///
    /// Failing to reach the backend is reported here; failures while listing
    /// come out of the stream.
    async fn walk(&mut self, options: &WalkOptions) -> Result<WalkStream>;

    /// Release the cached stream. Closing an unopened or already closed
    /// handle is a no-op.
    async fn close(&mut self) -> Result<()>;

    /// Local filesystem path, for handles backed by local files.
    fn local_path(&self) -> Option<PathBuf> {
        None
    }

    /// Whether this handle implements [`RemoteHandle`].
    fn is_remote(&self) -> bool {
        false
    }

    /// Remote capabilities, if any.
    fn as_remote(&mut self) -> Option<&mut dyn RemoteHandle> {
        None
    }
}

/// Handle on a resource behind a network connection.
#[async_trait]
pub trait RemoteHandle: FileHandle {
    /// (Re)connect. A non-empty `credentials` bag replaces the stored one;
    /// the new connection replaces any cached connection.
    async fn connect(&mut self, credentials: Option<Credentials>) -> Result<()>;

    /// Copy the remote content into `target`, a local handle, and return it.
    async fn download(&mut self, target: Box<dyn FileHandle>) -> Result<Box<dyn FileHandle>>;
}
