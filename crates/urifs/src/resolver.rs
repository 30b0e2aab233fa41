//! URI resolution: string in, handle out.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::handle::FileHandle;
use crate::logging_impl::redact_uri;
use crate::map::Mapping;
use crate::mode::Mode;
use crate::options::{Credentials, OpenOptions, WalkOptions};
use crate::registry::SchemeRegistry;
use crate::uri::{Uri, expand_home};
use crate::walk::WalkStream;

/// Directory, under the home directory, that downloads land in by default.
pub const DOWNLOADS_DIR: &str = "Downloads";

fn default_download_target(filename: &str) -> Result<String> {
    if filename.is_empty() {
        return Err(Error::Download(
            "source has no filename; give an explicit target".into(),
        ));
    }
    let home = dirs::home_dir()
        .ok_or_else(|| Error::Download("no home directory for the default target".into()))?;
    let target: PathBuf = home.join(DOWNLOADS_DIR).join(filename);
    Ok(target.to_string_lossy().into_owned())
}

impl SchemeRegistry {
    /// Open a handle.
    ///
    /// A leading `~` is expanded, the scheme is looked up and the handler is
    /// built with `options`. No connection is made and no file is touched.
    pub fn open(&self, uri: &str, options: OpenOptions) -> Result<Box<dyn FileHandle>> {
        let expanded = expand_home(uri);
        let parsed = Uri::parse(&expanded)?;
        let handle = self.construct_file(parsed, options)?;
        tracing::debug!(uri = %redact_uri(&expanded), mode = %handle.mode(), "opened handle");
        Ok(handle)
    }

    /// Whether the resource at `uri` exists.
    pub async fn exists(&self, uri: &str, options: OpenOptions) -> Result<bool> {
        self.open(uri, options)?.exists().await
    }

    /// Walk the tree rooted at `uri`.
    ///
    /// The stream outlives the handle it was produced from.
    pub async fn walk(
        &self,
        uri: &str,
        options: OpenOptions,
        walk: &WalkOptions,
    ) -> Result<WalkStream> {
        self.open(uri, options)?.walk(walk).await
    }

    /// Copy a remote resource to a local target and return the target handle.
    ///
    /// Without `target` the file lands in `~/Downloads/<filename>`. The target
    /// is opened in `r+` mode. A local source or a remote target is refused
    /// before any connection is made.
    pub async fn download(
        &self,
        source: &str,
        target: Option<&str>,
        credentials: Option<Credentials>,
    ) -> Result<Box<dyn FileHandle>> {
        let mut source = self.open(source, OpenOptions::new())?;
        let target = match target {
            Some(target) => target.to_string(),
            None => default_download_target(source.filename())?,
        };
        let target = self.open(&target, OpenOptions::new().mode(Mode::ReadWrite))?;

        let Some(remote) = source.as_remote() else {
            return Err(Error::Download("cannot download from non-remote".into()));
        };
        if target.is_remote() {
            return Err(Error::Download(
                "cannot download remote-to-remote; stage through a local URI".into(),
            ));
        }

        remote.connect(credentials).await?;
        remote.download(target).await
    }

    /// Open a mapping.
    pub fn map(&self, uri: &str, options: OpenOptions) -> Result<Box<dyn Mapping>> {
        let expanded = expand_home(uri);
        let parsed = Uri::parse(&expanded)?;
        let mapping = self.construct_map(parsed, options)?;
        tracing::debug!(uri = %redact_uri(&expanded), "opened mapping");
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_target_uses_downloads_directory() {
        if dirs::home_dir().is_some() {
            let target = default_download_target("report.csv").unwrap();
            assert!(target.ends_with("/Downloads/report.csv"));
        }
    }

    #[test]
    fn default_target_requires_filename() {
        assert!(matches!(
            default_download_target(""),
            Err(Error::Download(_))
        ));
    }

    #[tokio::test]
    async fn local_source_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.txt");
        tokio::fs::write(&source, "a").await.unwrap();
        let target = dir.path().join("b.txt");

        let registry = SchemeRegistry::new();
        let err = registry
            .download(source.to_str().unwrap(), Some(target.to_str().unwrap()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Download(msg) if msg.contains("non-remote")));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn remote_target_is_refused_before_connecting() {
        let registry = SchemeRegistry::new();
        let err = registry
            .download("s3://bucket/a.txt", Some("s3://bucket/b.txt"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Download(msg) if msg.contains("remote-to-remote")));
    }

    #[test]
    fn open_unknown_scheme() {
        let registry = SchemeRegistry::new();
        assert!(matches!(
            registry.open("gopher://host/x", OpenOptions::new()),
            Err(Error::Scheme(s)) if s == "gopher"
        ));
    }
}
