//! SFTP client backed by `russh` + `russh-sftp`.
//!
//! Recognized credential keys: `username`, `password`, `port`, `private_key`
//! (path to a key file), `private_key_passphrase`, `timeout_secs`.
//!
//! Host keys are not verified.

use async_trait::async_trait;
use russh::client;
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use russh_sftp::client::SftpSession as SftpClient;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::sftp::{DEFAULT_PORT, RemoteEntry, SftpConnector, SftpSession};
use crate::error::{Error, Result};
use crate::options::Credentials;

const BACKEND: &str = "sftp";

/// Opens sessions over SSH.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector;

struct AcceptAnyHostKey;

impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}

fn ssh_err(err: impl std::error::Error + Send + Sync + 'static) -> Error {
    Error::backend(BACKEND, err)
}

#[async_trait]
impl SftpConnector for SshConnector {
    async fn connect(&self, host: &str, credentials: &Credentials) -> Result<Box<dyn SftpSession>> {
        let port = match credentials.get("port") {
            Some(port) => port
                .parse::<u16>()
                .map_err(|_| Error::Parse(format!("port: not a number: {port}")))?,
            None => DEFAULT_PORT,
        };
        let username = credentials
            .get("username")
            .ok_or_else(|| Error::Parse("sftp connection requires a username".into()))?;

        let mut config = client::Config::default();
        if let Some(secs) = credentials.get("timeout_secs") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| Error::Parse(format!("timeout_secs: not a number: {secs}")))?;
            config.inactivity_timeout = Some(Duration::from_secs(secs));
        }

        let mut handle = client::connect(Arc::new(config), (host, port), AcceptAnyHostKey)
            .await
            .map_err(ssh_err)?;

        let authenticated = if let Some(key_path) = credentials.get("private_key") {
            let key = load_secret_key(key_path, credentials.get("private_key_passphrase"))
                .map_err(ssh_err)?;
            let hash = handle
                .best_supported_rsa_hash()
                .await
                .map_err(ssh_err)?
                .flatten();
            handle
                .authenticate_publickey(username, PrivateKeyWithHashAlg::new(Arc::new(key), hash))
                .await
                .map_err(ssh_err)?
                .success()
        } else {
            let password = credentials.get("password").unwrap_or_default();
            handle
                .authenticate_password(username, password)
                .await
                .map_err(ssh_err)?
                .success()
        };
        if !authenticated {
            return Err(Error::backend(
                BACKEND,
                format!("authentication failed for {username}@{host}:{port}"),
            ));
        }

        let channel = handle.channel_open_session().await.map_err(ssh_err)?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(ssh_err)?;
        let sftp = SftpClient::new(channel.into_stream())
            .await
            .map_err(ssh_err)?;

        Ok(Box::new(SshSession {
            sftp,
            _ssh: handle,
        }))
    }
}

struct SshSession {
    sftp: SftpClient,
    // Keeps the transport open for as long as the sftp channel lives.
    _ssh: client::Handle<AcceptAnyHostKey>,
}

#[async_trait]
impl SftpSession for SshSession {
    async fn exists(&self, path: &str) -> Result<bool> {
        self.sftp.try_exists(path).await.map_err(ssh_err)
    }

    async fn get(&self, remote: &str, local: &Path) -> Result<()> {
        let body = self.sftp.read(remote).await.map_err(ssh_err)?;
        tokio::fs::write(local, body).await?;
        Ok(())
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let listing = self.sftp.read_dir(path).await.map_err(ssh_err)?;
        Ok(listing
            .map(|entry| RemoteEntry {
                name: entry.file_name(),
                is_dir: entry.file_type().is_dir(),
            })
            .collect())
    }
}
