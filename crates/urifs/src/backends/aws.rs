//! Object-storage client backed by `aws-sdk-s3`.
//!
//! Credentials are read as described in the shared SDK configuration; on
//! top of those, `force_path_style=true` selects path-style addressing.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use super::s3::{ObjectStore, ObjectStoreConnector};
use crate::error::{Error, Result};
use crate::options::Credentials;

const BACKEND: &str = "s3";

/// Builds SDK clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsConnector;

#[async_trait]
impl ObjectStoreConnector for AwsConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn ObjectStore>> {
        let shared = super::sdk::load_config(credentials).await?;
        let mut config = aws_sdk_s3::config::Builder::from(&shared);
        if credentials.get("force_path_style") == Some("true") {
            config = config.force_path_style(true);
        }

        Ok(Arc::new(SdkStore {
            client: Client::from_conf(config.build()),
        }))
    }
}

struct SdkStore {
    client: Client,
}

fn not_found(bucket: &str, key: &str) -> Error {
    std::io::Error::new(ErrorKind::NotFound, format!("s3://{bucket}/{key} not found")).into()
}

#[async_trait]
impl ObjectStore for SdkStore {
    async fn head(&self, bucket: &str, key: &str) -> Result<()> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(()),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => {
                Err(not_found(bucket, key))
            }
            Err(err) => Err(Error::backend(BACKEND, err)),
        }
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                return Err(not_found(bucket, key));
            }
            Err(err) => return Err(Error::backend(BACKEND, err)),
        };
        let body = output
            .body
            .collect()
            .await
            .map_err(|err| Error::backend(BACKEND, err))?;
        Ok(body.into_bytes().to_vec())
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| Error::backend(BACKEND, err))?;
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| Error::backend(BACKEND, err))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .map(str::to_string),
            );
        }
        Ok(keys)
    }

    async fn download(&self, bucket: &str, key: &str, target: &Path) -> Result<()> {
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                return Err(not_found(bucket, key));
            }
            Err(err) => return Err(Error::backend(BACKEND, err)),
        };
        let mut reader = output.body.into_async_read();
        let mut file = tokio::fs::File::create(target).await?;
        tokio::io::copy(&mut reader, &mut file).await?;
        Ok(())
    }
}
