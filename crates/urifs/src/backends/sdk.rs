//! Shared SDK configuration for the object-storage and table clients.
//!
//! Recognized credential keys:
//!
//! | Key                      | Effect                                   |
//! |--------------------------|------------------------------------------|
//! | `aws_access_key_id`      | static access key (with the secret)      |
//! | `aws_secret_access_key`  | static secret key                        |
//! | `aws_session_token`      | session token for temporary credentials  |
//! | `region` / `region_name` | region                                   |
//! | `endpoint_url`           | custom endpoint (compatible services)    |
//! | `timeout_secs`           | per-operation timeout                    |
//!
//! Anything not given falls back to the SDK's environment/profile chain.

use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use std::time::Duration;

#[cfg(not(feature = "s3"))]
use aws_sdk_dynamodb::config::Credentials as StaticCredentials;
#[cfg(feature = "s3")]
use aws_sdk_s3::config::Credentials as StaticCredentials;

use crate::error::{Error, Result};
use crate::options::Credentials;

/// Load the shared configuration from `credentials`.
pub(super) async fn load_config(credentials: &Credentials) -> Result<SdkConfig> {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = credentials
        .get("region")
        .or_else(|| credentials.get("region_name"))
    {
        loader = loader.region(Region::new(region.to_string()));
    }
    if let (Some(key_id), Some(secret)) = (
        credentials.get("aws_access_key_id"),
        credentials.get("aws_secret_access_key"),
    ) {
        loader = loader.credentials_provider(StaticCredentials::new(
            key_id,
            secret,
            credentials.get("aws_session_token").map(str::to_string),
            None,
            "urifs",
        ));
    }
    if let Some(endpoint) = credentials.get("endpoint_url") {
        loader = loader.endpoint_url(endpoint);
    }
    if let Some(secs) = credentials.get("timeout_secs") {
        let secs: u64 = secs
            .parse()
            .map_err(|_| Error::Parse(format!("timeout_secs: not a number: {secs}")))?;
        loader = loader.timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(Duration::from_secs(secs))
                .build(),
        );
    }

    Ok(loader.load().await)
}
