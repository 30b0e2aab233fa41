//! Backend adapters.
//!
//! Each file adapter implements [`RemoteBackend`](crate::RemoteBackend) on
//! top of a narrow service interface:
//!
//! | Adapter          | Service interface | Connector              | Real client (feature)          |
//! |------------------|-------------------|------------------------|--------------------------------|
//! | [`S3Backend`]    | [`ObjectStore`]   | [`ObjectStoreConnector`] | `aws-sdk-s3` (`s3`)          |
//! | [`SftpBackend`]  | [`SftpSession`]   | [`SftpConnector`]      | `russh` + `russh-sftp` (`sftp`) |
//! | [`DynamoMap`]    | [`KeyValueStore`] | [`KeyValueConnector`]  | `aws-sdk-dynamodb` (`dynamodb`) |
//!
//! [`DynamoMap`] is a [`Mapping`](crate::Mapping) rather than a file handle.
//!
//! The service interfaces carry no handle semantics: they are plain
//! get/put/list primitives. [`memory`] provides in-process implementations
//! of all of them for tests and offline use.

mod dynamo;
pub mod memory;
mod s3;
mod sftp;

#[cfg(feature = "s3")]
mod aws;
#[cfg(feature = "dynamodb")]
mod dynamo_sdk;
#[cfg(any(feature = "s3", feature = "dynamodb"))]
mod sdk;
#[cfg(feature = "sftp")]
mod ssh;

pub(crate) use dynamo::default_connector as default_table_connector;
pub use dynamo::{
    DynamoMap, Item, ItemStream, KeyKind, KeyValueConnector, KeyValueStore, ScanPage, TableInfo,
};
pub use memory::{MemoryKeyValueStore, MemoryObjectStore, MemorySftp};
pub use s3::{ObjectStore, ObjectStoreConnector, S3Backend, S3File};
pub use sftp::{RemoteEntry, SftpBackend, SftpConnector, SftpFile, SftpSession};

#[cfg(feature = "s3")]
pub use aws::AwsConnector;
#[cfg(feature = "dynamodb")]
pub use dynamo_sdk::DynamoConnector;
#[cfg(feature = "sftp")]
pub use ssh::SshConnector;
