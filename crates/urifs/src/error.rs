//! Error types for urifs
//!
//! This module provides error types for handle construction and I/O with the
//! following design goals:
//! - One variant per failure category so callers can match on it
//! - Backend-native failures pass through untouched
//! - No credentials in messages (URIs are redacted before they get here)

use std::io::ErrorKind;
use thiserror::Error;

/// Result type alias using urifs' Error.
pub type Result<T> = std::result::Result<T, Error>;

/// urifs error types.
#[derive(Error, Debug)]
pub enum Error {
    /// No handler is registered for the URI scheme.
    #[error("unsupported URI scheme: '{0}'")]
    Scheme(String),

    /// The access mode is not one of the recognized modes.
    #[error("cannot open in '{0}' mode")]
    Mode(String),

    /// Content access in a non-write mode on a resource that does not exist.
    #[error("{0} does not exist")]
    FileNotFound(String),

    /// Download preconditions failed (source not remote, or target remote).
    #[error("download error: {0}")]
    Download(String),

    /// No parser is registered for a mapping file's extension.
    #[error("no parser registered for extension '{0}'")]
    Extension(String),

    /// The operation is not provided by this backend.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// The URI could not be parsed or lacks a required component.
    #[error("invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// Key missing from a mapping.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Structured content could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// Every mapping in a chain failed.
    #[error("all {} chained mappings failed", .0.len())]
    Chain(Vec<Error>),

    /// I/O error from local files or a service reporting a missing object.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by a backend service client, passed through unchanged.
    #[error("{backend} error: {source}")]
    Backend {
        backend: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Wrap a backend-native error.
    pub fn backend(
        backend: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Backend {
            backend,
            source: source.into(),
        }
    }

    /// Create an invalid-URI error.
    pub fn invalid_uri(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-implemented error for `operation` on `backend`.
    pub fn not_implemented(backend: &str, operation: &str) -> Self {
        Self::NotImplemented(format!("{operation} is not supported by the {backend} backend"))
    }

    /// True when the error reports a missing file or object.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Io(err) => err.kind() == ErrorKind::NotFound,
            Error::FileNotFound(_) => true,
            _ => false,
        }
    }
}
