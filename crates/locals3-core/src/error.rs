//! Storage error types.

use std::path::PathBuf;

/// Errors reported by an [`ObjectStore`](crate::ObjectStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The bucket does not exist.
    #[error("The specified bucket does not exist: {bucket}")]
    NoSuchBucket {
        /// The bucket name that was not found.
        bucket: String,
    },

    /// The bucket still holds objects.
    #[error("The bucket you tried to delete is not empty: {bucket}")]
    BucketNotEmpty {
        /// The bucket name.
        bucket: String,
    },

    /// The bucket name cannot be stored by this engine.
    #[error("Invalid bucket name: {bucket}")]
    InvalidBucketName {
        /// The offending name.
        bucket: String,
    },

    /// The key cannot be stored by this engine.
    #[error("Invalid key {key}: {reason}")]
    InvalidKey {
        /// The offending key.
        key: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A staged part is missing or its content does not match the manifest.
    #[error("Invalid part {part_number}: {reason}")]
    InvalidPart {
        /// The part number from the manifest.
        part_number: u32,
        /// Why the part was rejected.
        reason: &'static str,
    },

    /// Filesystem failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A metadata sidecar could not be read or written.
    #[error("invalid metadata for {path}: {source}")]
    Metadata {
        /// Sidecar path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The upstream endpoint could not be reached or answered an error.
    #[error("upstream fetch of {url} failed: {message}")]
    Upstream {
        /// Requested URL.
        url: String,
        /// Failure description.
        message: String,
    },

    /// Anything else.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl StoreError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Shorthand for [`StoreError::NoSuchBucket`].
    pub fn no_such_bucket(bucket: impl Into<String>) -> Self {
        Self::NoSuchBucket {
            bucket: bucket.into(),
        }
    }
}
