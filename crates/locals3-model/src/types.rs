//! Values exchanged with the storage engine.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default page size for object listings.
pub const DEFAULT_MAX_KEYS: usize = 1000;

/// Default content type for objects stored without one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Fixed owner reported in listings and ACL stubs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    /// Canonical user id.
    pub id: &'static str,
    /// Display name.
    pub display_name: &'static str,
}

impl Owner {
    /// The single owner every bucket and object belongs to.
    pub const LOCAL: Self = Self {
        id: "123",
        display_name: "locals3",
    };
}

/// A bucket as listed by the storage engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    /// Bucket name.
    pub name: String,
    /// When the bucket was created.
    pub creation_date: DateTime<Utc>,
}

impl Bucket {
    /// Create a bucket record stamped with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            creation_date: Utc::now(),
        }
    }
}

/// Metadata persisted alongside an object's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    /// MIME type served back as `Content-Type`.
    pub content_type: String,
    /// Hex MD5 of the content; served quoted as `ETag`.
    pub md5_hex: String,
    /// Content length in bytes.
    pub size: u64,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
    /// `x-amz-meta-*` values keyed by the lowercase header suffix.
    #[serde(default)]
    pub custom_metadata: BTreeMap<String, String>,
}

/// Read-only view of a stored object handed to the protocol layer.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Object key.
    pub key: String,
    /// Stored metadata.
    pub metadata: ObjectMetadata,
    /// The object bytes. Cloning is cheap and slicing does not copy.
    pub data: Bytes,
}

impl StoredObject {
    /// The ETag value, including the surrounding quotes.
    #[must_use]
    pub fn etag(&self) -> String {
        format!("\"{}\"", self.metadata.md5_hex)
    }

    /// Content length in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.metadata.size
    }
}

/// Listing parameters for a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketQuery {
    /// Only keys strictly after this one are returned.
    pub marker: Option<String>,
    /// Only keys starting with this prefix are returned.
    pub prefix: Option<String>,
    /// Maximum number of keys plus common prefixes.
    pub max_keys: usize,
    /// Keys containing this after the prefix are rolled up into common prefixes.
    pub delimiter: Option<String>,
}

impl Default for BucketQuery {
    fn default() -> Self {
        Self {
            marker: None,
            prefix: None,
            max_keys: DEFAULT_MAX_KEYS,
            delimiter: None,
        }
    }
}

/// One entry of an object listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    /// Object key.
    pub key: String,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
    /// Hex MD5 of the content.
    pub md5_hex: String,
    /// Content length in bytes.
    pub size: u64,
}

/// Result of evaluating a [`BucketQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketQueryResult {
    /// The bucket that was listed.
    pub bucket: String,
    /// The query that produced this result.
    pub query: BucketQuery,
    /// Matching objects in key order.
    pub objects: Vec<ObjectSummary>,
    /// Rolled-up prefixes when a delimiter was given.
    pub common_prefixes: Vec<String>,
    /// Whether more results exist past this page.
    pub is_truncated: bool,
    /// Marker to continue from when truncated.
    pub next_marker: Option<String>,
}

/// A staged multipart part referenced by a completion manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRef {
    /// 1-based part number.
    pub part_number: u32,
    /// ETag the client recorded for the part, without quotes.
    pub etag: Option<String>,
    /// Key under which the part was staged.
    pub staged_key: String,
}
