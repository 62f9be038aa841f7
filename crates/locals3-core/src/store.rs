//! The storage collaborator contract.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use chrono::Utc;

use locals3_model::types::DEFAULT_CONTENT_TYPE;
use locals3_model::{
    Bucket, BucketQuery, BucketQueryResult, ObjectMetadata, PartRef, StoredObject,
};

use crate::checksums;
use crate::error::StoreError;

/// Bytes and request-supplied metadata for an object being written.
#[derive(Debug, Clone, Default)]
pub struct ObjectUpload {
    /// Object content.
    pub data: Bytes,
    /// `Content-Type` supplied by the client.
    pub content_type: Option<String>,
    /// `x-amz-meta-*` values keyed by lowercase suffix.
    pub custom_metadata: BTreeMap<String, String>,
}

impl ObjectUpload {
    /// An upload with no metadata.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// Compute the metadata this upload will be stored with.
    #[must_use]
    pub fn to_metadata(&self) -> ObjectMetadata {
        ObjectMetadata {
            content_type: self
                .content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_owned()),
            md5_hex: checksums::compute_md5(&self.data),
            size: self.data.len() as u64,
            last_modified: Utc::now(),
            custom_metadata: self.custom_metadata.clone(),
        }
    }
}

/// What a copy does with the source object's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MetadataDirective {
    /// Keep the source object's content type and custom metadata.
    #[default]
    Copy,
    /// Use the metadata supplied with the copy request instead.
    Replace {
        /// New content type.
        content_type: Option<String>,
        /// New custom metadata.
        custom_metadata: BTreeMap<String, String>,
    },
}

impl MetadataDirective {
    /// Metadata for a copy of `source` holding `data`.
    #[must_use]
    pub fn apply(&self, source: &ObjectMetadata) -> ObjectMetadata {
        let mut metadata = ObjectMetadata {
            last_modified: Utc::now(),
            ..source.clone()
        };
        if let Self::Replace {
            content_type,
            custom_metadata,
        } = self
        {
            metadata.content_type = content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_owned());
            metadata.custom_metadata = custom_metadata.clone();
        }
        metadata
    }
}

/// A bucket/object store the protocol layer delegates to.
///
/// Calls are synchronous; implementations may block. Every write must be
/// atomic per key, and [`create_bucket`](Self::create_bucket) must behave as
/// create-or-fetch so concurrent lazy creation is safe.
pub trait ObjectStore: Send + Sync + fmt::Debug + 'static {
    /// All buckets, ordered by name.
    fn list_buckets(&self) -> Result<Vec<Bucket>, StoreError>;

    /// Look up a bucket.
    fn get_bucket(&self, name: &str) -> Result<Option<Bucket>, StoreError>;

    /// Create a bucket, or return the existing one.
    fn create_bucket(&self, name: &str) -> Result<Bucket, StoreError>;

    /// Delete an empty bucket.
    fn delete_bucket(&self, name: &str) -> Result<(), StoreError>;

    /// Evaluate a listing query against a bucket.
    fn query_objects(
        &self,
        bucket: &str,
        query: &BucketQuery,
    ) -> Result<BucketQueryResult, StoreError>;

    /// Fetch an object. A missing bucket or key yields `Ok(None)`.
    fn get_object(&self, bucket: &str, key: &str) -> Result<Option<StoredObject>, StoreError>;

    /// Write an object into an existing bucket.
    fn store_object(
        &self,
        bucket: &str,
        key: &str,
        upload: ObjectUpload,
    ) -> Result<StoredObject, StoreError>;

    /// Copy an object. A missing source yields `Ok(None)`.
    fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        directive: &MetadataDirective,
    ) -> Result<Option<StoredObject>, StoreError>;

    /// Delete an object. Deleting a missing object is not an error.
    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError>;

    /// Concatenate staged parts in the given order into `final_key`, then
    /// remove the staged parts.
    fn combine_parts(
        &self,
        bucket: &str,
        upload_id: &str,
        final_key: &str,
        parts: &[PartRef],
    ) -> Result<StoredObject, StoreError>;

    /// Try to populate a missing object from elsewhere. Stores without a
    /// replication source report `Ok(None)`.
    fn replicate_object(
        &self,
        _bucket: &str,
        _key: &str,
    ) -> Result<Option<StoredObject>, StoreError> {
        Ok(None)
    }
}

/// Concatenate part payloads after checking them against the manifest.
///
/// `read` returns the staged content for a part, or `None` if it is missing.
pub(crate) fn assemble_parts<F>(parts: &[PartRef], mut read: F) -> Result<Bytes, StoreError>
where
    F: FnMut(&PartRef) -> Result<Option<Bytes>, StoreError>,
{
    let mut combined = Vec::new();
    for part in parts {
        let data = read(part)?.ok_or(StoreError::InvalidPart {
            part_number: part.part_number,
            reason: "part was never uploaded",
        })?;
        if let Some(etag) = &part.etag {
            if !etag.is_empty() && *etag != checksums::compute_md5(&data) {
                return Err(StoreError::InvalidPart {
                    part_number: part.part_number,
                    reason: "etag does not match uploaded content",
                });
            }
        }
        combined.extend_from_slice(&data);
    }
    Ok(Bytes::from(combined))
}
