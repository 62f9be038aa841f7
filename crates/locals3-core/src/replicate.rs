//! Pull-through replication from an upstream S3 endpoint.
//!
//! [`Replicating`] wraps any [`ObjectStore`]. When the protocol layer misses
//! on a read it calls [`ObjectStore::replicate_object`], which fetches
//! `{endpoint}/{bucket}/{key}` from upstream, stores the result locally and
//! returns it.

use std::collections::BTreeMap;
use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::{debug, info, warn};

use locals3_model::{Bucket, BucketQuery, BucketQueryResult, PartRef, StoredObject};

use crate::error::StoreError;
use crate::store::{MetadataDirective, ObjectStore, ObjectUpload};

/// Characters escaped in each key segment of the upstream URL.
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

const META_PREFIX: &str = "x-amz-meta-";

/// HTTP client side of replication.
#[derive(Debug, Clone)]
pub struct Upstream {
    endpoint: String,
    timeout: Duration,
}

impl Upstream {
    /// Fetch from `endpoint` with a 30 second timeout.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_owned(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Override the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The endpoint objects are fetched from.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// URL of an object on the upstream endpoint.
    #[must_use]
    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint,
            utf8_percent_encode(bucket, KEY_SEGMENT),
            utf8_percent_encode(key, KEY_SEGMENT)
        )
    }

    /// GET an object from upstream. A 404 yields `Ok(None)`.
    ///
    /// Blocks the calling thread.
    pub fn fetch(&self, bucket: &str, key: &str) -> Result<Option<ObjectUpload>, StoreError> {
        let url = self.object_url(bucket, key);
        let upstream_err = |message: String| StoreError::Upstream {
            url: url.clone(),
            message,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| upstream_err(e.to_string()))?;
        let response = client
            .get(&url)
            .send()
            .map_err(|e| upstream_err(e.to_string()))?;

        let status = response.status();
        if status == http::StatusCode::NOT_FOUND {
            debug!(%url, "object not found upstream");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(upstream_err(format!("upstream answered {status}")));
        }

        let headers = response.headers();
        let content_type = headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let custom_metadata: BTreeMap<String, String> = headers
            .iter()
            .filter_map(|(name, value)| {
                let suffix = name.as_str().strip_prefix(META_PREFIX)?;
                Some((suffix.to_owned(), value.to_str().ok()?.to_owned()))
            })
            .collect();
        let data = response.bytes().map_err(|e| upstream_err(e.to_string()))?;

        Ok(Some(ObjectUpload {
            data,
            content_type,
            custom_metadata,
        }))
    }
}

/// An [`ObjectStore`] that fills read misses from an [`Upstream`].
#[derive(Debug)]
pub struct Replicating<S> {
    inner: S,
    upstream: Upstream,
}

impl<S: ObjectStore> Replicating<S> {
    /// Wrap `inner`, fetching misses from `upstream`.
    pub fn new(inner: S, upstream: Upstream) -> Self {
        Self { inner, upstream }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: ObjectStore> ObjectStore for Replicating<S> {
    fn list_buckets(&self) -> Result<Vec<Bucket>, StoreError> {
        self.inner.list_buckets()
    }

    fn get_bucket(&self, name: &str) -> Result<Option<Bucket>, StoreError> {
        self.inner.get_bucket(name)
    }

    fn create_bucket(&self, name: &str) -> Result<Bucket, StoreError> {
        self.inner.create_bucket(name)
    }

    fn delete_bucket(&self, name: &str) -> Result<(), StoreError> {
        self.inner.delete_bucket(name)
    }

    fn query_objects(
        &self,
        bucket: &str,
        query: &BucketQuery,
    ) -> Result<BucketQueryResult, StoreError> {
        self.inner.query_objects(bucket, query)
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Option<StoredObject>, StoreError> {
        self.inner.get_object(bucket, key)
    }

    fn store_object(
        &self,
        bucket: &str,
        key: &str,
        upload: ObjectUpload,
    ) -> Result<StoredObject, StoreError> {
        self.inner.store_object(bucket, key, upload)
    }

    fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        directive: &MetadataDirective,
    ) -> Result<Option<StoredObject>, StoreError> {
        self.inner
            .copy_object(src_bucket, src_key, dst_bucket, dst_key, directive)
    }

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.inner.delete_object(bucket, key)
    }

    fn combine_parts(
        &self,
        bucket: &str,
        upload_id: &str,
        final_key: &str,
        parts: &[PartRef],
    ) -> Result<StoredObject, StoreError> {
        self.inner.combine_parts(bucket, upload_id, final_key, parts)
    }

    fn replicate_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<StoredObject>, StoreError> {
        let upload = match self.upstream.fetch(bucket, key) {
            Ok(Some(upload)) => upload,
            Ok(None) => return Ok(None),
            // An unreachable or refusing upstream is a miss, not a server fault.
            Err(StoreError::Upstream { url, message }) => {
                warn!(%url, %message, "upstream fetch failed");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        self.inner.create_bucket(bucket)?;
        let stored = self.inner.store_object(bucket, key, upload)?;
        info!(bucket, key, size = stored.size(), "replicated object from upstream");
        Ok(Some(stored))
    }
}
