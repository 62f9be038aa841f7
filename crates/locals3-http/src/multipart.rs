//! Multipart upload coordination.
//!
//! Uploads have no server-side session: the upload id is only a namespace
//! for staged part keys. Parts are stored as ordinary objects under
//! `{upload_id}_{key}_part{n}` and stitched together on completion, after
//! which the store removes them. Buckets are created lazily at every step.

use uuid::Uuid;

use locals3_core::{MetadataDirective, ObjectStore, ObjectUpload, StoreError};
use locals3_model::{CopySource, PartRef, StoredObject};
use locals3_xml::{CompletedPart, parse_complete_multipart_upload};

/// Generate a new upload id.
#[must_use]
pub fn new_upload_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// The key a part is staged under.
#[must_use]
pub fn staged_key(upload_id: &str, key: &str, part_number: u32) -> String {
    format!("{upload_id}_{key}_part{part_number}")
}

/// The `Location` reported for an assembled or form-uploaded object.
#[must_use]
pub fn object_location(bucket: &str, key: &str, port: u16) -> String {
    format!("http://{bucket}.localhost:{port}/{key}")
}

/// Turn a completion manifest into part references in ascending part order.
///
/// Repeated part numbers keep their first entry.
#[must_use]
pub fn part_refs(upload_id: &str, key: &str, mut parts: Vec<CompletedPart>) -> Vec<PartRef> {
    parts.sort_by_key(|p| p.part_number);
    parts.dedup_by_key(|p| p.part_number);
    parts
        .into_iter()
        .map(|p| PartRef {
            staged_key: staged_key(upload_id, key, p.part_number),
            part_number: p.part_number,
            etag: p.etag,
        })
        .collect()
}

/// Stage an uploaded part.
pub fn stage_part<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
    key: &str,
    upload_id: &str,
    part_number: u32,
    upload: ObjectUpload,
) -> Result<StoredObject, StoreError> {
    store.create_bucket(bucket)?;
    store.store_object(bucket, &staged_key(upload_id, key, part_number), upload)
}

/// Stage a part by copying an existing object. A missing source yields `None`.
pub fn stage_part_copy<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
    key: &str,
    upload_id: &str,
    part_number: u32,
    source: &CopySource,
) -> Result<Option<StoredObject>, StoreError> {
    store.create_bucket(bucket)?;
    store.copy_object(
        &source.bucket,
        &source.key,
        bucket,
        &staged_key(upload_id, key, part_number),
        &MetadataDirective::Copy,
    )
}

/// Assemble the final object from a completion manifest body.
pub fn complete<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
    key: &str,
    upload_id: &str,
    manifest: &[u8],
) -> Result<StoredObject, StoreError> {
    store.create_bucket(bucket)?;
    let parts = part_refs(upload_id, key, parse_complete_multipart_upload(manifest));
    tracing::debug!(bucket, key, upload_id, parts = parts.len(), "completing multipart upload");
    store.combine_parts(bucket, upload_id, key, &parts)
}
