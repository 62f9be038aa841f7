//! In-memory object store.
//!
//! Buckets live in a [`DashMap`]; each bucket keeps its objects in a
//! [`BTreeMap`] so listings come out in key order without sorting. Objects
//! larger than the configured threshold are spilled to temporary files and
//! removed again when their entry is dropped (see the [`Drop`] impl on
//! [`StoredData`]).

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, trace, warn};

use locals3_model::{
    Bucket, BucketQuery, BucketQueryResult, ObjectMetadata, ObjectSummary, PartRef, StoredObject,
};

use crate::error::StoreError;
use crate::query;
use crate::store::{MetadataDirective, ObjectStore, ObjectUpload, assemble_parts};

/// Default maximum object size kept in memory before spilling (512 KiB).
pub const DEFAULT_MAX_MEMORY_SIZE: usize = 524_288;

// ---------------------------------------------------------------------------
// StoredData
// ---------------------------------------------------------------------------

/// Object bytes, either held in memory or spilled to a temp file.
enum StoredData {
    InMemory { data: Bytes },
    OnDisk { path: PathBuf, size: u64 },
}

impl std::fmt::Debug for StoredData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InMemory { data } => f
                .debug_struct("InMemory")
                .field("size", &data.len())
                .finish(),
            Self::OnDisk { path, size } => f
                .debug_struct("OnDisk")
                .field("path", path)
                .field("size", size)
                .finish(),
        }
    }
}

impl Drop for StoredData {
    fn drop(&mut self) {
        if let Self::OnDisk { path, .. } = self {
            if let Err(e) = std::fs::remove_file(path.as_path()) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to remove temp file");
                }
            } else {
                trace!(path = %path.display(), "removed temp file");
            }
        }
    }
}

impl StoredData {
    fn read_all(&self) -> Result<Bytes, StoreError> {
        match self {
            Self::InMemory { data } => Ok(data.clone()),
            Self::OnDisk { path, .. } => std::fs::read(path)
                .map(Bytes::from)
                .map_err(|e| StoreError::io(path.clone(), e)),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ObjectEntry {
    metadata: ObjectMetadata,
    data: StoredData,
}

#[derive(Debug)]
struct BucketEntry {
    creation_date: DateTime<Utc>,
    objects: BTreeMap<String, ObjectEntry>,
}

impl BucketEntry {
    fn new() -> Self {
        Self {
            creation_date: Utc::now(),
            objects: BTreeMap::new(),
        }
    }
}

/// Object store that keeps everything in process memory.
///
/// # Examples
///
/// ```
/// use locals3_core::{MemoryStore, ObjectStore, ObjectUpload};
///
/// let store = MemoryStore::default();
/// store.create_bucket("b").expect("create bucket");
/// store
///     .store_object("b", "hello.txt", ObjectUpload::from_bytes("hello"))
///     .expect("store object");
/// let obj = store.get_object("b", "hello.txt").expect("get").expect("present");
/// assert_eq!(obj.data.as_ref(), b"hello");
/// ```
pub struct MemoryStore {
    buckets: DashMap<String, BucketEntry>,
    max_memory_size: usize,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("bucket_count", &self.buckets.len())
            .field("max_memory_size", &self.max_memory_size)
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MEMORY_SIZE)
    }
}

impl MemoryStore {
    /// Create a store that spills objects larger than `max_memory_size` bytes.
    #[must_use]
    pub fn new(max_memory_size: usize) -> Self {
        Self {
            buckets: DashMap::new(),
            max_memory_size,
        }
    }

    fn store_data(&self, data: Bytes) -> Result<StoredData, StoreError> {
        if data.len() > self.max_memory_size {
            spill_to_disk(&data)
        } else {
            Ok(StoredData::InMemory { data })
        }
    }

    fn read_entry(&self, bucket: &str, key: &str) -> Result<Option<StoredObject>, StoreError> {
        let Some(entry) = self.buckets.get(bucket) else {
            return Ok(None);
        };
        let Some(object) = entry.objects.get(key) else {
            return Ok(None);
        };
        Ok(Some(StoredObject {
            key: key.to_owned(),
            metadata: object.metadata.clone(),
            data: object.data.read_all()?,
        }))
    }

    fn insert(
        &self,
        bucket: &str,
        key: &str,
        metadata: ObjectMetadata,
        data: Bytes,
    ) -> Result<StoredObject, StoreError> {
        let stored = self.store_data(data.clone())?;
        let mut entry = self
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::no_such_bucket(bucket))?;
        entry.objects.insert(
            key.to_owned(),
            ObjectEntry {
                metadata: metadata.clone(),
                data: stored,
            },
        );
        debug!(bucket, key, size = metadata.size, "stored object");
        Ok(StoredObject {
            key: key.to_owned(),
            metadata,
            data,
        })
    }
}

/// Write data to a temporary file that outlives the handle.
fn spill_to_disk(data: &[u8]) -> Result<StoredData, StoreError> {
    let size = data.len() as u64;
    let mut temp = tempfile::NamedTempFile::new()
        .map_err(|e| StoreError::io(std::env::temp_dir(), e))?;
    temp.write_all(data)
        .map_err(|e| StoreError::io(temp.path().to_path_buf(), e))?;
    let path = temp
        .into_temp_path()
        .keep()
        .map_err(|e| StoreError::io(e.path.to_path_buf(), e.error))?;
    trace!(path = %path.display(), size, "spilled data to disk");
    Ok(StoredData::OnDisk { path, size })
}

impl ObjectStore for MemoryStore {
    fn list_buckets(&self) -> Result<Vec<Bucket>, StoreError> {
        let mut buckets: Vec<Bucket> = self
            .buckets
            .iter()
            .map(|entry| Bucket {
                name: entry.key().clone(),
                creation_date: entry.creation_date,
            })
            .collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    fn get_bucket(&self, name: &str) -> Result<Option<Bucket>, StoreError> {
        Ok(self.buckets.get(name).map(|entry| Bucket {
            name: name.to_owned(),
            creation_date: entry.creation_date,
        }))
    }

    fn create_bucket(&self, name: &str) -> Result<Bucket, StoreError> {
        let entry = self
            .buckets
            .entry(name.to_owned())
            .or_insert_with(BucketEntry::new);
        Ok(Bucket {
            name: name.to_owned(),
            creation_date: entry.creation_date,
        })
    }

    fn delete_bucket(&self, name: &str) -> Result<(), StoreError> {
        let removed = self
            .buckets
            .remove_if(name, |_, entry| entry.objects.is_empty());
        if removed.is_some() {
            debug!(bucket = name, "deleted bucket");
            return Ok(());
        }
        if self.buckets.contains_key(name) {
            Err(StoreError::BucketNotEmpty {
                bucket: name.to_owned(),
            })
        } else {
            Err(StoreError::no_such_bucket(name))
        }
    }

    fn query_objects(
        &self,
        bucket: &str,
        query: &BucketQuery,
    ) -> Result<BucketQueryResult, StoreError> {
        let entry = self
            .buckets
            .get(bucket)
            .ok_or_else(|| StoreError::no_such_bucket(bucket))?;
        let summaries = entry.objects.iter().map(|(key, object)| ObjectSummary {
            key: key.clone(),
            last_modified: object.metadata.last_modified,
            md5_hex: object.metadata.md5_hex.clone(),
            size: object.metadata.size,
        });
        Ok(query::evaluate(bucket, summaries, query))
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Option<StoredObject>, StoreError> {
        self.read_entry(bucket, key)
    }

    fn store_object(
        &self,
        bucket: &str,
        key: &str,
        upload: ObjectUpload,
    ) -> Result<StoredObject, StoreError> {
        let metadata = upload.to_metadata();
        self.insert(bucket, key, metadata, upload.data)
    }

    fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        directive: &MetadataDirective,
    ) -> Result<Option<StoredObject>, StoreError> {
        // The source guard is released before the destination is locked.
        let Some(source) = self.read_entry(src_bucket, src_key)? else {
            return Ok(None);
        };
        let metadata = directive.apply(&source.metadata);
        self.insert(dst_bucket, dst_key, metadata, source.data)
            .map(Some)
    }

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        if let Some(mut entry) = self.buckets.get_mut(bucket) {
            if entry.objects.remove(key).is_some() {
                debug!(bucket, key, "deleted object");
            }
        }
        Ok(())
    }

    fn combine_parts(
        &self,
        bucket: &str,
        upload_id: &str,
        final_key: &str,
        parts: &[PartRef],
    ) -> Result<StoredObject, StoreError> {
        let combined = assemble_parts(parts, |part| {
            Ok(self
                .read_entry(bucket, &part.staged_key)?
                .map(|object| object.data))
        })?;
        let stored = self.store_object(bucket, final_key, ObjectUpload::from_bytes(combined))?;
        for part in parts {
            self.delete_object(bucket, &part.staged_key)?;
        }
        debug!(bucket, upload_id, key = final_key, parts = parts.len(), "combined parts");
        Ok(stored)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
