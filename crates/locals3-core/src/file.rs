//! Filesystem-backed object store.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<bucket>/<key segment>/.../<last segment>/.locals3_meta/content
//! <root>/<bucket>/<key segment>/.../<last segment>/.locals3_meta/metadata.json
//! ```
//!
//! A key ending in `/` keeps its files in `.locals3_meta_dir` instead, so
//! `photos` and `photos/` can coexist. Every file is written to a temp file
//! in the same directory and renamed into place; reads check the content
//! against the size and digest in the metadata.

use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use locals3_model::{
    Bucket, BucketQuery, BucketQueryResult, ObjectMetadata, ObjectSummary, PartRef, StoredObject,
};

use crate::checksums;
use crate::error::StoreError;
use crate::query;
use crate::store::{MetadataDirective, ObjectStore, ObjectUpload, assemble_parts};

const META_DIR: &str = ".locals3_meta";
const DIR_MARKER_META_DIR: &str = ".locals3_meta_dir";
const RESERVED_PREFIX: &str = ".locals3_";
const CONTENT_FILE: &str = "content";
const METADATA_FILE: &str = "metadata.json";

/// Reads of an object whose content and metadata disagree.
const READ_ATTEMPTS: usize = 3;

/// Object store persisting buckets as directories under a root.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| StoreError::io(root.clone(), e))?;
        debug!(root = %root.display(), "opened file store");
        Ok(Self { root })
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StoreError> {
        if bucket.is_empty()
            || bucket == "."
            || bucket == ".."
            || bucket.contains(['/', '\\'])
            || bucket.starts_with(RESERVED_PREFIX)
        {
            return Err(StoreError::InvalidBucketName {
                bucket: bucket.to_owned(),
            });
        }
        Ok(self.root.join(bucket))
    }

    fn object_dir(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let invalid = |reason| StoreError::InvalidKey {
            key: key.to_owned(),
            reason,
        };
        let (body, meta_dir) = match key.strip_suffix('/') {
            Some(body) => (body, DIR_MARKER_META_DIR),
            None => (key, META_DIR),
        };
        if body.is_empty() {
            return Err(invalid("key is empty"));
        }

        let mut dir = self.bucket_dir(bucket)?;
        for segment in body.split('/') {
            match segment {
                "" => return Err(invalid("empty path segment")),
                "." | ".." => return Err(invalid("relative path segment")),
                s if s.starts_with(RESERVED_PREFIX) => {
                    return Err(invalid("reserved path segment"));
                }
                s if s.contains('\\') => return Err(invalid("backslash in path segment")),
                s => dir.push(s),
            }
        }
        dir.push(meta_dir);
        Ok(dir)
    }

    fn read_metadata(meta_dir: &Path) -> Result<Option<ObjectMetadata>, StoreError> {
        let path = meta_dir.join(METADATA_FILE);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| StoreError::Metadata { path, source })
    }

    fn read_content(meta_dir: &Path) -> Result<Option<Bytes>, StoreError> {
        let path = meta_dir.join(CONTENT_FILE);
        match std::fs::read(&path) {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Read content and metadata as one consistent object.
    ///
    /// A concurrent write renames the content before the metadata, so a
    /// pair whose size or digest disagrees is read again.
    fn read_object(&self, bucket: &str, key: &str) -> Result<Option<StoredObject>, StoreError> {
        let meta_dir = self.object_dir(bucket, key)?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let Some(mut metadata) = Self::read_metadata(&meta_dir)? else {
                return Ok(None);
            };
            let Some(data) = Self::read_content(&meta_dir)? else {
                return Ok(None);
            };
            let md5_hex = checksums::compute_md5(&data);
            let consistent = data.len() as u64 == metadata.size && md5_hex == metadata.md5_hex;
            if !consistent {
                if attempt < READ_ATTEMPTS {
                    debug!(bucket, key, attempt, "object changed while reading");
                    std::thread::yield_now();
                    continue;
                }
                // Describe the bytes actually on disk.
                warn!(bucket, key, "object metadata does not match content");
                metadata.size = data.len() as u64;
                metadata.md5_hex = md5_hex;
            }
            return Ok(Some(StoredObject {
                key: key.to_owned(),
                metadata,
                data,
            }));
        }
    }

    fn write_object(
        &self,
        bucket: &str,
        key: &str,
        metadata: ObjectMetadata,
        data: Bytes,
    ) -> Result<StoredObject, StoreError> {
        let bucket_dir = self.bucket_dir(bucket)?;
        if !bucket_dir.is_dir() {
            return Err(StoreError::no_such_bucket(bucket));
        }
        let meta_dir = self.object_dir(bucket, key)?;
        std::fs::create_dir_all(&meta_dir).map_err(|e| StoreError::io(meta_dir.clone(), e))?;

        let json = serde_json::to_vec_pretty(&metadata).map_err(|source| StoreError::Metadata {
            path: meta_dir.join(METADATA_FILE),
            source,
        })?;
        write_atomic(&meta_dir, CONTENT_FILE, &data)?;
        write_atomic(&meta_dir, METADATA_FILE, &json)?;

        debug!(bucket, key, size = metadata.size, "stored object");
        Ok(StoredObject {
            key: key.to_owned(),
            metadata,
            data,
        })
    }

    /// Collect every object under a bucket directory.
    fn walk(&self, bucket_dir: &Path) -> Result<Vec<ObjectSummary>, StoreError> {
        let mut found = Vec::new();
        let mut pending = vec![(bucket_dir.to_path_buf(), String::new())];

        while let Some((dir, prefix)) = pending.pop() {
            let entries = std::fs::read_dir(&dir).map_err(|e| StoreError::io(dir.clone(), e))?;
            for entry in entries {
                let entry = entry.map_err(|e| StoreError::io(dir.clone(), e))?;
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                let key = match name.as_str() {
                    META_DIR if !prefix.is_empty() => prefix.clone(),
                    DIR_MARKER_META_DIR if !prefix.is_empty() => format!("{prefix}/"),
                    n if n.starts_with(RESERVED_PREFIX) => continue,
                    n => {
                        let child = if prefix.is_empty() {
                            n.to_owned()
                        } else {
                            format!("{prefix}/{n}")
                        };
                        pending.push((path, child));
                        continue;
                    }
                };
                match Self::read_metadata(&path) {
                    Ok(Some(metadata)) => found.push(ObjectSummary {
                        key,
                        last_modified: metadata.last_modified,
                        md5_hex: metadata.md5_hex,
                        size: metadata.size,
                    }),
                    Ok(None) => {}
                    Err(e) => warn!(key, error = %e, "skipping unreadable object"),
                }
            }
        }

        found.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(found)
    }

    /// Remove empty directories from `dir` up to, but not including, `stop`.
    fn prune_empty_dirs(mut dir: &Path, stop: &Path) {
        while dir != stop && dir.starts_with(stop) {
            if std::fs::remove_dir(dir).is_err() {
                break;
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
    }
}

fn write_atomic(dir: &Path, name: &str, data: &[u8]) -> Result<(), StoreError> {
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    temp.write_all(data)
        .map_err(|e| StoreError::io(temp.path().to_path_buf(), e))?;
    let target = dir.join(name);
    temp.persist(&target)
        .map_err(|e| StoreError::io(target, e.error))?;
    Ok(())
}

fn creation_date(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path)
        .and_then(|m| m.created().or_else(|_| m.modified()))
        .map_or_else(|_| Utc::now(), DateTime::<Utc>::from)
}

impl ObjectStore for FileStore {
    fn list_buckets(&self) -> Result<Vec<Bucket>, StoreError> {
        let entries =
            std::fs::read_dir(&self.root).map_err(|e| StoreError::io(self.root.clone(), e))?;
        let mut buckets = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(self.root.clone(), e))?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if !path.is_dir() || name.starts_with(RESERVED_PREFIX) {
                continue;
            }
            buckets.push(Bucket {
                name,
                creation_date: creation_date(&path),
            });
        }
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    fn get_bucket(&self, name: &str) -> Result<Option<Bucket>, StoreError> {
        let Ok(dir) = self.bucket_dir(name) else {
            return Ok(None);
        };
        if !dir.is_dir() {
            return Ok(None);
        }
        Ok(Some(Bucket {
            name: name.to_owned(),
            creation_date: creation_date(&dir),
        }))
    }

    fn create_bucket(&self, name: &str) -> Result<Bucket, StoreError> {
        let dir = self.bucket_dir(name)?;
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(dir.clone(), e))?;
        Ok(Bucket {
            name: name.to_owned(),
            creation_date: creation_date(&dir),
        })
    }

    fn delete_bucket(&self, name: &str) -> Result<(), StoreError> {
        let dir = match self.bucket_dir(name) {
            Ok(dir) if dir.is_dir() => dir,
            _ => return Err(StoreError::no_such_bucket(name)),
        };
        if !self.walk(&dir)?.is_empty() {
            return Err(StoreError::BucketNotEmpty {
                bucket: name.to_owned(),
            });
        }
        std::fs::remove_dir_all(&dir).map_err(|e| StoreError::io(dir, e))?;
        debug!(bucket = name, "deleted bucket");
        Ok(())
    }

    fn query_objects(
        &self,
        bucket: &str,
        query: &BucketQuery,
    ) -> Result<BucketQueryResult, StoreError> {
        let dir = match self.bucket_dir(bucket) {
            Ok(dir) if dir.is_dir() => dir,
            _ => return Err(StoreError::no_such_bucket(bucket)),
        };
        let summaries = self.walk(&dir)?;
        Ok(query::evaluate(bucket, summaries, query))
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Option<StoredObject>, StoreError> {
        match self.read_object(bucket, key) {
            Err(StoreError::InvalidKey { .. } | StoreError::InvalidBucketName { .. }) => Ok(None),
            other => other,
        }
    }

    fn store_object(
        &self,
        bucket: &str,
        key: &str,
        upload: ObjectUpload,
    ) -> Result<StoredObject, StoreError> {
        let metadata = upload.to_metadata();
        self.write_object(bucket, key, metadata, upload.data)
    }

    fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        directive: &MetadataDirective,
    ) -> Result<Option<StoredObject>, StoreError> {
        let Some(source) = self.get_object(src_bucket, src_key)? else {
            return Ok(None);
        };
        let metadata = directive.apply(&source.metadata);
        self.write_object(dst_bucket, dst_key, metadata, source.data)
            .map(Some)
    }

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let Ok(meta_dir) = self.object_dir(bucket, key) else {
            return Ok(());
        };
        match std::fs::remove_dir_all(&meta_dir) {
            Ok(()) => debug!(bucket, key, "deleted object"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StoreError::io(meta_dir, e)),
        }
        if let (Some(parent), Ok(bucket_dir)) = (meta_dir.parent(), self.bucket_dir(bucket)) {
            Self::prune_empty_dirs(parent, &bucket_dir);
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
                .get_object(bucket, &part.staged_key)?
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
