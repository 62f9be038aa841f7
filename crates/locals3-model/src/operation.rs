//! The operation tag attached to every classified request.

use std::fmt;

use crate::request::CopySource;

/// A classified storage operation.
///
/// Variants that need more than the bucket/object pair carry their own
/// payload, so a request can never claim to be a copy without naming its
/// source, or a staged part without its upload id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// `PUT /{bucket}`.
    CreateBucket,
    /// `GET /` with path-style addressing.
    ListBuckets,
    /// `GET /{bucket}` (marker/prefix/max-keys/delimiter come from the query).
    ListBucketObjects,
    /// `HEAD /{bucket}/{key}`: a fetch whose body is suppressed.
    Head,
    /// `PUT /{bucket}/{key}`.
    StoreObject,
    /// `PUT /{bucket}/{key}` carrying a copy-source header.
    CopyObject(CopySource),
    /// `GET /{bucket}/{key}`.
    Get,
    /// `GET /{bucket}/{key}?acl`.
    GetAcl,
    /// `PUT /{bucket}/{key}?acl`.
    SetAcl,
    /// `DELETE /{bucket}/{key}`.
    DeleteObject,
    /// `DELETE /{bucket}`.
    DeleteBucket,
    /// `POST /{bucket}/{key}?uploads`.
    InitiateMultipartUpload,
    /// `PUT /{bucket}/{key}?partNumber=N&uploadId=ID`.
    UploadPart {
        /// Upload the part belongs to.
        upload_id: String,
        /// 1-based part number.
        part_number: u32,
    },
    /// `PUT /{bucket}/{key}?partNumber=N&uploadId=ID` with a copy source.
    UploadPartCopy {
        /// Upload the part belongs to.
        upload_id: String,
        /// 1-based part number.
        part_number: u32,
        /// Object the part is copied from.
        source: CopySource,
    },
    /// `POST /{bucket}/{key}?uploadId=ID` with a completion manifest.
    CompleteMultipartUpload {
        /// Upload being completed.
        upload_id: String,
    },
    /// Browser-style `multipart/form-data` POST upload.
    PostObject,
    /// `POST` that matches none of the recognised shapes.
    UnrecognizedPost,
    /// Anything that could not be classified.
    Unknown,
}

impl Operation {
    /// Returns a stable name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateBucket => "CreateBucket",
            Self::ListBuckets => "ListBuckets",
            Self::ListBucketObjects => "ListBucketObjects",
            Self::Head => "Head",
            Self::StoreObject => "StoreObject",
            Self::CopyObject(_) => "CopyObject",
            Self::Get => "Get",
            Self::GetAcl => "GetAcl",
            Self::SetAcl => "SetAcl",
            Self::DeleteObject => "DeleteObject",
            Self::DeleteBucket => "DeleteBucket",
            Self::InitiateMultipartUpload => "InitiateMultipartUpload",
            Self::UploadPart { .. } => "UploadPart",
            Self::UploadPartCopy { .. } => "UploadPartCopy",
            Self::CompleteMultipartUpload { .. } => "CompleteMultipartUpload",
            Self::PostObject => "PostObject",
            Self::UnrecognizedPost => "UnrecognizedPost",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether this operation needs a bucket to be meaningful.
    #[must_use]
    pub fn requires_bucket(&self) -> bool {
        !matches!(self, Self::ListBuckets | Self::Unknown)
    }

    /// Whether this operation copies from another object.
    #[must_use]
    pub fn copy_source(&self) -> Option<&CopySource> {
        match self {
            Self::CopyObject(source) | Self::UploadPartCopy { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
