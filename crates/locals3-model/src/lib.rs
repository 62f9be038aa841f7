//! Protocol-agnostic data model for locals3.
//!
//! This crate holds the values that flow between the HTTP protocol layer and
//! the storage engine: the classified [`CanonicalRequest`], the [`Operation`]
//! tag it carries, the read-only views returned by storage, and the
//! S3-shaped [`S3Error`].

pub mod error;
pub mod operation;
pub mod request;
pub mod types;

pub use error::{S3Error, S3ErrorCode};
pub use operation::Operation;
pub use request::{AddressingStyle, CanonicalRequest, CopySource, QueryParams};
pub use types::{
    Bucket, BucketQuery, BucketQueryResult, ObjectMetadata, ObjectSummary, Owner, PartRef,
    StoredObject,
};
