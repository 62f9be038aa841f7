//! Storage collaborators for locals3.
//!
//! The protocol layer talks to storage exclusively through the
//! [`ObjectStore`] trait. Two engines are provided:
//!
//! - [`MemoryStore`]: everything in process memory, large objects spilled to
//!   temporary files.
//! - [`FileStore`]: one directory per bucket under a root directory, with a
//!   JSON metadata sidecar per object.
//!
//! Either can be wrapped in [`Replicating`] to fetch missing objects from an
//! upstream S3 endpoint on demand.

pub mod checksums;
pub mod config;
pub mod error;
pub mod file;
pub mod memory;
pub mod query;
pub mod replicate;
pub mod store;

pub use config::LocalS3Config;
pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use replicate::{Replicating, Upstream};
pub use store::{MetadataDirective, ObjectStore, ObjectUpload};
