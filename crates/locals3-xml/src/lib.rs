//! S3 XML rendering for locals3.
//!
//! Every function here is a pure serializer: it takes already-built domain
//! values and returns the bytes of an XML document. Nothing in this crate
//! touches storage or HTTP.
//!
//! # S3 XML conventions
//!
//! - Namespace: `http://s3.amazonaws.com/doc/2006-03-01/`
//! - Booleans: lowercase `true`/`false`
//! - Timestamps: ISO 8601 format (`2006-02-03T16:45:09.000Z`)
//! - XML declaration: `<?xml version="1.0" encoding="UTF-8"?>`

pub mod deserialize;
pub mod error;
pub mod serialize;

pub use deserialize::{CompletedPart, parse_complete_multipart_upload};
pub use error::{XmlError, error_to_xml};
pub use serialize::{
    S3_NAMESPACE, S3Serialize, acl, complete_multipart_result, copy_object_result,
    copy_part_result, initiate_multipart_result, list_bucket_objects, list_buckets,
    post_response, to_xml,
};
