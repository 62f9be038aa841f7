//! Request classification.
//!
//! [`S3Router`] turns an HTTP request into a [`CanonicalRequest`] by looking
//! at, in order:
//!
//! - the `Host` header (virtual-host vs path-style addressing, see
//!   [`HostResolver`])
//! - the URL path (bucket and object key)
//! - the query string (`acl`, `uploads`, `uploadId`, `partNumber`)
//! - special headers (`x-amz-copy-source`, `Content-Type` for form uploads)
//!
//! Classification never fails. Requests that match no known shape become
//! [`Operation::Unknown`] and are answered with an error document later.

use http::Method;
use percent_encoding::percent_decode_str;

use locals3_model::{AddressingStyle, CanonicalRequest, CopySource, Operation, QueryParams};

use crate::resolver::{HostMatch, HostResolver};

/// Header naming the source object of a copy.
pub const COPY_SOURCE_HEADER: &str = "x-amz-copy-source";

/// Highest part number accepted for a staged part.
pub const MAX_PART_NUMBER: u32 = 10_000;

/// Classifies requests against a fixed set of root hostnames.
#[derive(Debug, Clone)]
pub struct S3Router {
    resolver: HostResolver,
}

impl S3Router {
    /// Create a router using `resolver` for virtual-host detection.
    #[must_use]
    pub fn new(resolver: HostResolver) -> Self {
        Self { resolver }
    }

    /// The host resolver.
    #[must_use]
    pub fn resolver(&self) -> &HostResolver {
        &self.resolver
    }

    /// Classify a request.
    pub fn resolve<B>(&self, req: &http::Request<B>) -> CanonicalRequest {
        let method = req.method();
        let uri = req.uri();
        let headers = req.headers();

        let host = headers
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| uri.authority().map(http::uri::Authority::as_str));
        let host_match = self.resolver.resolve(host);
        let style = host_match.style();

        let (bucket, object) = match host_match {
            HostMatch::VirtualHost(bucket) => (Some(bucket), parse_vhost_key(uri.path())),
            HostMatch::PathStyle => parse_path(uri.path()),
        };
        let query = parse_query(uri.query().unwrap_or(""));

        let operation = match *method {
            Method::GET | Method::HEAD => {
                classify_get(method, style, bucket.as_deref(), object.as_deref(), &query)
            }
            Method::PUT => classify_put(bucket.as_deref(), object.as_deref(), &query, headers),
            Method::DELETE => classify_delete(bucket.as_deref(), object.as_deref()),
            Method::POST => classify_post(&query, headers),
            _ => Operation::Unknown,
        };

        // Nothing but a bucket listing can proceed without a bucket.
        let operation = if operation.requires_bucket() && bucket.is_none() {
            Operation::Unknown
        } else {
            operation
        };

        CanonicalRequest::new(method.clone(), style, operation)
            .with_bucket(bucket)
            .with_object(object)
            .with_query(query)
    }
}

fn classify_get(
    method: &Method,
    style: AddressingStyle,
    bucket: Option<&str>,
    object: Option<&str>,
    query: &QueryParams,
) -> Operation {
    match (bucket, object) {
        (None, _) if style == AddressingStyle::Path => Operation::ListBuckets,
        (_, None) => Operation::ListBucketObjects,
        (_, Some(_)) if *method == Method::HEAD => Operation::Head,
        (_, Some(_)) if query.get("acl") == Some("") => Operation::GetAcl,
        (_, Some(_)) => Operation::Get,
    }
}

fn classify_put(
    bucket: Option<&str>,
    object: Option<&str>,
    query: &QueryParams,
    headers: &http::HeaderMap,
) -> Operation {
    let copy_source = single_copy_source(headers);

    if let Some(upload_id) = query.get("uploadId") {
        let Some(part_number) = query
            .get("partNumber")
            .and_then(|n| n.parse::<u32>().ok())
            .filter(|n| (1..=MAX_PART_NUMBER).contains(n))
        else {
            return Operation::Unknown;
        };
        let upload_id = upload_id.to_owned();
        return match copy_source {
            Some(source) => Operation::UploadPartCopy {
                upload_id,
                part_number,
                source,
            },
            None => Operation::UploadPart {
                upload_id,
                part_number,
            },
        };
    }

    // A copy source wins over every path-based shape.
    if let Some(source) = copy_source {
        return Operation::CopyObject(source);
    }

    match (bucket, object) {
        (None, _) => Operation::Unknown,
        (Some(_), None) => Operation::CreateBucket,
        (Some(_), Some(_)) if query.contains("acl") => Operation::SetAcl,
        (Some(_), Some(_)) => Operation::StoreObject,
    }
}

fn classify_delete(bucket: Option<&str>, object: Option<&str>) -> Operation {
    match (bucket, object) {
        (None, _) => Operation::Unknown,
        (Some(_), None) => Operation::DeleteBucket,
        (Some(_), Some(_)) => Operation::DeleteObject,
    }
}

fn classify_post(query: &QueryParams, headers: &http::HeaderMap) -> Operation {
    if query.contains("uploads") {
        return Operation::InitiateMultipartUpload;
    }
    if let Some(upload_id) = query.get("uploadId") {
        return Operation::CompleteMultipartUpload {
            upload_id: upload_id.to_owned(),
        };
    }
    if is_form_upload(headers) {
        return Operation::PostObject;
    }
    Operation::UnrecognizedPost
}

fn is_form_upload(headers: &http::HeaderMap) -> bool {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<mime::Mime>().ok())
        .is_some_and(|m| m.type_() == mime::MULTIPART && m.subtype() == mime::FORM_DATA)
}

/// The copy source, if exactly one `x-amz-copy-source` header is present.
fn single_copy_source(headers: &http::HeaderMap) -> Option<CopySource> {
    let mut values = headers.get_all(COPY_SOURCE_HEADER).iter();
    let value = values.next()?;
    if values.next().is_some() {
        return None;
    }
    Some(parse_copy_source(&String::from_utf8_lossy(value.as_bytes())))
}

/// Parse `[/]bucket/key[?versionId=...]`.
///
/// The key is percent-decoded; `+` is kept literally.
#[must_use]
pub fn parse_copy_source(value: &str) -> CopySource {
    let value = value
        .split_once("?versionId=")
        .map_or(value, |(source, _)| source);
    let trimmed = value.strip_prefix('/').unwrap_or(value);
    let (bucket, key) = trimmed.split_once('/').unwrap_or((trimmed, ""));
    CopySource::new(decode_uri_component(bucket), decode_uri_component(key))
}

/// Split a path-style URL path into bucket and key.
///
/// The key is everything after the first segment, trailing `/` included.
fn parse_path(path: &str) -> (Option<String>, Option<String>) {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return (None, None);
    }

    match trimmed.split_once('/') {
        Some((bucket, key)) => {
            let key = (!key.is_empty()).then(|| decode_uri_component(key));
            (Some(decode_uri_component(bucket)), key)
        }
        None => (Some(decode_uri_component(trimmed)), None),
    }
}

/// With virtual-host addressing the whole path is the key.
fn parse_vhost_key(path: &str) -> Option<String> {
    let raw = path.strip_prefix('/').unwrap_or(path);
    (!raw.is_empty()).then(|| decode_uri_component(raw))
}

fn decode_uri_component(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

fn parse_query(query: &str) -> QueryParams {
    QueryParams::new(form_urlencoded::parse(query.as_bytes()).into_owned().collect())
}
