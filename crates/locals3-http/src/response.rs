//! Response rendering.
//!
//! Every handler outcome becomes an explicit `http::Response` here: S3 error
//! documents, XML result documents and object payloads. Object rendering
//! evaluates the conditional headers first, then an optional byte range.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::SubsecRound;
use http::header::{self, HeaderValue};

use locals3_model::{S3Error, StoredObject};
use locals3_xml::XmlError;

use crate::body::S3ResponseBody;
use crate::request::{META_PREFIX, format_http_date, parse_http_date};

/// Content type of S3 result and error documents.
pub const CONTENT_TYPE_XML: &str = "application/xml";

/// Content type of PUT and POST responses.
pub const CONTENT_TYPE_TEXT_XML: &str = "text/xml";

/// Headers allowed on cross-origin uploads.
pub const UPLOAD_ALLOW_HEADERS: &str = "Authorization, Content-Length";

/// A byte range resolved against an object size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// Serve the whole object.
    Full,
    /// Serve `start..=end`.
    Partial {
        /// First byte offset.
        start: u64,
        /// Last byte offset, inclusive.
        end: u64,
    },
    /// The range starts past the end of the object.
    Unsatisfiable,
}

/// Resolve a `Range` header against an object of `size` bytes.
///
/// Only a single `bytes=` range is honoured. A missing or zero end means
/// "to the end"; the end is clamped to the last byte. Anything the parser
/// does not understand falls back to the full object.
#[must_use]
pub fn parse_range(value: &str, size: u64) -> ByteRange {
    if size == 0 {
        return ByteRange::Full;
    }
    let Some(spec) = value.trim().strip_prefix("bytes=") else {
        return ByteRange::Full;
    };
    if spec.contains(',') {
        return ByteRange::Full;
    }
    let Some((start, end)) = spec.split_once('-') else {
        return ByteRange::Full;
    };
    let (start, end) = (start.trim(), end.trim());
    let last = size - 1;

    if start.is_empty() {
        return match end.parse::<u64>() {
            Ok(0) => ByteRange::Unsatisfiable,
            Ok(suffix) => ByteRange::Partial {
                start: size.saturating_sub(suffix),
                end: last,
            },
            Err(_) => ByteRange::Full,
        };
    }

    let Ok(start) = start.parse::<u64>() else {
        return ByteRange::Full;
    };
    let end = match end {
        "" => last,
        other => match other.parse::<u64>() {
            Ok(0) => last,
            Ok(end) => end.min(last),
            Err(_) => return ByteRange::Full,
        },
    };

    if start > last {
        ByteRange::Unsatisfiable
    } else if start > end {
        ByteRange::Full
    } else {
        ByteRange::Partial { start, end }
    }
}

/// Render an object for GET or HEAD.
///
/// `head_only` keeps every header but drops the payload.
pub fn render_object(
    object: &StoredObject,
    request_headers: &http::HeaderMap,
    head_only: bool,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    if is_not_modified(object, request_headers) {
        return build_response(
            http::Response::builder().status(http::StatusCode::NOT_MODIFIED),
            S3ResponseBody::empty(),
        );
    }

    // Ranges are resolved against the bytes held, not the recorded size.
    let size = object.data.len() as u64;
    let range = request_headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map_or(ByteRange::Full, |v| parse_range(v, size));

    let (status, payload, content_range) = match range {
        ByteRange::Full => (http::StatusCode::OK, object.data.clone(), None),
        ByteRange::Partial { start, end } => {
            let payload = slice(&object.data, start, end)?;
            (
                http::StatusCode::PARTIAL_CONTENT,
                payload,
                Some(format!("bytes {start}-{end}/{size}")),
            )
        }
        ByteRange::Unsatisfiable => {
            let requested = request_headers
                .get(header::RANGE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            return Err(S3Error::invalid_range(requested.to_owned()));
        }
    };

    let metadata = &object.metadata;
    let mut builder = http::Response::builder().status(status);
    builder = set_header(builder, header::CONTENT_TYPE, &metadata.content_type);
    builder = set_header(
        builder,
        header::LAST_MODIFIED,
        &format_http_date(&metadata.last_modified),
    );
    builder = set_header(builder, header::ETAG, &object.etag());
    builder = builder
        .header(header::ACCEPT_RANGES, "bytes")
        .header("Last-Ranges", "bytes")
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(header::CONTENT_LENGTH, payload.len());
    if let Some(content_range) = content_range {
        builder = set_header(builder, header::CONTENT_RANGE, &content_range);
    }
    builder = set_metadata_headers(builder, &metadata.custom_metadata);

    let body = if head_only {
        S3ResponseBody::empty()
    } else {
        S3ResponseBody::from_bytes(payload)
    };
    build_response(builder, body)
}

fn is_not_modified(object: &StoredObject, headers: &http::HeaderMap) -> bool {
    if let Some(value) = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
    {
        let etag = object.etag();
        let matched = value.split(',').map(str::trim).any(|candidate| {
            candidate == "*"
                || candidate == etag
                || candidate.strip_prefix("W/") == Some(etag.as_str())
        });
        if matched {
            return true;
        }
    }

    headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date)
        // HTTP dates carry whole seconds only.
        .is_some_and(|since| since >= object.metadata.last_modified.trunc_subsecs(0))
}

fn slice(data: &Bytes, start: u64, end: u64) -> Result<Bytes, S3Error> {
    let out_of_bounds = || S3Error::invalid_range(format!("bytes={start}-{end}"));
    let start = usize::try_from(start).map_err(|_| out_of_bounds())?;
    let end = usize::try_from(end).map_err(|_| out_of_bounds())?;
    if start > end || end >= data.len() {
        return Err(out_of_bounds());
    }
    Ok(data.slice(start..=end))
}

/// Set a header if the value is a valid header value.
pub(crate) fn set_header(
    builder: http::response::Builder,
    name: header::HeaderName,
    value: &str,
) -> http::response::Builder {
    match HeaderValue::from_str(value) {
        Ok(hv) => builder.header(name, hv),
        Err(_) => builder,
    }
}

/// Echo custom metadata as `x-amz-meta-*` headers.
pub(crate) fn set_metadata_headers(
    mut builder: http::response::Builder,
    metadata: &BTreeMap<String, String>,
) -> http::response::Builder {
    for (key, value) in metadata {
        let header_name = format!("{META_PREFIX}{key}");
        if let Ok(hv) = HeaderValue::from_str(value) {
            builder = builder.header(header_name, hv);
        }
    }
    builder
}

/// Add the CORS headers every POST and staged-part response carries.
pub(crate) fn with_upload_cors(builder: http::response::Builder) -> http::response::Builder {
    builder
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(header::ACCESS_CONTROL_ALLOW_HEADERS, UPLOAD_ALLOW_HEADERS)
        .header(header::ACCESS_CONTROL_EXPOSE_HEADERS, "ETag")
}

/// Turn a serializer result into a body.
pub(crate) fn xml_body(document: Result<Vec<u8>, XmlError>) -> Result<S3ResponseBody, S3Error> {
    document
        .map(S3ResponseBody::from_bytes)
        .map_err(|e| S3Error::internal_error("failed to render XML response").with_source(e))
}

/// Build a response from a builder, converting build errors to `S3Error`.
pub(crate) fn build_response(
    builder: http::response::Builder,
    body: S3ResponseBody,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    builder
        .body(body)
        .map_err(|e| S3Error::internal_error(format!("failed to build HTTP response: {e}")))
}

/// Render an [`S3Error`] as an XML error response.
#[must_use]
pub fn error_to_response(err: &S3Error, request_id: &str) -> http::Response<S3ResponseBody> {
    let request_id = err.request_id.as_deref().unwrap_or(request_id);
    let xml_bytes = locals3_xml::error_to_xml(
        err.code.as_str(),
        &err.message,
        err.resource.as_deref(),
        request_id,
    );

    let mut response = http::Response::new(S3ResponseBody::from_bytes(xml_bytes));
    *response.status_mut() = err.status_code;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(CONTENT_TYPE_XML),
    );
    response
}
