//! Request header helpers.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};

use locals3_core::{MetadataDirective, ObjectUpload};

/// Prefix of user metadata headers.
pub const META_PREFIX: &str = "x-amz-meta-";

/// Header selecting `COPY` or `REPLACE` metadata handling on copy.
pub const METADATA_DIRECTIVE_HEADER: &str = "x-amz-metadata-directive";

/// Collect `x-amz-meta-*` headers keyed by their lowercase suffix.
///
/// Repeated headers are joined with `,`.
#[must_use]
pub fn collect_metadata(headers: &http::HeaderMap) -> BTreeMap<String, String> {
    let mut metadata: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Some(suffix) = name.as_str().strip_prefix(META_PREFIX) else {
            continue;
        };
        if suffix.is_empty() {
            continue;
        }
        let Ok(value) = value.to_str() else {
            continue;
        };
        metadata
            .entry(suffix.to_owned())
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_owned());
    }
    metadata
}

/// The request `Content-Type`, if present and non-empty.
#[must_use]
pub fn content_type(headers: &http::HeaderMap) -> Option<String> {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Build the upload for a `PUT` body and its headers.
#[must_use]
pub fn object_upload(headers: &http::HeaderMap, body: Bytes) -> ObjectUpload {
    ObjectUpload {
        data: body,
        content_type: content_type(headers),
        custom_metadata: collect_metadata(headers),
    }
}

/// Metadata handling requested for a copy.
#[must_use]
pub fn metadata_directive(headers: &http::HeaderMap) -> MetadataDirective {
    let replace = headers
        .get(METADATA_DIRECTIVE_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("REPLACE"));
    if replace {
        MetadataDirective::Replace {
            content_type: content_type(headers),
            custom_metadata: collect_metadata(headers),
        }
    } else {
        MetadataDirective::Copy
    }
}

/// Format a timestamp as an HTTP date (`Sun, 06 Nov 1994 08:49:37 GMT`).
#[must_use]
pub fn format_http_date(time: &DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an HTTP date in any of the three forms RFC 9110 allows.
#[must_use]
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}
