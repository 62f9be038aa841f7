//! `multipart/form-data` parsing for browser-style POST uploads.
//!
//! Works on the already-collected body. Every part with a `filename` (or
//! named `file`) is the upload payload; every other part is a form field.

use std::collections::HashMap;

use bytes::Bytes;

use locals3_model::S3Error;

/// A parsed form upload.
#[derive(Debug)]
pub struct MultipartForm {
    /// Non-file fields keyed by lowercase name.
    pub fields: HashMap<String, String>,
    /// The uploaded file content.
    pub file_data: Bytes,
    /// `Content-Type` of the file part, if given.
    pub file_content_type: Option<String>,
    /// `filename` of the file part, if given.
    pub filename: Option<String>,
}

impl MultipartForm {
    /// Look up a form field by name, ignoring case.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Fields whose lowercase name starts with `prefix`.
    pub fn fields_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.fields.iter().filter_map(move |(name, value)| {
            name.strip_prefix(prefix)
                .filter(|suffix| !suffix.is_empty())
                .map(|suffix| (suffix, value.as_str()))
        })
    }
}

/// Extract the boundary from a `multipart/form-data; boundary=...` content type.
pub fn extract_boundary(content_type: &str) -> Result<String, S3Error> {
    if !content_type
        .to_ascii_lowercase()
        .starts_with("multipart/form-data")
    {
        return Err(S3Error::invalid_request(format!(
            "POST requires Content-Type multipart/form-data, got: {content_type}"
        )));
    }

    for param in content_type.split(';') {
        let trimmed = param.trim();
        let Some((name, value)) = trimmed.split_once('=') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("boundary") {
            let boundary = value.trim().trim_matches('"');
            if boundary.is_empty() {
                return Err(S3Error::invalid_request("Empty boundary in Content-Type"));
            }
            return Ok(boundary.to_owned());
        }
    }

    Err(S3Error::invalid_request("Missing boundary in Content-Type"))
}

/// Parse a `multipart/form-data` body.
pub fn parse_multipart(body: &[u8], boundary: &str) -> Result<MultipartForm, S3Error> {
    let delimiter = format!("--{boundary}");
    let end_delimiter = format!("--{boundary}--");

    let mut fields = HashMap::new();
    let mut file: Option<(Bytes, Option<String>, Option<String>)> = None;

    for part in split_parts(body, delimiter.as_bytes(), end_delimiter.as_bytes()) {
        let Some((headers, part_body)) = split_headers_body(part) else {
            continue;
        };
        let disposition = parse_content_disposition(headers);
        let Some(name) = disposition.name else {
            continue;
        };

        if name.eq_ignore_ascii_case("file") || disposition.filename.is_some() {
            file = Some((
                Bytes::copy_from_slice(part_body),
                parse_part_content_type(headers),
                disposition.filename,
            ));
        } else {
            fields.insert(
                name.to_ascii_lowercase(),
                String::from_utf8_lossy(part_body).into_owned(),
            );
        }
    }

    let (file_data, file_content_type, filename) = file.ok_or_else(|| {
        S3Error::invalid_request("Missing file field in multipart form data")
    })?;

    Ok(MultipartForm {
        fields,
        file_data,
        file_content_type,
        filename,
    })
}

fn split_parts<'a>(body: &'a [u8], delimiter: &[u8], end_delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();

    // Skip the preamble.
    let Some(first) = find_bytes(body, delimiter) else {
        return parts;
    };
    let mut remaining = skip_crlf(&body[first + delimiter.len()..]);

    loop {
        if remaining.starts_with(b"--")
            || remaining.starts_with(end_delimiter)
            || remaining
                .strip_prefix(b"\r\n")
                .is_some_and(|r| r.starts_with(end_delimiter))
        {
            break;
        }

        if let Some(pos) = find_bytes(remaining, delimiter) {
            parts.push(strip_trailing_crlf(&remaining[..pos]));
            remaining = skip_crlf(&remaining[pos + delimiter.len()..]);
        } else {
            let part = strip_trailing_crlf(remaining);
            if !part.is_empty() {
                parts.push(part);
            }
            break;
        }
    }

    parts
}

fn split_headers_body(part: &[u8]) -> Option<(&[u8], &[u8])> {
    let separator = b"\r\n\r\n";
    find_bytes(part, separator).map(|pos| (&part[..pos], &part[pos + separator.len()..]))
}

struct ContentDisposition {
    name: Option<String>,
    filename: Option<String>,
}

fn parse_content_disposition(headers: &[u8]) -> ContentDisposition {
    let headers = String::from_utf8_lossy(headers);
    let mut disposition = ContentDisposition {
        name: None,
        filename: None,
    };

    for line in headers.split("\r\n") {
        if !line.to_ascii_lowercase().starts_with("content-disposition:") {
            continue;
        }
        for param in line.split(';').skip(1) {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').to_owned();
            match key.trim().to_ascii_lowercase().as_str() {
                "name" => disposition.name = Some(value),
                "filename" => disposition.filename = Some(value),
                _ => {}
            }
        }
    }

    disposition
}

fn parse_part_content_type(headers: &[u8]) -> Option<String> {
    let headers = String::from_utf8_lossy(headers);
    headers.split("\r\n").find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("content-type")
            .then(|| value.trim().to_owned())
            .filter(|v| !v.is_empty())
    })
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn skip_crlf(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\r\n").unwrap_or(data)
}

fn strip_trailing_crlf(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\r\n").unwrap_or(data)
}
