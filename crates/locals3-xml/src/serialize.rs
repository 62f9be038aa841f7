//! Response documents.
//!
//! Each response shape is a small borrowed view implementing [`S3Serialize`];
//! the free functions at the bottom of the module wrap them with the right
//! root element so callers never deal with element names.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};

use locals3_model::{Bucket, BucketQueryResult, ObjectSummary, Owner};

use crate::error::XmlError;

/// The S3 XML namespace.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Types that write themselves as the children of a root element.
///
/// Uses `io::Result` because `quick_xml::Writer` closures require `io::Result<()>`.
pub trait S3Serialize {
    /// Serialize this value as XML child elements into the given writer.
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()>;
}

/// Serialize a value as a complete document under `root_element`.
///
/// # Errors
///
/// Returns `XmlError` if serialization fails.
pub fn to_xml<T: S3Serialize>(root_element: &str, value: &T) -> Result<Vec<u8>, XmlError> {
    let mut buf = Vec::with_capacity(512);
    let mut writer = Writer::new(&mut buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer
        .create_element(root_element)
        .with_attribute(("xmlns", S3_NAMESPACE))
        .write_inner_content(|w| value.serialize_xml(w))?;

    Ok(buf)
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

fn write_optional_text<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: Option<&str>,
) -> io::Result<()> {
    if let Some(v) = value {
        write_text_element(writer, tag, v)?;
    }
    Ok(())
}

fn write_bool<W: Write>(writer: &mut Writer<W>, tag: &str, value: bool) -> io::Result<()> {
    write_text_element(writer, tag, if value { "true" } else { "false" })
}

fn write_owner<W: Write>(writer: &mut Writer<W>, owner: &Owner) -> io::Result<()> {
    writer.create_element("Owner").write_inner_content(|w| {
        write_text_element(w, "ID", owner.id)?;
        write_text_element(w, "DisplayName", owner.display_name)?;
        Ok(())
    })?;
    Ok(())
}

/// Format a timestamp the way S3 writes them in XML bodies.
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn quoted(md5_hex: &str) -> String {
    format!("\"{md5_hex}\"")
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

struct BucketList<'a>(&'a [Bucket]);

impl S3Serialize for BucketList<'_> {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_owner(writer, &Owner::LOCAL)?;
        writer.create_element("Buckets").write_inner_content(|w| {
            for bucket in self.0 {
                w.create_element("Bucket").write_inner_content(|w| {
                    write_text_element(w, "Name", &bucket.name)?;
                    write_text_element(
                        w,
                        "CreationDate",
                        &format_timestamp(&bucket.creation_date),
                    )?;
                    Ok(())
                })?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

impl S3Serialize for ObjectSummary {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Contents").write_inner_content(|w| {
            write_text_element(w, "Key", &self.key)?;
            write_text_element(w, "LastModified", &format_timestamp(&self.last_modified))?;
            write_text_element(w, "ETag", &quoted(&self.md5_hex))?;
            write_text_element(w, "Size", &self.size.to_string())?;
            write_text_element(w, "StorageClass", "STANDARD")?;
            write_owner(w, &Owner::LOCAL)?;
            Ok(())
        })?;
        Ok(())
    }
}

impl S3Serialize for BucketQueryResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Name", &self.bucket)?;
        write_text_element(writer, "Prefix", self.query.prefix.as_deref().unwrap_or(""))?;
        write_text_element(writer, "Marker", self.query.marker.as_deref().unwrap_or(""))?;
        write_text_element(writer, "MaxKeys", &self.query.max_keys.to_string())?;
        write_optional_text(writer, "Delimiter", self.query.delimiter.as_deref())?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        write_optional_text(writer, "NextMarker", self.next_marker.as_deref())?;
        for object in &self.objects {
            object.serialize_xml(writer)?;
        }
        for prefix in &self.common_prefixes {
            writer
                .create_element("CommonPrefixes")
                .write_inner_content(|w| write_text_element(w, "Prefix", prefix))?;
        }
        Ok(())
    }
}

struct AccessControlPolicy;

impl S3Serialize for AccessControlPolicy {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        let owner = Owner::LOCAL;
        write_owner(writer, &owner)?;
        writer
            .create_element("AccessControlList")
            .write_inner_content(|w| {
                w.create_element("Grant").write_inner_content(|w| {
                    w.create_element("Grantee")
                        .with_attribute(("xmlns:xsi", XSI_NAMESPACE))
                        .with_attribute(("xsi:type", "CanonicalUser"))
                        .write_inner_content(|w| {
                            write_text_element(w, "ID", owner.id)?;
                            write_text_element(w, "DisplayName", owner.display_name)?;
                            Ok(())
                        })?;
                    write_text_element(w, "Permission", "FULL_CONTROL")?;
                    Ok(())
                })?;
                Ok(())
            })?;
        Ok(())
    }
}

struct CopyResult<'a> {
    last_modified: &'a DateTime<Utc>,
    md5_hex: &'a str,
}

impl S3Serialize for CopyResult<'_> {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "LastModified", &format_timestamp(self.last_modified))?;
        write_text_element(writer, "ETag", &quoted(self.md5_hex))?;
        Ok(())
    }
}

/// `Location`/`Bucket`/`Key`/`ETag` quadruple shared by the completion and
/// form-upload results.
struct LocatedObject<'a> {
    location: &'a str,
    bucket: &'a str,
    key: &'a str,
    md5_hex: &'a str,
}

impl S3Serialize for LocatedObject<'_> {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Location", self.location)?;
        write_text_element(writer, "Bucket", self.bucket)?;
        write_text_element(writer, "Key", self.key)?;
        write_text_element(writer, "ETag", &quoted(self.md5_hex))?;
        Ok(())
    }
}

struct InitiateResult<'a> {
    bucket: &'a str,
    key: &'a str,
    upload_id: &'a str,
}

impl S3Serialize for InitiateResult<'_> {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Bucket", self.bucket)?;
        write_text_element(writer, "Key", self.key)?;
        write_text_element(writer, "UploadId", self.upload_id)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Renderers
// ---------------------------------------------------------------------------

/// `ListAllMyBucketsResult` for `GET /`.
pub fn list_buckets(buckets: &[Bucket]) -> Result<Vec<u8>, XmlError> {
    to_xml("ListAllMyBucketsResult", &BucketList(buckets))
}

/// `ListBucketResult` for `GET /{bucket}`.
pub fn list_bucket_objects(result: &BucketQueryResult) -> Result<Vec<u8>, XmlError> {
    to_xml("ListBucketResult", result)
}

/// `AccessControlPolicy` stub granting the local owner full control.
pub fn acl() -> Result<Vec<u8>, XmlError> {
    to_xml("AccessControlPolicy", &AccessControlPolicy)
}

/// `CopyObjectResult` for a completed copy.
pub fn copy_object_result(
    last_modified: &DateTime<Utc>,
    md5_hex: &str,
) -> Result<Vec<u8>, XmlError> {
    to_xml(
        "CopyObjectResult",
        &CopyResult {
            last_modified,
            md5_hex,
        },
    )
}

/// `CopyPartResult` for a part staged by copy.
pub fn copy_part_result(last_modified: &DateTime<Utc>, md5_hex: &str) -> Result<Vec<u8>, XmlError> {
    to_xml(
        "CopyPartResult",
        &CopyResult {
            last_modified,
            md5_hex,
        },
    )
}

/// `CompleteMultipartUploadResult` for an assembled object.
pub fn complete_multipart_result(
    location: &str,
    bucket: &str,
    key: &str,
    md5_hex: &str,
) -> Result<Vec<u8>, XmlError> {
    to_xml(
        "CompleteMultipartUploadResult",
        &LocatedObject {
            location,
            bucket,
            key,
            md5_hex,
        },
    )
}

/// `InitiateMultipartUploadResult` carrying a fresh upload id.
pub fn initiate_multipart_result(
    bucket: &str,
    key: &str,
    upload_id: &str,
) -> Result<Vec<u8>, XmlError> {
    to_xml(
        "InitiateMultipartUploadResult",
        &InitiateResult {
            bucket,
            key,
            upload_id,
        },
    )
}

/// `PostResponse` for a form upload answered with status 201.
pub fn post_response(
    location: &str,
    bucket: &str,
    key: &str,
    md5_hex: &str,
) -> Result<Vec<u8>, XmlError> {
    to_xml(
        "PostResponse",
        &LocatedObject {
            location,
            bucket,
            key,
            md5_hex,
        },
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use locals3_model::BucketQuery;

    use super::*;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0)
            .single()
            .expect("valid timestamp")
    }

    fn render(xml: Result<Vec<u8>, XmlError>) -> String {
        String::from_utf8(xml.expect("serialization should succeed")).expect("valid UTF-8")
    }

    #[test]
    fn test_should_list_buckets_with_owner() {
        let buckets = vec![Bucket {
            name: "photos".to_owned(),
            creation_date: fixed_time(),
        }];
        let xml = render(list_buckets(&buckets));

        assert!(xml.contains(
            "<ListAllMyBucketsResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">"
        ));
        assert!(xml.contains("<Owner><ID>123</ID><DisplayName>locals3</DisplayName></Owner>"));
        assert!(xml.contains(
            "<Bucket><Name>photos</Name><CreationDate>2024-03-01T12:30:00.000Z</CreationDate></Bucket>"
        ));
    }

    #[test]
    fn test_should_render_listing_with_common_prefixes() {
        let result = BucketQueryResult {
            bucket: "photos".to_owned(),
            query: BucketQuery {
                prefix: Some("2024/".to_owned()),
                delimiter: Some("/".to_owned()),
                max_keys: 2,
                ..BucketQuery::default()
            },
            objects: vec![ObjectSummary {
                key: "2024/cover.jpg".to_owned(),
                last_modified: fixed_time(),
                md5_hex: "abc".to_owned(),
                size: 42,
            }],
            common_prefixes: vec!["2024/march/".to_owned()],
            is_truncated: true,
            next_marker: Some("2024/march/".to_owned()),
        };
        let xml = render(list_bucket_objects(&result));

        assert!(xml.contains("<Name>photos</Name><Prefix>2024/</Prefix><Marker></Marker>"));
        assert!(xml.contains("<MaxKeys>2</MaxKeys><Delimiter>/</Delimiter>"));
        assert!(xml.contains("<IsTruncated>true</IsTruncated>"));
        assert!(xml.contains("<NextMarker>2024/march/</NextMarker>"));
        assert!(xml.contains("<Key>2024/cover.jpg</Key>"));
        assert!(xml.contains("<ETag>&quot;abc&quot;</ETag><Size>42</Size>"));
        assert!(xml.contains("<CommonPrefixes><Prefix>2024/march/</Prefix></CommonPrefixes>"));
    }

    #[test]
    fn test_should_render_acl_stub() {
        let xml = render(acl());
        assert!(xml.contains("xsi:type=\"CanonicalUser\""));
        assert!(xml.contains("<Permission>FULL_CONTROL</Permission>"));
    }

    #[test]
    fn test_should_render_copy_results() {
        let xml = render(copy_object_result(&fixed_time(), "abc"));
        assert!(xml.contains("<CopyObjectResult"));
        assert!(xml.contains("<LastModified>2024-03-01T12:30:00.000Z</LastModified>"));

        let xml = render(copy_part_result(&fixed_time(), "abc"));
        assert!(xml.contains("<CopyPartResult"));
    }

    #[test]
    fn test_should_render_multipart_documents() {
        let xml = render(initiate_multipart_result("b", "big.bin", "0123abcd"));
        assert!(xml.contains("<Bucket>b</Bucket><Key>big.bin</Key><UploadId>0123abcd</UploadId>"));

        let xml = render(complete_multipart_result(
            "http://b.localhost:4567/big.bin",
            "b",
            "big.bin",
            "ff",
        ));
        assert!(xml.contains("<CompleteMultipartUploadResult"));
        assert!(xml.contains("<Location>http://b.localhost:4567/big.bin</Location>"));
    }

    #[test]
    fn test_should_render_post_response() {
        let xml = render(post_response(
            "http://b.localhost:4567/up/a.txt",
            "b",
            "up/a.txt",
            "ff",
        ));
        assert!(xml.contains("<PostResponse"));
        assert!(xml.contains("<Key>up/a.txt</Key>"));
    }
}
