//! Completion-manifest parsing.
//!
//! The `CompleteMultipartUpload` body is read with a small streaming pass
//! that only cares about `<Part>` elements and their `PartNumber`/`ETag`
//! children. Element prefixes are ignored so namespaced documents parse the
//! same as bare ones. Any malformed input yields an empty list.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::XmlError;

/// One `<Part>` entry of a completion manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// Part number as given by the client.
    pub part_number: u32,
    /// ETag with surrounding quotes removed, if the entry had one.
    pub etag: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    None,
    PartNumber,
    ETag,
}

/// Parse the `<Part>` entries of a completion manifest in document order.
///
/// Entries without a numeric `PartNumber` are skipped. A document that is
/// not well-formed produces an empty list rather than an error.
#[must_use]
pub fn parse_complete_multipart_upload(body: &[u8]) -> Vec<CompletedPart> {
    match read_parts(body) {
        Ok(parts) => parts,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring malformed completion manifest");
            Vec::new()
        }
    }
}

fn read_parts(body: &[u8]) -> Result<Vec<CompletedPart>, XmlError> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut parts = Vec::new();
    let mut in_part = false;
    let mut field = Field::None;
    let mut number: Option<u32> = None;
    let mut etag: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"Part" => {
                    in_part = true;
                    number = None;
                    etag = None;
                }
                b"PartNumber" if in_part => field = Field::PartNumber,
                b"ETag" if in_part => field = Field::ETag,
                _ => field = Field::None,
            },
            Event::Text(t) => {
                let text = t
                    .decode()
                    .map_err(|err| XmlError::Malformed(err.to_string()))?;
                match field {
                    Field::PartNumber => number = text.trim().parse().ok(),
                    Field::ETag => {
                        let value = etag.get_or_insert_with(String::new);
                        value.push_str(&text);
                    }
                    Field::None => {}
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"Part" && in_part {
                    in_part = false;
                    if let Some(part_number) = number.take() {
                        parts.push(CompletedPart {
                            part_number,
                            etag: etag.take().map(|v| strip_quotes(&v)),
                        });
                    }
                }
                field = Field::None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(parts)
}

fn strip_quotes(value: &str) -> String {
    value.trim().trim_matches('"').to_owned()
}
