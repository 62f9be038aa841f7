//! Response body type.
//!
//! [`S3ResponseBody`] is either a fully buffered payload (XML documents,
//! object bytes, JSON health reports) or empty (304, 204, HEAD responses).

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::Full;

/// Body of every response produced by the service.
#[derive(Debug, Default)]
pub enum S3ResponseBody {
    /// A payload held in memory.
    Buffered(Full<Bytes>),
    /// No payload.
    #[default]
    Empty,
}

impl S3ResponseBody {
    /// Create a buffered body from bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Buffered(Full::new(data.into()))
    }

    /// Create an empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Create a buffered body from a UTF-8 string.
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self::Buffered(Full::new(Bytes::from(s.into())))
    }
}

impl http_body::Body for S3ResponseBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered(full) => Pin::new(full)
                .poll_frame(cx)
                .map_err(|never| match never {}),
            Self::Empty => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered(full) => full.is_end_stream(),
            Self::Empty => true,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Buffered(full) => full.size_hint(),
            Self::Empty => http_body::SizeHint::with_exact(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body::Body;
    use http_body_util::BodyExt;

    use super::*;

    #[test]
    fn test_should_report_empty_body_as_end_of_stream() {
        let body = S3ResponseBody::empty();
        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));
    }

    #[test]
    fn test_should_size_buffered_body() {
        let body = S3ResponseBody::from_string("hello world");
        assert!(!body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(11));
    }

    #[tokio::test]
    async fn test_should_yield_buffered_bytes() {
        let body = S3ResponseBody::from_bytes(Bytes::from_static(b"<Root/>"));
        let collected = body.collect().await.expect("collect").to_bytes();
        assert_eq!(collected.as_ref(), b"<Root/>");
    }
}
