//! The canonical, protocol-agnostic form of an incoming request.

use std::fmt;

use crate::operation::Operation;

/// How the bucket name was carried by the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingStyle {
    /// Bucket is the first path segment (`http://host/bucket/key`).
    Path,
    /// Bucket is a subdomain of a root hostname (`http://bucket.host/key`).
    VirtualHost,
}

impl fmt::Display for AddressingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path => f.write_str("path"),
            Self::VirtualHost => f.write_str("virtual-host"),
        }
    }
}

/// Source object named by an `x-amz-copy-source` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySource {
    /// Source bucket.
    pub bucket: String,
    /// Source key, already percent-decoded.
    pub key: String,
}

impl CopySource {
    /// Create a copy source.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

/// Decoded query-string parameters in request order.
///
/// Flag-style parameters such as `?uploads` or `?acl` are kept with an empty
/// value so that presence can be tested separately from the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// Wrap already-decoded pairs.
    #[must_use]
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    /// First value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `name`.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether `name` appears at all.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|(k, _)| k == name)
    }

    /// Whether there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over all pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A fully classified request.
///
/// Built once per incoming request by the classifier and never mutated
/// afterwards. `bucket` is only absent for [`Operation::ListBuckets`] and
/// for [`Operation::Unknown`] requests whose bucket could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    operation: Operation,
    bucket: Option<String>,
    object: Option<String>,
    style: AddressingStyle,
    verb: http::Method,
    query: QueryParams,
}

impl CanonicalRequest {
    /// Start a request for `verb` resolved with `style`.
    #[must_use]
    pub fn new(verb: http::Method, style: AddressingStyle, operation: Operation) -> Self {
        Self {
            operation,
            bucket: None,
            object: None,
            style,
            verb,
            query: QueryParams::default(),
        }
    }

    /// Set the bucket.
    #[must_use]
    pub fn with_bucket(mut self, bucket: Option<String>) -> Self {
        self.bucket = bucket.filter(|b| !b.is_empty());
        self
    }

    /// Set the object key.
    #[must_use]
    pub fn with_object(mut self, object: Option<String>) -> Self {
        self.object = object.filter(|o| !o.is_empty());
        self
    }

    /// Set the query parameters.
    #[must_use]
    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    /// The classified operation.
    #[must_use]
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// The bucket, if one was resolved.
    #[must_use]
    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    /// The object key, if the path named one.
    #[must_use]
    pub fn object(&self) -> Option<&str> {
        self.object.as_deref()
    }

    /// Whether the bucket came from the URL path.
    #[must_use]
    pub fn is_path_style(&self) -> bool {
        self.style == AddressingStyle::Path
    }

    /// The addressing style.
    #[must_use]
    pub fn style(&self) -> AddressingStyle {
        self.style
    }

    /// The original HTTP verb.
    #[must_use]
    pub fn verb(&self) -> &http::Method {
        &self.verb
    }

    /// The decoded query parameters.
    #[must_use]
    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    /// Whether the response body must be suppressed.
    #[must_use]
    pub fn is_head(&self) -> bool {
        self.verb == http::Method::HEAD
    }
}
