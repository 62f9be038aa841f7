//! Host/path resolution.
//!
//! Decides whether a request addresses its bucket through a subdomain of one
//! of the root hostnames (virtual-host style) or through the first path
//! segment (path style). The root hostname set is fixed at construction.

use std::net::IpAddr;

use locals3_core::config::strip_port;
use locals3_model::AddressingStyle;

/// Bucket addressing derived from the `Host` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostMatch {
    /// The bucket is the named subdomain.
    VirtualHost(String),
    /// The bucket, if any, comes from the path.
    PathStyle,
}

impl HostMatch {
    /// The addressing style this match implies.
    #[must_use]
    pub fn style(&self) -> AddressingStyle {
        match self {
            Self::VirtualHost(_) => AddressingStyle::VirtualHost,
            Self::PathStyle => AddressingStyle::Path,
        }
    }
}

/// Matches request hosts against a fixed set of root hostnames.
#[derive(Debug, Clone)]
pub struct HostResolver {
    /// Lowercase root hostnames, longest first.
    roots: Vec<String>,
}

impl HostResolver {
    /// Build a resolver for the given root hostnames.
    #[must_use]
    pub fn new<I, S>(roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<String> = Vec::new();
        for root in roots {
            let root = strip_port(root.as_ref()).to_ascii_lowercase();
            if !root.is_empty() && !unique.contains(&root) {
                unique.push(root);
            }
        }
        unique.sort_by_key(|r| std::cmp::Reverse(r.len()));
        Self { roots: unique }
    }

    /// The root hostnames, longest first.
    #[must_use]
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Classify a `Host` header value.
    ///
    /// Hosts that are a root, an IP literal, or unrelated to every root are
    /// path style. Otherwise the subdomain in front of the longest matching
    /// root names the bucket.
    #[must_use]
    pub fn resolve(&self, host: Option<&str>) -> HostMatch {
        let Some(host) = host.map(str::trim).filter(|h| !h.is_empty()) else {
            return HostMatch::PathStyle;
        };
        if is_ip_literal(host) {
            return HostMatch::PathStyle;
        }

        let name = strip_port(host).to_ascii_lowercase();
        if self.roots.iter().any(|r| *r == name) {
            return HostMatch::PathStyle;
        }

        // Longest root first gives the shortest subdomain.
        for root in &self.roots {
            let Some(subdomain) = name.strip_suffix(root.as_str()) else {
                continue;
            };
            if let Some(bucket) = subdomain.strip_suffix('.').filter(|b| !b.is_empty()) {
                return HostMatch::VirtualHost(bucket.to_owned());
            }
        }
        HostMatch::PathStyle
    }
}

fn is_ip_literal(host: &str) -> bool {
    if host.parse::<IpAddr>().is_ok() {
        return true;
    }
    let without_port = strip_port(host);
    let unbracketed = without_port
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(without_port);
    unbracketed.parse::<IpAddr>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> HostResolver {
        HostResolver::new(["s3.amazonaws.com", "localhost", "s3.localhost"])
    }

    #[test]
    fn test_should_treat_root_hosts_as_path_style() {
        let r = resolver();
        assert_eq!(r.resolve(Some("localhost:4567")), HostMatch::PathStyle);
        assert_eq!(r.resolve(Some("s3.amazonaws.com")), HostMatch::PathStyle);
        assert_eq!(r.resolve(Some("S3.LOCALHOST")), HostMatch::PathStyle);
        assert_eq!(r.resolve(None), HostMatch::PathStyle);
    }

    #[test]
    fn test_should_extract_bucket_from_subdomain() {
        let r = resolver();
        assert_eq!(
            r.resolve(Some("photos.s3.amazonaws.com")),
            HostMatch::VirtualHost("photos".to_owned())
        );
        assert_eq!(
            r.resolve(Some("photos.localhost:4567")),
            HostMatch::VirtualHost("photos".to_owned())
        );
    }

    #[test]
    fn test_should_prefer_shortest_subdomain() {
        let r = resolver();
        // Matches both `localhost` and `s3.localhost`; the bucket is `my`.
        assert_eq!(
            r.resolve(Some("my.s3.localhost")),
            HostMatch::VirtualHost("my".to_owned())
        );
        assert_eq!(
            r.resolve(Some("a.b.s3.amazonaws.com")),
            HostMatch::VirtualHost("a.b".to_owned())
        );
    }

    #[test]
    fn test_should_never_treat_ip_address_as_bucket() {
        let r = HostResolver::new(["0.1", "localhost"]);
        assert_eq!(r.resolve(Some("127.0.0.1")), HostMatch::PathStyle);
        assert_eq!(r.resolve(Some("10.0.0.1:4567")), HostMatch::PathStyle);
        assert_eq!(r.resolve(Some("[::1]:4567")), HostMatch::PathStyle);
        assert_eq!(r.resolve(Some("::1")), HostMatch::PathStyle);
    }

    #[test]
    fn test_should_treat_unknown_hosts_as_path_style() {
        let r = resolver();
        assert_eq!(r.resolve(Some("example.org")), HostMatch::PathStyle);
        assert_eq!(r.resolve(Some("notlocalhost")), HostMatch::PathStyle);
        assert_eq!(r.resolve(Some(".localhost")), HostMatch::PathStyle);
    }

    #[test]
    fn test_should_normalize_configured_roots() {
        let r = HostResolver::new(["S3.Dev.Internal:9000", "localhost", "localhost", ""]);
        assert_eq!(r.roots(), ["s3.dev.internal", "localhost"]);
        assert_eq!(
            r.resolve(Some("b.s3.dev.internal")),
            HostMatch::VirtualHost("b".to_owned())
        );
    }
}
