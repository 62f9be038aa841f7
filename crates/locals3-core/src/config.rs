//! Server configuration.
//!
//! [`LocalS3Config`] is loaded from environment variables and then overridden
//! by command-line flags in the server binary.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Hostnames that are always treated as roots in addition to the configured one.
pub const DEFAULT_ROOT_HOSTNAMES: [&str; 3] = ["localhost", "s3.amazonaws.com", "s3.localhost"];

/// Errors found while validating a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Only one half of the TLS certificate/key pair was provided.
    #[error("TLS requires both a certificate and a private key (got only the {provided})")]
    IncompleteTlsPair {
        /// Which half was provided.
        provided: &'static str,
    },

    /// The hostname is empty after stripping the port.
    #[error("hostname must not be empty")]
    EmptyHostname,
}

/// locals3 server configuration.
///
/// # Examples
///
/// ```
/// use locals3_core::config::LocalS3Config;
///
/// let config = LocalS3Config::default();
/// assert_eq!(config.port, 4567);
/// assert_eq!(config.hostname, "s3.amazonaws.com");
/// assert!(config.root.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct LocalS3Config {
    /// Address to bind.
    #[builder(default = String::from("0.0.0.0"))]
    pub address: String,

    /// Port to bind; `0` picks an ephemeral port.
    #[builder(default = 4567)]
    pub port: u16,

    /// Root hostname used to recognise virtual-host style requests.
    #[builder(default = String::from("s3.amazonaws.com"))]
    pub hostname: String,

    /// Directory for the file-backed store; `None` keeps everything in memory.
    #[builder(default)]
    pub root: Option<PathBuf>,

    /// PEM certificate chain for TLS.
    #[builder(default)]
    pub ssl_cert: Option<PathBuf>,

    /// PEM private key for TLS.
    #[builder(default)]
    pub ssl_key: Option<PathBuf>,

    /// Create buckets on first reference instead of answering `NoSuchBucket`.
    #[builder(default = false)]
    pub create_buckets: bool,

    /// Fetch missing objects from the upstream endpoint.
    #[builder(default = false)]
    pub replicate: bool,

    /// Upstream endpoint used when `replicate` is enabled.
    #[builder(default = String::from("https://s3.amazonaws.com"))]
    pub upstream_endpoint: String,

    /// Objects larger than this many bytes are spilled to temp files by the
    /// in-memory store.
    #[builder(default = 524_288)]
    pub max_memory_object_size: usize,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for LocalS3Config {
    fn default() -> Self {
        Self {
            address: String::from("0.0.0.0"),
            port: 4567,
            hostname: String::from("s3.amazonaws.com"),
            root: None,
            ssl_cert: None,
            ssl_key: None,
            create_buckets: false,
            replicate: false,
            upstream_endpoint: String::from("https://s3.amazonaws.com"),
            max_memory_object_size: 524_288,
            log_level: String::from("info"),
        }
    }
}

impl LocalS3Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `LOCALS3_ADDRESS` | `0.0.0.0` |
    /// | `LOCALS3_PORT` | `4567` |
    /// | `LOCALS3_HOSTNAME` | `s3.amazonaws.com` |
    /// | `LOCALS3_ROOT` | unset (in-memory) |
    /// | `LOCALS3_SSL_CERT` | unset |
    /// | `LOCALS3_SSL_KEY` | unset |
    /// | `LOCALS3_CREATE_BUCKETS` | `false` |
    /// | `LOCALS3_REPLICATE` | `false` |
    /// | `LOCALS3_UPSTREAM_ENDPOINT` | `https://s3.amazonaws.com` |
    /// | `LOCALS3_MAX_MEMORY_OBJECT_SIZE` | `524288` |
    /// | `LOG_LEVEL` | `info` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("LOCALS3_ADDRESS") {
            config.address = v;
        }
        if let Ok(v) = std::env::var("LOCALS3_PORT") {
            if let Ok(n) = v.parse::<u16>() {
                config.port = n;
            }
        }
        if let Ok(v) = std::env::var("LOCALS3_HOSTNAME") {
            config.hostname = strip_port(&v).to_owned();
        }
        if let Ok(v) = std::env::var("LOCALS3_ROOT") {
            config.root = non_empty_path(v);
        }
        if let Ok(v) = std::env::var("LOCALS3_SSL_CERT") {
            config.ssl_cert = non_empty_path(v);
        }
        if let Ok(v) = std::env::var("LOCALS3_SSL_KEY") {
            config.ssl_key = non_empty_path(v);
        }
        if let Ok(v) = std::env::var("LOCALS3_CREATE_BUCKETS") {
            config.create_buckets = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("LOCALS3_REPLICATE") {
            config.replicate = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("LOCALS3_UPSTREAM_ENDPOINT") {
            config.upstream_endpoint = v;
        }
        if let Ok(v) = std::env::var("LOCALS3_MAX_MEMORY_OBJECT_SIZE") {
            if let Ok(n) = v.parse::<usize>() {
                config.max_memory_object_size = n;
            }
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }

    /// Check settings that must hold before the server starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (&self.ssl_cert, &self.ssl_key) {
            (Some(_), None) => {
                return Err(ConfigError::IncompleteTlsPair {
                    provided: "certificate",
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::IncompleteTlsPair {
                    provided: "private key",
                });
            }
            _ => {}
        }
        if self.hostname.is_empty() {
            return Err(ConfigError::EmptyHostname);
        }
        Ok(())
    }

    /// Whether the listener should speak TLS.
    #[must_use]
    pub fn tls_enabled(&self) -> bool {
        self.ssl_cert.is_some() && self.ssl_key.is_some()
    }

    /// `address:port` string to bind.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }

    /// The configured hostname followed by the built-in root hostnames.
    #[must_use]
    pub fn root_hostnames(&self) -> Vec<String> {
        let mut roots = vec![self.hostname.clone()];
        for host in DEFAULT_ROOT_HOSTNAMES {
            if !roots.iter().any(|r| r == host) {
                roots.push(host.to_owned());
            }
        }
        roots
    }
}

/// Remove a trailing `:port` from a hostname.
#[must_use]
pub fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}

fn non_empty_path(value: String) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
