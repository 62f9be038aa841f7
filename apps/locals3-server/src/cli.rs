//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use locals3_core::LocalS3Config;
use locals3_core::config::strip_port;

#[derive(Debug, Parser)]
#[command(
    name = "locals3-server",
    version,
    about = "Local S3-compatible server for development and testing"
)]
pub struct Cli {
    /// Directory to store buckets in; objects are kept in memory when unset.
    #[arg(short = 'r', long)]
    pub root: Option<PathBuf>,

    /// Port to listen on (0 picks a free port).
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Address to bind.
    #[arg(short = 'a', long)]
    pub address: Option<String>,

    /// Extra root hostname for virtual-host style requests.
    #[arg(short = 'H', long)]
    pub hostname: Option<String>,

    /// PEM certificate chain; requires --sslkey.
    #[arg(long = "sslcert")]
    pub ssl_cert: Option<PathBuf>,

    /// PEM private key; requires --sslcert.
    #[arg(long = "sslkey")]
    pub ssl_key: Option<PathBuf>,

    /// Create missing buckets when they are listed.
    #[arg(long)]
    pub create_buckets: bool,

    /// Fetch objects missing locally from the upstream endpoint.
    #[arg(long)]
    pub replicate: bool,

    /// Upstream endpoint used by --replicate.
    #[arg(long)]
    pub upstream: Option<String>,

    /// Log level.
    #[arg(long, value_enum)]
    pub log: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the version banner and exit.
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
    Fatal,
}

impl LogLevel {
    /// The tracing filter directive for this level.
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error | Self::Critical | Self::Fatal => "error",
        }
    }
}

impl Cli {
    /// Layer command-line flags over environment configuration.
    pub fn apply(&self, config: &mut LocalS3Config) {
        if let Some(root) = &self.root {
            config.root = Some(root.clone());
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(address) = &self.address {
            config.address.clone_from(address);
        }
        if let Some(hostname) = &self.hostname {
            config.hostname = strip_port(hostname).to_owned();
        }
        if let Some(cert) = &self.ssl_cert {
            config.ssl_cert = Some(cert.clone());
        }
        if let Some(key) = &self.ssl_key {
            config.ssl_key = Some(key.clone());
        }
        if self.create_buckets {
            config.create_buckets = true;
        }
        if self.replicate {
            config.replicate = true;
        }
        if let Some(upstream) = &self.upstream {
            config.upstream_endpoint.clone_from(upstream);
        }
        if let Some(level) = self.log {
            config.log_level = level.as_filter().to_owned();
        }
    }
}
