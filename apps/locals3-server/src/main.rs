//! locals3 server - a lightweight local S3-compatible server.
//!
//! # Usage
//!
//! ```text
//! locals3-server -r /tmp/s3 -p 4567
//! locals3-server --sslcert cert.pem --sslkey key.pem
//! locals3-server --replicate --upstream https://s3.amazonaws.com
//! ```
//!
//! Every flag has an environment fallback (`LOCALS3_*`, see
//! [`LocalS3Config::from_env`]); flags win. `RUST_LOG` overrides `--log`.

mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use locals3_core::{FileStore, LocalS3Config, MemoryStore, ObjectStore, Replicating, Upstream};
use locals3_http::{
    HandlerConfig, HostResolver, S3HttpService, S3Router, StoreHandler, serve, shutdown_signal,
    tls_acceptor,
};

use crate::cli::{Cli, Command};

/// Server version reported by `--version` and the health check.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the configured level.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Bind, build the service over `store` and serve until a shutdown signal.
async fn run<S: ObjectStore>(store: S, config: &LocalS3Config) -> Result<()> {
    let tls = match (&config.ssl_cert, &config.ssl_key) {
        (Some(cert), Some(key)) => Some(
            tls_acceptor(cert, key)
                .with_context(|| format!("failed to load TLS pair {}", cert.display()))?,
        ),
        _ => None,
    };

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to read bound address")?;

    let handler = StoreHandler::new(
        Arc::new(store),
        HandlerConfig {
            create_buckets: config.create_buckets,
            port: local_addr.port(),
        },
    );
    let router = S3Router::new(HostResolver::new(config.root_hostnames()));
    info!(roots = ?router.resolver().roots(), "virtual-host roots");
    let service = S3HttpService::new(handler, router);

    info!(
        addr = %local_addr,
        tls = tls.is_some(),
        "listening for connections"
    );
    serve(listener, service, tls, shutdown_signal()).await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if matches!(cli.command, Some(Command::Version)) {
        println!("locals3 {VERSION}");
        return Ok(());
    }

    let mut config = LocalS3Config::from_env();
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    init_tracing(&config.log_level)?;

    info!(
        address = %config.address,
        port = config.port,
        hostname = %config.hostname,
        root = ?config.root,
        create_buckets = config.create_buckets,
        replicate = config.replicate,
        version = VERSION,
        "starting locals3 server",
    );

    let upstream = config
        .replicate
        .then(|| Upstream::new(config.upstream_endpoint.clone()));

    match (&config.root, upstream) {
        (Some(root), None) => {
            let store = FileStore::new(root)
                .with_context(|| format!("cannot use storage root {}", root.display()))?;
            run(store, &config).await
        }
        (Some(root), Some(upstream)) => {
            let store = FileStore::new(root)
                .with_context(|| format!("cannot use storage root {}", root.display()))?;
            run(Replicating::new(store, upstream), &config).await
        }
        (None, None) => run(MemoryStore::new(config.max_memory_object_size), &config).await,
        (None, Some(upstream)) => {
            let store = MemoryStore::new(config.max_memory_object_size);
            run(Replicating::new(store, upstream), &config).await
        }
    }
}
