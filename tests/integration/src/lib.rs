//! End-to-end tests for the locals3 server.
//!
//! Every test starts its own server in process on an ephemeral port with an
//! in-memory store, then talks to it over real HTTP with `reqwest` or the
//! AWS SDK.
//!
//! ```text
//! cargo test -p locals3-integration
//! ```

use std::net::SocketAddr;
use std::sync::{Arc, Once};
use std::time::Duration;

use aws_sdk_s3::config::{
    BehaviorVersion, Credentials, Region, RequestChecksumCalculation, ResponseChecksumValidation,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use locals3_core::{LocalS3Config, MemoryStore, ObjectStore, Replicating, Upstream};
use locals3_http::{HandlerConfig, HostResolver, S3HttpService, S3Router, StoreHandler, serve};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A server running on its own task for the duration of a test.
#[derive(Debug)]
pub struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Start a server with default settings.
    pub async fn start() -> Self {
        Self::start_with(false).await
    }

    /// Start a server, optionally creating missing buckets on listing.
    pub async fn start_with(create_buckets: bool) -> Self {
        Self::spawn(Arc::new(MemoryStore::default()), create_buckets).await
    }

    /// Start a server that fetches read misses from `upstream`.
    ///
    /// Returns the replicating store too, so tests can inspect what was
    /// copied locally.
    pub async fn start_replicating(upstream: &str) -> (Self, Arc<Replicating<MemoryStore>>) {
        let store = Arc::new(Replicating::new(
            MemoryStore::default(),
            Upstream::new(upstream).with_timeout(Duration::from_secs(5)),
        ));
        let server = Self::spawn(Arc::clone(&store), false).await;
        (server, store)
    }

    async fn spawn<S: ObjectStore>(store: Arc<S>, create_buckets: bool) -> Self {
        init_tracing();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");

        let handler = StoreHandler::new(
            store,
            HandlerConfig {
                create_buckets,
                port: addr.port(),
            },
        );
        let roots = LocalS3Config::default().root_hostnames();
        let service = S3HttpService::new(handler, S3Router::new(HostResolver::new(roots)));

        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(serve(listener, service, None, async {
            rx.await.ok();
        }));

        Self {
            addr,
            shutdown: Some(tx),
            task: Some(task),
        }
    }

    /// The bound port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// `http://127.0.0.1:{port}`.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Absolute URL for a path (and query).
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.endpoint())
    }

    /// An S3 client pointing at this server, path-style.
    #[must_use]
    pub fn s3_client(&self) -> aws_sdk_s3::Client {
        let creds = Credentials::new("test", "test", None, None, "integration-test");

        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(creds)
            .endpoint_url(self.endpoint())
            .force_path_style(true)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
            .build();

        aws_sdk_s3::Client::from_conf(config)
    }

    /// Stop accepting and wait for open connections to drain.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.await.expect("server task");
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Generate a unique bucket name for a test.
#[must_use]
pub fn test_bucket_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

/// A plain HTTP client that keeps no connections alive between tests.
#[must_use]
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("http client")
}

mod test_bucket;
mod test_cors;
mod test_form;
mod test_multipart;
mod test_object;
mod test_range;
mod test_replicate;
mod test_service;
mod test_vhost;
