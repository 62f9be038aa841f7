//! The S3 HTTP service implementing hyper's `Service` trait.
//!
//! [`S3HttpService`] ties together routing, dispatch and response
//! formatting. For every request it:
//!
//! 1. Answers the health check (`GET /_locals3/health`) without routing
//! 2. Answers CORS preflight requests (`OPTIONS`)
//! 3. Collects the request body
//! 4. Classifies the request via [`S3Router`]
//! 5. Runs the [`S3Handler`] on the blocking pool
//! 6. Adds common response headers (`x-amz-request-id`, `Server`)
//! 7. Emits one access-log line

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http_body_util::BodyExt;
use hyper::service::Service;
use tracing::{debug, error, info};
use uuid::Uuid;

use locals3_model::S3Error;

use crate::body::S3ResponseBody;
use crate::dispatch::S3Handler;
use crate::response::error_to_response;
use crate::router::S3Router;

/// Path of the health check endpoint.
pub const HEALTH_PATH: &str = "/_locals3/health";

/// Value of the `Server` response header.
pub const SERVER_NAME: &str = "locals3";

const PREFLIGHT_ALLOW_METHODS: &str = "PUT, POST, HEAD, GET, OPTIONS";
const PREFLIGHT_ALLOW_HEADERS: &str = "Accept, Content-Type, Authorization, Content-Length, ETag";

/// The S3 HTTP service.
///
/// # Type Parameters
///
/// - `H`: The operation handler implementing [`S3Handler`].
#[derive(Debug)]
pub struct S3HttpService<H: S3Handler> {
    handler: Arc<H>,
    router: Arc<S3Router>,
}

impl<H: S3Handler> S3HttpService<H> {
    /// Create a service from a handler and a router.
    #[must_use]
    pub fn new(handler: H, router: S3Router) -> Self {
        Self::from_shared(Arc::new(handler), router)
    }

    /// Create a service from a shared handler and a router.
    #[must_use]
    pub fn from_shared(handler: Arc<H>, router: S3Router) -> Self {
        Self {
            handler,
            router: Arc::new(router),
        }
    }

    /// The request classifier.
    #[must_use]
    pub fn router(&self) -> &S3Router {
        &self.router
    }
}

impl<H: S3Handler> Clone for S3HttpService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            router: Arc::clone(&self.router),
        }
    }
}

impl<H, B> Service<http::Request<B>> for S3HttpService<H>
where
    H: S3Handler,
    B: http_body::Body + Send + 'static,
    B::Data: Send,
    B::Error: fmt::Display + Send,
{
    type Response = http::Response<S3ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<B>) -> Self::Future {
        let handler = Arc::clone(&self.handler);
        let router = Arc::clone(&self.router);

        Box::pin(async move {
            let started = Instant::now();
            let request_id = Uuid::new_v4().simple().to_string().to_uppercase();
            let method = req.method().clone();
            let uri = req.uri().clone();

            let response = process_request(req, handler, &router, &request_id).await;
            let response = add_common_headers(response, &request_id);

            info!(
                %method,
                %uri,
                status = response.status().as_u16(),
                elapsed_ms = started.elapsed().as_millis(),
                request_id,
                "handled request"
            );
            Ok(response)
        })
    }
}

async fn process_request<H, B>(
    req: http::Request<B>,
    handler: Arc<H>,
    router: &S3Router,
    request_id: &str,
) -> http::Response<S3ResponseBody>
where
    H: S3Handler,
    B: http_body::Body + Send + 'static,
    B::Data: Send,
    B::Error: fmt::Display + Send,
{
    let method = req.method();
    if *method == http::Method::GET && req.uri().path() == HEALTH_PATH {
        return health_check_response();
    }
    if *method == http::Method::OPTIONS {
        return cors_preflight_response();
    }

    let canonical = router.resolve(&req);
    debug!(
        operation = %canonical.operation(),
        bucket = ?canonical.bucket(),
        key = ?canonical.object(),
        path_style = canonical.is_path_style(),
        request_id,
        "routed S3 request"
    );

    let (parts, incoming) = req.into_parts();
    let body = match collect_body(incoming).await {
        Ok(body) => body,
        Err(err) => {
            error!(error = %err, request_id, "failed to collect request body");
            let s3_err = S3Error::internal_error("Failed to read request body");
            return error_to_response(&s3_err, request_id);
        }
    };

    let outcome =
        tokio::task::spawn_blocking(move || handler.handle(&canonical, &parts, body)).await;
    match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            debug!(error = %err, request_id, "S3 operation returned error");
            error_to_response(&err, request_id)
        }
        Err(join_err) => {
            error!(error = %join_err, request_id, "request worker failed");
            let s3_err = S3Error::internal_error("Request worker failed");
            error_to_response(&s3_err, request_id)
        }
    }
}

/// Collect the full request body into `Bytes`.
async fn collect_body<B>(incoming: B) -> Result<Bytes, B::Error>
where
    B: http_body::Body,
{
    let collected = incoming.collect().await?;
    Ok(collected.to_bytes())
}

fn health_check_response() -> http::Response<S3ResponseBody> {
    let body = serde_json::json!({
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
    });
    let mut response = http::Response::new(S3ResponseBody::from_string(body.to_string()));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

fn cors_preflight_response() -> http::Response<S3ResponseBody> {
    let mut response = http::Response::new(S3ResponseBody::empty());
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(PREFLIGHT_ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(PREFLIGHT_ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("ETag"),
    );
    response
}

/// Add the headers every response carries.
fn add_common_headers(
    mut response: http::Response<S3ResponseBody>,
    request_id: &str,
) -> http::Response<S3ResponseBody> {
    let headers = response.headers_mut();

    if let Ok(hv) = HeaderValue::from_str(request_id) {
        headers.insert("x-amz-request-id", hv.clone());
        headers.insert("x-amz-id-2", hv);
    }
    headers.insert(header::SERVER, HeaderValue::from_static(SERVER_NAME));
    headers
        .entry(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .or_insert_with(|| HeaderValue::from_static("*"));

    response
}
