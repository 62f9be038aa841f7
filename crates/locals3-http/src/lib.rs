//! HTTP protocol layer for locals3.
//!
//! - **Resolution** ([`resolver`]): decides between virtual-host and
//!   path-style bucket addressing from the `Host` header.
//! - **Classification** ([`router`]): turns method, path, query and headers
//!   into an immutable [`CanonicalRequest`](locals3_model::CanonicalRequest).
//! - **Dispatch** ([`dispatch`]): the [`S3Handler`] trait and
//!   [`StoreHandler`], which drives an
//!   [`ObjectStore`](locals3_core::ObjectStore) and renders the outcome.
//! - **Multipart** ([`multipart`]) and **form uploads** ([`form`]).
//! - **Rendering** ([`response`]): object payloads with conditional and
//!   range handling, XML documents and S3 error bodies.
//! - **Service** ([`service`]) and **listener** ([`server`], [`tls`]).
//!
//! # Architecture
//!
//! ```text
//! HTTP Request
//!   -> S3HttpService (hyper Service)
//!     -> Health check / CORS preflight interception
//!     -> S3Router (host resolution + operation classification)
//!     -> Body collection
//!     -> S3Handler::handle on the blocking pool
//!     -> Common response headers (x-amz-request-id, Server)
//!   <- HTTP Response
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use locals3_core::MemoryStore;
//! use locals3_http::{HandlerConfig, HostResolver, S3HttpService, S3Router, StoreHandler};
//!
//! let handler = StoreHandler::new(Arc::new(MemoryStore::default()), HandlerConfig::default());
//! let router = S3Router::new(HostResolver::new(["localhost"]));
//! let service = S3HttpService::new(handler, router);
//! // Hand `service` to `locals3_http::server::serve`.
//! ```

// S3Error is the error type of every handler path.
#![allow(clippy::result_large_err)]

pub mod body;
pub mod dispatch;
pub mod form;
pub mod multipart;
pub mod request;
pub mod resolver;
pub mod response;
pub mod router;
pub mod server;
pub mod service;
pub mod tls;

pub use body::S3ResponseBody;
pub use dispatch::{HandlerConfig, S3Handler, StoreHandler, store_error};
pub use resolver::{HostMatch, HostResolver};
pub use router::S3Router;
pub use server::{serve, shutdown_signal};
pub use service::S3HttpService;
pub use tls::{TlsError, tls_acceptor};
