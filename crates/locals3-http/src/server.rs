//! Listener lifecycle: accept, optional TLS handshake, graceful drain.

use std::future::Future;

use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use crate::dispatch::S3Handler;
use crate::service::S3HttpService;

/// Serve connections from `listener` until `shutdown` resolves.
///
/// Each connection runs on its own task. Once `shutdown` fires the listener
/// stops accepting and the call returns after every open connection has
/// finished its in-flight requests.
pub async fn serve<H, F>(
    listener: TcpListener,
    service: S3HttpService<H>,
    tls: Option<TlsAcceptor>,
    shutdown: F,
) where
    H: S3Handler,
    F: Future<Output = ()>,
{
    let graceful = GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let http = http.clone();
                let watcher = graceful.watcher();
                let tls = tls.clone();

                tokio::spawn(async move {
                    let result = match tls {
                        Some(acceptor) => match acceptor.accept(stream).await {
                            Ok(stream) => {
                                let conn = http.serve_connection(TokioIo::new(stream), svc);
                                watcher.watch(conn.into_owned()).await
                            }
                            Err(e) => {
                                debug!(%peer_addr, error = %e, "TLS handshake failed");
                                return;
                            }
                        },
                        None => {
                            let conn = http.serve_connection(TokioIo::new(stream), svc);
                            watcher.watch(conn.into_owned()).await
                        }
                    };
                    if let Err(e) = result {
                        debug!(%peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    // Wait for in-flight requests to complete.
    graceful.shutdown().await;
    info!("all connections drained");
}

/// Resolve on SIGINT, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT"),
        () = terminate => info!("received SIGTERM"),
    }
}
