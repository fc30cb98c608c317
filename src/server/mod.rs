//! Local diagnostics API over HTTP/1.1.
//!
//! One hyper connection task per accepted socket; every request is routed
//! by [`routes::handle`]. The listener refuses non-loopback callers unless
//! `allow_remote` is set.

pub mod routes;
pub mod sse;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::combinators::UnsyncBoxBody;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::core::cli_runner::CommandRunner;
use crate::error::{ProxydashError, Result};
use crate::storage::config::Settings;

/// Response body type for every route.
pub type Body = UnsyncBoxBody<Bytes, Infallible>;

/// Shared, read-only state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub runner: Arc<dyn CommandRunner>,
}

impl AppState {
    #[must_use]
    pub fn new(settings: Arc<Settings>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { settings, runner }
    }
}

/// Bind the configured listener address.
///
/// # Errors
///
/// Returns [`ProxydashError::Bind`] if the address is unavailable.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| ProxydashError::Bind {
            addr: addr.to_string(),
            message: e.to_string(),
        })
}

/// Accept connections until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the listener's local address cannot be read.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<()> {
    let local = listener.local_addr()?;
    if !state.settings.allow_remote && !routes::is_local(local.ip()) {
        tracing::warn!(
            addr = %local,
            "listening on a non-loopback address; remote callers will be refused"
        );
    }
    tracing::info!(addr = %local, "diagnostics API listening");

    loop {
        let (stream, peer) = tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            },
        };

        let state = state.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let service = service_fn(move |request: hyper::Request<hyper::body::Incoming>| {
                let state = state.clone();
                let method = request.method().clone();
                let path = request.uri().path().to_string();
                async move {
                    Ok::<_, Infallible>(routes::handle(&state, &method, &path, peer).await)
                }
            });
            let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
            tokio::pin!(connection);
            tokio::select! {
                result = connection.as_mut() => {
                    if let Err(e) = result {
                        tracing::debug!(peer = %peer, error = %e, "connection closed with error");
                    }
                }
                () = shutdown.cancelled() => {
                    connection.as_mut().graceful_shutdown();
                    let _ = connection.await;
                }
            }
        });
    }

    tracing::info!("diagnostics API stopped");
    Ok(())
}

/// Bind and serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run(settings: Arc<Settings>, runner: Arc<dyn CommandRunner>) -> Result<()> {
    let listener = bind(settings.bind).await?;
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
        }
        trigger.cancel();
    });
    serve(listener, AppState::new(settings, runner), shutdown).await
}
