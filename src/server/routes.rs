//! Request routing for the diagnostics API.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use chrono::Utc;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{self, HeaderValue};
use hyper::{Method, Response, StatusCode};
use serde::Serialize;
use serde_json::json;

use super::{AppState, Body, sse};
use crate::core::actions::ActionDispatcher;
use crate::core::service_state::StateResolver;
use crate::core::{credential_health, diagnostics, log_stream, models};
use crate::error::ProxydashError;

/// A recognized API path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Health,
    State,
    Auth,
    Models,
    Diagnostics,
    Logs(&'a str),
    Action(&'a str),
}

impl<'a> Route<'a> {
    /// Match a request path. Trailing slashes are ignored.
    #[must_use]
    pub fn parse(path: &'a str) -> Option<Self> {
        let path = path.strip_suffix('/').unwrap_or(path);
        let rest = path.strip_prefix("/api/")?;
        match rest {
            "health" => Some(Self::Health),
            "state" => Some(Self::State),
            "auth" => Some(Self::Auth),
            "models" => Some(Self::Models),
            "diagnostics" => Some(Self::Diagnostics),
            _ => {
                if let Some(target) = rest.strip_prefix("logs/") {
                    (!target.contains('/')).then_some(Self::Logs(target))
                } else if let Some(name) = rest.strip_prefix("actions/") {
                    (!name.contains('/')).then_some(Self::Action(name))
                } else {
                    None
                }
            }
        }
    }

    /// The only method this route accepts.
    #[must_use]
    pub fn method(&self) -> Method {
        match self {
            Self::Action(_) => Method::POST,
            _ => Method::GET,
        }
    }
}

/// True for loopback peers, including IPv4-mapped IPv6 loopback.
#[must_use]
pub fn is_local(ip: IpAddr) -> bool {
    ip.to_canonical().is_loopback()
}

/// JSON response with the given status.
pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    match serde_json::to_vec(value) {
        Ok(bytes) => {
            let mut response = Response::new(full(bytes));
            *response.status_mut() = status;
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            response
        }
        Err(e) => {
            tracing::error!(error = %e, "cannot serialize response");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

fn full(bytes: impl Into<Bytes>) -> Body {
    Full::new(bytes.into())
        .map_err(|never: Infallible| match never {})
        .boxed_unsync()
}

/// `{"error": message}` with the given status.
pub fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    let mut response = Response::new(full(json!({ "error": message }).to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

fn from_error(err: &ProxydashError) -> Response<Body> {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    error_response(status, &err.to_string())
}

fn sse_response(body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

/// Route one request. Request bodies are never read.
pub async fn handle(
    state: &AppState,
    method: &Method,
    path: &str,
    peer: SocketAddr,
) -> Response<Body> {
    if !state.settings.allow_remote && !is_local(peer.ip()) {
        tracing::warn!(peer = %peer, path, "rejected non-local caller");
        return from_error(&ProxydashError::Forbidden);
    }

    let Some(route) = Route::parse(path) else {
        return error_response(StatusCode::NOT_FOUND, "not found");
    };
    if *method != route.method() {
        let mut response = error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
        if let Ok(allow) = HeaderValue::from_str(route.method().as_str()) {
            response.headers_mut().insert(header::ALLOW, allow);
        }
        return response;
    }

    tracing::debug!(method = %method, path, "handling request");
    let settings = state.settings.as_ref();
    let runner = state.runner.as_ref();

    match route {
        Route::Health => json(
            StatusCode::OK,
            &json!({ "ok": true, "version": env!("CARGO_PKG_VERSION") }),
        ),
        Route::State => json(
            StatusCode::OK,
            &StateResolver::new(settings, runner).resolve().await,
        ),
        Route::Auth => json(
            StatusCode::OK,
            &credential_health::evaluate(settings, Utc::now()).await,
        ),
        Route::Models => json(StatusCode::OK, &models::fetch_catalog(settings).await),
        Route::Diagnostics => json(
            StatusCode::OK,
            &diagnostics::collect(settings, runner).await,
        ),
        Route::Logs(target) => match log_stream::open(settings, runner, target).await {
            Ok(stream) => sse_response(sse::body(stream)),
            Err(e) => from_error(&e),
        },
        Route::Action(name) => {
            match ActionDispatcher::new(settings, runner).dispatch(name).await {
                Ok(report) => json(StatusCode::OK, &report),
                Err(e) => from_error(&e),
            }
        }
    }
}
