//! Server-Sent Events framing for log streams.
//!
//! Each log event is one `data:` frame carrying the event as JSON.
//! Heartbeats are SSE comments, which clients ignore but which keep idle
//! proxies from closing the connection. The first frame is a `retry:` hint
//! telling the browser how long to wait before reconnecting.

use std::convert::Infallible;

use futures::StreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Bytes, Frame};

use super::Body;
use crate::core::log_stream::{LogStream, StreamItem};

/// Reconnect delay suggested to clients.
pub const RETRY_MILLIS: u64 = 3000;

pub const HEARTBEAT_FRAME: &str = ": heartbeat\n\n";

#[must_use]
pub fn retry_frame() -> Bytes {
    Bytes::from(format!("retry: {RETRY_MILLIS}\n\n"))
}

/// Encode one stream item as an SSE frame.
#[must_use]
pub fn encode(item: &StreamItem) -> Bytes {
    match item {
        StreamItem::Heartbeat => Bytes::from_static(HEARTBEAT_FRAME.as_bytes()),
        StreamItem::Event(event) => match serde_json::to_string(event) {
            Ok(json) => Bytes::from(format!("data: {json}\n\n")),
            Err(e) => {
                tracing::warn!(error = %e, "cannot encode log event");
                Bytes::from_static(b": encode error\n\n")
            }
        },
    }
}

/// Response body that streams `stream` as SSE frames.
///
/// The body owns the stream; when the client disconnects hyper drops the
/// body, which kills the log process.
#[must_use]
pub fn body(stream: LogStream) -> Body {
    let frames = futures::stream::once(async { retry_frame() })
        .chain(stream.map(|item| encode(&item)))
        .map(|bytes| Ok::<_, Infallible>(Frame::data(bytes)));
    StreamBody::new(frames).boxed_unsync()
}
