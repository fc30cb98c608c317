//! Live log following for the managed service.
//!
//! A [`LogStream`] owns one follow-mode `logs` child process. A producer
//! task reads the child's stdout and stderr as raw bytes, frames them into
//! complete lines and pushes [`StreamItem`]s through a bounded channel,
//! interleaved with heartbeats on a fixed interval. Dropping the stream
//! cancels the producer and kills the child.

use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::Stream;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;

use crate::core::backend::{Backend, BackendKind, BackendMode};
use crate::core::cli_runner::{CommandRunner, CommandSpec};
use crate::core::service_state::StateResolver;
use crate::error::{ProxydashError, Result};
use crate::storage::config::Settings;

/// Items buffered between the producer and a slow consumer.
const CHANNEL_CAPACITY: usize = 256;
const READ_CHUNK: usize = 8192;

// =============================================================================
// Events
// =============================================================================

/// Kind of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogEventKind {
    /// A stdout line.
    Log,
    /// A stderr line, or a failure to start.
    Error,
    /// The process exited.
    Status,
}

/// One event pushed to a log consumer. `line` never contains a newline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    #[serde(rename = "type")]
    pub kind: LogEventKind,
    pub line: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl LogEvent {
    fn new(kind: LogEventKind, line: impl Into<String>) -> Self {
        Self {
            kind,
            line: line.into(),
            timestamp: Utc::now(),
            exit_code: None,
        }
    }

    #[must_use]
    pub fn log(line: impl Into<String>) -> Self {
        Self::new(LogEventKind::Log, line)
    }

    #[must_use]
    pub fn error(line: impl Into<String>) -> Self {
        Self::new(LogEventKind::Error, line)
    }

    #[must_use]
    pub fn status(exit_code: i32) -> Self {
        Self {
            exit_code: Some(exit_code),
            ..Self::new(
                LogEventKind::Status,
                format!("log process exited with code {exit_code}"),
            )
        }
    }
}

/// What a [`LogStream`] yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    Event(LogEvent),
    Heartbeat,
}

/// Lifecycle of a log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamState {
    Connecting,
    Streaming,
    Closed,
    ClosedError,
}

// =============================================================================
// Line Framing
// =============================================================================

/// Splits a byte stream into complete lines.
///
/// Partial lines are held until their newline arrives. A trailing `\r` is
/// dropped and invalid UTF-8 is replaced.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let rest = self.buffer.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.buffer, rest);
            line.pop();
            lines.push(decode(&line));
        }
        lines
    }

    /// Flush a trailing partial line, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        Some(decode(&line))
    }
}

fn decode(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

// =============================================================================
// Stream
// =============================================================================

/// A running log follower.
///
/// Implements [`Stream`]; the stream ends after the final `status` event,
/// or after a single `error` event if the process could not be started.
pub struct LogStream {
    rx: mpsc::Receiver<StreamItem>,
    state: watch::Receiver<StreamState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl LogStream {
    /// Spawn `spec` and start producing items.
    #[must_use]
    pub fn spawn(spec: CommandSpec, heartbeat: Duration) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (state_tx, state) = watch::channel(StreamState::Connecting);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(produce(spec, heartbeat, tx, state_tx, cancel.clone()));
        Self {
            rx,
            state,
            cancel,
            task,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

}

impl Stream for LogStream {
    type Item = StreamItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for LogStream {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

/// Producer side: owns the child and the framers.
async fn produce(
    spec: CommandSpec,
    heartbeat: Duration,
    tx: mpsc::Sender<StreamItem>,
    state: watch::Sender<StreamState>,
    cancel: CancellationToken,
) {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &spec.cwd {
        command.current_dir(cwd);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(command = %spec.display(), error = %e, "cannot start log follower");
            let _ = tx
                .send(StreamItem::Event(LogEvent::error(format!("{}: {e}", spec.program))))
                .await;
            let _ = state.send(StreamState::ClosedError);
            return;
        }
    };

    let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take()) else {
        let _ = tx
            .send(StreamItem::Event(LogEvent::error("log process has no output pipes")))
            .await;
        let _ = state.send(StreamState::ClosedError);
        return;
    };

    let _ = state.send(StreamState::Streaming);
    tracing::debug!(command = %spec.display(), "log follower started");

    let mut ticker = interval_at(Instant::now() + heartbeat, heartbeat);
    let mut out_framer = LineFramer::new();
    let mut err_framer = LineFramer::new();
    let mut out_buf = vec![0u8; READ_CHUNK];
    let mut err_buf = vec![0u8; READ_CHUNK];
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        let items: Vec<StreamItem> = tokio::select! {
            () = cancel.cancelled() => {
                let _ = child.start_kill();
                let _ = state.send(StreamState::Closed);
                return;
            }
            _ = ticker.tick() => vec![StreamItem::Heartbeat],
            read = stdout.read(&mut out_buf), if out_open => {
                framed(read, &out_buf, &mut out_framer, &mut out_open, LogEvent::log)
            }
            read = stderr.read(&mut err_buf), if err_open => {
                framed(read, &err_buf, &mut err_framer, &mut err_open, LogEvent::error)
            }
        };
        for item in items {
            if tx.send(item).await.is_err() {
                let _ = child.start_kill();
                let _ = state.send(StreamState::Closed);
                return;
            }
        }
    }

    let exit_code = tokio::select! {
        () = cancel.cancelled() => {
            let _ = child.start_kill();
            let _ = state.send(StreamState::Closed);
            return;
        }
        status = child.wait() => status.ok().and_then(|s| s.code()).unwrap_or(-1),
    };

    tracing::debug!(command = %spec.display(), exit_code, "log follower exited");
    let _ = tx.send(StreamItem::Event(LogEvent::status(exit_code))).await;
    let _ = state.send(StreamState::Closed);
}

/// Turn one read result into events, closing the side on EOF or error.
fn framed(
    read: std::io::Result<usize>,
    buf: &[u8],
    framer: &mut LineFramer,
    open: &mut bool,
    event: fn(String) -> LogEvent,
) -> Vec<StreamItem> {
    let lines = match read {
        Ok(0) | Err(_) => {
            *open = false;
            framer.finish().into_iter().collect()
        }
        Ok(n) => framer.push(&buf[..n]),
    };
    lines
        .into_iter()
        .map(|line| StreamItem::Event(event(line)))
        .collect()
}

// =============================================================================
// Opening a stream
// =============================================================================

/// Reject targets that are empty, look like flags, or carry characters
/// no compose service or container name can contain.
///
/// # Errors
///
/// Returns [`ProxydashError::InvalidTarget`].
pub fn validate_target(target: &str) -> Result<()> {
    let valid = !target.is_empty()
        && target.len() <= 128
        && !target.starts_with('-')
        && target
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ProxydashError::InvalidTarget(target.to_string()))
    }
}

/// Pick the backend for a log stream; `auto` resolves state first.
pub async fn choose_backend(settings: &Settings, runner: &dyn CommandRunner) -> BackendKind {
    match settings.backend_mode {
        BackendMode::Compose => BackendKind::Compose,
        BackendMode::Docker => BackendKind::Container,
        BackendMode::Auto => StateResolver::new(settings, runner).resolve().await.backend,
    }
}

/// Validate `target`, choose a backend and start following its logs.
///
/// # Errors
///
/// Returns [`ProxydashError::InvalidTarget`] before anything is spawned.
pub async fn open(
    settings: &Settings,
    runner: &dyn CommandRunner,
    target: &str,
) -> Result<LogStream> {
    validate_target(target)?;
    let kind = choose_backend(settings, runner).await;
    let spec = Backend::new(settings).follow_logs(kind, target);
    tracing::info!(target, backend = %kind, "opening log stream");
    Ok(LogStream::spawn(spec, settings.heartbeat_interval))
}
