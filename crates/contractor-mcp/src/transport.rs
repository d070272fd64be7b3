//! MCP Transport layer implementations

use std::collections::HashMap;
use std::io;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, trace};

/// Transport trait for MCP communication
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, message: Value) -> io::Result<()>;
    /// Next message from the server, `None` once the connection is closed
    async fn receive(&mut self) -> io::Result<Option<Value>>;
    async fn close(&mut self) -> io::Result<()>;
}

/// Next JSON-RPC message from a line-delimited stream.
///
/// Blank lines and lines that are not JSON (a backend logging to stdout)
/// are skipped.
async fn read_message<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Option<Value>> {
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str(line) {
            Ok(value) => return Ok(Some(value)),
            Err(e) => trace!(error = %e, line, "Skipping non-JSON line from backend"),
        }
    }
}

/// Stdio transport for subprocess communication
pub struct StdioTransport {
    child: Child,
    reader: Option<BufReader<tokio::process::ChildStdout>>,
}

impl StdioTransport {
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> io::Result<Self> {
        let mut child = Command::new(command)
            .args(args)
            .envs(env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("Failed to capture stdout"))?;

        debug!(command, "Spawned stdio MCP backend");

        Ok(Self {
            child,
            reader: Some(BufReader::new(stdout)),
        })
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&mut self, message: Value) -> io::Result<()> {
        let stdin = self
            .child
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::other("Stdin not available"))?;

        let json = serde_json::to_string(&message)?;
        stdin.write_all(json.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;

        Ok(())
    }

    async fn receive(&mut self) -> io::Result<Option<Value>> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| io::Error::other("Reader not available"))?;

        read_message(reader).await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.reader = None;
        self.child.kill().await?;
        Ok(())
    }
}

/// A single server-sent event
#[derive(Debug, Clone)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

type SseStream = Pin<Box<dyn Stream<Item = io::Result<SseEvent>> + Send>>;

/// Decode a byte stream into server-sent events
pub fn parse_sse_stream<S, E>(byte_stream: S) -> SseStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let events = byte_stream
        .map(|chunk| chunk.map_err(io::Error::other))
        .eventsource()
        .map(|result| {
            result
                .map(|event| SseEvent {
                    event: event.event,
                    data: event.data,
                })
                .map_err(|e| io::Error::other(e.to_string()))
        });

    Box::pin(events)
}

/// SSE transport for HTTP-based communication.
///
/// The server streams responses over a long-lived `GET` and announces, in
/// an `endpoint` event, the URL that client messages are `POST`ed to.
pub struct SseTransport {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    events: SseStream,
}

impl SseTransport {
    /// Open the event stream and wait for the server's endpoint announcement
    pub async fn connect(url: &str) -> io::Result<Self> {
        let base = reqwest::Url::parse(url).map_err(io::Error::other)?;
        let client = reqwest::Client::new();

        let response = client
            .get(base.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(io::Error::other)?
            .error_for_status()
            .map_err(io::Error::other)?;

        let mut events = parse_sse_stream(response.bytes_stream());
        let endpoint = wait_for_endpoint(&mut events, &base).await?;
        debug!(%base, %endpoint, "SSE MCP backend connected");

        Ok(Self {
            client,
            endpoint,
            events,
        })
    }

    /// URL that client messages are posted to
    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }
}

async fn wait_for_endpoint(events: &mut SseStream, base: &reqwest::Url) -> io::Result<reqwest::Url> {
    while let Some(event) = events.next().await {
        let event = event?;
        if event.event == "endpoint" {
            return base.join(event.data.trim()).map_err(io::Error::other);
        }
        trace!(event = %event.event, "Skipping SSE event before endpoint announcement");
    }

    Err(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "SSE stream closed before endpoint was announced",
    ))
}

#[async_trait]
impl Transport for SseTransport {
    async fn send(&mut self, message: Value) -> io::Result<()> {
        self.client
            .post(self.endpoint.clone())
            .json(&message)
            .send()
            .await
            .map_err(io::Error::other)?
            .error_for_status()
            .map_err(io::Error::other)?;

        Ok(())
    }

    async fn receive(&mut self) -> io::Result<Option<Value>> {
        while let Some(event) = self.events.next().await {
            let event = event?;
            match event.event.as_str() {
                "" | "message" => {
                    let value: Value = serde_json::from_str(&event.data)?;
                    return Ok(Some(value));
                }
                other => trace!(event = other, "Ignoring SSE event"),
            }
        }

        Ok(None)
    }

    async fn close(&mut self) -> io::Result<()> {
        self.events = Box::pin(futures::stream::empty());
        Ok(())
    }
}
