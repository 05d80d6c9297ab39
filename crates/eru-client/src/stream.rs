//! WebSocket log streaming
//!
//! ERU serves build and container logs over `/websockets/` endpoints.
//! [`LogStream`] wraps the socket as an explicit sequence of lines:
//! `Some(Ok(_))` per non-empty line, `Some(Err(_))` once on a socket or
//! protocol error, `None` after a clean close and forever afterwards.
//! Dropping the stream closes the socket.

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

use crate::client::EruClient;
use crate::error::{EruError, EruResult};

/// One log line from the server.
#[derive(Debug, Clone)]
pub enum LogLine {
    /// Plain text line, as container logs are served.
    Text(String),
    /// JSON-decoded line, as build logs are served.
    Json(serde_json::Value),
}

/// Lazy, potentially unbounded sequence of log lines.
pub struct LogStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    as_json: bool,
    done: bool,
}

impl LogStream {
    pub(crate) async fn connect(url: Url, as_json: bool) -> EruResult<Self> {
        debug!(url = %url, "opening log stream");
        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| EruError::Transport(format!("websocket connect failed: {}", e)))?;

        Ok(Self {
            socket,
            as_json,
            done: false,
        })
    }

    /// Next line, skipping empty ones.
    pub async fn next(&mut self) -> Option<EruResult<LogLine>> {
        if self.done {
            return None;
        }

        loop {
            let message = match self.socket.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(EruError::Transport(format!("websocket error: {}", e))));
                }
                None => {
                    self.done = true;
                    return None;
                }
            };

            let text = match message {
                tungstenite::Message::Text(text) => text,
                tungstenite::Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(e) => {
                        self.done = true;
                        return Some(Err(EruError::Transport(format!(
                            "undecodable log frame: {}",
                            e
                        ))));
                    }
                },
                tungstenite::Message::Close(_) => {
                    self.done = true;
                    return None;
                }
                // ping/pong and raw frames carry no log data
                _ => continue,
            };

            if text.is_empty() {
                continue;
            }

            if self.as_json {
                return match serde_json::from_str(&text) {
                    Ok(value) => Some(Ok(LogLine::Json(value))),
                    Err(e) => {
                        self.done = true;
                        Some(Err(EruError::Transport(format!("bad log line: {}", e))))
                    }
                };
            }
            return Some(Ok(LogLine::Text(text)));
        }
    }
}

impl EruClient {
    fn websocket_url(&self, path: &str, params: &[(&str, String)]) -> EruResult<Url> {
        let mut url = self.base_url().join(path)?;

        let scheme = match url.scheme() {
            "http" => Some("ws"),
            "https" => Some("wss"),
            _ => None,
        };
        if let Some(scheme) = scheme {
            url.set_scheme(scheme).map_err(|_| {
                EruError::Transport(format!("cannot derive websocket scheme for {}", url))
            })?;
        }

        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Tail the build log of a task as JSON lines.
    pub async fn build_log(&self, task_id: u64) -> EruResult<LogStream> {
        let url = self.websocket_url(&format!("/websockets/tasklog/{}/", task_id), &[])?;
        LogStream::connect(url, true).await
    }

    /// Tail a container's log as text lines. `tail` behaves like
    /// `tail -n`; zero streams from now on.
    pub async fn container_log(
        &self,
        container_id: &str,
        stdout: bool,
        stderr: bool,
        tail: u64,
    ) -> EruResult<LogStream> {
        let params = [
            ("stdout", if stdout { "1" } else { "0" }.to_string()),
            ("stderr", if stderr { "1" } else { "0" }.to_string()),
            ("tail", tail.to_string()),
        ];
        let url = self.websocket_url(
            &format!("/websockets/containerlog/{}/", container_id),
            &params,
        )?;
        LogStream::connect(url, false).await
    }
}
