//! Telemetry topic streams.
//!
//! The backend publishes each frame as a base64-encoded JSON document in a
//! WebSocket text message.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures_util::StreamExt;
use reqwest::Url;
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Pose,
    Map,
    Plan,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Pose => "pose",
            Topic::Map => "map",
            Topic::Plan => "plan",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decode one frame payload into its JSON text.
pub fn decode_frame(payload: &[u8]) -> Result<String> {
    let trimmed = std::str::from_utf8(payload)
        .context("frame is not UTF-8")?
        .trim();
    let bytes = STANDARD.decode(trimmed).context("frame is not base64")?;
    String::from_utf8(bytes).context("decoded frame is not UTF-8")
}

/// Encode a JSON document the way the backend frames it.
pub fn encode_frame(json: &str) -> String {
    STANDARD.encode(json.as_bytes())
}

fn parse_frame<T: DeserializeOwned>(topic: Topic, json: &str) -> Result<T> {
    serde_json::from_str(json).with_context(|| format!("parsing {topic} frame"))
}

/// Subscription to one backend topic.
pub struct TopicStream {
    topic: Topic,
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    frames: u64,
}

impl TopicStream {
    pub async fn connect(url: Url, topic: Topic) -> Result<Self> {
        let (socket, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("connecting to {topic} stream"))?;
        tracing::info!(%topic, "stream connected");
        Ok(Self {
            topic,
            socket,
            frames: 0,
        })
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Number of frames delivered so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Next decoded JSON document (returns None on close).
    pub async fn next_json(&mut self) -> Result<Option<String>> {
        while let Some(msg) = self.socket.next().await {
            let msg = msg?;
            let payload = match msg {
                Message::Text(text) => text.into_bytes(),
                Message::Binary(data) => data,
                Message::Close(_) => {
                    tracing::info!(topic = %self.topic, "stream closed by backend");
                    return Ok(None);
                }
                _ => continue,
            };
            match decode_frame(&payload) {
                Ok(json) => {
                    self.frames += 1;
                    return Ok(Some(json));
                }
                Err(e) => {
                    tracing::warn!(topic = %self.topic, "dropping undecodable frame: {e:#}");
                }
            }
        }
        Ok(None)
    }

    /// Next frame parsed as `T` (returns None on close).
    ///
    /// Frames that do not parse as `T` are logged and skipped, like frames
    /// that fail to decode. Only socket errors are returned.
    pub async fn next_frame<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        while let Some(json) = self.next_json().await? {
            match parse_frame(self.topic, &json) {
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => {
                    tracing::warn!(topic = %self.topic, "dropping unparsable frame: {e:#}");
                }
            }
        }
        Ok(None)
    }

    pub async fn close(mut self) -> Result<()> {
        self.socket.close(None).await?;
        Ok(())
    }
}
