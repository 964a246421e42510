//! Client side of the HTTP relay (optional).
//!
//! One [`HttpRelay`] is a room transport, a snapshot provider and a room
//! registry at once:
//!
//! - `send` posts the frame to `POST /rooms/{id}/messages`
//! - `subscribe` opens `GET /rooms/{id}/stream` (Server-Sent Events)
//! - `fetch_snapshot` reads `GET /rooms/{id}/snapshot`
//! - `register_room` calls `POST /rooms`
//!
//! Because every frame passes through the relay, the relay's snapshot always
//! covers what its members have sent.

use std::future::Future;
use std::sync::mpsc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use groupcart_core::{CartError, RoomId, UserId};
use groupcart_events::{RoomEnvelope, RoomMessage, RoomTransport, Subscription};

use crate::bootstrap::{RoomRegistry, RoomSnapshot, SnapshotError, SnapshotProvider};
use crate::client::RoomFrame;
use crate::config::ClientConfig;

#[derive(Debug, Error)]
pub enum HttpRelayError {
    #[error("the HTTP relay needs a running tokio runtime")]
    NoRuntime,

    #[error("relay request failed: {0}")]
    Request(String),

    #[error("relay rejected the frame ({status}): {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("serialize error: {0}")]
    Serialize(String),
}

#[derive(Serialize)]
struct CreateRoomBody<'a> {
    host_user_id: &'a UserId,
}

#[derive(Deserialize)]
struct CreatedRoom {
    room_id: RoomId,
}

/// HTTP client for one relay server.
///
/// The transport half is synchronous like every [`RoomTransport`]; requests
/// run on the captured tokio handle. Calls made from inside the runtime use
/// `block_in_place`, which needs the multi-threaded scheduler.
#[derive(Debug, Clone)]
pub struct HttpRelay {
    http: reqwest::Client,
    base_url: String,
    handle: Handle,
}

impl HttpRelay {
    pub fn new(base_url: impl Into<String>, handle: Handle) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            handle,
        }
    }

    /// Build from client settings, on the current tokio runtime.
    pub fn from_config(config: &ClientConfig) -> Result<Self, HttpRelayError> {
        let handle = Handle::try_current().map_err(|_| HttpRelayError::NoRuntime)?;
        Ok(Self::new(config.relay_url.clone(), handle))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn snapshot_url(&self, room_id: &RoomId) -> String {
        format!("{}/rooms/{}/snapshot", self.base_url, room_id)
    }

    fn messages_url(&self, room_id: &RoomId) -> String {
        format!("{}/rooms/{}/messages", self.base_url, room_id)
    }

    fn stream_url(&self, room_id: &RoomId) -> String {
        format!("{}/rooms/{}/stream", self.base_url, room_id)
    }

    fn block_on<F: Future>(&self, fut: F) -> F::Output {
        match Handle::try_current() {
            Ok(_) => tokio::task::block_in_place(|| self.handle.block_on(fut)),
            Err(_) => self.handle.block_on(fut),
        }
    }

    async fn post_frame(&self, room_id: &RoomId, body: String) -> Result<(), HttpRelayError> {
        let res = self
            .http
            .post(self.messages_url(room_id))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| HttpRelayError::Request(e.to_string()))?;

        if res.status().is_success() {
            return Ok(());
        }
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        Err(HttpRelayError::Rejected { status, body })
    }

    async fn open_stream(&self, room_id: &RoomId) -> Result<reqwest::Response, HttpRelayError> {
        let res = self
            .http
            .get(self.stream_url(room_id))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| HttpRelayError::Request(e.to_string()))?;

        if res.status() != StatusCode::OK {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(HttpRelayError::Rejected { status, body });
        }
        Ok(res)
    }
}

impl RoomTransport<RoomFrame> for HttpRelay {
    type Error = HttpRelayError;

    fn send(&self, room_id: &RoomId, message: RoomFrame) -> Result<(), Self::Error> {
        let body = message
            .to_json()
            .map_err(|e| HttpRelayError::Serialize(e.to_string()))?;
        self.block_on(self.post_frame(room_id, body))
    }

    /// Opens the stream before returning, so frames posted afterwards reach
    /// this subscription. If the relay refuses (unknown room, relay down) the
    /// subscription is returned already closed.
    fn subscribe(&self, room_id: &RoomId) -> Subscription<RoomFrame> {
        let (tx, rx) = mpsc::channel();

        match self.block_on(self.open_stream(room_id)) {
            Ok(res) => {
                self.handle.spawn(pump_stream(res, tx, room_id.clone()));
            }
            Err(err) => {
                warn!(room_id = %room_id, error = %err, "could not open relay stream");
            }
        }

        Subscription::new(rx)
    }
}

/// Forward SSE frames into the subscription queue until either side goes away.
async fn pump_stream(mut res: reqwest::Response, tx: mpsc::Sender<RoomFrame>, room_id: RoomId) {
    let mut buf: Vec<u8> = Vec::new();

    loop {
        let chunk = match res.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                debug!(room_id = %room_id, "relay stream ended");
                return;
            }
            Err(err) => {
                warn!(room_id = %room_id, error = %err, "relay stream failed");
                return;
            }
        };
        buf.extend_from_slice(&chunk);

        while let Some(end) = buf.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = buf.drain(..end + 2).collect();
            let frame = match decode_sse_block(&String::from_utf8_lossy(&block)) {
                None => continue,
                Some(Ok(frame)) => frame,
                Some(Err(err)) => {
                    debug!(room_id = %room_id, error = %err, "dropping undecodable frame");
                    continue;
                }
            };
            if tx.send(frame).is_err() {
                debug!(room_id = %room_id, "subscription dropped; closing relay stream");
                return;
            }
        }
    }
}

/// Decode one SSE event block. Comment-only blocks (keep-alives) yield `None`.
pub(crate) fn decode_sse_block(block: &str) -> Option<Result<RoomFrame, CartError>> {
    let data: Vec<&str> = block
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect();

    if data.is_empty() {
        return None;
    }
    Some(RoomEnvelope::<RoomMessage>::from_json(&data.join("\n")))
}

#[async_trait]
impl SnapshotProvider for HttpRelay {
    async fn fetch_snapshot(&self, room_id: &RoomId) -> Result<RoomSnapshot, SnapshotError> {
        let res = self
            .http
            .get(self.snapshot_url(room_id))
            .send()
            .await
            .map_err(|e| SnapshotError::Unavailable(e.to_string()))?;

        match res.status() {
            StatusCode::OK => res
                .json::<RoomSnapshot>()
                .await
                .map_err(|e| SnapshotError::Malformed(e.to_string())),
            StatusCode::NOT_FOUND => Err(SnapshotError::RoomNotFound(room_id.clone())),
            status if status.is_server_error() => {
                Err(SnapshotError::Unavailable(format!("relay answered {status}")))
            }
            status => Err(SnapshotError::Malformed(format!("unexpected status {status}"))),
        }
    }
}

#[async_trait]
impl RoomRegistry for HttpRelay {
    async fn register_room(&self, host_user_id: &UserId) -> Result<RoomId, SnapshotError> {
        let res = self
            .http
            .post(format!("{}/rooms", self.base_url))
            .json(&CreateRoomBody { host_user_id })
            .send()
            .await
            .map_err(|e| SnapshotError::Unavailable(e.to_string()))?;

        match res.status() {
            StatusCode::CREATED => res
                .json::<CreatedRoom>()
                .await
                .map(|created| created.room_id)
                .map_err(|e| SnapshotError::Malformed(e.to_string())),
            status if status.is_server_error() => {
                Err(SnapshotError::Unavailable(format!("relay answered {status}")))
            }
            status => Err(SnapshotError::Malformed(format!("unexpected status {status}"))),
        }
    }
}
