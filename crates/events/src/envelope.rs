use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use groupcart_core::{CartError, RoomId, UserId};

use crate::message::RoomMessage;

/// Envelope for a room message, carrying routing + attribution metadata.
///
/// This is the unit handed to a transport.
///
/// Notes:
/// - **Room scoping** is carried here via `room_id`; receivers drop envelopes
///   addressed to another room.
/// - `message_id` identifies one send; redeliveries keep it.
/// - `sent_at` is informational only. Ordering decisions never use wall-clock
///   time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomEnvelope<M> {
    message_id: Uuid,
    room_id: RoomId,
    sender: UserId,
    sent_at: DateTime<Utc>,
    payload: M,
}

impl<M> RoomEnvelope<M> {
    pub fn new(
        message_id: Uuid,
        room_id: RoomId,
        sender: UserId,
        sent_at: DateTime<Utc>,
        payload: M,
    ) -> Self {
        Self {
            message_id,
            room_id,
            sender,
            sent_at,
            payload,
        }
    }

    /// Wrap a payload for sending now, with a fresh message id.
    pub fn seal(room_id: RoomId, sender: UserId, payload: M) -> Self {
        Self::new(Uuid::now_v7(), room_id, sender, Utc::now(), payload)
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn sender(&self) -> &UserId {
        &self.sender
    }

    pub fn sent_at(&self) -> DateTime<Utc> {
        self.sent_at
    }

    pub fn payload(&self) -> &M {
        &self.payload
    }

    pub fn into_payload(self) -> M {
        self.payload
    }
}

impl RoomEnvelope<RoomMessage> {
    /// Decode an envelope from raw JSON (socket frame, pub/sub payload, HTTP body).
    ///
    /// Any decoding failure, including an invalid change payload, is reported
    /// as [`CartError::MalformedEvent`].
    pub fn from_json(raw: &str) -> Result<Self, CartError> {
        serde_json::from_str(raw).map_err(|e| CartError::malformed(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, CartError> {
        serde_json::to_string(self).map_err(|e| CartError::malformed(e.to_string()))
    }
}
