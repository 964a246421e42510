use serde::{Deserialize, Serialize};

use groupcart_core::RoomId;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub host_user_id: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub room_id: RoomId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublishResponse {
    /// Merge outcome for cart changes (`inserted`, `stale`, ...), absent otherwise.
    pub outcome: Option<String>,
}
