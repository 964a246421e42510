//! Messages exchanged inside a room.

use serde::{Deserialize, Serialize};

use groupcart_core::{Price, UserId};

use crate::change::ChangeEvent;
use crate::event::Event;

/// Final state of a group order, broadcast when a member places it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlaced {
    pub placed_by: UserId,
    pub subtotal: Price,
    pub item_count: u64,
}

/// Room-level message.
///
/// Only `CartChange` carries cart state. Presence messages are informational,
/// `OrderPlaced` closes the room for every member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RoomMessage {
    CartChange(ChangeEvent),
    UserJoined { user_id: UserId },
    UserLeft { user_id: UserId },
    OrderPlaced(OrderPlaced),
}

impl Event for RoomMessage {
    fn event_type(&self) -> &'static str {
        match self {
            RoomMessage::CartChange(_) => "room.cart.changed",
            RoomMessage::UserJoined { .. } => "room.user.joined",
            RoomMessage::UserLeft { .. } => "room.user.left",
            RoomMessage::OrderPlaced(_) => "room.order.placed",
        }
    }

    fn version(&self) -> u32 {
        1
    }
}
