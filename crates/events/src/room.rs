use groupcart_core::RoomId;

use crate::RoomEnvelope;

/// Helper trait for room-scoped messages.
///
/// Workers pinned to a room use this to drop messages addressed elsewhere
/// (a shared channel or a misrouted relay frame).
pub trait RoomScoped {
    fn room_id(&self) -> &RoomId;
}

impl<M> RoomScoped for RoomEnvelope<M> {
    fn room_id(&self) -> &RoomId {
        RoomEnvelope::room_id(self)
    }
}
