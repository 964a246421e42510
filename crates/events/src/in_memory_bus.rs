//! In-memory room relay for tests/dev.

use std::collections::HashMap;
use std::sync::{Mutex, mpsc};

use thiserror::Error;

use groupcart_core::RoomId;

use crate::bus::{RoomTransport, Subscription};

#[derive(Debug, Error)]
pub enum InMemoryRelayError {
    /// Send failed due to internal lock poisoning.
    #[error("relay lock poisoned")]
    Poisoned,
}

/// In-memory socket relay.
///
/// - No IO / no async
/// - Fan-out to every subscriber of the room, including the sender
/// - Best-effort: dead subscribers are dropped on the next send
#[derive(Debug)]
pub struct InMemoryRelay<M> {
    rooms: Mutex<HashMap<RoomId, Vec<mpsc::Sender<M>>>>,
}

impl<M> InMemoryRelay<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscribers currently registered for `room_id`.
    pub fn subscriber_count(&self, room_id: &RoomId) -> usize {
        self.rooms
            .lock()
            .map(|rooms| rooms.get(room_id).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl<M> Default for InMemoryRelay<M> {
    fn default() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }
}

impl<M> RoomTransport<M> for InMemoryRelay<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryRelayError;

    fn send(&self, room_id: &RoomId, message: M) -> Result<(), Self::Error> {
        let mut rooms = self.rooms.lock().map_err(|_| InMemoryRelayError::Poisoned)?;

        if let Some(subs) = rooms.get_mut(room_id) {
            // Drop any dead subscribers while sending.
            subs.retain(|tx| tx.send(message.clone()).is_ok());
            if subs.is_empty() {
                rooms.remove(room_id);
            }
        }

        Ok(())
    }

    fn subscribe(&self, room_id: &RoomId) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // If the lock is poisoned, we still return a subscription;
        // it just won't receive messages.
        if let Ok(mut rooms) = self.rooms.lock() {
            rooms.entry(room_id.clone()).or_default().push(tx);
        }

        Subscription::new(rx)
    }
}
