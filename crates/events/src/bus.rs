//! Room transport abstraction (mechanics only).
//!
//! A transport moves room messages between the members of a room. The cart
//! core assumes very little about it:
//!
//! - **At-least-once delivery**: a message may arrive more than once.
//! - **No ordering guarantees**: messages may arrive in any order.
//! - **No acknowledgement**: senders do not wait for receivers.
//! - **No persistence**: late joiners bootstrap from a snapshot provider,
//!   not from the transport.
//!
//! Consumers must therefore be idempotent and order-insensitive, which the
//! per-entry merge rule in `groupcart-cart` provides.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use groupcart_core::RoomId;

/// A subscription to one room's message stream.
///
/// This is the inbound event queue of a client: messages are buffered here
/// until the owning worker takes them one at a time.
///
/// ## Usage Pattern
///
/// ```ignore
/// let sub = transport.subscribe(&room_id);
///
/// loop {
///     match sub.recv_timeout(Duration::from_millis(250)) {
///         Ok(envelope) => session.handle_inbound(envelope),
///         Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue, // check for shutdown
///         Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break, // transport gone
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Take every message that is already buffered, without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Room-scoped publish/subscribe transport.
///
/// `send` corresponds to the socket `emit`, `subscribe` to registering an
/// `on_receive` callback (the callback itself is driven by a worker in
/// `groupcart-infra`).
///
/// Whether a sender receives its own messages back is implementation-defined;
/// the merge rule treats an echo as a duplicate.
pub trait RoomTransport<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn send(&self, room_id: &RoomId, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self, room_id: &RoomId) -> Subscription<M>;
}

impl<M, T> RoomTransport<M> for Arc<T>
where
    T: RoomTransport<M> + ?Sized,
{
    type Error = T::Error;

    fn send(&self, room_id: &RoomId, message: M) -> Result<(), Self::Error> {
        (**self).send(room_id, message)
    }

    fn subscribe(&self, room_id: &RoomId) -> Subscription<M> {
        (**self).subscribe(room_id)
    }
}
