//! Room messages and the transport they travel over.

pub mod bus;
pub mod change;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod message;
pub mod room;

pub use bus::{RoomTransport, Subscription};
pub use change::{ChangeEvent, WireChange};
pub use envelope::RoomEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryRelay, InMemoryRelayError};
pub use message::{OrderPlaced, RoomMessage};
pub use room::RoomScoped;
