//! Shared cart domain (pure logic, no IO).
//!
//! Local intents are turned into versioned entry writes by the
//! [`LocalMutator`]; remote change events are folded into the same store by
//! the [`ReconciliationEngine`]. A [`RoomSession`] ties both to one room.

pub mod clock;
pub mod entry;
pub mod mutator;
pub mod reconcile;
pub mod session;
pub mod store;

pub use clock::{Precedence, Stamp};
pub use entry::CartEntry;
pub use mutator::{AddItem, CartCommand, LocalMutator, RemoveItem, SetQuantity};
pub use reconcile::{MergeOutcome, MergeReport, ReconciliationEngine};
pub use session::{
    CartChange, ConnectivityState, OrderSummary, RoomSession, SessionState, SessionStats,
};
pub use store::EntryStore;
