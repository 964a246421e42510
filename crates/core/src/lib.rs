//! `groupcart-core`: shared building blocks for the group cart.
//!
//! This crate contains **pure domain** primitives (no transport, no storage).

pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use entity::Entity;
pub use error::{CartError, CartResult};
pub use id::{EntryId, MenuItemId, RoomId, SizeId, UserId};
pub use money::Price;
pub use value_object::ValueObject;
