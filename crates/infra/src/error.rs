use thiserror::Error;

use groupcart_core::CartError;

use crate::bootstrap::SnapshotError;

/// Errors surfaced by [`crate::client::RoomClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Local cart rule violated, or bootstrap gave up.
    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unknown menu item {menu_item_id} (size {size_id})")]
    UnknownMenuItem {
        menu_item_id: String,
        size_id: String,
    },

    #[error("session lock poisoned")]
    Poisoned,
}

pub type ClientResult<T> = Result<T, ClientError>;
