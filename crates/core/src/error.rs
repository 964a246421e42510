//! Cart error model.

use thiserror::Error;

use crate::id::EntryId;

/// Result type used across the cart layer.
pub type CartResult<T> = Result<T, CartError>;

/// Cart-level error.
///
/// Every variant is local and recoverable: it is surfaced to the caller (the
/// display layer) for user-visible messaging and never tears the session down.
/// Reordered or duplicated delivery is not an error and has no variant here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
    /// A requested quantity was out of range for the operation.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// The entry does not exist in the local store.
    #[error("cart entry not found: {0}")]
    EntryNotFound(EntryId),

    /// An inbound change event failed validation and was dropped.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// The session has been closed (order placed); no further local mutation.
    #[error("session closed")]
    SessionClosed,

    /// The cart-state bootstrap did not complete within its retry budget.
    #[error("bootstrap timed out after {attempts} attempt(s)")]
    BootstrapTimeout { attempts: u32 },

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The entry's version counter cannot be advanced any further.
    #[error("version exhausted for entry {0}")]
    VersionExhausted(EntryId),
}

impl CartError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedEvent(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
