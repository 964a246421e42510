//! Strongly-typed identifiers used across the cart.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CartError;

/// Identifier of a cart entry.
///
/// Assigned once by the originating client. UUIDv7 is time-ordered, so sorting
/// by `EntryId` yields the order in which entries were created, on every client.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Create a new identifier (UUIDv7, time-ordered).
    ///
    /// Prefer passing IDs explicitly in tests for determinism.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for EntryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for EntryId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for EntryId {
    type Err = CartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid =
            Uuid::from_str(s).map_err(|e| CartError::invalid_id(format!("EntryId: {e}")))?;
        Ok(Self(uuid))
    }
}

/// Opaque room token shared out-of-band (QR code / invite link).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

/// Stable per-client identifier. Also the tie-break key for concurrent writes,
/// so it orders lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

/// Reference into externally-owned menu data (opaque to the cart).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MenuItemId(String);

/// Reference to a size/variant of a menu item (opaque to the cart).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SizeId(String);

const MAX_TOKEN_LEN: usize = 128;

fn validate_token(name: &str, raw: &str) -> Result<(), CartError> {
    if raw.is_empty() {
        return Err(CartError::invalid_id(format!("{name}: must not be empty")));
    }
    if raw.len() > MAX_TOKEN_LEN {
        return Err(CartError::invalid_id(format!(
            "{name}: longer than {MAX_TOKEN_LEN} bytes"
        )));
    }
    if raw.chars().any(char::is_control) {
        return Err(CartError::invalid_id(format!(
            "{name}: contains control characters"
        )));
    }
    Ok(())
}

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Build a validated identifier.
            pub fn new(value: impl Into<String>) -> Result<Self, CartError> {
                let value = value.into();
                validate_token($name, &value)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $t {
            type Error = CartError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = CartError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

impl_string_newtype!(RoomId, "RoomId");
impl_string_newtype!(UserId, "UserId");
impl_string_newtype!(MenuItemId, "MenuItemId");
impl_string_newtype!(SizeId, "SizeId");

impl RoomId {
    /// Generate a fresh room token.
    ///
    /// 32 hex characters from a random UUIDv4 (122 random bits), so tokens are
    /// not guessable from one another and collisions are negligible.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl UserId {
    /// Generate a fresh client identity (UUIDv7 rendered as text).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_room_ids_are_distinct_hex_tokens() {
        let a = RoomId::generate();
        let b = RoomId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn user_ids_order_lexicographically() {
        let a = UserId::new("A").unwrap();
        let b = UserId::new("B").unwrap();
        assert!(b > a);
    }

    #[test]
    fn empty_and_control_tokens_are_rejected() {
        assert!(matches!(UserId::new(""), Err(CartError::InvalidId(_))));
        assert!(matches!(RoomId::new("ab\ncd"), Err(CartError::InvalidId(_))));
        assert!(MenuItemId::new("x".repeat(MAX_TOKEN_LEN + 1)).is_err());
    }

    #[test]
    fn deserialize_validates_tokens() {
        let ok: UserId = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(ok.as_str(), "alice");
        assert!(serde_json::from_str::<UserId>("\"\"").is_err());
    }

    #[test]
    fn entry_id_parses_from_display() {
        let id = EntryId::new();
        let parsed: EntryId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<EntryId>().is_err());
    }
}
