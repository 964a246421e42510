//! Per-entry change events exchanged between room members.

use serde::{Deserialize, Serialize};

use groupcart_core::{CartError, EntryId, MenuItemId, Price, SizeId, UserId};

/// A single entry-level change, as emitted by the local mutator and carried by
/// the transport.
///
/// The event is the full state of the entry at `version` (not a delta), which
/// is what makes re-delivery and reordering harmless on the receiving side.
///
/// Decoding goes through [`WireChange`] so malformed payloads (unknown
/// fields, negative quantity, missing ids, version 0) are rejected at the
/// boundary with [`CartError::MalformedEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "WireChange")]
pub struct ChangeEvent {
    pub entry_id: EntryId,
    pub quantity: u32,
    pub unit_price: Price,
    pub menu_item_id: MenuItemId,
    pub size_id: SizeId,
    pub added_by: UserId,
    pub version: u64,
    pub last_writer_id: UserId,
}

impl ChangeEvent {
    /// Check invariants that the type system does not already enforce.
    pub fn validate(&self) -> Result<(), CartError> {
        if self.version == 0 {
            return Err(CartError::malformed(format!(
                "entry {}: version must start at 1",
                self.entry_id
            )));
        }
        Ok(())
    }

    /// Decode a raw JSON payload.
    pub fn from_json(raw: &str) -> Result<Self, CartError> {
        serde_json::from_str(raw).map_err(|e| CartError::malformed(e.to_string()))
    }
}

/// Untrusted wire shape of a [`ChangeEvent`].
///
/// Every field is optional and loosely typed so that validation can report
/// precisely what is wrong instead of failing inside serde.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WireChange {
    pub entry_id: Option<String>,
    pub quantity: Option<i64>,
    pub unit_price: Option<u64>,
    pub menu_item_id: Option<String>,
    pub size_id: Option<String>,
    pub added_by: Option<String>,
    pub version: Option<u64>,
    pub last_writer_id: Option<String>,
}

fn required<T>(field: &'static str, value: Option<T>) -> Result<T, CartError> {
    value.ok_or_else(|| CartError::malformed(format!("missing field `{field}`")))
}

fn parse_field<T>(field: &'static str, raw: String) -> Result<T, CartError>
where
    T: core::str::FromStr<Err = CartError>,
{
    raw.parse()
        .map_err(|e: CartError| CartError::malformed(format!("field `{field}`: {e}")))
}

impl TryFrom<WireChange> for ChangeEvent {
    type Error = CartError;

    fn try_from(wire: WireChange) -> Result<Self, Self::Error> {
        let entry_id = parse_field("entryId", required("entryId", wire.entry_id)?)?;

        let raw_quantity = required("quantity", wire.quantity)?;
        let quantity = u32::try_from(raw_quantity).map_err(|_| {
            CartError::malformed(format!("field `quantity`: {raw_quantity} out of range"))
        })?;

        let event = ChangeEvent {
            entry_id,
            quantity,
            unit_price: Price::from_cents(required("unitPrice", wire.unit_price)?),
            menu_item_id: parse_field("menuItemId", required("menuItemId", wire.menu_item_id)?)?,
            size_id: parse_field("sizeId", required("sizeId", wire.size_id)?)?,
            added_by: parse_field("addedBy", required("addedBy", wire.added_by)?)?,
            version: required("version", wire.version)?,
            last_writer_id: parse_field(
                "lastWriterId",
                required("lastWriterId", wire.last_writer_id)?,
            )?,
        };
        event.validate()?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_json() -> serde_json::Value {
        json!({
            "entryId": "0190a5c4-8f4e-7000-8000-000000000001",
            "quantity": 2,
            "unitPrice": 1299,
            "menuItemId": "margherita",
            "sizeId": "medium",
            "addedBy": "alice",
            "version": 1,
            "lastWriterId": "alice"
        })
    }

    #[test]
    fn decodes_valid_payload() {
        let ev = ChangeEvent::from_json(&valid_json().to_string()).unwrap();
        assert_eq!(ev.quantity, 2);
        assert_eq!(ev.unit_price, Price::from_cents(1299));
        assert_eq!(ev.last_writer_id.as_str(), "alice");
    }

    #[test]
    fn serialized_form_decodes_back() {
        let ev = ChangeEvent::from_json(&valid_json().to_string()).unwrap();
        let raw = serde_json::to_string(&ev).unwrap();
        assert_eq!(ChangeEvent::from_json(&raw).unwrap(), ev);
    }

    #[test]
    fn rejects_negative_quantity() {
        let mut v = valid_json();
        v["quantity"] = json!(-1);
        let err = ChangeEvent::from_json(&v.to_string()).unwrap_err();
        assert!(matches!(err, CartError::MalformedEvent(msg) if msg.contains("quantity")));
    }

    #[test]
    fn rejects_missing_entry_id() {
        let mut v = valid_json();
        v.as_object_mut().unwrap().remove("entryId");
        let err = ChangeEvent::from_json(&v.to_string()).unwrap_err();
        assert!(matches!(err, CartError::MalformedEvent(msg) if msg.contains("entryId")));
    }

    #[test]
    fn rejects_unknown_fields() {
        let mut v = valid_json();
        v["totalPrice"] = json!(2598);
        assert!(matches!(
            ChangeEvent::from_json(&v.to_string()),
            Err(CartError::MalformedEvent(_))
        ));
    }

    #[test]
    fn rejects_version_zero() {
        let mut v = valid_json();
        v["version"] = json!(0);
        assert!(matches!(
            ChangeEvent::from_json(&v.to_string()),
            Err(CartError::MalformedEvent(_))
        ));
    }
}
