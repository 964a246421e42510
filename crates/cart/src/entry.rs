use serde::Serialize;

use groupcart_core::{Entity, EntryId, MenuItemId, Price, SizeId, UserId};
use groupcart_events::ChangeEvent;

use crate::clock::Stamp;

/// One line of the shared cart.
///
/// `quantity == 0` marks a tombstone: the entry is hidden from the visible
/// cart but kept so that older writes for the same id are still rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartEntry {
    entry_id: EntryId,
    menu_item_id: MenuItemId,
    size_id: SizeId,
    quantity: u32,
    unit_price: Price,
    added_by: UserId,
    stamp: Stamp,
}

impl CartEntry {
    /// A brand-new entry authored by `author` (version 1).
    pub fn create(
        entry_id: EntryId,
        menu_item_id: MenuItemId,
        size_id: SizeId,
        quantity: u32,
        unit_price: Price,
        author: UserId,
    ) -> Self {
        Self {
            entry_id,
            menu_item_id,
            size_id,
            quantity,
            unit_price,
            added_by: author.clone(),
            stamp: Stamp::initial(author),
        }
    }

    /// Rebuild the entry state carried by a change event.
    pub fn from_change(event: &ChangeEvent) -> Self {
        Self {
            entry_id: event.entry_id,
            menu_item_id: event.menu_item_id.clone(),
            size_id: event.size_id.clone(),
            quantity: event.quantity,
            unit_price: event.unit_price,
            added_by: event.added_by.clone(),
            stamp: Stamp::new(event.version, event.last_writer_id.clone()),
        }
    }

    /// The change event describing this entry's current state.
    pub fn to_change(&self) -> ChangeEvent {
        ChangeEvent {
            entry_id: self.entry_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            menu_item_id: self.menu_item_id.clone(),
            size_id: self.size_id.clone(),
            added_by: self.added_by.clone(),
            version: self.stamp.version(),
            last_writer_id: self.stamp.writer().clone(),
        }
    }

    /// Same entry with a new quantity under a new stamp. Identity and pricing
    /// are carried over unchanged.
    pub fn requantified(&self, quantity: u32, stamp: Stamp) -> Self {
        Self {
            quantity,
            stamp,
            ..self.clone()
        }
    }

    pub fn entry_id(&self) -> EntryId {
        self.entry_id
    }

    pub fn menu_item_id(&self) -> &MenuItemId {
        &self.menu_item_id
    }

    pub fn size_id(&self) -> &SizeId {
        &self.size_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> Price {
        self.unit_price
    }

    pub fn added_by(&self) -> &UserId {
        &self.added_by
    }

    pub fn stamp(&self) -> &Stamp {
        &self.stamp
    }

    pub fn version(&self) -> u64 {
        self.stamp.version()
    }

    pub fn last_writer_id(&self) -> &UserId {
        self.stamp.writer()
    }

    /// Always derived from its factors, never stored.
    pub fn total_price(&self) -> Price {
        self.unit_price.times(self.quantity)
    }

    pub fn is_visible(&self) -> bool {
        self.quantity > 0
    }
}

impl Entity for CartEntry {
    type Id = EntryId;

    fn id(&self) -> &Self::Id {
        &self.entry_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CartEntry {
        CartEntry::create(
            EntryId::new(),
            MenuItemId::new("margherita").unwrap(),
            SizeId::new("large").unwrap(),
            2,
            Price::from_cents(1599),
            UserId::new("alice").unwrap(),
        )
    }

    #[test]
    fn total_price_follows_quantity() {
        let e = sample();
        assert_eq!(e.total_price(), Price::from_cents(3198));

        let bob = UserId::new("bob").unwrap();
        let stamp = e.stamp().next(bob.clone()).unwrap();
        let e3 = e.requantified(3, stamp);
        assert_eq!(e3.total_price(), Price::from_cents(4797));
        assert_eq!(e3.added_by().as_str(), "alice");
        assert_eq!(e3.last_writer_id(), &bob);
        assert_eq!(e3.version(), 2);
    }

    #[test]
    fn change_event_carries_full_state() {
        let e = sample();
        assert_eq!(CartEntry::from_change(&e.to_change()), e);
    }
}
