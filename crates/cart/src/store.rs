//! Entry store: the local view of `entry_id -> CartEntry`.

use std::collections::BTreeMap;

use groupcart_core::{Entity, EntryId, Price};

use crate::entry::CartEntry;

/// In-memory map of cart entries.
///
/// Pure data: the store does not decide whether a write is warranted, callers
/// (the mutator and the reconciliation engine) do.
///
/// Entries are keyed by their time-ordered `EntryId`, so iteration order is
/// creation order and is identical on every client holding the same entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryStore {
    entries: BTreeMap<EntryId, CartEntry>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entry_id: &EntryId) -> Option<&CartEntry> {
        self.entries.get(entry_id)
    }

    /// Replace any entry with the same id, unconditionally.
    pub fn upsert(&mut self, entry: CartEntry) {
        self.entries.insert(*entry.id(), entry);
    }

    /// Visible entries (quantity > 0) in creation order.
    pub fn snapshot(&self) -> Vec<CartEntry> {
        self.visible().cloned().collect()
    }

    /// Every stored entry, tombstones included, in creation order.
    pub fn entries(&self) -> impl Iterator<Item = &CartEntry> {
        self.entries.values()
    }

    /// Sum of `total_price()` over visible entries.
    pub fn subtotal(&self) -> Price {
        self.visible().map(CartEntry::total_price).sum()
    }

    /// Sum of quantities over visible entries.
    pub fn item_count(&self) -> u64 {
        self.visible().map(|e| u64::from(e.quantity())).sum()
    }

    /// Number of stored entries, tombstones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn tombstone_count(&self) -> usize {
        self.entries.values().filter(|e| !e.is_visible()).count()
    }

    fn visible(&self) -> impl Iterator<Item = &CartEntry> {
        self.entries.values().filter(|e| e.is_visible())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupcart_core::{MenuItemId, SizeId, UserId};
    use uuid::Uuid;

    fn entry(n: u128, quantity: u32, cents: u64) -> CartEntry {
        CartEntry::create(
            EntryId::from_uuid(Uuid::from_u128(n)),
            MenuItemId::new("item").unwrap(),
            SizeId::new("regular").unwrap(),
            quantity,
            Price::from_cents(cents),
            UserId::new("alice").unwrap(),
        )
    }

    #[test]
    fn snapshot_hides_tombstones_and_keeps_creation_order() {
        let mut store = EntryStore::new();
        store.upsert(entry(3, 1, 100));
        store.upsert(entry(1, 2, 100));
        store.upsert(entry(2, 0, 100));

        let ids: Vec<u128> = store
            .snapshot()
            .iter()
            .map(|e| e.entry_id().as_uuid().as_u128())
            .collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.tombstone_count(), 1);
    }

    #[test]
    fn upsert_replaces_by_id() {
        let mut store = EntryStore::new();
        store.upsert(entry(1, 1, 100));
        store.upsert(entry(1, 5, 100));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&EntryId::from_uuid(Uuid::from_u128(1))).unwrap().quantity(), 5);
    }

    #[test]
    fn totals_cover_visible_entries_only() {
        let mut store = EntryStore::new();
        store.upsert(entry(1, 2, 1299));
        store.upsert(entry(2, 1, 899));
        store.upsert(entry(3, 0, 10_000));

        assert_eq!(store.subtotal(), Price::from_cents(3497));
        assert_eq!(store.item_count(), 3);
    }
}
