//! Local mutator: user intent -> entry write + outbound change event.

use serde::{Deserialize, Serialize};

use groupcart_core::{CartError, CartResult, EntryId, MenuItemId, Price, SizeId, UserId};
use groupcart_events::ChangeEvent;

use crate::entry::CartEntry;
use crate::store::EntryStore;

/// Command: AddItem.
///
/// `unit_price` is read from the menu once, here, and never re-queried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub entry_id: EntryId,
    pub menu_item_id: MenuItemId,
    pub size_id: SizeId,
    pub unit_price: Price,
    pub quantity: i64,
}

impl AddItem {
    /// Build the command with a freshly assigned entry id.
    pub fn new(menu_item_id: MenuItemId, size_id: SizeId, unit_price: Price, quantity: i64) -> Self {
        Self {
            entry_id: EntryId::new(),
            menu_item_id,
            size_id,
            unit_price,
            quantity,
        }
    }
}

/// Command: SetQuantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetQuantity {
    pub entry_id: EntryId,
    pub quantity: i64,
}

/// Command: RemoveItem (same as setting the quantity to zero).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItem {
    pub entry_id: EntryId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartCommand {
    AddItem(AddItem),
    SetQuantity(SetQuantity),
    RemoveItem(RemoveItem),
}

/// Applies one user's intents to the local store.
#[derive(Debug, Clone)]
pub struct LocalMutator {
    user_id: UserId,
}

impl LocalMutator {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Decide the entry state a command produces. Does not touch the store.
    pub fn decide(&self, store: &EntryStore, command: &CartCommand) -> CartResult<CartEntry> {
        match command {
            CartCommand::AddItem(cmd) => self.decide_add(store, cmd),
            CartCommand::SetQuantity(cmd) => self.decide_set(store, cmd.entry_id, cmd.quantity),
            CartCommand::RemoveItem(cmd) => self.decide_set(store, cmd.entry_id, 0),
        }
    }

    /// Decide, write the result to the store, and return the event to send.
    pub fn execute(&self, store: &mut EntryStore, command: &CartCommand) -> CartResult<ChangeEvent> {
        let entry = self.decide(store, command)?;
        let event = entry.to_change();
        store.upsert(entry);
        Ok(event)
    }

    pub fn add_item(&self, store: &mut EntryStore, cmd: AddItem) -> CartResult<ChangeEvent> {
        self.execute(store, &CartCommand::AddItem(cmd))
    }

    pub fn set_quantity(
        &self,
        store: &mut EntryStore,
        entry_id: EntryId,
        quantity: i64,
    ) -> CartResult<ChangeEvent> {
        self.execute(store, &CartCommand::SetQuantity(SetQuantity { entry_id, quantity }))
    }

    pub fn remove_item(&self, store: &mut EntryStore, entry_id: EntryId) -> CartResult<ChangeEvent> {
        self.execute(store, &CartCommand::RemoveItem(RemoveItem { entry_id }))
    }

    fn decide_add(&self, store: &EntryStore, cmd: &AddItem) -> CartResult<CartEntry> {
        if cmd.quantity <= 0 {
            return Err(CartError::InvalidQuantity(cmd.quantity));
        }
        let quantity = to_quantity(cmd.quantity)?;

        if store.get(&cmd.entry_id).is_some() {
            return Err(CartError::invalid_id(format!(
                "entry {} already exists",
                cmd.entry_id
            )));
        }

        Ok(CartEntry::create(
            cmd.entry_id,
            cmd.menu_item_id.clone(),
            cmd.size_id.clone(),
            quantity,
            cmd.unit_price,
            self.user_id.clone(),
        ))
    }

    fn decide_set(&self, store: &EntryStore, entry_id: EntryId, quantity: i64) -> CartResult<CartEntry> {
        let current = store.get(&entry_id).ok_or(CartError::EntryNotFound(entry_id))?;
        let quantity = to_quantity(quantity)?;

        let stamp = current
            .stamp()
            .next(self.user_id.clone())
            .ok_or(CartError::VersionExhausted(entry_id))?;

        Ok(current.requantified(quantity, stamp))
    }
}

fn to_quantity(quantity: i64) -> CartResult<u32> {
    u32::try_from(quantity).map_err(|_| CartError::InvalidQuantity(quantity))
}
