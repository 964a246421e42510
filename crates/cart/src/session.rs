//! Room session: binds one client to one room and owns its cart state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use groupcart_core::{CartError, CartResult, EntryId, MenuItemId, Price, RoomId, SizeId, UserId};
use groupcart_events::{ChangeEvent, Event, OrderPlaced, RoomEnvelope, RoomMessage};

use crate::entry::CartEntry;
use crate::mutator::{AddItem, CartCommand, LocalMutator};
use crate::reconcile::{MergeOutcome, MergeReport, ReconciliationEngine};
use crate::store::EntryStore;

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Joined (or reconnected), waiting for a full cart snapshot.
    Joining,
    /// Bootstrapped and accepting local mutations.
    Active,
    /// Order placed. Terminal.
    Closed,
}

/// Connectivity of the client's transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    Online,
    Offline,
}

/// Change notification for the display layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartChange {
    /// A local mutation was applied.
    Local(EntryId),
    /// A remote change was merged into the store.
    Remote { entry_id: EntryId, outcome: MergeOutcome },
    /// A bootstrap snapshot was merged.
    Bootstrapped(MergeReport),
    /// The order was placed (locally or by another member).
    OrderPlaced { placed_by: UserId },
}

type ChangeListener = Box<dyn FnMut(&CartChange) + Send>;

/// Counters for local diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Outcomes of every remote change and bootstrap entry, malformed included.
    pub merges: MergeReport,
    /// Envelopes addressed to a different room, ignored.
    pub foreign: usize,
}

/// The cart as it stood when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub room_id: RoomId,
    pub placed_by: UserId,
    pub lines: Vec<CartEntry>,
    pub subtotal: Price,
    pub item_count: u64,
}

impl OrderSummary {
    /// The broadcast that closes the room for everyone else.
    pub fn message(&self) -> RoomMessage {
        RoomMessage::OrderPlaced(OrderPlaced {
            placed_by: self.placed_by.clone(),
            subtotal: self.subtotal,
            item_count: self.item_count,
        })
    }
}

/// One client's membership in a group order.
///
/// Exclusively owns the entry store: local intents go through the mutator,
/// inbound messages through the reconciliation engine, one at a time. The
/// session never talks to the transport itself; mutations return the event to
/// send and the caller decides how to deliver it.
pub struct RoomSession {
    room_id: RoomId,
    user_id: UserId,
    state: SessionState,
    connectivity: ConnectivityState,
    needs_resync: bool,
    store: EntryStore,
    mutator: LocalMutator,
    engine: ReconciliationEngine,
    members: BTreeSet<UserId>,
    stats: SessionStats,
    listeners: Vec<ChangeListener>,
}

impl core::fmt::Debug for RoomSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RoomSession")
            .field("room_id", &self.room_id)
            .field("user_id", &self.user_id)
            .field("state", &self.state)
            .field("connectivity", &self.connectivity)
            .field("entries", &self.store.len())
            .field("members", &self.members)
            .finish_non_exhaustive()
    }
}

impl RoomSession {
    /// Start a new group order hosted by `host_user_id`.
    ///
    /// The host holds the whole (empty) history, so the session is active
    /// immediately.
    pub fn create(host_user_id: UserId) -> Self {
        Self::host(RoomId::generate(), host_user_id)
    }

    /// Host a room whose id was assigned elsewhere (by the relay's registry).
    pub fn host(room_id: RoomId, host_user_id: UserId) -> Self {
        info!(room_id = %room_id, user_id = %host_user_id, "group order created");
        Self::build(room_id, host_user_id, SessionState::Active)
    }

    /// Bind to an existing room. Starts empty and waits for a bootstrap.
    pub fn join(room_id: RoomId, user_id: UserId) -> Self {
        info!(room_id = %room_id, user_id = %user_id, "joining group order");
        Self::build(room_id, user_id, SessionState::Joining)
    }

    fn build(room_id: RoomId, user_id: UserId, state: SessionState) -> Self {
        let mut members = BTreeSet::new();
        members.insert(user_id.clone());

        Self {
            room_id,
            mutator: LocalMutator::new(user_id.clone()),
            user_id,
            state,
            connectivity: ConnectivityState::Online,
            needs_resync: false,
            store: EntryStore::new(),
            engine: ReconciliationEngine::new(),
            members,
            stats: SessionStats::default(),
            listeners: Vec::new(),
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.connectivity
    }

    /// Set after a reconnect; cleared by the next completed bootstrap.
    pub fn needs_resync(&self) -> bool {
        self.needs_resync
    }

    pub fn members(&self) -> &BTreeSet<UserId> {
        &self.members
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn snapshot(&self) -> Vec<CartEntry> {
        self.store.snapshot()
    }

    pub fn subtotal(&self) -> Price {
        self.store.subtotal()
    }

    pub fn item_count(&self) -> u64 {
        self.store.item_count()
    }

    /// Register a display-layer listener, called after every applied change.
    pub fn on_change(&mut self, listener: impl FnMut(&CartChange) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Wrap a message for the transport, addressed from this session.
    pub fn seal(&self, message: RoomMessage) -> RoomEnvelope<RoomMessage> {
        RoomEnvelope::seal(self.room_id.clone(), self.user_id.clone(), message)
    }

    /// Presence announcement sent right after subscribing.
    pub fn joined_message(&self) -> RoomMessage {
        RoomMessage::UserJoined {
            user_id: self.user_id.clone(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Local intents
    // ─────────────────────────────────────────────────────────────────────

    pub fn add_item(
        &mut self,
        menu_item_id: MenuItemId,
        size_id: SizeId,
        unit_price: Price,
        quantity: i64,
    ) -> CartResult<ChangeEvent> {
        self.execute(CartCommand::AddItem(AddItem::new(
            menu_item_id,
            size_id,
            unit_price,
            quantity,
        )))
    }

    pub fn set_quantity(&mut self, entry_id: EntryId, quantity: i64) -> CartResult<ChangeEvent> {
        self.execute(CartCommand::SetQuantity(crate::mutator::SetQuantity {
            entry_id,
            quantity,
        }))
    }

    pub fn remove_item(&mut self, entry_id: EntryId) -> CartResult<ChangeEvent> {
        self.execute(CartCommand::RemoveItem(crate::mutator::RemoveItem { entry_id }))
    }

    /// Empty the shared cart: tombstone every visible entry.
    ///
    /// All removals are decided before any is written, so the store is left
    /// untouched if one of them fails. Returns one event per removed entry.
    pub fn clear(&mut self) -> CartResult<Vec<ChangeEvent>> {
        if self.is_closed() {
            return Err(CartError::SessionClosed);
        }

        let removals = self
            .store
            .snapshot()
            .iter()
            .map(|entry| {
                let command = CartCommand::RemoveItem(crate::mutator::RemoveItem {
                    entry_id: entry.entry_id(),
                });
                self.mutator.decide(&self.store, &command)
            })
            .collect::<CartResult<Vec<_>>>()?;

        let events: Vec<ChangeEvent> = removals.iter().map(CartEntry::to_change).collect();
        for entry in removals {
            self.store.upsert(entry);
        }

        info!(room_id = %self.room_id, removed = events.len(), "cart cleared");
        for event in &events {
            self.notify(&CartChange::Local(event.entry_id));
        }
        Ok(events)
    }

    /// Apply a local command and return the change event to broadcast.
    pub fn execute(&mut self, command: CartCommand) -> CartResult<ChangeEvent> {
        if self.is_closed() {
            return Err(CartError::SessionClosed);
        }

        let event = self.mutator.execute(&mut self.store, &command)?;
        debug!(
            room_id = %self.room_id,
            entry_id = %event.entry_id,
            version = event.version,
            quantity = event.quantity,
            "local cart mutation"
        );
        self.notify(&CartChange::Local(event.entry_id));
        Ok(event)
    }

    /// Finalise the order. Terminal: later local mutations fail with
    /// `SessionClosed`, and so does a second call.
    pub fn place_order(&mut self) -> CartResult<OrderSummary> {
        if self.is_closed() {
            return Err(CartError::SessionClosed);
        }

        self.state = SessionState::Closed;
        let summary = OrderSummary {
            room_id: self.room_id.clone(),
            placed_by: self.user_id.clone(),
            lines: self.store.snapshot(),
            subtotal: self.store.subtotal(),
            item_count: self.store.item_count(),
        };
        info!(
            room_id = %self.room_id,
            subtotal = %summary.subtotal,
            item_count = summary.item_count,
            "group order placed"
        );
        self.notify(&CartChange::OrderPlaced {
            placed_by: self.user_id.clone(),
        });
        Ok(summary)
    }

    /// Leave the room. Consumes the session; the returned message is the
    /// best-effort goodbye for the other members.
    pub fn leave(self) -> RoomMessage {
        info!(room_id = %self.room_id, user_id = %self.user_id, "leaving group order");
        RoomMessage::UserLeft {
            user_id: self.user_id,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Inbound
    // ─────────────────────────────────────────────────────────────────────

    /// Merge a full cart snapshot and mark the session bootstrapped.
    ///
    /// Entries are merged with the same rule as live events, so anything that
    /// arrived while the snapshot was in flight is neither lost nor
    /// overwritten by older snapshot data.
    pub fn complete_bootstrap(&mut self, entries: &[ChangeEvent], closed: bool) -> MergeReport {
        let report = self.engine.merge_all(&mut self.store, entries);
        self.accumulate(&report);

        self.needs_resync = false;
        if closed {
            self.state = SessionState::Closed;
        } else if self.state == SessionState::Joining {
            self.state = SessionState::Active;
        }

        info!(
            room_id = %self.room_id,
            applied = report.applied(),
            discarded = report.discarded(),
            malformed = report.malformed,
            closed,
            "cart bootstrap complete"
        );
        self.notify(&CartChange::Bootstrapped(report));
        report
    }

    /// Process one inbound message.
    ///
    /// Returns the merge outcome for cart changes, `None` for everything else
    /// (presence, order placed, envelopes for other rooms). Changes are merged
    /// even after the session closed so the display stays accurate; nothing is
    /// ever re-broadcast from here.
    pub fn handle_inbound(
        &mut self,
        envelope: RoomEnvelope<RoomMessage>,
    ) -> CartResult<Option<MergeOutcome>> {
        if envelope.room_id() != &self.room_id {
            debug!(
                room_id = %self.room_id,
                foreign_room = %envelope.room_id(),
                "ignoring message for another room"
            );
            self.stats.foreign += 1;
            return Ok(None);
        }

        let sender = envelope.sender().clone();
        let message = envelope.into_payload();
        debug!(
            room_id = %self.room_id,
            sender = %sender,
            event_type = message.event_type(),
            "inbound room message"
        );

        match message {
            RoomMessage::CartChange(event) => {
                self.members.insert(sender);
                self.apply_remote(&event).map(Some)
            }
            RoomMessage::UserJoined { user_id } => {
                self.members.insert(user_id);
                Ok(None)
            }
            RoomMessage::UserLeft { user_id } => {
                if user_id != self.user_id {
                    self.members.remove(&user_id);
                }
                Ok(None)
            }
            RoomMessage::OrderPlaced(placed) => {
                if !self.is_closed() {
                    info!(
                        room_id = %self.room_id,
                        placed_by = %placed.placed_by,
                        "order placed by another member; closing session"
                    );
                    self.state = SessionState::Closed;
                    self.notify(&CartChange::OrderPlaced {
                        placed_by: placed.placed_by,
                    });
                }
                Ok(None)
            }
        }
    }

    /// Decode and process a raw inbound frame. Malformed frames are counted,
    /// logged and reported; the session keeps going.
    pub fn handle_inbound_raw(&mut self, raw: &str) -> CartResult<Option<MergeOutcome>> {
        match RoomEnvelope::<RoomMessage>::from_json(raw) {
            Ok(envelope) => self.handle_inbound(envelope),
            Err(err) => {
                warn!(room_id = %self.room_id, error = %err, "dropping malformed room message");
                self.stats.merges.malformed += 1;
                Err(err)
            }
        }
    }

    /// Merge one remote change event.
    pub fn apply_remote(&mut self, event: &ChangeEvent) -> CartResult<MergeOutcome> {
        match self.engine.apply(&mut self.store, event) {
            Ok(outcome) => {
                self.stats.merges.record(outcome);
                if outcome.applied() {
                    self.notify(&CartChange::Remote {
                        entry_id: event.entry_id,
                        outcome,
                    });
                }
                Ok(outcome)
            }
            Err(err) => {
                warn!(room_id = %self.room_id, error = %err, "dropping malformed change event");
                self.stats.merges.malformed += 1;
                Err(err)
            }
        }
    }

    /// Record a transport connectivity change.
    ///
    /// Coming back online after being offline means events may have been
    /// missed, so an active session drops back to `Joining` until it has
    /// bootstrapped again.
    pub fn set_connectivity(&mut self, connectivity: ConnectivityState) {
        let reconnected = self.connectivity == ConnectivityState::Offline
            && connectivity == ConnectivityState::Online;
        self.connectivity = connectivity;

        if reconnected {
            info!(room_id = %self.room_id, "transport reconnected; resync required");
            self.needs_resync = true;
            if self.state == SessionState::Active {
                self.state = SessionState::Joining;
            }
        }
    }

    fn accumulate(&mut self, report: &MergeReport) {
        let m = &mut self.stats.merges;
        m.inserted += report.inserted;
        m.superseded += report.superseded;
        m.won_tie += report.won_tie;
        m.lost_tie += report.lost_tie;
        m.duplicate += report.duplicate;
        m.stale += report.stale;
        m.malformed += report.malformed;
    }

    fn notify(&mut self, change: &CartChange) {
        for listener in &mut self.listeners {
            listener(change);
        }
    }
}
