//! In-memory room registry that doubles as the bootstrap snapshot source.
//!
//! Every change event seen on a room is folded into a per-room
//! [`EntryStore`] with the same merge rule clients use, so the snapshot is
//! the converged cart regardless of delivery order.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use groupcart_cart::{EntryStore, MergeOutcome, ReconciliationEngine};
use groupcart_core::{RoomId, UserId};
use groupcart_events::{RoomEnvelope, RoomMessage};

use crate::bootstrap::{RoomRegistry, RoomSnapshot, SnapshotError, SnapshotProvider};

/// Attempts at finding an unused room id before giving up.
pub const ROOM_ID_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomPhase {
    Active,
    Ordered,
}

/// Public view of a room (for the join page).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomStatus {
    pub room_id: RoomId,
    pub host_user_id: UserId,
    pub status: RoomPhase,
    pub members: Vec<UserId>,
    pub item_count: u64,
}

#[derive(Debug)]
struct RoomRecord {
    host_user_id: UserId,
    store: EntryStore,
    members: BTreeSet<UserId>,
    phase: RoomPhase,
    ordered_at: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    rooms: RwLock<HashMap<RoomId, RoomRecord>>,
    engine: ReconciliationEngine,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a room. Returns `false` (and changes nothing) if the id is taken.
    pub fn create_room(&self, room_id: RoomId, host_user_id: UserId) -> Result<bool, SnapshotError> {
        let mut rooms = self.write()?;
        if rooms.contains_key(&room_id) {
            return Ok(false);
        }

        let mut members = BTreeSet::new();
        members.insert(host_user_id.clone());
        rooms.insert(
            room_id,
            RoomRecord {
                host_user_id,
                store: EntryStore::new(),
                members,
                phase: RoomPhase::Active,
                ordered_at: None,
            },
        );
        Ok(true)
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms
            .read()
            .map(|rooms| rooms.contains_key(room_id))
            .unwrap_or(false)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().map(|rooms| rooms.len()).unwrap_or(0)
    }

    /// Fold one room message into the room's state.
    ///
    /// Returns the merge outcome for cart changes. Invalid change payloads are
    /// rejected as [`SnapshotError::Malformed`] and leave the room untouched.
    pub fn record(
        &self,
        envelope: &RoomEnvelope<RoomMessage>,
    ) -> Result<Option<MergeOutcome>, SnapshotError> {
        let mut rooms = self.write()?;
        let room = rooms
            .get_mut(envelope.room_id())
            .ok_or_else(|| SnapshotError::RoomNotFound(envelope.room_id().clone()))?;

        let outcome = match envelope.payload() {
            RoomMessage::CartChange(event) => {
                let outcome = self
                    .engine
                    .apply(&mut room.store, event)
                    .map_err(|e| SnapshotError::Malformed(e.to_string()))?;
                room.members.insert(envelope.sender().clone());
                Some(outcome)
            }
            RoomMessage::UserJoined { user_id } => {
                room.members.insert(user_id.clone());
                None
            }
            RoomMessage::UserLeft { user_id } => {
                room.members.remove(user_id);
                None
            }
            RoomMessage::OrderPlaced(_) => {
                room.phase = RoomPhase::Ordered;
                room.ordered_at.get_or_insert_with(Instant::now);
                None
            }
        };

        debug!(
            room_id = %envelope.room_id(),
            sender = %envelope.sender(),
            outcome = outcome.map(MergeOutcome::as_str).unwrap_or("n/a"),
            "room message recorded"
        );
        Ok(outcome)
    }

    pub fn snapshot(&self, room_id: &RoomId) -> Result<RoomSnapshot, SnapshotError> {
        let rooms = self.read()?;
        let room = rooms
            .get(room_id)
            .ok_or_else(|| SnapshotError::RoomNotFound(room_id.clone()))?;

        Ok(RoomSnapshot {
            room_id: room_id.clone(),
            entries: room.store.entries().map(|e| e.to_change()).collect(),
            closed: room.phase == RoomPhase::Ordered,
        })
    }

    pub fn status(&self, room_id: &RoomId) -> Result<RoomStatus, SnapshotError> {
        let rooms = self.read()?;
        let room = rooms
            .get(room_id)
            .ok_or_else(|| SnapshotError::RoomNotFound(room_id.clone()))?;

        Ok(RoomStatus {
            room_id: room_id.clone(),
            host_user_id: room.host_user_id.clone(),
            status: room.phase,
            members: room.members.iter().cloned().collect(),
            item_count: room.store.item_count(),
        })
    }

    /// Forget rooms whose order was placed at least `ttl` ago.
    ///
    /// Rooms for which `in_use` returns true are kept regardless of age.
    /// Active rooms are never evicted. Returns the ids that were dropped.
    pub fn evict_ordered<F>(&self, ttl: Duration, in_use: F) -> Result<Vec<RoomId>, SnapshotError>
    where
        F: Fn(&RoomId) -> bool,
    {
        let mut rooms = self.write()?;
        let expired: Vec<RoomId> = rooms
            .iter()
            .filter(|(room_id, room)| {
                room.ordered_at.is_some_and(|at| at.elapsed() >= ttl) && !in_use(room_id)
            })
            .map(|(room_id, _)| room_id.clone())
            .collect();

        for room_id in &expired {
            rooms.remove(room_id);
        }
        if !expired.is_empty() {
            info!(evicted = expired.len(), remaining = rooms.len(), "ordered rooms evicted");
        }
        Ok(expired)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<RoomId, RoomRecord>>, SnapshotError> {
        self.rooms
            .read()
            .map_err(|_| SnapshotError::Unavailable("room registry lock poisoned".into()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<RoomId, RoomRecord>>, SnapshotError> {
        self.rooms
            .write()
            .map_err(|_| SnapshotError::Unavailable("room registry lock poisoned".into()))
    }
}

#[async_trait]
impl SnapshotProvider for InMemorySnapshotStore {
    async fn fetch_snapshot(&self, room_id: &RoomId) -> Result<RoomSnapshot, SnapshotError> {
        self.snapshot(room_id)
    }
}

#[async_trait]
impl RoomRegistry for InMemorySnapshotStore {
    async fn register_room(&self, host_user_id: &UserId) -> Result<RoomId, SnapshotError> {
        for _ in 0..ROOM_ID_ATTEMPTS {
            let room_id = RoomId::generate();
            if self.create_room(room_id.clone(), host_user_id.clone())? {
                return Ok(room_id);
            }
        }
        Err(SnapshotError::Unavailable(format!(
            "no unused room id after {ROOM_ID_ATTEMPTS} attempts"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupcart_cart::RoomSession;
    use groupcart_core::{MenuItemId, Price, SizeId};
    use groupcart_events::OrderPlaced;

    fn user(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[test]
    fn room_ids_are_not_reused() {
        let store = InMemorySnapshotStore::new();
        let room = RoomId::generate();
        assert!(store.create_room(room.clone(), user("a")).unwrap());
        assert!(!store.create_room(room.clone(), user("b")).unwrap());
        assert_eq!(store.status(&room).unwrap().host_user_id, user("a"));
    }

    #[test]
    fn snapshot_includes_tombstones_and_converged_values() {
        let mut host = RoomSession::create(user("a"));
        let store = InMemorySnapshotStore::new();
        store.create_room(host.room_id().clone(), user("a")).unwrap();

        let kept = host
            .add_item(
                MenuItemId::new("1").unwrap(),
                SizeId::new("medium").unwrap(),
                Price::from_cents(1299),
                2,
            )
            .unwrap();
        let gone = host
            .add_item(
                MenuItemId::new("7").unwrap(),
                SizeId::new("regular").unwrap(),
                Price::from_cents(499),
                1,
            )
            .unwrap();
        let removed = host.remove_item(gone.entry_id).unwrap();

        for ev in [removed, kept, gone] {
            store
                .record(&host.seal(RoomMessage::CartChange(ev)))
                .unwrap();
        }

        let snap = store.snapshot(host.room_id()).unwrap();
        assert_eq!(snap.entries.len(), 2);
        assert!(!snap.closed);
        assert_eq!(store.status(host.room_id()).unwrap().item_count, 2);

        let mut late = RoomSession::join(host.room_id().clone(), user("b"));
        late.complete_bootstrap(&snap.entries, snap.closed);
        assert_eq!(late.snapshot(), host.snapshot());
    }

    #[test]
    fn order_placed_marks_room_ordered() {
        let store = InMemorySnapshotStore::new();
        let room = RoomId::generate();
        store.create_room(room.clone(), user("a")).unwrap();

        let env = RoomEnvelope::seal(
            room.clone(),
            user("a"),
            RoomMessage::OrderPlaced(OrderPlaced {
                placed_by: user("a"),
                subtotal: Price::ZERO,
                item_count: 0,
            }),
        );
        store.record(&env).unwrap();

        assert!(store.snapshot(&room).unwrap().closed);
        assert_eq!(store.status(&room).unwrap().status, RoomPhase::Ordered);
    }

    #[test]
    fn unknown_room_and_malformed_change_are_rejected() {
        let store = InMemorySnapshotStore::new();
        let stranger = RoomEnvelope::seal(
            RoomId::generate(),
            user("a"),
            RoomMessage::UserJoined { user_id: user("a") },
        );
        assert!(matches!(
            store.record(&stranger),
            Err(SnapshotError::RoomNotFound(_))
        ));

        let mut host = RoomSession::create(user("a"));
        store.create_room(host.room_id().clone(), user("a")).unwrap();
        let mut bad = host
            .add_item(
                MenuItemId::new("1").unwrap(),
                SizeId::new("small").unwrap(),
                Price::from_cents(1099),
                1,
            )
            .unwrap();
        bad.version = 0;

        let err = store.record(&host.seal(RoomMessage::CartChange(bad))).unwrap_err();
        assert!(matches!(err, SnapshotError::Malformed(_)));
        assert!(store.snapshot(host.room_id()).unwrap().entries.is_empty());
    }

    fn order_placed(room: &RoomId) -> RoomEnvelope<RoomMessage> {
        RoomEnvelope::seal(
            room.clone(),
            user("a"),
            RoomMessage::OrderPlaced(OrderPlaced {
                placed_by: user("a"),
                subtotal: Price::ZERO,
                item_count: 0,
            }),
        )
    }

    #[test]
    fn only_ordered_rooms_past_their_ttl_and_unused_are_evicted() {
        let store = InMemorySnapshotStore::new();
        let active = RoomId::generate();
        let ordered = RoomId::generate();
        let watched = RoomId::generate();
        for room in [&active, &ordered, &watched] {
            store.create_room(room.clone(), user("a")).unwrap();
        }
        store.record(&order_placed(&ordered)).unwrap();
        store.record(&order_placed(&watched)).unwrap();

        let none = store
            .evict_ordered(Duration::from_secs(3600), |_| false)
            .unwrap();
        assert!(none.is_empty());

        let evicted = store
            .evict_ordered(Duration::ZERO, |room| room == &watched)
            .unwrap();
        assert_eq!(evicted, vec![ordered.clone()]);
        assert!(!store.contains(&ordered));
        assert!(store.contains(&active));
        assert!(store.contains(&watched));
        assert!(matches!(
            store.snapshot(&ordered),
            Err(SnapshotError::RoomNotFound(_))
        ));
    }

    #[tokio::test]
    async fn registered_rooms_belong_to_their_host() {
        let store = InMemorySnapshotStore::new();
        let first = store.register_room(&user("a")).await.unwrap();
        let second = store.register_room(&user("b")).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(store.room_count(), 2);
        assert_eq!(store.status(&second).unwrap().host_user_id, user("b"));
        assert!(!store.snapshot(&first).unwrap().closed);
    }
}
