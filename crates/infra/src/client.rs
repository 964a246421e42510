//! Client wiring: one room session plus its transport, worker and menu.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use groupcart_cart::{
    CartChange, CartEntry, ConnectivityState, MergeReport, OrderSummary, RoomSession, SessionState,
};
use groupcart_core::{EntryId, MenuItemId, Price, RoomId, SizeId, UserId};
use groupcart_events::{ChangeEvent, RoomEnvelope, RoomMessage, RoomTransport};

use crate::bootstrap::{BootstrapPolicy, RoomRegistry, SnapshotProvider, fetch_with_retry};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::menu::MenuCatalog;
use crate::worker::{RoomWorker, WorkerHandle};

pub type RoomFrame = RoomEnvelope<RoomMessage>;

/// A member's connection to one group order.
///
/// The session sits behind a single mutex shared with the inbound worker, so
/// local intents and remote merges are applied one at a time.
pub struct RoomClient<T>
where
    T: RoomTransport<RoomFrame> + 'static,
{
    room_id: RoomId,
    user_id: UserId,
    session: Arc<Mutex<RoomSession>>,
    transport: Arc<T>,
    menu: Arc<dyn MenuCatalog>,
    policy: BootstrapPolicy,
    worker: Option<WorkerHandle>,
}

impl<T> RoomClient<T>
where
    T: RoomTransport<RoomFrame> + 'static,
{
    /// Start a new group order as its host.
    ///
    /// The room is registered first, so the registry can serve snapshots to
    /// joiners from the host's very first change.
    pub async fn host<R>(
        transport: Arc<T>,
        menu: Arc<dyn MenuCatalog>,
        registry: &R,
        user_id: UserId,
        config: &ClientConfig,
    ) -> ClientResult<Self>
    where
        R: RoomRegistry + ?Sized,
    {
        let room_id = registry.register_room(&user_id).await?;
        let session = RoomSession::host(room_id, user_id);
        let client = Self::connect(transport, menu, session, config)?;
        client.announce()?;
        Ok(client)
    }

    /// Join an existing room: subscribe, announce, then bootstrap.
    ///
    /// Messages arriving while the snapshot is in flight are merged as they
    /// come; the snapshot merge afterwards cannot overwrite anything newer.
    pub async fn join<P>(
        transport: Arc<T>,
        menu: Arc<dyn MenuCatalog>,
        provider: &P,
        room_id: RoomId,
        user_id: UserId,
        config: &ClientConfig,
    ) -> ClientResult<Self>
    where
        P: SnapshotProvider + ?Sized,
    {
        let session = RoomSession::join(room_id, user_id);
        let client = Self::connect(transport, menu, session, config)?;
        client.announce()?;
        client.resync(provider).await?;
        Ok(client)
    }

    fn connect(
        transport: Arc<T>,
        menu: Arc<dyn MenuCatalog>,
        session: RoomSession,
        config: &ClientConfig,
    ) -> ClientResult<Self> {
        let room_id = session.room_id().clone();
        let user_id = session.user_id().clone();
        let session = Arc::new(Mutex::new(session));

        let inbound = session.clone();
        let worker = RoomWorker::new(format!("room-{room_id}-{user_id}"))
            .tick(config.worker_tick)
            .subscribe(transport.as_ref(), room_id.clone(), move |frame: RoomFrame| {
                let mut session = inbound.lock().map_err(|_| ClientError::Poisoned)?;
                session.handle_inbound(frame)?;
                Ok::<(), ClientError>(())
            })
            .map_err(|e| ClientError::Transport(format!("failed to start room worker: {e}")))?;

        Ok(Self {
            room_id,
            user_id,
            session,
            transport,
            menu,
            policy: config.bootstrap,
            worker: Some(worker),
        })
    }

    /// Fetch a fresh snapshot and merge it. Used on join and after reconnects.
    pub async fn resync<P>(&self, provider: &P) -> ClientResult<MergeReport>
    where
        P: SnapshotProvider + ?Sized,
    {
        let snapshot = fetch_with_retry(provider, &self.room_id, &self.policy).await?;
        let mut session = self.lock()?;
        Ok(session.complete_bootstrap(&snapshot.entries, snapshot.closed))
    }

    /// Record a transport connectivity change. Returns whether a resync is due.
    pub fn set_connectivity(&self, connectivity: ConnectivityState) -> ClientResult<bool> {
        let mut session = self.lock()?;
        session.set_connectivity(connectivity);
        Ok(session.needs_resync())
    }

    /// Add a menu item. The unit price is looked up now and frozen on the line.
    pub fn add_item(
        &self,
        menu_item_id: MenuItemId,
        size_id: SizeId,
        quantity: i64,
    ) -> ClientResult<EntryId> {
        let unit_price: Price = self.menu.price_of(&menu_item_id, &size_id).ok_or_else(|| {
            ClientError::UnknownMenuItem {
                menu_item_id: menu_item_id.to_string(),
                size_id: size_id.to_string(),
            }
        })?;

        let event = self
            .lock()?
            .add_item(menu_item_id, size_id, unit_price, quantity)?;
        let entry_id = event.entry_id;
        self.broadcast_change(event)?;
        Ok(entry_id)
    }

    pub fn set_quantity(&self, entry_id: EntryId, quantity: i64) -> ClientResult<()> {
        let event = self.lock()?.set_quantity(entry_id, quantity)?;
        self.broadcast_change(event)
    }

    pub fn remove_item(&self, entry_id: EntryId) -> ClientResult<()> {
        let event = self.lock()?.remove_item(entry_id)?;
        self.broadcast_change(event)
    }

    /// Empty the shared cart for everyone. Returns how many lines were removed.
    pub fn clear_cart(&self) -> ClientResult<usize> {
        let events = self.lock()?.clear()?;
        let removed = events.len();
        for event in events {
            self.broadcast_change(event)?;
        }
        Ok(removed)
    }

    pub fn place_order(&self) -> ClientResult<OrderSummary> {
        let summary = self.lock()?.place_order()?;
        self.broadcast(summary.message())?;
        Ok(summary)
    }

    /// Leave the room: stop the inbound worker and say goodbye.
    ///
    /// The goodbye is best-effort; members who miss it keep showing this user
    /// until their next resync.
    pub fn leave(mut self) -> ClientResult<()> {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }

        info!(room_id = %self.room_id, user_id = %self.user_id, "leaving group order");
        let goodbye = RoomMessage::UserLeft {
            user_id: self.user_id.clone(),
        };
        self.broadcast(goodbye)
    }

    pub fn on_change(&self, listener: impl FnMut(&CartChange) + Send + 'static) -> ClientResult<()> {
        self.lock()?.on_change(listener);
        Ok(())
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn state(&self) -> ClientResult<SessionState> {
        Ok(self.lock()?.state())
    }

    pub fn snapshot(&self) -> ClientResult<Vec<CartEntry>> {
        Ok(self.lock()?.snapshot())
    }

    pub fn subtotal(&self) -> ClientResult<Price> {
        Ok(self.lock()?.subtotal())
    }

    pub fn item_count(&self) -> ClientResult<u64> {
        Ok(self.lock()?.item_count())
    }

    pub fn members(&self) -> ClientResult<Vec<UserId>> {
        Ok(self.lock()?.members().iter().cloned().collect())
    }

    fn announce(&self) -> ClientResult<()> {
        let joined = self.lock()?.joined_message();
        self.broadcast(joined)
    }

    fn broadcast_change(&self, event: ChangeEvent) -> ClientResult<()> {
        self.broadcast(RoomMessage::CartChange(event))
    }

    /// Hand a message to the transport. A failed send marks the client
    /// offline instead of failing the local action; the next resync repairs
    /// what the other members missed.
    fn broadcast(&self, message: RoomMessage) -> ClientResult<()> {
        let frame = RoomEnvelope::seal(self.room_id.clone(), self.user_id.clone(), message);

        if let Err(err) = self.transport.send(&self.room_id, frame) {
            warn!(room_id = %self.room_id, error = ?err, "room send failed; marking offline");
            self.lock()?.set_connectivity(ConnectivityState::Offline);
        }
        Ok(())
    }

    fn lock(&self) -> ClientResult<MutexGuard<'_, RoomSession>> {
        self.session.lock().map_err(|_| ClientError::Poisoned)
    }
}

impl<T> Drop for RoomClient<T>
where
    T: RoomTransport<RoomFrame> + 'static,
{
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            info!("room client dropped; stopping inbound worker");
            worker.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use groupcart_events::InMemoryRelay;

    use crate::menu::StaticMenu;
    use crate::snapshot_store::InMemorySnapshotStore;

    type Relay = InMemoryRelay<RoomFrame>;

    /// A relay plus a "server" that folds every frame of the watched rooms
    /// into a snapshot store, the way the relay service does.
    struct Harness {
        relay: Arc<Relay>,
        store: Arc<InMemorySnapshotStore>,
        menu: Arc<dyn MenuCatalog>,
        servers: Vec<WorkerHandle>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                relay: Arc::new(Relay::new()),
                store: Arc::new(InMemorySnapshotStore::new()),
                menu: Arc::new(StaticMenu::house()),
                servers: Vec::new(),
            }
        }

        fn watch(&mut self, room_id: &RoomId) {
            let sink = self.store.clone();
            let server = RoomWorker::new("test-server")
                .tick(Duration::from_millis(5))
                .subscribe(self.relay.as_ref(), room_id.clone(), move |frame: RoomFrame| {
                    sink.record(&frame).map(|_| ())
                })
                .unwrap();
            self.servers.push(server);
        }

        /// Host a room, then start recording it.
        async fn host(&mut self, host: &str) -> RoomClient<Relay> {
            let client = RoomClient::host(
                self.relay.clone(),
                self.menu.clone(),
                self.store.as_ref(),
                user(host),
                &config(),
            )
            .await
            .unwrap();
            self.watch(client.room_id());
            client
        }

        async fn join(&self, room_id: &RoomId, who: &str) -> ClientResult<RoomClient<Relay>> {
            RoomClient::join(
                self.relay.clone(),
                self.menu.clone(),
                self.store.as_ref(),
                room_id.clone(),
                user(who),
                &config(),
            )
            .await
        }
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            for server in self.servers.drain(..) {
                server.shutdown();
            }
        }
    }

    fn user(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn config() -> ClientConfig {
        ClientConfig {
            bootstrap: BootstrapPolicy {
                timeout: Duration::from_millis(200),
                attempts: 2,
                backoff: Duration::from_millis(5),
            },
            worker_tick: Duration::from_millis(5),
            ..ClientConfig::default()
        }
    }

    fn item(id: &str) -> MenuItemId {
        MenuItemId::new(id).unwrap()
    }

    fn size(id: &str) -> SizeId {
        SizeId::new(id).unwrap()
    }

    async fn eventually(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn hosting_registers_the_room() {
        let mut h = Harness::new();
        let alice = h.host("alice").await;

        assert_eq!(alice.state().unwrap(), SessionState::Active);
        let status = h.store.status(alice.room_id()).unwrap();
        assert_eq!(status.host_user_id, user("alice"));
    }

    #[tokio::test]
    async fn members_converge_through_the_relay() {
        let mut h = Harness::new();
        let alice = h.host("alice").await;
        let bob = h.join(alice.room_id(), "bob").await.unwrap();
        assert_eq!(bob.state().unwrap(), SessionState::Active);

        let pizza = alice.add_item(item("1"), size("large"), 2).unwrap();
        let salad = bob.add_item(item("6"), size("regular"), 1).unwrap();

        eventually(|| bob.snapshot().unwrap().len() == 2 && alice.snapshot().unwrap().len() == 2).await;
        assert_eq!(alice.snapshot().unwrap(), bob.snapshot().unwrap());
        assert_eq!(alice.subtotal().unwrap(), Price::from_cents(2 * 1599 + 899));

        bob.set_quantity(pizza, 3).unwrap();
        alice.remove_item(salad).unwrap();
        eventually(|| alice.item_count().unwrap() == 3 && bob.item_count().unwrap() == 3).await;
        assert_eq!(alice.snapshot().unwrap(), bob.snapshot().unwrap());
    }

    #[tokio::test]
    async fn late_joiner_bootstraps_existing_cart() {
        let mut h = Harness::new();
        let alice = h.host("alice").await;
        let entry = alice.add_item(item("2"), size("small"), 1).unwrap();
        alice.set_quantity(entry, 4).unwrap();
        eventually(|| h.store.status(alice.room_id()).map(|s| s.item_count == 4).unwrap_or(false)).await;

        let carol = h.join(alice.room_id(), "carol").await.unwrap();

        assert_eq!(carol.snapshot().unwrap(), alice.snapshot().unwrap());
        eventually(|| alice.members().unwrap().contains(&user("carol"))).await;
    }

    #[tokio::test]
    async fn clearing_the_cart_empties_it_for_every_member() {
        let mut h = Harness::new();
        let alice = h.host("alice").await;
        let bob = h.join(alice.room_id(), "bob").await.unwrap();

        alice.add_item(item("1"), size("small"), 1).unwrap();
        bob.add_item(item("7"), size("regular"), 2).unwrap();
        eventually(|| alice.item_count().unwrap() == 3 && bob.item_count().unwrap() == 3).await;

        assert_eq!(bob.clear_cart().unwrap(), 2);
        eventually(|| alice.snapshot().unwrap().is_empty()).await;
        eventually(|| h.store.status(alice.room_id()).map(|s| s.item_count == 0).unwrap_or(false)).await;
        assert_eq!(alice.subtotal().unwrap(), Price::ZERO);
    }

    #[tokio::test]
    async fn order_placed_by_host_closes_every_member() {
        let mut h = Harness::new();
        let alice = h.host("alice").await;
        let bob = h.join(alice.room_id(), "bob").await.unwrap();

        alice.add_item(item("8"), size("regular"), 2).unwrap();
        let summary = alice.place_order().unwrap();
        assert_eq!(summary.subtotal, Price::from_cents(1398));

        eventually(|| bob.state().unwrap() == SessionState::Closed).await;
        assert!(matches!(
            bob.add_item(item("7"), size("regular"), 1),
            Err(ClientError::Cart(groupcart_core::CartError::SessionClosed))
        ));
        eventually(|| h.store.snapshot(alice.room_id()).unwrap().closed).await;
    }

    #[tokio::test]
    async fn unknown_menu_item_is_rejected_before_touching_the_cart() {
        let mut h = Harness::new();
        let alice = h.host("alice").await;
        let err = alice.add_item(item("1"), size("regular"), 1).unwrap_err();
        assert!(matches!(err, ClientError::UnknownMenuItem { .. }));
        assert!(alice.snapshot().unwrap().is_empty());
    }

    #[tokio::test]
    async fn joining_an_unknown_room_fails() {
        let h = Harness::new();
        let result = h.join(&RoomId::generate(), "bob").await;
        assert!(matches!(result, Err(ClientError::Snapshot(_))));
    }

    #[tokio::test]
    async fn reconnect_triggers_resync() {
        let mut h = Harness::new();
        let alice = h.host("alice").await;
        assert!(!alice.set_connectivity(ConnectivityState::Offline).unwrap());
        assert!(alice.set_connectivity(ConnectivityState::Online).unwrap());
        assert_eq!(alice.state().unwrap(), SessionState::Joining);

        alice.resync(h.store.as_ref()).await.unwrap();
        assert_eq!(alice.state().unwrap(), SessionState::Active);
    }

    #[tokio::test]
    async fn leaving_removes_the_member_everywhere() {
        let mut h = Harness::new();
        let alice = h.host("alice").await;
        let bob = h.join(alice.room_id(), "bob").await.unwrap();
        eventually(|| alice.members().unwrap().contains(&user("bob"))).await;

        bob.leave().unwrap();
        eventually(|| !alice.members().unwrap().contains(&user("bob"))).await;
        eventually(|| {
            h.store
                .status(alice.room_id())
                .map(|s| !s.members.contains(&user("bob")))
                .unwrap_or(false)
        })
        .await;
    }
}
