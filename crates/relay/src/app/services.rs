//! Relay state: the room registry and one broadcast channel per room.

use std::{
    collections::HashMap,
    convert::Infallible,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};
use tracing::{debug, info, warn};

use groupcart_cart::MergeOutcome;
use groupcart_core::{RoomId, UserId};
use groupcart_infra::{
    InMemorySnapshotStore, ROOM_ID_ATTEMPTS, RoomFrame, RoomSnapshot, RoomStatus, SnapshotError,
};

type RoomIdGenerator = Arc<dyn Fn() -> RoomId + Send + Sync>;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no unused room id after {0} attempts")]
    RoomIdExhausted(usize),

    #[error("message addressed to room {envelope}, posted to {path}")]
    RoomMismatch { path: RoomId, envelope: RoomId },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("relay state lock poisoned")]
    Poisoned,
}

pub struct RelayServices {
    rooms: InMemorySnapshotStore,
    channels: Mutex<HashMap<RoomId, broadcast::Sender<RoomFrame>>>,
    room_capacity: usize,
    room_ids: RoomIdGenerator,
}

impl core::fmt::Debug for RelayServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RelayServices")
            .field("rooms", &self.rooms.room_count())
            .field("room_capacity", &self.room_capacity)
            .finish_non_exhaustive()
    }
}

impl RelayServices {
    pub fn new(room_capacity: usize) -> Self {
        Self::with_room_ids(room_capacity, Arc::new(RoomId::generate))
    }

    /// Same as [`RelayServices::new`] with a custom room id source.
    pub fn with_room_ids(room_capacity: usize, room_ids: RoomIdGenerator) -> Self {
        Self {
            rooms: InMemorySnapshotStore::new(),
            channels: Mutex::new(HashMap::new()),
            room_capacity: room_capacity.max(1),
            room_ids,
        }
    }

    /// Register a new room hosted by `host_user_id`, retrying on id collision.
    pub fn create_room(&self, host_user_id: UserId) -> Result<RoomId, RelayError> {
        for attempt in 1..=ROOM_ID_ATTEMPTS {
            let room_id = (self.room_ids)();
            if self.rooms.create_room(room_id.clone(), host_user_id.clone())? {
                info!(room_id = %room_id, host = %host_user_id, "room created");
                return Ok(room_id);
            }
            warn!(room_id = %room_id, attempt, "room id collision; retrying");
        }
        Err(RelayError::RoomIdExhausted(ROOM_ID_ATTEMPTS))
    }

    pub fn status(&self, room_id: &RoomId) -> Result<RoomStatus, RelayError> {
        Ok(self.rooms.status(room_id)?)
    }

    pub fn snapshot(&self, room_id: &RoomId) -> Result<RoomSnapshot, RelayError> {
        Ok(self.rooms.snapshot(room_id)?)
    }

    /// Validate, record and fan out one frame posted to `room_id`.
    ///
    /// Recording happens before fan-out, so a snapshot served after this
    /// returns already reflects the frame.
    pub fn publish(&self, room_id: &RoomId, frame: RoomFrame) -> Result<Option<MergeOutcome>, RelayError> {
        if frame.room_id() != room_id {
            return Err(RelayError::RoomMismatch {
                path: room_id.clone(),
                envelope: frame.room_id().clone(),
            });
        }

        let outcome = self.rooms.record(&frame)?;
        let receivers = self.sender(room_id)?.send(frame).unwrap_or(0);
        debug!(room_id = %room_id, receivers, "frame fanned out");
        Ok(outcome)
    }

    pub fn subscribe(&self, room_id: &RoomId) -> Result<broadcast::Receiver<RoomFrame>, RelayError> {
        if !self.rooms.contains(room_id) {
            return Err(SnapshotError::RoomNotFound(room_id.clone()).into());
        }
        Ok(self.sender(room_id)?.subscribe())
    }

    /// Forget ordered rooms older than `ttl` that nobody is streaming.
    ///
    /// Their broadcast channels go with them. Returns how many were evicted.
    pub fn evict_ordered_rooms(&self, ttl: Duration) -> Result<usize, RelayError> {
        let mut channels = self.channels.lock().map_err(|_| RelayError::Poisoned)?;
        let evicted = self.rooms.evict_ordered(ttl, |room_id| {
            channels
                .get(room_id)
                .is_some_and(|tx| tx.receiver_count() > 0)
        })?;

        for room_id in &evicted {
            channels.remove(room_id);
        }
        Ok(evicted.len())
    }

    fn sender(&self, room_id: &RoomId) -> Result<broadcast::Sender<RoomFrame>, RelayError> {
        let mut channels = self.channels.lock().map_err(|_| RelayError::Poisoned)?;
        let tx = channels
            .entry(room_id.clone())
            .or_insert_with(|| broadcast::channel(self.room_capacity).0);
        Ok(tx.clone())
    }
}

/// Periodically evict ordered rooms, checking every `ttl`.
///
/// Must be called from inside a tokio runtime.
pub fn spawn_room_sweeper(services: Arc<RelayServices>, ttl: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ttl);
        loop {
            ticker.tick().await;
            match services.evict_ordered_rooms(ttl) {
                Ok(0) => {}
                Ok(evicted) => debug!(evicted, "room sweep finished"),
                Err(err) => warn!(error = %err, "room sweep failed"),
            }
        }
    })
}

/// SSE stream of every frame posted to one room.
///
/// Lossy: a subscriber that lags behind the room buffer skips the missed
/// frames and is expected to resync from the snapshot endpoint.
pub fn room_sse_stream(
    rx: broadcast::Receiver<RoomFrame>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(frame) => match frame.to_json() {
            Ok(data) => Some(Ok(SseEvent::default().event("message").data(data))),
            Err(err) => {
                warn!(error = %err, "failed to encode frame for SSE");
                None
            }
        },
        Err(lagged) => {
            warn!(error = %lagged, "SSE subscriber lagged; frames skipped");
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
