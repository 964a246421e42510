//! Late-join bootstrap: fetch the full cart of a room, with timeout and retry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use groupcart_core::{CartError, RoomId, UserId};
use groupcart_events::ChangeEvent;

use crate::error::{ClientError, ClientResult};

/// Full state of one room: every entry (tombstones included) as the change
/// event describing its current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub entries: Vec<ChangeEvent>,
    /// The order was already placed.
    pub closed: bool,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// Temporary failure; the request may be retried.
    #[error("snapshot provider unavailable: {0}")]
    Unavailable(String),

    #[error("malformed snapshot data: {0}")]
    Malformed(String),
}

impl SnapshotError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SnapshotError::Unavailable(_))
    }
}

/// Serves full cart snapshots to joining clients.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn fetch_snapshot(&self, room_id: &RoomId) -> Result<RoomSnapshot, SnapshotError>;
}

#[async_trait]
impl<P> SnapshotProvider for Arc<P>
where
    P: SnapshotProvider + ?Sized,
{
    async fn fetch_snapshot(&self, room_id: &RoomId) -> Result<RoomSnapshot, SnapshotError> {
        (**self).fetch_snapshot(room_id).await
    }
}

/// Hands out room ids to hosts.
///
/// The registry that assigns the id is the one that later serves the room's
/// snapshot, so a host must register before anyone can join.
#[async_trait]
pub trait RoomRegistry: Send + Sync {
    async fn register_room(&self, host_user_id: &UserId) -> Result<RoomId, SnapshotError>;
}

#[async_trait]
impl<R> RoomRegistry for Arc<R>
where
    R: RoomRegistry + ?Sized,
{
    async fn register_room(&self, host_user_id: &UserId) -> Result<RoomId, SnapshotError> {
        (**self).register_room(host_user_id).await
    }
}

/// Timeout and retry schedule for one bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapPolicy {
    /// Deadline for a single fetch.
    pub timeout: Duration,
    /// Total number of fetches before giving up.
    pub attempts: u32,
    /// Delay before the first retry; doubles on every further retry.
    pub backoff: Duration,
}

impl Default for BootstrapPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2000),
            attempts: 4,
            backoff: Duration::from_millis(250),
        }
    }
}

impl BootstrapPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor)
    }
}

/// Fetch the snapshot of `room_id`, retrying timeouts and temporary failures.
///
/// Gives up with [`CartError::BootstrapTimeout`] once `policy.attempts` fetches
/// have failed. Permanent errors (unknown room, malformed data) are returned
/// immediately.
pub async fn fetch_with_retry<P>(
    provider: &P,
    room_id: &RoomId,
    policy: &BootstrapPolicy,
) -> ClientResult<RoomSnapshot>
where
    P: SnapshotProvider + ?Sized,
{
    let attempts = policy.attempts.max(1);

    for attempt in 1..=attempts {
        match tokio::time::timeout(policy.timeout, provider.fetch_snapshot(room_id)).await {
            Ok(Ok(snapshot)) => {
                if &snapshot.room_id != room_id {
                    return Err(SnapshotError::Malformed(format!(
                        "asked for room {room_id}, got {}",
                        snapshot.room_id
                    ))
                    .into());
                }
                info!(
                    room_id = %room_id,
                    attempt,
                    entries = snapshot.entries.len(),
                    "cart snapshot fetched"
                );
                return Ok(snapshot);
            }
            Ok(Err(err)) if !err.is_retryable() => return Err(ClientError::Snapshot(err)),
            Ok(Err(err)) => {
                warn!(room_id = %room_id, attempt, error = %err, "cart snapshot fetch failed");
            }
            Err(_) => {
                warn!(
                    room_id = %room_id,
                    attempt,
                    timeout_ms = policy.timeout.as_millis() as u64,
                    "cart snapshot fetch timed out"
                );
            }
        }

        if attempt < attempts {
            tokio::time::sleep(policy.backoff_for(attempt)).await;
        }
    }

    Err(CartError::BootstrapTimeout { attempts }.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails (by hanging or erroring) for the first `failures` calls.
    struct Flaky {
        failures: u32,
        hang: bool,
        calls: AtomicU32,
    }

    #[async_trait]
    impl SnapshotProvider for Flaky {
        async fn fetch_snapshot(&self, room_id: &RoomId) -> Result<RoomSnapshot, SnapshotError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                if self.hang {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                return Err(SnapshotError::Unavailable("relay restarting".into()));
            }
            Ok(RoomSnapshot {
                room_id: room_id.clone(),
                entries: Vec::new(),
                closed: false,
            })
        }
    }

    fn policy(attempts: u32) -> BootstrapPolicy {
        BootstrapPolicy {
            timeout: Duration::from_millis(20),
            attempts,
            backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn backoff_doubles() {
        let p = BootstrapPolicy {
            backoff: Duration::from_millis(100),
            ..BootstrapPolicy::default()
        };
        assert_eq!(p.backoff_for(1), Duration::from_millis(100));
        assert_eq!(p.backoff_for(2), Duration::from_millis(200));
        assert_eq!(p.backoff_for(4), Duration::from_millis(800));
    }

    #[tokio::test]
    async fn retries_until_the_provider_answers() {
        let provider = Flaky {
            failures: 2,
            hang: false,
            calls: AtomicU32::new(0),
        };
        let room = RoomId::generate();

        let snapshot = fetch_with_retry(&provider, &room, &policy(3)).await.unwrap();
        assert_eq!(snapshot.room_id, room);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_with_bootstrap_timeout() {
        let provider = Flaky {
            failures: u32::MAX,
            hang: true,
            calls: AtomicU32::new(0),
        };

        let err = fetch_with_retry(&provider, &RoomId::generate(), &policy(2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Cart(CartError::BootstrapTimeout { attempts: 2 })
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_room_is_not_retried() {
        struct Missing;

        #[async_trait]
        impl SnapshotProvider for Missing {
            async fn fetch_snapshot(&self, room_id: &RoomId) -> Result<RoomSnapshot, SnapshotError> {
                Err(SnapshotError::RoomNotFound(room_id.clone()))
            }
        }

        let err = fetch_with_retry(&Missing, &RoomId::generate(), &policy(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Snapshot(SnapshotError::RoomNotFound(_))));
    }
}
