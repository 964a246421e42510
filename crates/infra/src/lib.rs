//! Infrastructure layer: transports, bootstrap, config, client wiring.

pub mod bootstrap;
pub mod client;
pub mod config;
pub mod error;
pub mod menu;
pub mod snapshot_store;
pub mod worker;

#[cfg(feature = "redis")]
pub mod redis_relay;

#[cfg(feature = "http")]
pub mod http_relay;

pub use bootstrap::{
    BootstrapPolicy, RoomRegistry, RoomSnapshot, SnapshotError, SnapshotProvider, fetch_with_retry,
};
pub use client::{RoomClient, RoomFrame};
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, ClientResult};
pub use menu::{MenuCatalog, MenuItem, MenuSize, StaticMenu};
pub use snapshot_store::{InMemorySnapshotStore, ROOM_ID_ATTEMPTS, RoomPhase, RoomStatus};
pub use worker::{RoomWorker, WorkerHandle};

#[cfg(feature = "http")]
pub use http_relay::{HttpRelay, HttpRelayError};
