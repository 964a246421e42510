//! Redis pub/sub room transport (optional).
//!
//! One channel per room. Pub/sub is not durable: a member that is offline
//! misses messages and recovers them through the snapshot bootstrap.

use std::sync::mpsc;
use std::thread;

use redis::Commands;
use thiserror::Error;
use tracing::{debug, warn};

use groupcart_core::RoomId;
use groupcart_events::{RoomEnvelope, RoomMessage, RoomTransport, Subscription};

#[derive(Debug, Error)]
pub enum RedisRelayError {
    #[error("redis error: {0}")]
    Redis(String),
    #[error("serialize error: {0}")]
    Serialize(String),
}

/// Redis pub/sub relay for room envelopes.
#[derive(Debug, Clone)]
pub struct RedisRelay {
    client: redis::Client,
    prefix: String,
}

impl RedisRelay {
    pub fn new(redis_url: impl AsRef<str>, prefix: impl Into<String>) -> Result<Self, RedisRelayError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| RedisRelayError::Redis(e.to_string()))?;
        Ok(Self {
            client,
            prefix: prefix.into(),
        })
    }

    pub fn channel(&self, room_id: &RoomId) -> String {
        format!("{}:room:{}", self.prefix, room_id)
    }
}

impl RoomTransport<RoomEnvelope<RoomMessage>> for RedisRelay {
    type Error = RedisRelayError;

    fn send(&self, room_id: &RoomId, message: RoomEnvelope<RoomMessage>) -> Result<(), Self::Error> {
        let payload = message
            .to_json()
            .map_err(|e| RedisRelayError::Serialize(e.to_string()))?;

        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| RedisRelayError::Redis(e.to_string()))?;

        let _: i64 = conn
            .publish(self.channel(room_id), payload)
            .map_err(|e| RedisRelayError::Redis(e.to_string()))?;

        Ok(())
    }

    fn subscribe(&self, room_id: &RoomId) -> Subscription<RoomEnvelope<RoomMessage>> {
        let (tx, rx) = mpsc::channel();

        let client = self.client.clone();
        let channel = self.channel(room_id);

        // Background thread that receives pub/sub messages and forwards them.
        thread::spawn(move || {
            let mut conn = match client.get_connection() {
                Ok(c) => c,
                Err(err) => {
                    warn!(channel = %channel, error = %err, "redis subscribe connection failed");
                    return;
                }
            };

            let mut pubsub = conn.as_pubsub();
            if let Err(err) = pubsub.subscribe(&channel) {
                warn!(channel = %channel, error = %err, "redis subscribe failed");
                return;
            }

            loop {
                let msg = match pubsub.get_message() {
                    Ok(m) => m,
                    Err(_) => return,
                };

                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(_) => continue,
                };

                let envelope = match RoomEnvelope::<RoomMessage>::from_json(&payload) {
                    Ok(e) => e,
                    Err(err) => {
                        debug!(channel = %channel, error = %err, "dropping undecodable frame");
                        continue;
                    }
                };

                if tx.send(envelope).is_err() {
                    return;
                }
            }
        });

        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_per_room() {
        let relay = RedisRelay::new("redis://127.0.0.1:6379", "groupcart").unwrap();
        let a = RoomId::generate();
        let b = RoomId::generate();
        assert_eq!(relay.channel(&a), format!("groupcart:room:{a}"));
        assert_ne!(relay.channel(&a), relay.channel(&b));
    }
}
