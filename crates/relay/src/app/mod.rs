//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: room registry and per-room broadcast channels
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use crate::config::RelayConfig;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Also starts the ordered-room sweeper, so it must run inside a tokio runtime.
pub fn build_app(config: &RelayConfig) -> Router {
    let services = Arc::new(services::RelayServices::new(config.room_capacity));
    services::spawn_room_sweeper(services.clone(), config.ordered_room_ttl);
    build_app_with(services)
}

/// Build the router around existing services.
pub fn build_app_with(services: Arc<services::RelayServices>) -> Router {
    routes::router()
        .layer(Extension(services))
        .layer(ServiceBuilder::new())
}
