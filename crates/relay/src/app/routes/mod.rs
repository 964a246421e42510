use axum::{Router, routing::get};

pub mod rooms;
pub mod system;

/// Router for all room endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/rooms", rooms::router())
}
