//! Room endpoints: create, status, bootstrap snapshot, publish, stream.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use groupcart_core::{RoomId, UserId};
use groupcart_infra::RoomFrame;

use crate::app::dto::{CreateRoomRequest, CreateRoomResponse, PublishResponse};
use crate::app::errors::{cart_error_to_response, relay_error_to_response};
use crate::app::services::{self, RelayServices};

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_room))
        .route("/:room_id", get(get_room))
        .route("/:room_id/snapshot", get(get_snapshot))
        .route("/:room_id/messages", post(post_message))
        .route("/:room_id/stream", get(stream_room))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

fn parse_room_id(raw: String) -> Result<RoomId, axum::response::Response> {
    RoomId::new(raw).map_err(cart_error_to_response)
}

/// POST /rooms
pub async fn create_room(
    Extension(services): Extension<Arc<RelayServices>>,
    Json(req): Json<CreateRoomRequest>,
) -> axum::response::Response {
    let host = match UserId::new(req.host_user_id) {
        Ok(u) => u,
        Err(e) => return cart_error_to_response(e),
    };

    match services.create_room(host) {
        Ok(room_id) => (StatusCode::CREATED, Json(CreateRoomResponse { room_id })).into_response(),
        Err(e) => relay_error_to_response(e),
    }
}

/// GET /rooms/:room_id
pub async fn get_room(
    Extension(services): Extension<Arc<RelayServices>>,
    Path(room_id): Path<String>,
) -> axum::response::Response {
    let room_id = match parse_room_id(room_id) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.status(&room_id) {
        Ok(status) => Json(status).into_response(),
        Err(e) => relay_error_to_response(e),
    }
}

/// GET /rooms/:room_id/snapshot
///
/// Full cart (tombstones included) for bootstrapping late joiners.
pub async fn get_snapshot(
    Extension(services): Extension<Arc<RelayServices>>,
    Path(room_id): Path<String>,
) -> axum::response::Response {
    let room_id = match parse_room_id(room_id) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.snapshot(&room_id) {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => relay_error_to_response(e),
    }
}

/// POST /rooms/:room_id/messages
///
/// The body is decoded by hand so that wire-level validation failures map to
/// `400 malformed_event` rather than the extractor's generic rejection.
pub async fn post_message(
    Extension(services): Extension<Arc<RelayServices>>,
    Path(room_id): Path<String>,
    body: String,
) -> axum::response::Response {
    let room_id = match parse_room_id(room_id) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let frame = match RoomFrame::from_json(&body) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(room_id = %room_id, error = %e, "rejecting malformed frame");
            return cart_error_to_response(e);
        }
    };

    match services.publish(&room_id, frame) {
        Ok(outcome) => (
            StatusCode::ACCEPTED,
            Json(PublishResponse {
                outcome: outcome.map(|o| o.as_str().to_string()),
            }),
        )
            .into_response(),
        Err(e) => relay_error_to_response(e),
    }
}

/// GET /rooms/:room_id/stream
///
/// Server-Sent Events, one `message` event per posted frame.
pub async fn stream_room(
    Extension(services): Extension<Arc<RelayServices>>,
    Path(room_id): Path<String>,
) -> axum::response::Response {
    let room_id = match parse_room_id(room_id) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.subscribe(&room_id) {
        Ok(rx) => services::room_sse_stream(rx).into_response(),
        Err(e) => relay_error_to_response(e),
    }
}
