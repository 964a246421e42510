use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use groupcart_core::CartError;
use groupcart_infra::SnapshotError;

use crate::app::services::RelayError;

pub fn relay_error_to_response(err: RelayError) -> axum::response::Response {
    match err {
        RelayError::RoomIdExhausted(_) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "room_id_exhausted",
            err.to_string(),
        ),
        RelayError::RoomMismatch { .. } => {
            json_error(StatusCode::BAD_REQUEST, "room_mismatch", err.to_string())
        }
        RelayError::Snapshot(SnapshotError::RoomNotFound(_)) => {
            json_error(StatusCode::NOT_FOUND, "room_not_found", err.to_string())
        }
        RelayError::Snapshot(SnapshotError::Malformed(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "malformed_event", msg)
        }
        RelayError::Snapshot(SnapshotError::Unavailable(msg)) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg)
        }
        RelayError::Poisoned => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            err.to_string(),
        ),
    }
}

pub fn cart_error_to_response(err: CartError) -> axum::response::Response {
    match err {
        CartError::MalformedEvent(msg) => json_error(StatusCode::BAD_REQUEST, "malformed_event", msg),
        CartError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        other => json_error(StatusCode::BAD_REQUEST, "bad_request", other.to_string()),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
