use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::chat::ChatError;
use shared::models::ChatRequest;
use tracing::{error, warn};

use super::AppState;
use super::errors::{bad_request_response, gateway_error_response, method_not_allowed_response};

pub(super) async fn chat(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match serde_json::from_slice::<ChatRequest>(&body) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "rejected malformed chat payload");
            return bad_request_response(
                "invalid_request_payload",
                &format!("bad request: {err}"),
            );
        }
    };

    match state.chat.handle_turn(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(ChatError::EmptyMessage) => {
            bad_request_response("empty_message", "message must not be empty")
        }
        Err(ChatError::Gateway(err)) => {
            error!(error = %err, "model invocation failed");
            gateway_error_response()
        }
    }
}

pub(super) async fn method_not_allowed() -> Response {
    method_not_allowed_response("POST")
}
