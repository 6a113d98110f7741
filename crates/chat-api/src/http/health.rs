use axum::http::StatusCode;
use axum::response::IntoResponse;

pub(super) async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
