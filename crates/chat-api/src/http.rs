use axum::Router;
use axum::routing::{any, post};
use shared::chat::ChatService;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod chat;
mod errors;
mod health;

#[derive(Clone)]
pub struct AppState {
    pub chat: ChatService,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RouterOptions {
    pub cors_enabled: bool,
}

pub fn build_router(app_state: AppState, options: RouterOptions) -> Router {
    let router = Router::new()
        .route("/health", any(health::health))
        .route("/chat", post(chat::chat).fallback(chat::method_not_allowed))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http());

    if options.cors_enabled {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
