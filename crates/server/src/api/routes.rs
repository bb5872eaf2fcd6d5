use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::{metrics_middleware, signature_middleware};
use super::{handlers, slack};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Platform callbacks; commands must carry a valid signature
    let slack_routes = Router::new()
        .route(
            "/commands",
            post(slack::slash_command).layer(middleware::from_fn_with_state(
                state.clone(),
                signature_middleware,
            )),
        )
        .route("/oauth", get(slack::oauth_redirect));

    // API routes
    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config));

    Router::new()
        .nest("/slack", slack_routes)
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
