use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{auth_middleware::auth_middleware, handlers, metrics_handler, state::AppState};

pub fn observability_routes() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics_handler::metrics_endpoint))
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health_check))
}

/// Memo CRUD. Writes sit behind bearer auth; reads are public.
pub fn memo_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/memos", post(handlers::create_memo))
        .route(
            "/api/memos/:id",
            put(handlers::update_memo).delete(handlers::delete_memo),
        )
        // route_layer only wraps the routes registered above this line
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
        .route("/api/memos", get(handlers::list_memos))
        .route("/api/memos/search", get(handlers::search_memos))
        .route("/api/memos/:id", get(handlers::get_memo))
}
