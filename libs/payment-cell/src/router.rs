use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn card_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_cards).post(handlers::save_card))
        .route("/{card_id}", delete(handlers::delete_card))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
