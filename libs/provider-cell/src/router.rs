use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn provider_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::list_providers))
        .route("/onboard", post(handlers::onboard_provider));

    let protected_routes = Router::new()
        .route("/details", get(handlers::get_provider_details))
        .route("/me", put(handlers::update_provider))
        .route(
            "/availability",
            get(handlers::get_availability).post(handlers::set_availability),
        )
        .route("/account-details", post(handlers::save_account_details))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
