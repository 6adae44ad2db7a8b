use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn booking_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/general-details", get(handlers::general_booking_details))
        .route("/accept", get(handlers::accept_from_link))
        .route("/reject", get(handlers::reject_from_link));

    let protected_routes = Router::new()
        .route("/request", post(handlers::booking_request))
        .route("/finalize", put(handlers::finalize_booking))
        .route("/accept", post(handlers::accept_booking))
        .route("/reject", post(handlers::reject_booking))
        .route("/cancel", post(handlers::cancel_booking))
        .route("/complete", post(handlers::complete_booking))
        .route("/reschedule/available-times", post(handlers::reschedule_available_times))
        .route("/reschedule", post(handlers::reschedule_booking))
        .route("/patient", get(handlers::patient_bookings))
        .route("/provider", get(handlers::provider_bookings))
        .route("/earnings", get(handlers::total_earnings))
        .route("/earnings/monthly", get(handlers::monthly_earnings))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
