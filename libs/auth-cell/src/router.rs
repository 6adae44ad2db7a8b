use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn auth_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/validate", post(handlers::validate_token))
        .route("/verify", post(handlers::verify_token))
        .route("/patients/register", post(handlers::register_patient))
        .route("/patients/login", post(handlers::patient_login))
        .route("/providers/login", post(handlers::provider_login))
        .route("/password/forgot", post(handlers::forgot_password))
        .route("/password/reset", post(handlers::reset_password));

    let protected_routes = Router::new()
        .route("/me", get(handlers::get_me).put(handlers::update_me))
        .route("/password/change", post(handlers::change_password))
        .route("/email/send-otp", post(handlers::send_email_code))
        .route("/email/confirm", post(handlers::confirm_email))
        .route("/phone/send-otp", post(handlers::send_phone_code))
        .route("/phone/confirm", post(handlers::confirm_phone))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
