use std::sync::Arc;

use axum::{routing::get, Router};

use auth_cell::router::auth_routes;
use booking_cell::router::booking_routes;
use insurance_cell::router::insurance_routes;
use payment_cell::router::card_routes;
use provider_cell::router::provider_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    let api = Router::new()
        .nest("/auth", auth_routes(state.clone()))
        .nest("/providers", provider_routes(state.clone()))
        .nest("/bookings", booking_routes(state.clone()))
        .nest("/insurance", insurance_routes(state.clone()))
        .nest("/cards", card_routes(state));

    Router::new()
        .route("/", get(|| async { "Telehealth API is running!" }))
        .nest("/api/v1", api)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use shared_utils::jwt::issue_action_token;
    use shared_utils::test_utils::{TestConfig, TEST_JWT_SECRET};
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(TestConfig::default().to_arc())
    }

    #[tokio::test]
    async fn health_route_responds() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cells_are_mounted_under_api_v1() {
        let response = app()
            .oneshot(Request::builder().uri("/api/v1/cards").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn email_link_token_is_not_a_session() {
        let token = issue_action_token("provider-1", "accept", "booking-9", TEST_JWT_SECRET, 48).unwrap();
        let request = Request::builder()
            .uri("/api/v1/auth/me")
            .header("Authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
