use std::sync::Arc;

use axum::{
    extract::{Extension, Json, Query, State},
    http::StatusCode,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::pagination::PageQuery;
use shared_utils::extractor::require_health_provider;

use crate::models::{
    EditProviderRequest, OnboardProviderRequest, ProviderDetailsQuery, SaveAccountDetailsRequest,
    SetAvailabilityRequest,
};
use crate::services::ProviderService;

#[axum::debug_handler]
pub async fn onboard_provider(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<OnboardProviderRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = ProviderService::new(&config)?;
    let provider = service.onboard(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "provider": provider,
            "message": "Health provider onboarded"
        })),
    ))
}

#[axum::debug_handler]
pub async fn list_providers(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ProviderService::new(&config)?;
    let page = service.list_providers(&query).await?;

    Ok(Json(json!(page)))
}

#[axum::debug_handler]
pub async fn get_provider_details(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<ProviderDetailsQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ProviderService::new(&config)?;
    let provider = service.get_details(&query.email).await?;

    Ok(Json(json!(provider)))
}

#[axum::debug_handler]
pub async fn update_provider(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<EditProviderRequest>,
) -> Result<Json<Value>, AppError> {
    require_health_provider(&user)?;

    let service = ProviderService::new(&config)?;
    let provider = service.update_provider(&user.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "provider": provider,
        "message": "Health provider updated"
    })))
}

#[axum::debug_handler]
pub async fn set_availability(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<SetAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    require_health_provider(&user)?;

    let service = ProviderService::new(&config)?;
    let slots = service.set_availability(&user.id, request.available_days).await?;

    Ok(Json(json!({
        "success": true,
        "slots": slots,
        "message": "Availability updated"
    })))
}

#[axum::debug_handler]
pub async fn get_availability(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_health_provider(&user)?;

    let service = ProviderService::new(&config)?;
    let available_days = service.get_available_days(&user.id).await?;

    Ok(Json(json!({ "available_days": available_days })))
}

#[axum::debug_handler]
pub async fn save_account_details(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<SaveAccountDetailsRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = ProviderService::new(&config)?;
    let details = service.save_account_details(&user, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "account_details": details,
            "message": "Account details saved"
        })),
    ))
}
