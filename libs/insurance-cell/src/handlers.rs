use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_patient;

use crate::models::InsuranceDetailsRequest;
use crate::services::InsuranceService;

#[axum::debug_handler]
pub async fn save_insurance_details(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<InsuranceDetailsRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_patient(&user)?;

    let service = InsuranceService::new(&config)?;
    let details = service.save_insurance_details(&user, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "insurance_details": details,
            "message": "Gotten Insurance details successfully"
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_insurance_details(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = InsuranceService::new(&config)?;
    let details = service.get_insurance_details(&user).await?;

    Ok(Json(json!({
        "success": true,
        "insurance_details": details
    })))
}
