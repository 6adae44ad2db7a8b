use std::sync::Arc;

use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_patient;

use crate::models::SaveCardRequest;
use crate::services::CardService;

#[axum::debug_handler]
pub async fn save_card(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<SaveCardRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_patient(&user)?;

    let service = CardService::new(&config)?;
    let card = service.save_card(&user, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "card": card,
            "message": "Card saved successfully"
        })),
    ))
}

#[axum::debug_handler]
pub async fn list_cards(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = CardService::new(&config)?;
    let cards = service.list_cards(&user).await?;

    Ok(Json(json!({
        "success": true,
        "cards": cards
    })))
}

#[axum::debug_handler]
pub async fn delete_card(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(card_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = CardService::new(&config)?;
    service.delete_card(&user, &card_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Card deleted successfully"
    })))
}
