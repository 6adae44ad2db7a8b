use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::{TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::jwt::validate_token as decode_token;

use crate::models::{
    ChangePasswordRequest, ConfirmCodeRequest, ForgotPasswordRequest, LoginRequest,
    PhoneCodeRequest, RegistrationRequest, ResetPasswordRequest, UpdateProfileRequest, UserType,
};
use crate::services::{AccountService, VerificationService};

#[axum::debug_handler]
pub async fn validate_token(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let user = decode_token(auth.token(), &config.jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

#[axum::debug_handler]
pub async fn verify_token(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Json<Value> {
    debug!("Verifying token");

    let valid = decode_token(auth.token(), &config.jwt_secret).is_ok();
    Json(json!({ "valid": valid }))
}

#[axum::debug_handler]
pub async fn register_patient(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<RegistrationRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = AccountService::new(&config)?;
    let profile = service.register_patient(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "user": profile,
            "message": "Patient account created"
        })),
    ))
}

async fn login_as(config: &AppConfig, request: LoginRequest, user_type: UserType) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(config)?;
    let response = service.login(&request.email, &request.password, user_type).await?;

    Ok(Json(json!({
        "success": true,
        "user": response.user,
        "token": response.token
    })))
}

#[axum::debug_handler]
pub async fn patient_login(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    login_as(&config, request, UserType::Patient).await
}

#[axum::debug_handler]
pub async fn provider_login(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    login_as(&config, request, UserType::HealthProvider).await
}

#[axum::debug_handler]
pub async fn get_me(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(&config)?;
    let profile = service.get_profile(&user.id).await?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn update_me(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(&config)?;
    let profile = service.update_profile(&user.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "user": profile,
        "message": "Profile updated"
    })))
}

#[axum::debug_handler]
pub async fn change_password(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(&config)?;
    service.change_password(&user.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Password updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn forgot_password(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    if request.email.trim().is_empty() {
        return Err(AppError::ValidationError("email is required".to_string()));
    }

    let service = VerificationService::new(&config)?;
    service.forgot_password(&request.email).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Password reset code sent to your email"
    })))
}

#[axum::debug_handler]
pub async fn reset_password(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let service = VerificationService::new(&config)?;
    service.confirm_forgot_password(request).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Password reset successfully"
    })))
}

#[axum::debug_handler]
pub async fn send_email_code(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = VerificationService::new(&config)?;
    service.request_email_verification(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Verification code sent to your email"
    })))
}

#[axum::debug_handler]
pub async fn confirm_email(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<ConfirmCodeRequest>,
) -> Result<Json<Value>, AppError> {
    let service = VerificationService::new(&config)?;
    service.confirm_email(&user.id, &request.token).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Email verified"
    })))
}

#[axum::debug_handler]
pub async fn send_phone_code(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<PhoneCodeRequest>,
) -> Result<Json<Value>, AppError> {
    let service = VerificationService::new(&config)?;
    service
        .request_phone_verification(&user.id, request.phone_number.as_deref())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Verification code sent to your phone"
    })))
}

#[axum::debug_handler]
pub async fn confirm_phone(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<ConfirmCodeRequest>,
) -> Result<Json<Value>, AppError> {
    let service = VerificationService::new(&config)?;
    service.confirm_phone(&user.id, &request.token).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Phone number verified"
    })))
}
