use std::sync::Arc;

use axum::{
    extract::{Extension, Json, Query, State},
    response::Html,
};
use chrono::{Datelike, Utc};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::pagination::PageQuery;
use shared_utils::extractor::{require_health_provider, require_patient};

use crate::models::{
    ActionTokenQuery, BookingIdRequest, BookingListQuery, BookingRequest, CancelBookingRequest,
    FinalizeBookingRequest, RescheduleBookingRequest, RescheduleTimesRequest,
};
use crate::services::{BookingService, EarningsService, PricingService};

#[axum::debug_handler]
pub async fn general_booking_details(State(config): State<Arc<AppConfig>>) -> Result<Json<Value>, AppError> {
    let details = PricingService::new(&config).general_booking_details().await?;
    Ok(Json(json!(details)))
}

#[axum::debug_handler]
pub async fn booking_request(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Query(query): Query<PageQuery>,
    Json(request): Json<BookingRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&config)?;
    let outcome = service.booking_request(&user, request, &query).await?;

    let message = if outcome.booking_id.is_some() {
        "request successful"
    } else {
        "No provider is available for this request"
    };

    Ok(Json(json!({
        "success": true,
        "booking_id": outcome.booking_id,
        "data": outcome.providers,
        "message": message
    })))
}

#[axum::debug_handler]
pub async fn finalize_booking(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<FinalizeBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&config)?;
    let booking = service.finalize_booking(&user, request).await?;

    Ok(Json(json!({
        "success": true,
        "booking": booking,
        "message": "Booking request sent to provider"
    })))
}

#[axum::debug_handler]
pub async fn accept_booking(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookingIdRequest>,
) -> Result<Json<Value>, AppError> {
    require_health_provider(&user)?;

    let service = BookingService::new(&config)?;
    let booking = service.accept_booking(&user.id, &request.booking_id).await?;

    Ok(Json(json!({
        "success": true,
        "booking": booking,
        "message": "Booking accepted"
    })))
}

#[axum::debug_handler]
pub async fn reject_booking(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookingIdRequest>,
) -> Result<Json<Value>, AppError> {
    require_health_provider(&user)?;

    let service = BookingService::new(&config)?;
    let booking = service.reject_booking(&user.id, &request.booking_id).await?;

    Ok(Json(json!({
        "success": true,
        "booking": booking,
        "message": "Booking rejected"
    })))
}

#[axum::debug_handler]
pub async fn accept_from_link(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<ActionTokenQuery>,
) -> Result<Html<&'static str>, AppError> {
    let service = BookingService::new(&config)?;
    service.respond_with_token(&query.token, true).await?;

    Ok(Html("<h1>Booking request accepted successfully</h1>"))
}

#[axum::debug_handler]
pub async fn reject_from_link(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<ActionTokenQuery>,
) -> Result<Html<&'static str>, AppError> {
    let service = BookingService::new(&config)?;
    service.respond_with_token(&query.token, false).await?;

    Ok(Html("<h1>Booking request rejected successfully</h1>"))
}

#[axum::debug_handler]
pub async fn cancel_booking(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&config)?;
    service.cancel_booking(&user, request).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Booking has been cancelled"
    })))
}

#[axum::debug_handler]
pub async fn complete_booking(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookingIdRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&config)?;
    let booking = service.complete_booking(&user, &request.booking_id).await?;

    Ok(Json(json!({
        "success": true,
        "booking": booking,
        "message": "Booking completed"
    })))
}

#[axum::debug_handler]
pub async fn reschedule_available_times(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleTimesRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&config)?;
    let availability = service.reschedule_available_times(&user, request).await?;

    Ok(Json(json!({
        "success": true,
        "data": availability
    })))
}

#[axum::debug_handler]
pub async fn reschedule_booking(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&config)?;
    let booking = service.reschedule_booking(&user, request).await?;

    Ok(Json(json!({
        "success": true,
        "booking": booking,
        "message": "Booking rescheduled"
    })))
}

#[axum::debug_handler]
pub async fn patient_bookings(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Query(query): Query<BookingListQuery>,
) -> Result<Json<Value>, AppError> {
    require_patient(&user)?;

    let service = BookingService::new(&config)?;
    let page = service.list_bookings(&user, &query).await?;

    Ok(Json(json!(page)))
}

#[axum::debug_handler]
pub async fn provider_bookings(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Query(query): Query<BookingListQuery>,
) -> Result<Json<Value>, AppError> {
    require_health_provider(&user)?;

    let service = BookingService::new(&config)?;
    let page = service.list_bookings(&user, &query).await?;

    Ok(Json(json!(page)))
}

#[axum::debug_handler]
pub async fn total_earnings(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let earnings = EarningsService::new(&config).total(&user).await?;
    Ok(Json(json!({ "success": true, "data": earnings })))
}

#[axum::debug_handler]
pub async fn monthly_earnings(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let earnings = EarningsService::new(&config)
        .monthly(&user, Utc::now().year())
        .await?;
    Ok(Json(json!({ "success": true, "data": earnings })))
}
