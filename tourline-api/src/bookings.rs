use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use tourline_core::booking::{validate_booking, Booking, BookingStatus, ContactInfo, PassengerDetails};
use tourline_core::repository::NewBooking;

use crate::auth::decode_claims;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub package_id: Uuid,
    pub passengers: Vec<PassengerDetails>,
    pub contact: ContactInfo,
}

#[derive(Debug, Serialize)]
pub struct CreateBookingResponse {
    pub booking_id: Uuid,
    pub order_reference: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: BookingStatus,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking))
        .route("/v1/bookings/{id}", get(get_booking))
}

async fn create_booking(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Json<CreateBookingResponse>, AppError> {
    let claims = decode_claims(bearer.token(), &state.auth.secret)?;

    // 1. Price the party from the package's seat price.
    let package = state
        .packages
        .get_package(req.package_id)
        .await
        .map_err(AppError::from_store)?
        .ok_or_else(|| AppError::NotFoundError("Tour package not found".to_string()))?;
    let ages: Vec<i32> = req.passengers.iter().map(|p| p.age).collect();
    let amount_cents = package.price_for_party(&ages);

    // 2. Validate before any seats move.
    validate_booking(
        &req.passengers,
        &req.contact,
        amount_cents,
        state.business_rules.pan_threshold_cents,
    )
    .map_err(|e| AppError::ValidationError(e.to_string()))?;

    // 3. Reserve seats and persist the booking in one transaction.
    let booking = state
        .bookings
        .create_booking(NewBooking {
            user_id: claims.sub,
            package_id: package.id,
            passengers: req.passengers,
            contact: req.contact,
            amount_cents,
            currency: package.currency.clone(),
        })
        .await
        .map_err(AppError::from_store)?;

    // 4. Open the gateway order. If the provider is down, no seats may stay
    // held for an order that was never created.
    let order = match state
        .gateway
        .create_order(booking.id, amount_cents, &booking.currency)
        .await
    {
        Ok(order) => order,
        Err(e) => {
            tracing::warn!(booking_id = %booking.id, "Gateway order creation failed: {}", e);
            if let Err(rollback) = state.bookings.mark_failed(booking.id).await {
                // The sweeper picks the booking up if this also fails.
                tracing::error!(booking_id = %booking.id, "Rollback failed: {}", rollback);
            }
            return Err(AppError::GatewayUnavailable(
                "Payment provider is unavailable, please retry".to_string(),
            ));
        }
    };

    // 5. Bind the order to the booking, exactly once.
    state
        .bookings
        .attach_order_reference(booking.id, &order.reference)
        .await
        .map_err(AppError::from_store)?;

    info!(booking_id = %booking.id, reference = %order.reference, "Booking created");

    Ok(Json(CreateBookingResponse {
        booking_id: booking.id,
        order_reference: order.reference,
        amount_cents,
        currency: booking.currency,
        status: booking.status,
    }))
}

async fn get_booking(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let claims = decode_claims(bearer.token(), &state.auth.secret)?;

    let booking = state
        .bookings
        .get_booking(booking_id)
        .await
        .map_err(AppError::from_store)?
        .ok_or_else(|| AppError::NotFoundError("Booking not found".to_string()))?;

    if booking.user_id != claims.sub && claims.role != "ADMIN" {
        return Err(AppError::AuthorizationError(
            "Booking does not belong to you".to_string(),
        ));
    }

    Ok(Json(booking))
}
