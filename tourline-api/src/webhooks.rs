use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use tracing::info;

use tourline_core::events::{parse_webhook, GatewayEvent, PaymentNotice};
use tourline_core::repository::SettlementOutcome;

use crate::state::AppState;

/// Hex-encoded HMAC-SHA256 of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payment", post(handle_payment_webhook))
}

/// POST /v1/webhooks/payment
///
/// The authoritative settlement channel. Delivery is at-least-once and
/// unordered, so everything downstream of the signature gate must be
/// idempotent. Responses: 400 when the gateway should NOT redeliver
/// (forged or unparseable), 200 once the event is durably handled or
/// deliberately ignored, 500 only when settlement failed and redelivery is
/// wanted.
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    // 1. Verify the signature over the exact raw bytes before parsing JSON
    // or touching the database.
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let Some(signature) = signature else {
        return StatusCode::BAD_REQUEST;
    };
    if !state.signatures.verify_webhook(&body, signature) {
        tracing::warn!("Webhook rejected: signature mismatch");
        return StatusCode::BAD_REQUEST;
    }

    // 2. Parse the closed event union.
    let envelope = match parse_webhook(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!("Webhook rejected: unparseable body: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    match envelope.event {
        GatewayEvent::PaymentCaptured(notice) => {
            settle(&state, &envelope.id, &notice, Settle::Captured).await
        }
        GatewayEvent::PaymentFailed(notice) => {
            settle(&state, &envelope.id, &notice, Settle::Failed).await
        }
        GatewayEvent::Unknown => {
            // Deliberate no-op branch, not an error.
            info!(delivery = %envelope.id, "Ignoring unhandled webhook event type");
            StatusCode::OK
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Settle {
    Captured,
    Failed,
}

async fn settle(
    state: &AppState,
    delivery_id: &str,
    notice: &PaymentNotice,
    direction: Settle,
) -> StatusCode {
    // 3. Look up the booking by gateway order id. A delayed webhook for a
    // booking that was since expired or removed is expected traffic.
    let booking = match state
        .bookings
        .find_by_order_reference(&notice.order_reference)
        .await
    {
        Ok(Some(booking)) => booking,
        Ok(None) => {
            info!(delivery = %delivery_id, "Webhook for unknown order reference, acknowledging");
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(delivery = %delivery_id, "Booking lookup failed: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    // 4–5. Exactly-once settlement. The store runs the state transition and
    // the reservation commit/release in one transaction; redeliveries and
    // racing sweeps land on the AlreadyPaid/AlreadyClosed branches.
    let outcome = match direction {
        Settle::Captured => state.bookings.confirm_paid(booking.id).await,
        Settle::Failed => state.bookings.mark_failed(booking.id).await,
    };
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(booking_id = %booking.id, "Settlement failed: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    match outcome {
        SettlementOutcome::Settled if direction == Settle::Captured => {
            info!(booking_id = %booking.id, "Booking confirmed by gateway webhook");
            // 6. Best-effort mail, strictly after the committed transaction.
            // A failure here must never re-run settlement or fail the ack.
            if let Ok(Some(confirmed)) = state.bookings.get_booking(booking.id).await {
                if let Err(e) = state.mailer.send_booking_confirmed(&confirmed).await {
                    tracing::warn!(booking_id = %booking.id, "Confirmation mail failed: {}", e);
                }
            }
        }
        SettlementOutcome::Settled => {
            info!(booking_id = %booking.id, "Payment failed, booking closed and seats released");
        }
        SettlementOutcome::AlreadyPaid => {
            info!(delivery = %delivery_id, booking_id = %booking.id, "Duplicate delivery for a settled booking, no-op");
        }
        SettlementOutcome::AlreadyClosed => {
            info!(delivery = %delivery_id, booking_id = %booking.id, "Webhook for a closed booking, no-op");
        }
    }
    StatusCode::OK
}
