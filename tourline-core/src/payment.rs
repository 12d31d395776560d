use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An order opened with the payment provider for a single booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    /// Provider's order id (e.g. order_Nxy...). Stored on the booking and
    /// used to correlate webhook deliveries.
    pub reference: String,
    pub booking_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Transport-level failure or 5xx from the provider; the caller should
    /// roll the booking back and surface a retryable error.
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    /// The provider refused the order outright (bad amount, bad currency).
    #[error("Payment gateway rejected the order: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a payment order for the booking's full amount. Failure here must
    /// leave no seats held for an order that was never created.
    async fn create_order(
        &self,
        booking_id: Uuid,
        amount_cents: i64,
        currency: &str,
    ) -> Result<GatewayOrder, GatewayError>;
}
