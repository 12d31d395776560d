use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use uuid::Uuid;

use tourline_core::payment::{GatewayError, GatewayOrder, PaymentGateway};

/// Deterministic in-process gateway for tests and local development.
///
/// Order references are derived from the booking id so a test can construct
/// the webhook payload it expects the provider to send. `unavailable()`
/// simulates a provider outage to exercise the rollback path.
pub struct MockGateway {
    orders: Mutex<Vec<GatewayOrder>>,
    unavailable: bool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            orders: Mutex::new(Vec::new()),
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            orders: Mutex::new(Vec::new()),
            unavailable: true,
        }
    }

    /// The reference `create_order` hands out for this booking.
    pub fn reference_for(booking_id: Uuid) -> String {
        format!("order_mock_{}", booking_id.simple())
    }

    pub fn created_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_order(
        &self,
        booking_id: Uuid,
        amount_cents: i64,
        currency: &str,
    ) -> Result<GatewayOrder, GatewayError> {
        if self.unavailable {
            return Err(GatewayError::Unavailable(
                "simulated provider outage".to_string(),
            ));
        }

        let order = GatewayOrder {
            reference: Self::reference_for(booking_id),
            booking_id,
            amount_cents,
            currency: currency.to_string(),
            created_at: Utc::now(),
        };
        self.orders.lock().unwrap().push(order.clone());
        Ok(order)
    }
}
