use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use tourline_core::payment::{GatewayError, GatewayOrder, PaymentGateway};

/// REST client for the payment provider's order API. Authenticates with the
/// key id/secret pair; the webhook signing secret is a separate credential
/// handled by `SignatureVerifier`.
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: String,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

impl HttpGateway {
    pub fn new(base_url: &str, key_id: &str, key_secret: &str) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn create_order(
        &self,
        booking_id: Uuid,
        amount_cents: i64,
        currency: &str,
    ) -> Result<GatewayOrder, GatewayError> {
        let url = format!("{}/v1/orders", self.base_url);
        let body = CreateOrderBody {
            amount: amount_cents,
            currency,
            receipt: format!("bk_{}", booking_id.simple()),
        };

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(GatewayError::Unavailable(format!(
                "provider returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(GatewayError::Rejected(format!(
                "provider returned {}",
                status
            )));
        }

        let order: CreateOrderResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        tracing::info!(booking_id = %booking_id, reference = %order.id, "Gateway order created");

        Ok(GatewayOrder {
            reference: order.id,
            booking_id,
            amount_cents: order.amount,
            currency: order.currency,
            created_at: Utc::now(),
        })
    }
}
