use serde::Deserialize;

/// One webhook delivery from the payment gateway.
///
/// The event set is a closed union: anything the reconciliation path does
/// not handle deserializes into `Unknown` and is acknowledged without
/// processing, so a new event type on the provider side can never crash the
/// handler or be half-applied.
#[derive(Debug, Clone)]
pub struct WebhookEnvelope {
    /// Provider's delivery id. Redeliveries reuse it, but idempotency is
    /// anchored on booking state, not on this id.
    pub id: String,
    pub event: GatewayEvent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum GatewayEvent {
    #[serde(rename = "payment.captured")]
    PaymentCaptured(PaymentNotice),
    #[serde(rename = "payment.failed")]
    PaymentFailed(PaymentNotice),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentNotice {
    /// The gateway order this payment belongs to; matches
    /// `Booking::order_reference`.
    pub order_reference: String,
    pub payment_reference: Option<String>,
    pub amount_cents: Option<i64>,
}

/// Parses the raw webhook body. Only called after signature verification.
pub fn parse_webhook(raw: &[u8]) -> Result<WebhookEnvelope, serde_json::Error> {
    #[derive(Deserialize)]
    struct DeliveryId {
        id: String,
    }
    // The tagged union scans for its `event`/`data` keys and skips the rest
    // of the envelope, so both reads work off the same raw object.
    let DeliveryId { id } = serde_json::from_slice(raw)?;
    let event: GatewayEvent = serde_json::from_slice(raw)?;
    Ok(WebhookEnvelope { id, event })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_captured_event() {
        let raw = br#"{
            "id": "evt_001",
            "event": "payment.captured",
            "data": {
                "order_reference": "order_abc123",
                "payment_reference": "pay_xyz789",
                "amount_cents": 1200000
            }
        }"#;
        let envelope = parse_webhook(raw).unwrap();
        match envelope.event {
            GatewayEvent::PaymentCaptured(notice) => {
                assert_eq!(notice.order_reference, "order_abc123");
                assert_eq!(notice.payment_reference.as_deref(), Some("pay_xyz789"));
            }
            other => panic!("expected captured, got {:?}", other),
        }
    }

    #[test]
    fn parses_failed_event() {
        let raw = br#"{
            "id": "evt_002",
            "event": "payment.failed",
            "data": { "order_reference": "order_abc123" }
        }"#;
        let envelope = parse_webhook(raw).unwrap();
        assert!(matches!(envelope.event, GatewayEvent::PaymentFailed(_)));
    }

    #[test]
    fn unhandled_event_types_fold_into_unknown() {
        let raw = br#"{ "id": "evt_003", "event": "refund.processed" }"#;
        let envelope = parse_webhook(raw).unwrap();
        assert!(matches!(envelope.event, GatewayEvent::Unknown));
    }

    #[test]
    fn garbage_body_is_an_error() {
        assert!(parse_webhook(b"not json").is_err());
    }
}
