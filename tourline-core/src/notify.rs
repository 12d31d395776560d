use async_trait::async_trait;

use crate::booking::Booking;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Outbound confirmation mail boundary. Dispatch is best-effort: callers run
/// it after the settlement transaction has committed and must swallow
/// failures rather than re-process the payment.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_booking_confirmed(&self, booking: &Booking) -> Result<(), NotifyError>;
}

/// Logs instead of sending. Stands in for the external mail collaborator in
/// development and tests.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_booking_confirmed(&self, booking: &Booking) -> Result<(), NotifyError> {
        tracing::info!(
            booking_id = %booking.id,
            email = %booking.contact.email,
            "Booking confirmation mail queued"
        );
        Ok(())
    }
}
