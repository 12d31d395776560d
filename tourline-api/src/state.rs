use std::sync::Arc;

use tourline_core::notify::Mailer;
use tourline_core::payment::PaymentGateway;
use tourline_core::repository::{BookingRepository, PackageRepository};
use tourline_gateway::SignatureVerifier;
use tourline_store::app_config::BusinessRules;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub packages: Arc<dyn PackageRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub signatures: SignatureVerifier,
    pub mailer: Arc<dyn Mailer>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}
