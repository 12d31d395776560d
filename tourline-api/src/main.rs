use std::net::SocketAddr;
use std::sync::Arc;

use tourline_api::{app, state::AuthConfig, worker, AppState};
use tourline_core::notify::{LogMailer, Mailer};
use tourline_core::payment::PaymentGateway;
use tourline_core::repository::{BookingRepository, PackageRepository};
use tourline_gateway::{HttpGateway, SignatureVerifier};
use tourline_store::{DbClient, PgBookingRepository, PgPackageRepository};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tourline_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = tourline_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Tourline API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let packages: Arc<dyn PackageRepository> = Arc::new(PgPackageRepository::new(db.pool.clone()));
    let bookings: Arc<dyn BookingRepository> = Arc::new(PgBookingRepository::new(db.pool.clone()));
    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        HttpGateway::new(
            &config.gateway.base_url,
            &config.gateway.key_id,
            &config.gateway.key_secret,
        )
        .expect("Failed to build gateway client"),
    );
    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);

    let app_state = AppState {
        packages,
        bookings: bookings.clone(),
        gateway,
        signatures: SignatureVerifier::new(config.gateway.webhook_secret.clone()),
        mailer,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        business_rules: config.business_rules.clone(),
    };

    tokio::spawn(worker::start_expiry_sweeper(
        bookings,
        config.business_rules.reservation_timeout_seconds,
        config.business_rules.sweep_interval_seconds,
    ));

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
