use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::time::interval;
use tracing::{error, info};

use tourline_core::repository::BookingRepository;

/// Background sweeper: releases the seat holds of PENDING bookings whose
/// payment never arrived within the reservation window. Without it,
/// abandoned checkouts leak inventory permanently.
pub async fn start_expiry_sweeper(
    bookings: Arc<dyn BookingRepository>,
    reservation_timeout_seconds: u64,
    sweep_interval_seconds: u64,
) {
    let mut ticker = interval(std::time::Duration::from_secs(sweep_interval_seconds));
    info!(
        "Expiry sweeper started (timeout {}s, interval {}s)",
        reservation_timeout_seconds, sweep_interval_seconds
    );

    loop {
        ticker.tick().await;
        sweep_once(&bookings, reservation_timeout_seconds).await;
    }
}

/// One sweep pass. The store resolves each booking with a conditional
/// transition, so a webhook confirming concurrently simply wins and that
/// booking is skipped.
pub async fn sweep_once(
    bookings: &Arc<dyn BookingRepository>,
    reservation_timeout_seconds: u64,
) -> usize {
    let cutoff = Utc::now() - Duration::seconds(reservation_timeout_seconds as i64);
    match bookings.expire_stale(cutoff).await {
        Ok(expired) => {
            if !expired.is_empty() {
                info!("Expired {} stale bookings, seats released", expired.len());
            }
            expired.len()
        }
        Err(e) => {
            error!("Expiry sweep failed: {}", e);
            0
        }
    }
}
