use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::{Booking, ContactInfo, PassengerDetails};
use crate::package::{NewTourPackage, TourPackage};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: i32, available: i32 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Booking {0} already has a gateway order attached")]
    ReferenceAlreadySet(Uuid),

    #[error("Gateway order reference already in use: {0}")]
    DuplicateReference(String),

    #[error("Storage failure: {0}")]
    Backend(String),
}

pub type RepoResult<T> = Result<T, StoreError>;

/// Result of an attempt to drive a booking to a terminal state. The
/// `AlreadyPaid` branch is the idempotency anchor that makes webhook
/// redelivery safe: the second and every later delivery observes it and
/// changes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementOutcome {
    /// The booking reached its terminal state in this call.
    Settled,
    /// Payment was recorded by an earlier call; state untouched.
    AlreadyPaid,
    /// The booking was already closed (cancelled/failed/expired); state
    /// untouched. A late webhook for an expired booking lands here.
    AlreadyClosed,
}

#[async_trait]
pub trait PackageRepository: Send + Sync {
    /// Publishes a package with `available_seats == total_seats`.
    async fn create_package(&self, pkg: NewTourPackage) -> RepoResult<TourPackage>;

    async fn get_package(&self, id: Uuid) -> RepoResult<Option<TourPackage>>;

    async fn list_packages(&self) -> RepoResult<Vec<TourPackage>>;
}

/// Everything a booking needs at creation time. The amount is priced by the
/// caller from the package's price table.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: String,
    pub package_id: Uuid,
    pub passengers: Vec<PassengerDetails>,
    pub contact: ContactInfo,
    pub amount_cents: i64,
    pub currency: String,
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Reserves seats and persists the booking, its passengers and the seat
    /// hold in one transaction. Fails with `InsufficientSeats` leaving no
    /// partial state behind.
    async fn create_booking(&self, req: NewBooking) -> RepoResult<Booking>;

    async fn get_booking(&self, id: Uuid) -> RepoResult<Option<Booking>>;

    async fn find_by_order_reference(&self, reference: &str) -> RepoResult<Option<Booking>>;

    /// Binds the gateway order to the booking. One-time: fails if a
    /// reference is already attached so a booking can never be bound to two
    /// gateway orders.
    async fn attach_order_reference(&self, id: Uuid, reference: &str) -> RepoResult<()>;

    /// Commits the seat hold and records the payment, atomically. The only
    /// path to `PAID`/`CONFIRMED`.
    async fn confirm_paid(&self, id: Uuid) -> RepoResult<SettlementOutcome>;

    /// Releases the seat hold and fails the booking, atomically.
    async fn mark_failed(&self, id: Uuid) -> RepoResult<SettlementOutcome>;

    /// Cancels PENDING bookings created before `cutoff`, releasing their
    /// holds. Returns the ids of the bookings it expired. Safe to run
    /// concurrently with `confirm_paid` for the same booking: whichever
    /// transaction wins, the loser observes a terminal state and no-ops.
    async fn expire_stale(&self, cutoff: DateTime<Utc>) -> RepoResult<Vec<Uuid>>;
}
