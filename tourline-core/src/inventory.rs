use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Handle for a provisional seat hold. Returned by `reserve` and consumed
/// by exactly one of `commit` or `release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationToken(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldState {
    Held,
    Committed,
    Released,
}

impl HoldState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HoldState::Held => "HELD",
            HoldState::Committed => "COMMITTED",
            HoldState::Released => "RELEASED",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Tour package not found: {0}")]
    PackageNotFound(Uuid),

    #[error("Unknown reservation token: {0}")]
    UnknownToken(Uuid),

    #[error("Insufficient seats: requested {requested}, available {available}")]
    Insufficient { requested: i32, available: i32 },

    #[error("Seat count must be positive, got {0}")]
    InvalidSeatCount(i32),
}

/// Authoritative seat accounting for tour packages.
///
/// `reserve` is the only operation that decrements `available_seats`, and it
/// does so with an atomic availability check so concurrent callers can never
/// jointly take the counter below zero. `commit` converts a hold into a
/// permanent decrement without touching the counter again; `release` returns
/// the held seats. Both are idempotent: only the first call on a HELD token
/// has any effect.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    async fn reserve(
        &self,
        package_id: Uuid,
        seats: i32,
    ) -> Result<ReservationToken, InventoryError>;

    async fn release(&self, token: ReservationToken) -> Result<(), InventoryError>;

    async fn commit(&self, token: ReservationToken) -> Result<(), InventoryError>;
}

#[derive(Debug, Clone)]
struct Counter {
    total_seats: i32,
    available_seats: i32,
}

#[derive(Debug, Clone)]
struct Hold {
    package_id: Uuid,
    seats: i32,
    state: HoldState,
}

#[derive(Default)]
struct LedgerState {
    counters: HashMap<Uuid, Counter>,
    holds: HashMap<Uuid, Hold>,
}

/// In-memory ledger. The production ledger lives in the Postgres store; this
/// one backs unit tests and local development, with each operation holding
/// the single lock for its whole check-and-mutate step so the same atomicity
/// contract applies.
#[derive(Default)]
pub struct InMemoryLedger {
    inner: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, package_id: Uuid, total_seats: i32) {
        let mut state = self.inner.lock().unwrap();
        state.counters.insert(
            package_id,
            Counter {
                total_seats,
                available_seats: total_seats,
            },
        );
    }

    pub fn available(&self, package_id: &Uuid) -> Option<i32> {
        let state = self.inner.lock().unwrap();
        state.counters.get(package_id).map(|c| c.available_seats)
    }

    /// True when `0 <= available <= total` for the package.
    pub fn in_bounds(&self, package_id: &Uuid) -> bool {
        let state = self.inner.lock().unwrap();
        state
            .counters
            .get(package_id)
            .map(|c| c.available_seats >= 0 && c.available_seats <= c.total_seats)
            .unwrap_or(false)
    }
}

#[async_trait]
impl InventoryLedger for InMemoryLedger {
    async fn reserve(
        &self,
        package_id: Uuid,
        seats: i32,
    ) -> Result<ReservationToken, InventoryError> {
        if seats <= 0 {
            return Err(InventoryError::InvalidSeatCount(seats));
        }
        let mut state = self.inner.lock().unwrap();
        let counter = state
            .counters
            .get_mut(&package_id)
            .ok_or(InventoryError::PackageNotFound(package_id))?;

        if counter.available_seats < seats {
            return Err(InventoryError::Insufficient {
                requested: seats,
                available: counter.available_seats,
            });
        }
        counter.available_seats -= seats;

        let token = ReservationToken(Uuid::new_v4());
        state.holds.insert(
            token.0,
            Hold {
                package_id,
                seats,
                state: HoldState::Held,
            },
        );
        Ok(token)
    }

    async fn release(&self, token: ReservationToken) -> Result<(), InventoryError> {
        let mut state = self.inner.lock().unwrap();
        let hold = match state.holds.get_mut(&token.0) {
            Some(h) => h,
            None => return Err(InventoryError::UnknownToken(token.0)),
        };
        if hold.state != HoldState::Held {
            // Already committed or released; second call is a no-op.
            return Ok(());
        }
        hold.state = HoldState::Released;
        let (package_id, seats) = (hold.package_id, hold.seats);
        if let Some(counter) = state.counters.get_mut(&package_id) {
            counter.available_seats += seats;
        }
        Ok(())
    }

    async fn commit(&self, token: ReservationToken) -> Result<(), InventoryError> {
        let mut state = self.inner.lock().unwrap();
        let hold = match state.holds.get_mut(&token.0) {
            Some(h) => h,
            None => return Err(InventoryError::UnknownToken(token.0)),
        };
        if hold.state == HoldState::Held {
            // Seats were already subtracted at reserve time; the counter
            // stays where it is.
            hold.state = HoldState::Committed;
        }
        Ok(())
    }
}
