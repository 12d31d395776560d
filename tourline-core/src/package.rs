use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A dated, sellable tour departure.
///
/// `available_seats` is the authoritative remaining sellable count and is
/// only ever mutated through the inventory ledger's conditional operations.
/// `total_seats` is fixed once the package is published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourPackage {
    pub id: Uuid,
    pub destination: String,
    pub title: String,
    pub starts_on: NaiveDate,
    pub total_seats: i32,
    pub available_seats: i32,
    pub price_cents: i64,
    /// Fare for passengers under `CHILD_AGE_LIMIT`.
    pub child_price_cents: i64,
    pub currency: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Child fare applies strictly below this age.
pub const CHILD_AGE_LIMIT: i32 = 12;

impl TourPackage {
    /// Total fare for a party, by age band.
    pub fn price_for_party(&self, ages: &[i32]) -> i64 {
        ages.iter()
            .map(|&age| {
                if age < CHILD_AGE_LIMIT {
                    self.child_price_cents
                } else {
                    self.price_cents
                }
            })
            .sum()
    }

    /// Seats currently sold or held by in-flight bookings.
    pub fn seats_taken(&self) -> i32 {
        self.total_seats - self.available_seats
    }

    /// Counter bounds that must hold at every observable point.
    pub fn seats_in_bounds(&self) -> bool {
        self.available_seats >= 0 && self.available_seats <= self.total_seats
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTourPackage {
    pub destination: String,
    pub title: String,
    pub starts_on: NaiveDate,
    pub total_seats: i32,
    pub price_cents: i64,
    /// Defaults to the adult fare when omitted.
    pub child_price_cents: Option<i64>,
    pub currency: String,
}

impl NewTourPackage {
    pub fn validate(&self) -> Result<(), PackageError> {
        if self.destination.trim().is_empty() || self.title.trim().is_empty() {
            return Err(PackageError::MissingField("destination/title"));
        }
        if self.total_seats <= 0 {
            return Err(PackageError::InvalidSeatCount(self.total_seats));
        }
        if self.price_cents <= 0 {
            return Err(PackageError::InvalidPrice(self.price_cents));
        }
        if let Some(child) = self.child_price_cents {
            if child <= 0 {
                return Err(PackageError::InvalidPrice(child));
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Seat capacity must be positive, got {0}")]
    InvalidSeatCount(i32),

    #[error("Price must be positive, got {0}")]
    InvalidPrice(i64),
}
