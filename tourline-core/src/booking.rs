use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Booking lifecycle. PENDING is the only non-terminal state; every other
/// state is final and transitions into it happen at most once.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Failed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(BookingStatus::Pending),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            "FAILED" => Some(BookingStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "UNPAID",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "UNPAID" => Some(PaymentStatus::Unpaid),
            "PAID" => Some(PaymentStatus::Paid),
            "FAILED" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
            Gender::Other => "OTHER",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "MALE" => Some(Gender::Male),
            "FEMALE" => Some(Gender::Female),
            "OTHER" => Some(Gender::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passenger {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub full_name: String,
    pub age: i32,
    pub gender: Gender,
    /// Order within the booking as submitted by the traveler.
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    /// Indian tax id, mandatory above the configured amount threshold.
    pub pan: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: String,
    pub package_id: Uuid,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    /// Gateway order id; bound exactly once, right after order creation.
    pub order_reference: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub contact: ContactInfo,
    pub passengers: Vec<Passenger>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Seat count requested equals passenger count.
    pub fn seat_count(&self) -> i32 {
        self.passengers.len() as i32
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Passenger details as submitted at booking time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassengerDetails {
    pub full_name: String,
    pub age: i32,
    pub gender: Gender,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("At least one passenger is required")]
    EmptyPassengers,

    #[error("Passenger {position}: {reason}")]
    InvalidPassenger { position: usize, reason: String },

    #[error("Invalid contact details: {0}")]
    InvalidContact(String),

    #[error("PAN is required for bookings above the configured amount")]
    PanRequired,

    #[error("PAN is not in the expected format")]
    InvalidPan,
}

/// Validates a booking request against the business rules before any seats
/// are touched. `amount_cents` is the already-priced total for the party.
pub fn validate_booking(
    passengers: &[PassengerDetails],
    contact: &ContactInfo,
    amount_cents: i64,
    pan_threshold_cents: i64,
) -> Result<(), ValidationError> {
    if passengers.is_empty() {
        return Err(ValidationError::EmptyPassengers);
    }
    for (i, p) in passengers.iter().enumerate() {
        if p.full_name.trim().is_empty() {
            return Err(ValidationError::InvalidPassenger {
                position: i,
                reason: "name is blank".to_string(),
            });
        }
        if p.age < 0 || p.age > 120 {
            return Err(ValidationError::InvalidPassenger {
                position: i,
                reason: format!("age {} out of range", p.age),
            });
        }
    }
    if contact.name.trim().is_empty() {
        return Err(ValidationError::InvalidContact("name is blank".to_string()));
    }
    if !contact.email.contains('@') {
        return Err(ValidationError::InvalidContact(
            "email is malformed".to_string(),
        ));
    }
    if contact.phone.trim().is_empty() {
        return Err(ValidationError::InvalidContact(
            "phone is blank".to_string(),
        ));
    }
    if amount_cents > pan_threshold_cents {
        match contact.pan.as_deref() {
            None => return Err(ValidationError::PanRequired),
            Some(pan) if !is_valid_pan(pan) => return Err(ValidationError::InvalidPan),
            Some(_) => {}
        }
    } else if let Some(pan) = contact.pan.as_deref() {
        // Optional below the threshold, but never accepted malformed.
        if !is_valid_pan(pan) {
            return Err(ValidationError::InvalidPan);
        }
    }
    Ok(())
}

/// PAN shape: five uppercase letters, four digits, one uppercase letter.
fn is_valid_pan(pan: &str) -> bool {
    let bytes = pan.as_bytes();
    bytes.len() == 10
        && bytes[..5].iter().all(|b| b.is_ascii_uppercase())
        && bytes[5..9].iter().all(|b| b.is_ascii_digit())
        && bytes[9].is_ascii_uppercase()
}
