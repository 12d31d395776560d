pub mod booking;
pub mod events;
pub mod inventory;
pub mod notify;
pub mod package;
pub mod payment;
pub mod repository;

pub use booking::{Booking, BookingStatus, Passenger, PaymentStatus};
pub use inventory::{InventoryLedger, ReservationToken};
pub use package::TourPackage;
pub use repository::{BookingRepository, PackageRepository, SettlementOutcome, StoreError};
