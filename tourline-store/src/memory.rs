use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use tourline_core::booking::{Booking, BookingStatus, Passenger, PaymentStatus};
use tourline_core::inventory::HoldState;
use tourline_core::package::{NewTourPackage, TourPackage};
use tourline_core::repository::{
    BookingRepository, NewBooking, PackageRepository, RepoResult, SettlementOutcome, StoreError,
};

#[derive(Debug, Clone)]
struct MemHold {
    package_id: Uuid,
    seats: i32,
    state: HoldState,
}

#[derive(Default)]
struct Inner {
    packages: HashMap<Uuid, TourPackage>,
    bookings: HashMap<Uuid, Booking>,
    holds: HashMap<Uuid, MemHold>,
}

/// In-memory implementation of both repositories behind a single mutex, so
/// every operation gets the same all-or-nothing visibility the Postgres
/// transactions provide. Backs the API-level tests and local development.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn available_seats(&self, package_id: &Uuid) -> Option<i32> {
        let inner = self.inner.lock().unwrap();
        inner.packages.get(package_id).map(|p| p.available_seats)
    }

    /// Rewrites a booking's creation time. Lets tests age a booking past the
    /// reservation timeout without sleeping.
    pub fn set_created_at(&self, booking_id: &Uuid, created_at: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(b) = inner.bookings.get_mut(booking_id) {
            b.created_at = created_at;
        }
    }

    fn release_hold_locked(inner: &mut Inner, booking_id: &Uuid) {
        if let Some(hold) = inner.holds.get_mut(booking_id) {
            if hold.state == HoldState::Held {
                hold.state = HoldState::Released;
                let (package_id, seats) = (hold.package_id, hold.seats);
                if let Some(pkg) = inner.packages.get_mut(&package_id) {
                    pkg.available_seats += seats;
                }
            }
        }
    }
}

#[async_trait]
impl PackageRepository for MemoryStore {
    async fn create_package(&self, pkg: NewTourPackage) -> RepoResult<TourPackage> {
        let now = Utc::now();
        let package = TourPackage {
            id: Uuid::new_v4(),
            destination: pkg.destination,
            title: pkg.title,
            starts_on: pkg.starts_on,
            total_seats: pkg.total_seats,
            available_seats: pkg.total_seats,
            price_cents: pkg.price_cents,
            child_price_cents: pkg.child_price_cents.unwrap_or(pkg.price_cents),
            currency: pkg.currency,
            published: true,
            created_at: now,
            updated_at: now,
        };
        let mut inner = self.inner.lock().unwrap();
        inner.packages.insert(package.id, package.clone());
        Ok(package)
    }

    async fn get_package(&self, id: Uuid) -> RepoResult<Option<TourPackage>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.packages.get(&id).cloned())
    }

    async fn list_packages(&self) -> RepoResult<Vec<TourPackage>> {
        let inner = self.inner.lock().unwrap();
        let mut packages: Vec<_> = inner
            .packages
            .values()
            .filter(|p| p.published)
            .cloned()
            .collect();
        packages.sort_by_key(|p| p.starts_on);
        Ok(packages)
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn create_booking(&self, req: NewBooking) -> RepoResult<Booking> {
        let seats = req.passengers.len() as i32;
        let mut inner = self.inner.lock().unwrap();

        let package = inner
            .packages
            .get_mut(&req.package_id)
            .ok_or_else(|| StoreError::NotFound(format!("package {}", req.package_id)))?;
        if package.available_seats < seats {
            return Err(StoreError::InsufficientSeats {
                requested: seats,
                available: package.available_seats,
            });
        }
        package.available_seats -= seats;

        let booking_id = Uuid::new_v4();
        let now = Utc::now();
        let passengers = req
            .passengers
            .iter()
            .enumerate()
            .map(|(i, p)| Passenger {
                id: Uuid::new_v4(),
                booking_id,
                full_name: p.full_name.clone(),
                age: p.age,
                gender: p.gender,
                position: i as i32,
            })
            .collect();

        let booking = Booking {
            id: booking_id,
            user_id: req.user_id,
            package_id: req.package_id,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            order_reference: None,
            amount_cents: req.amount_cents,
            currency: req.currency,
            contact: req.contact,
            passengers,
            created_at: now,
            updated_at: now,
        };

        inner.holds.insert(
            booking_id,
            MemHold {
                package_id: req.package_id,
                seats,
                state: HoldState::Held,
            },
        );
        inner.bookings.insert(booking_id, booking.clone());
        Ok(booking)
    }

    async fn get_booking(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.bookings.get(&id).cloned())
    }

    async fn find_by_order_reference(&self, reference: &str) -> RepoResult<Option<Booking>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .bookings
            .values()
            .find(|b| b.order_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn attach_order_reference(&self, id: Uuid, reference: &str) -> RepoResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .bookings
            .values()
            .any(|b| b.order_reference.as_deref() == Some(reference))
        {
            return Err(StoreError::DuplicateReference(reference.to_string()));
        }
        let booking = inner
            .bookings
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", id)))?;
        if booking.order_reference.is_some() {
            return Err(StoreError::ReferenceAlreadySet(id));
        }
        booking.order_reference = Some(reference.to_string());
        booking.updated_at = Utc::now();
        Ok(())
    }

    async fn confirm_paid(&self, id: Uuid) -> RepoResult<SettlementOutcome> {
        let mut inner = self.inner.lock().unwrap();
        let booking = inner
            .bookings
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", id)))?;

        if booking.payment_status == PaymentStatus::Paid {
            return Ok(SettlementOutcome::AlreadyPaid);
        }
        if booking.status.is_terminal() {
            return Ok(SettlementOutcome::AlreadyClosed);
        }

        booking.status = BookingStatus::Confirmed;
        booking.payment_status = PaymentStatus::Paid;
        booking.updated_at = Utc::now();

        if let Some(hold) = inner.holds.get_mut(&id) {
            if hold.state == HoldState::Held {
                hold.state = HoldState::Committed;
            }
        }
        Ok(SettlementOutcome::Settled)
    }

    async fn mark_failed(&self, id: Uuid) -> RepoResult<SettlementOutcome> {
        let mut inner = self.inner.lock().unwrap();
        let booking = inner
            .bookings
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", id)))?;

        if booking.payment_status == PaymentStatus::Paid {
            return Ok(SettlementOutcome::AlreadyPaid);
        }
        if booking.status.is_terminal() {
            return Ok(SettlementOutcome::AlreadyClosed);
        }

        booking.status = BookingStatus::Failed;
        booking.payment_status = PaymentStatus::Failed;
        booking.updated_at = Utc::now();

        Self::release_hold_locked(&mut inner, &id);
        Ok(SettlementOutcome::Settled)
    }

    async fn expire_stale(&self, cutoff: DateTime<Utc>) -> RepoResult<Vec<Uuid>> {
        let mut inner = self.inner.lock().unwrap();
        let stale: Vec<Uuid> = inner
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Pending && b.created_at < cutoff)
            .map(|b| b.id)
            .collect();

        let mut expired = Vec::new();
        for id in stale {
            if let Some(booking) = inner.bookings.get_mut(&id) {
                if booking.status != BookingStatus::Pending {
                    continue;
                }
                booking.status = BookingStatus::Cancelled;
                booking.updated_at = Utc::now();
            }
            Self::release_hold_locked(&mut inner, &id);
            expired.push(id);
        }
        Ok(expired)
    }
}
