use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use tourline_core::booking::{
    Booking, BookingStatus, ContactInfo, Gender, Passenger, PaymentStatus,
};
use tourline_core::repository::{
    BookingRepository, NewBooking, RepoResult, SettlementOutcome, StoreError,
};

use crate::db_err;

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: String,
    package_id: Uuid,
    status: String,
    payment_status: String,
    order_reference: Option<String>,
    amount_cents: i64,
    currency: String,
    contact_name: String,
    contact_email: String,
    contact_phone: String,
    pan: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct PassengerRow {
    id: Uuid,
    booking_id: Uuid,
    full_name: String,
    age: i32,
    gender: String,
    position: i32,
}

const BOOKING_COLUMNS: &str = "id, user_id, package_id, status, payment_status, order_reference, amount_cents, currency, contact_name, contact_email, contact_phone, pan, created_at, updated_at";

fn assemble(row: BookingRow, passengers: Vec<PassengerRow>) -> RepoResult<Booking> {
    let status = BookingStatus::from_str(&row.status)
        .ok_or_else(|| StoreError::Backend(format!("unknown booking status {}", row.status)))?;
    let payment_status = PaymentStatus::from_str(&row.payment_status).ok_or_else(|| {
        StoreError::Backend(format!("unknown payment status {}", row.payment_status))
    })?;

    let passengers = passengers
        .into_iter()
        .map(|p| {
            let gender = Gender::from_str(&p.gender)
                .ok_or_else(|| StoreError::Backend(format!("unknown gender {}", p.gender)))?;
            Ok(Passenger {
                id: p.id,
                booking_id: p.booking_id,
                full_name: p.full_name,
                age: p.age,
                gender,
                position: p.position,
            })
        })
        .collect::<RepoResult<Vec<_>>>()?;

    Ok(Booking {
        id: row.id,
        user_id: row.user_id,
        package_id: row.package_id,
        status,
        payment_status,
        order_reference: row.order_reference,
        amount_cents: row.amount_cents,
        currency: row.currency,
        contact: ContactInfo {
            name: row.contact_name,
            email: row.contact_email,
            phone: row.contact_phone,
            pan: row.pan,
        },
        passengers,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

impl PgBookingRepository {
    async fn load(&self, row: BookingRow) -> RepoResult<Booking> {
        let passengers: Vec<PassengerRow> = sqlx::query_as(
            "SELECT id, booking_id, full_name, age, gender, position FROM passengers \
             WHERE booking_id = $1 ORDER BY position",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        assemble(row, passengers)
    }

    /// Flips the booking's HELD reservation to RELEASED and returns the
    /// seats to the package counter. A no-op when the hold was already
    /// committed or released, so it composes with redundant callers.
    async fn release_hold(tx: &mut Transaction<'_, Postgres>, booking_id: Uuid) -> RepoResult<()> {
        let freed: Option<(Uuid, i32)> = sqlx::query_as(
            "UPDATE seat_reservations SET state = 'RELEASED', updated_at = NOW() \
             WHERE booking_id = $1 AND state = 'HELD' RETURNING package_id, seats",
        )
        .bind(booking_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_err)?;

        if let Some((package_id, seats)) = freed {
            sqlx::query(
                "UPDATE tour_packages SET available_seats = available_seats + $2, updated_at = NOW() \
                 WHERE id = $1",
            )
            .bind(package_id)
            .bind(seats)
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;
        }
        Ok(())
    }

    /// Current (status, payment_status) of a booking, for settling no-op
    /// outcomes after a conditional update matched zero rows.
    async fn settlement_outcome(
        tx: &mut Transaction<'_, Postgres>,
        booking_id: Uuid,
    ) -> RepoResult<SettlementOutcome> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT status, payment_status FROM bookings WHERE id = $1")
                .bind(booking_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(db_err)?;

        match row {
            None => Err(StoreError::NotFound(format!("booking {}", booking_id))),
            Some((_, payment)) if payment == "PAID" => Ok(SettlementOutcome::AlreadyPaid),
            Some(_) => Ok(SettlementOutcome::AlreadyClosed),
        }
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn create_booking(&self, req: NewBooking) -> RepoResult<Booking> {
        let seats = req.passengers.len() as i32;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Atomic conditional decrement. Zero rows affected means either the
        // package is unknown or there is not enough room; never a partial
        // write.
        let reserved = sqlx::query(
            "UPDATE tour_packages SET available_seats = available_seats - $2, updated_at = NOW() \
             WHERE id = $1 AND published AND available_seats >= $2",
        )
        .bind(req.package_id)
        .bind(seats)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if reserved.rows_affected() == 0 {
            let available: Option<i32> =
                sqlx::query_scalar("SELECT available_seats FROM tour_packages WHERE id = $1")
                    .bind(req.package_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(db_err)?;
            return match available {
                None => Err(StoreError::NotFound(format!("package {}", req.package_id))),
                Some(available) => Err(StoreError::InsufficientSeats {
                    requested: seats,
                    available,
                }),
            };
        }

        let booking_id = Uuid::new_v4();
        let row: BookingRow = sqlx::query_as(&format!(
            "INSERT INTO bookings (id, user_id, package_id, amount_cents, currency, contact_name, contact_email, contact_phone, pan) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .bind(&req.user_id)
        .bind(req.package_id)
        .bind(req.amount_cents)
        .bind(&req.currency)
        .bind(&req.contact.name)
        .bind(&req.contact.email)
        .bind(&req.contact.phone)
        .bind(&req.contact.pan)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        let mut passengers = Vec::with_capacity(req.passengers.len());
        for (i, p) in req.passengers.iter().enumerate() {
            let passenger: PassengerRow = sqlx::query_as(
                "INSERT INTO passengers (id, booking_id, full_name, age, gender, position) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 RETURNING id, booking_id, full_name, age, gender, position",
            )
            .bind(Uuid::new_v4())
            .bind(booking_id)
            .bind(&p.full_name)
            .bind(p.age)
            .bind(p.gender.as_str())
            .bind(i as i32)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
            passengers.push(passenger);
        }

        sqlx::query(
            "INSERT INTO seat_reservations (id, package_id, booking_id, seats) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(req.package_id)
        .bind(booking_id)
        .bind(seats)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        assemble(row, passengers)
    }

    async fn get_booking(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            None => Ok(None),
            Some(row) => Ok(Some(self.load(row).await?)),
        }
    }

    async fn find_by_order_reference(&self, reference: &str) -> RepoResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bookings WHERE order_reference = $1",
            BOOKING_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            None => Ok(None),
            Some(row) => Ok(Some(self.load(row).await?)),
        }
    }

    async fn attach_order_reference(&self, id: Uuid, reference: &str) -> RepoResult<()> {
        let result = sqlx::query(
            "UPDATE bookings SET order_reference = $2, updated_at = NOW() \
             WHERE id = $1 AND order_reference IS NULL",
        )
        .bind(id)
        .bind(reference)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .map(|d| d.is_unique_violation())
                .unwrap_or(false)
            {
                StoreError::DuplicateReference(reference.to_string())
            } else {
                db_err(e)
            }
        })?;

        if result.rows_affected() == 0 {
            let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM bookings WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
            return match exists {
                None => Err(StoreError::NotFound(format!("booking {}", id))),
                Some(_) => Err(StoreError::ReferenceAlreadySet(id)),
            };
        }
        Ok(())
    }

    async fn confirm_paid(&self, id: Uuid) -> RepoResult<SettlementOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // First writer wins: only a PENDING/UNPAID booking can move to
        // CONFIRMED/PAID. A concurrent sweeper or a redelivered webhook
        // matches zero rows here and no-ops.
        let updated = sqlx::query(
            "UPDATE bookings SET status = 'CONFIRMED', payment_status = 'PAID', updated_at = NOW() \
             WHERE id = $1 AND status = 'PENDING' AND payment_status = 'UNPAID'",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            return Self::settlement_outcome(&mut tx, id).await;
        }

        // Commit the hold. The counter was decremented at reserve time, so
        // this only flips the reservation state.
        sqlx::query(
            "UPDATE seat_reservations SET state = 'COMMITTED', updated_at = NOW() \
             WHERE booking_id = $1 AND state = 'HELD'",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(SettlementOutcome::Settled)
    }

    async fn mark_failed(&self, id: Uuid) -> RepoResult<SettlementOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let updated = sqlx::query(
            "UPDATE bookings SET status = 'FAILED', payment_status = 'FAILED', updated_at = NOW() \
             WHERE id = $1 AND status = 'PENDING' AND payment_status = 'UNPAID'",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            return Self::settlement_outcome(&mut tx, id).await;
        }

        Self::release_hold(&mut tx, id).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(SettlementOutcome::Settled)
    }

    async fn expire_stale(&self, cutoff: DateTime<Utc>) -> RepoResult<Vec<Uuid>> {
        let stale: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM bookings WHERE status = 'PENDING' AND created_at < $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        // One transaction per booking keeps the lock scope small and lets a
        // racing webhook win cleanly on any individual booking.
        let mut expired = Vec::new();
        for (id,) in stale {
            let mut tx = self.pool.begin().await.map_err(db_err)?;

            let updated = sqlx::query(
                "UPDATE bookings SET status = 'CANCELLED', updated_at = NOW() \
                 WHERE id = $1 AND status = 'PENDING' AND payment_status = 'UNPAID'",
            )
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            if updated.rows_affected() == 0 {
                // Confirmed (or otherwise settled) between the scan and now.
                continue;
            }

            Self::release_hold(&mut tx, id).await?;
            tx.commit().await.map_err(db_err)?;
            expired.push(id);
        }
        Ok(expired)
    }
}
