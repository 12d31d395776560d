use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use tourline_core::package::{NewTourPackage, TourPackage};
use tourline_core::repository::{PackageRepository, RepoResult};

use crate::db_err;

pub struct PgPackageRepository {
    pool: PgPool,
}

impl PgPackageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PackageRow {
    id: Uuid,
    destination: String,
    title: String,
    starts_on: NaiveDate,
    total_seats: i32,
    available_seats: i32,
    price_cents: i64,
    child_price_cents: i64,
    currency: String,
    published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PackageRow> for TourPackage {
    fn from(row: PackageRow) -> Self {
        TourPackage {
            id: row.id,
            destination: row.destination,
            title: row.title,
            starts_on: row.starts_on,
            total_seats: row.total_seats,
            available_seats: row.available_seats,
            price_cents: row.price_cents,
            child_price_cents: row.child_price_cents,
            currency: row.currency,
            published: row.published,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PACKAGE_COLUMNS: &str = "id, destination, title, starts_on, total_seats, available_seats, price_cents, child_price_cents, currency, published, created_at, updated_at";

#[async_trait]
impl PackageRepository for PgPackageRepository {
    async fn create_package(&self, pkg: NewTourPackage) -> RepoResult<TourPackage> {
        let id = Uuid::new_v4();
        let row: PackageRow = sqlx::query_as(&format!(
            "INSERT INTO tour_packages (id, destination, title, starts_on, total_seats, available_seats, price_cents, child_price_cents, currency) \
             VALUES ($1, $2, $3, $4, $5, $5, $6, $7, $8) RETURNING {}",
            PACKAGE_COLUMNS
        ))
        .bind(id)
        .bind(&pkg.destination)
        .bind(&pkg.title)
        .bind(pkg.starts_on)
        .bind(pkg.total_seats)
        .bind(pkg.price_cents)
        .bind(pkg.child_price_cents.unwrap_or(pkg.price_cents))
        .bind(&pkg.currency)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    async fn get_package(&self, id: Uuid) -> RepoResult<Option<TourPackage>> {
        let row: Option<PackageRow> = sqlx::query_as(&format!(
            "SELECT {} FROM tour_packages WHERE id = $1",
            PACKAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    async fn list_packages(&self) -> RepoResult<Vec<TourPackage>> {
        let rows: Vec<PackageRow> = sqlx::query_as(&format!(
            "SELECT {} FROM tour_packages WHERE published ORDER BY starts_on",
            PACKAGE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
