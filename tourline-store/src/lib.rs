pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod memory;
pub mod package_repo;

pub use booking_repo::PgBookingRepository;
pub use database::DbClient;
pub use memory::MemoryStore;
pub use package_repo::PgPackageRepository;

pub(crate) fn db_err(e: sqlx::Error) -> tourline_core::StoreError {
    tourline_core::StoreError::Backend(e.to_string())
}
