pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod payment_repo;
pub mod reservation_repo;
pub mod session;
pub mod user_repo;

pub use database::{DbClient, PgDatabase};
pub use session::PgSession;
