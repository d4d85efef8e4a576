use async_trait::async_trait;
use flyblue_core::repository::{Database, Session};
use flyblue_core::CoreResult;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

use crate::app_config::DatabaseConfig;
use crate::session::{db_error, PgSession};

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Waits for checked-out connections to return, then closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed.");
    }
}

/// [`Database`] backed by the PostgreSQL pool; every session is one transaction.
#[derive(Clone)]
pub struct PgDatabase {
    client: DbClient,
}

impl PgDatabase {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn begin(&self) -> CoreResult<Box<dyn Session>> {
        let tx = self.client.pool.begin().await.map_err(db_error)?;
        Ok(Box::new(PgSession::new(tx)))
    }
}
