use async_trait::async_trait;
use flyblue_core::repository::Session;
use flyblue_core::{CoreError, CoreResult};
use sqlx::{Postgres, Transaction};
use tracing::error;

/// One PostgreSQL transaction. Dropping it without `commit` rolls back.
pub struct PgSession {
    pub(crate) tx: Transaction<'static, Postgres>,
}

impl PgSession {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Session for PgSession {
    async fn commit(self: Box<Self>) -> CoreResult<()> {
        let session = *self;
        session.tx.commit().await.map_err(db_error)
    }
}

/// Unique violations become `Conflict`; anything else is a storage failure.
pub(crate) fn db_error(err: sqlx::Error) -> CoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            CoreError::Conflict(db.constraint().map_or_else(|| db.message().to_string(), |c| format!("{} violated", c)))
        }
        _ => {
            error!("Database error: {}", err);
            CoreError::Storage(err.to_string())
        }
    }
}
