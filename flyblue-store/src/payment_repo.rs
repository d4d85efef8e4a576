use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flyblue_core::models::{NewPayment, Payment};
use flyblue_core::repository::PaymentRepository;
use flyblue_core::{CoreError, CoreResult};

use crate::session::{db_error, PgSession};

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: i64,
    reservation_id: i64,
    amount_cents: i64,
    status: String,
    paid_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = CoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            reservation_id: row.reservation_id,
            amount_cents: row.amount_cents,
            status: row
                .status
                .parse()
                .map_err(|_| CoreError::Storage(format!("payment {} has status '{}'", row.id, row.status)))?,
            paid_at: row.paid_at,
        })
    }
}

#[async_trait]
impl PaymentRepository for PgSession {
    async fn find_payment(&mut self, reservation_id: i64) -> CoreResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(
            "SELECT id, reservation_id, amount_cents, status, paid_at FROM payments WHERE reservation_id = $1",
        )
        .bind(reservation_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error)?;

        row.map(Payment::try_from).transpose()
    }

    async fn insert_payment(&mut self, payment: &NewPayment) -> CoreResult<Option<Payment>> {
        // The unique index on reservation_id settles concurrent payers; the loser gets no row back.
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            INSERT INTO payments (reservation_id, amount_cents, status, paid_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (reservation_id) DO NOTHING
            RETURNING id, reservation_id, amount_cents, status, paid_at
            "#,
        )
        .bind(payment.reservation_id)
        .bind(payment.amount_cents)
        .bind(payment.status.as_str())
        .bind(payment.paid_at)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error)?;

        row.map(Payment::try_from).transpose()
    }
}
