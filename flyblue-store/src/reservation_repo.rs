use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flyblue_core::models::{NewReservation, Reservation, ReservationView};
use flyblue_core::repository::ReservationRepository;
use flyblue_core::CoreResult;

use crate::session::{db_error, PgSession};

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: i64,
    user_id: i64,
    flight_id: i64,
    seat_id: i64,
    luggage_option_id: i64,
    total_cents: i64,
}

impl From<ReservationRow> for Reservation {
    fn from(row: ReservationRow) -> Self {
        Reservation {
            id: row.id,
            user_id: row.user_id,
            flight_id: row.flight_id,
            seat_id: row.seat_id,
            luggage_option_id: row.luggage_option_id,
            total_cents: row.total_cents,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReservationViewRow {
    id: i64,
    origin_code: String,
    destination_code: String,
    departure: DateTime<Utc>,
    total_cents: i64,
}

const RESERVATION_COLUMNS: &str = "id, user_id, flight_id, seat_id, luggage_option_id, total_cents";

#[async_trait]
impl ReservationRepository for PgSession {
    async fn claim_seat(&mut self, seat_id: i64, flight_id: i64) -> CoreResult<bool> {
        // Row lock on the seat; a concurrent claimer waits here and then matches nothing.
        let result = sqlx::query(
            r#"
            UPDATE seats
            SET available = FALSE
            WHERE id = $1 AND flight_id = $2 AND available
            "#,
        )
        .bind(seat_id)
        .bind(flight_id)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_reservation(&mut self, reservation: &NewReservation) -> CoreResult<Reservation> {
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            r#"
            INSERT INTO reservations (user_id, flight_id, seat_id, luggage_option_id, total_cents)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            RESERVATION_COLUMNS
        ))
        .bind(reservation.user_id)
        .bind(reservation.flight_id)
        .bind(reservation.seat_id)
        .bind(reservation.luggage_option_id)
        .bind(reservation.total_cents)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error)?;

        Ok(row.into())
    }

    async fn find_reservation_for_user(&mut self, id: i64, user_id: i64) -> CoreResult<Option<Reservation>> {
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {} FROM reservations WHERE id = $1 AND user_id = $2",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error)?;

        Ok(row.map(Reservation::from))
    }

    async fn list_reservations(&mut self, user_id: i64) -> CoreResult<Vec<ReservationView>> {
        let rows = sqlx::query_as::<_, ReservationViewRow>(
            r#"
            SELECT r.id, o.code AS origin_code, d.code AS destination_code, f.departure, r.total_cents
            FROM reservations r
            JOIN flights f ON f.id = r.flight_id
            JOIN cities o ON o.id = f.origin_city_id
            JOIN cities d ON d.id = f.destination_city_id
            WHERE r.user_id = $1
            ORDER BY f.departure, r.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .map(|row| ReservationView {
                id: row.id,
                origin_code: row.origin_code,
                destination_code: row.destination_code,
                departure: row.departure,
                total_cents: row.total_cents,
            })
            .collect())
    }
}
