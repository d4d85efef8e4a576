use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flyblue_core::models::{City, Flight, LuggageOption, NewCity, NewFlight, NewLuggageOption, Seat, SeatPosition};
use flyblue_core::repository::CatalogRepository;
use flyblue_core::{CoreError, CoreResult};
use sqlx::{Postgres, QueryBuilder};

use crate::session::{db_error, PgSession};

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct CityRow {
    id: i64,
    name: String,
    code: String,
}

impl From<CityRow> for City {
    fn from(row: CityRow) -> Self {
        City {
            id: row.id,
            name: row.name,
            code: row.code,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LuggageRow {
    id: i64,
    kind: String,
    price_cents: i64,
    description: String,
    max_weight_kg: i32,
}

impl From<LuggageRow> for LuggageOption {
    fn from(row: LuggageRow) -> Self {
        LuggageOption {
            id: row.id,
            kind: row.kind,
            price_cents: row.price_cents,
            description: row.description,
            max_weight_kg: row.max_weight_kg,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: i64,
    code: String,
    origin_city_id: i64,
    destination_city_id: i64,
    departure: DateTime<Utc>,
    arrival: DateTime<Utc>,
    base_price_cents: i64,
}

impl From<FlightRow> for Flight {
    fn from(row: FlightRow) -> Self {
        Flight {
            id: row.id,
            code: row.code,
            origin_city_id: row.origin_city_id,
            destination_city_id: row.destination_city_id,
            departure: row.departure,
            arrival: row.arrival,
            base_price_cents: row.base_price_cents,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: i64,
    flight_id: i64,
    seat_row: i32,
    seat_column: String,
    available: bool,
}

impl TryFrom<SeatRow> for Seat {
    type Error = CoreError;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        let column = row
            .seat_column
            .parse()
            .map_err(|_| CoreError::Storage(format!("seat {} has column '{}'", row.id, row.seat_column)))?;
        Ok(Seat {
            id: row.id,
            flight_id: row.flight_id,
            row: row.seat_row,
            column,
            available: row.available,
        })
    }
}

const FLIGHT_COLUMNS: &str = "id, code, origin_city_id, destination_city_id, departure, arrival, base_price_cents";
const SEAT_COLUMNS: &str = "id, flight_id, seat_row, seat_column, available";

// Keeps each bulk insert well under the 65535 bind parameter limit.
const SEAT_INSERT_CHUNK: usize = 10_000;

#[async_trait]
impl CatalogRepository for PgSession {
    async fn insert_city(&mut self, city: &NewCity) -> CoreResult<City> {
        let row = sqlx::query_as::<_, CityRow>("INSERT INTO cities (name, code) VALUES ($1, $2) RETURNING id, name, code")
            .bind(&city.name)
            .bind(&city.code)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_error)?;

        Ok(row.into())
    }

    async fn find_city(&mut self, id: i64) -> CoreResult<Option<City>> {
        let row = sqlx::query_as::<_, CityRow>("SELECT id, name, code FROM cities WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?;

        Ok(row.map(City::from))
    }

    async fn list_cities(&mut self) -> CoreResult<Vec<City>> {
        let rows = sqlx::query_as::<_, CityRow>("SELECT id, name, code FROM cities ORDER BY id")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error)?;

        Ok(rows.into_iter().map(City::from).collect())
    }

    async fn insert_luggage_option(&mut self, option: &NewLuggageOption) -> CoreResult<LuggageOption> {
        let row = sqlx::query_as::<_, LuggageRow>(
            r#"
            INSERT INTO luggage_options (kind, price_cents, description, max_weight_kg)
            VALUES ($1, $2, $3, $4)
            RETURNING id, kind, price_cents, description, max_weight_kg
            "#,
        )
        .bind(&option.kind)
        .bind(option.price_cents)
        .bind(&option.description)
        .bind(option.max_weight_kg)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error)?;

        Ok(row.into())
    }

    async fn find_luggage_option(&mut self, id: i64) -> CoreResult<Option<LuggageOption>> {
        let row = sqlx::query_as::<_, LuggageRow>(
            "SELECT id, kind, price_cents, description, max_weight_kg FROM luggage_options WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error)?;

        Ok(row.map(LuggageOption::from))
    }

    async fn list_luggage_options(&mut self) -> CoreResult<Vec<LuggageOption>> {
        let rows = sqlx::query_as::<_, LuggageRow>(
            "SELECT id, kind, price_cents, description, max_weight_kg FROM luggage_options ORDER BY id",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(LuggageOption::from).collect())
    }

    async fn insert_flight(&mut self, flight: &NewFlight) -> CoreResult<Flight> {
        let row = sqlx::query_as::<_, FlightRow>(&format!(
            r#"
            INSERT INTO flights (code, origin_city_id, destination_city_id, departure, arrival, base_price_cents)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            FLIGHT_COLUMNS
        ))
        .bind(&flight.code)
        .bind(flight.origin_city_id)
        .bind(flight.destination_city_id)
        .bind(flight.departure)
        .bind(flight.arrival)
        .bind(flight.base_price_cents)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error)?;

        Ok(row.into())
    }

    async fn find_flight(&mut self, id: i64) -> CoreResult<Option<Flight>> {
        let row = sqlx::query_as::<_, FlightRow>(&format!("SELECT {} FROM flights WHERE id = $1", FLIGHT_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?;

        Ok(row.map(Flight::from))
    }

    async fn search_flights(
        &mut self,
        origin_city_id: i64,
        destination_city_id: i64,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> CoreResult<Vec<Flight>> {
        let rows = sqlx::query_as::<_, FlightRow>(&format!(
            r#"
            SELECT {}
            FROM flights
            WHERE origin_city_id = $1
              AND destination_city_id = $2
              AND departure >= $3
              AND departure < $4
            ORDER BY departure, id
            "#,
            FLIGHT_COLUMNS
        ))
        .bind(origin_city_id)
        .bind(destination_city_id)
        .bind(from)
        .bind(until)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(Flight::from).collect())
    }

    async fn insert_seats(&mut self, flight_id: i64, positions: &[SeatPosition]) -> CoreResult<u64> {
        let mut inserted = 0;
        for chunk in positions.chunks(SEAT_INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO seats (flight_id, seat_row, seat_column, available) ");
            builder.push_values(chunk, |mut b, position| {
                b.push_bind(flight_id)
                    .push_bind(position.row)
                    .push_bind(position.column.as_str())
                    .push_bind(true);
            });
            let result = builder.build().execute(&mut *self.tx).await.map_err(db_error)?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    async fn find_seat(&mut self, id: i64) -> CoreResult<Option<Seat>> {
        let row = sqlx::query_as::<_, SeatRow>(&format!("SELECT {} FROM seats WHERE id = $1", SEAT_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?;

        row.map(Seat::try_from).transpose()
    }

    async fn list_seats(&mut self, flight_id: i64) -> CoreResult<Vec<Seat>> {
        let rows = sqlx::query_as::<_, SeatRow>(&format!(
            "SELECT {} FROM seats WHERE flight_id = $1 ORDER BY seat_row, seat_column",
            SEAT_COLUMNS
        ))
        .bind(flight_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(Seat::try_from).collect()
    }
}
