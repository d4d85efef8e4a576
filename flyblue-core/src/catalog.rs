use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::gate::{require_admin, Caller};
use crate::models::{
    validate_price, City, Flight, LuggageOption, NewCity, NewFlight, NewLuggageOption, Seat, SeatColumn, SeatPosition,
};
use crate::repository::Session;
use crate::{CoreError, CoreResult};

/// Seat layout generated for every new flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatGrid {
    rows: u32,
    columns: Vec<SeatColumn>,
}

impl SeatGrid {
    /// `columns` is a string of distinct letters from `A` to `E`, e.g. `"ABCDE"`.
    pub fn new(rows: u32, columns: &str) -> CoreResult<Self> {
        if rows == 0 || rows > i32::MAX as u32 {
            return Err(CoreError::ValidationError(format!("seat grid rows out of range: {}", rows)));
        }

        let mut parsed = Vec::new();
        for c in columns.chars().filter(|c| !c.is_whitespace()) {
            let column = SeatColumn::try_from(c)?;
            if parsed.contains(&column) {
                return Err(CoreError::ValidationError(format!("seat column {} listed twice", column)));
            }
            parsed.push(column);
        }
        if parsed.is_empty() {
            return Err(CoreError::ValidationError("seat grid needs at least one column".into()));
        }

        Ok(Self { rows, columns: parsed })
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn columns(&self) -> &[SeatColumn] {
        &self.columns
    }

    pub fn capacity(&self) -> usize {
        self.rows as usize * self.columns.len()
    }

    /// Row-major: 1A, 1B, ... 2A, ...
    pub fn positions(&self) -> Vec<SeatPosition> {
        (1..=self.rows as i32)
            .flat_map(|row| self.columns.iter().map(move |&column| SeatPosition { row, column }))
            .collect()
    }
}

impl Default for SeatGrid {
    fn default() -> Self {
        Self {
            rows: 20,
            columns: SeatColumn::ALL.to_vec(),
        }
    }
}

/// `{origin}-{destination}-{YYYYMMDD}` of the departure date.
pub fn flight_code(origin: &City, destination: &City, departure: DateTime<Utc>) -> String {
    format!("{}-{}-{}", origin.code, destination.code, departure.format("%Y%m%d"))
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlightRequest {
    pub origin_city_id: i64,
    pub destination_city_id: i64,
    pub departure: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
    pub base_price_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedFlight {
    #[serde(flatten)]
    pub flight: Flight,
    pub seats_created: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlightDetails {
    #[serde(flatten)]
    pub flight: Flight,
    pub origin_city: String,
    pub destination_city: String,
    pub total_seats: usize,
    pub available_seats: usize,
}

// ============================================================================
// Administration
// ============================================================================

pub async fn create_city(session: &mut dyn Session, caller: &Caller, city: NewCity) -> CoreResult<City> {
    require_admin(caller)?;
    let city = session.insert_city(&city).await?;
    info!(city_id = city.id, code = %city.code, "City created");
    Ok(city)
}

pub async fn create_luggage_option(
    session: &mut dyn Session,
    caller: &Caller,
    option: NewLuggageOption,
) -> CoreResult<LuggageOption> {
    require_admin(caller)?;
    let option = session.insert_luggage_option(&option).await?;
    info!(luggage_option_id = option.id, "Luggage option created");
    Ok(option)
}

/// Inserts the flight and its full seat grid. Both land in the caller's
/// session, so a failure in either leaves neither behind.
pub async fn create_flight(
    session: &mut dyn Session,
    caller: &Caller,
    grid: &SeatGrid,
    req: FlightRequest,
) -> CoreResult<CreatedFlight> {
    require_admin(caller)?;

    validate_price("base price", req.base_price_cents)?;
    if req.departure >= req.arrival {
        return Err(CoreError::ValidationError("departure must be before arrival".into()));
    }

    let origin = session
        .find_city(req.origin_city_id)
        .await?
        .ok_or(CoreError::NotFound("city"))?;
    let destination = session
        .find_city(req.destination_city_id)
        .await?
        .ok_or(CoreError::NotFound("city"))?;

    let flight = session
        .insert_flight(&NewFlight {
            code: flight_code(&origin, &destination, req.departure),
            origin_city_id: origin.id,
            destination_city_id: destination.id,
            departure: req.departure,
            arrival: req.arrival,
            base_price_cents: req.base_price_cents,
        })
        .await?;

    let seats_created = session.insert_seats(flight.id, &grid.positions()).await?;
    if seats_created != grid.capacity() as u64 {
        return Err(CoreError::Storage(format!(
            "expected {} seats for flight {}, inserted {}",
            grid.capacity(),
            flight.id,
            seats_created
        )));
    }

    info!(flight_id = flight.id, code = %flight.code, seats = seats_created, "Flight created");
    Ok(CreatedFlight { flight, seats_created })
}

// ============================================================================
// Lookups
// ============================================================================

pub async fn get_flight(session: &mut dyn Session, flight_id: i64) -> CoreResult<FlightDetails> {
    let flight = session.find_flight(flight_id).await?.ok_or(CoreError::NotFound("flight"))?;
    let origin = session.find_city(flight.origin_city_id).await?;
    let destination = session.find_city(flight.destination_city_id).await?;
    let seats = session.list_seats(flight.id).await?;

    Ok(FlightDetails {
        origin_city: origin.map(|c| c.name).unwrap_or_else(|| "Unknown".into()),
        destination_city: destination.map(|c| c.name).unwrap_or_else(|| "Unknown".into()),
        total_seats: seats.len(),
        available_seats: seats.iter().filter(|s| s.available).count(),
        flight,
    })
}

pub async fn list_seats(session: &mut dyn Session, flight_id: i64) -> CoreResult<Vec<Seat>> {
    if session.find_flight(flight_id).await?.is_none() {
        return Err(CoreError::NotFound("flight"));
    }
    session.list_seats(flight_id).await
}

/// Flights on the route departing on `date` (UTC).
pub async fn search_flights(
    session: &mut dyn Session,
    origin_city_id: i64,
    destination_city_id: i64,
    date: NaiveDate,
) -> CoreResult<Vec<Flight>> {
    let from = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    let until = from + Duration::days(1);
    session.search_flights(origin_city_id, destination_city_id, from, until).await
}

pub async fn list_cities(session: &mut dyn Session) -> CoreResult<Vec<City>> {
    session.list_cities().await
}

pub async fn list_luggage_options(session: &mut dyn Session) -> CoreResult<Vec<LuggageOption>> {
    session.list_luggage_options().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDatabase;
    use crate::models::Role;
    use crate::repository::Database;

    const ADMIN: Caller = Caller { id: 1, role: Role::Admin };

    async fn seed_cities(session: &mut dyn Session) -> (City, City) {
        let bog = create_city(session, &ADMIN, NewCity::new("Bogota", "BOG").unwrap()).await.unwrap();
        let mia = create_city(session, &ADMIN, NewCity::new("Miami", "MIA").unwrap()).await.unwrap();
        (bog, mia)
    }

    fn request(origin: &City, destination: &City) -> FlightRequest {
        FlightRequest {
            origin_city_id: origin.id,
            destination_city_id: destination.id,
            departure: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
            arrival: Utc.with_ymd_and_hms(2025, 6, 1, 11, 30, 0).unwrap(),
            base_price_cents: 30_000,
        }
    }

    #[test]
    fn test_seat_grid_positions() {
        let grid = SeatGrid::new(12, "ABCDE").unwrap();
        let positions = grid.positions();
        assert_eq!(positions.len(), 60);
        assert_eq!(positions[0], SeatPosition { row: 1, column: SeatColumn::A });
        assert_eq!(positions[59], SeatPosition { row: 12, column: SeatColumn::E });

        assert!(SeatGrid::new(0, "ABC").is_err());
        assert!(SeatGrid::new(10, "").is_err());
        assert!(SeatGrid::new(10, "ABA").is_err());
        assert!(SeatGrid::new(10, "ABF").is_err());
        assert_eq!(SeatGrid::default().capacity(), 100);
    }

    #[tokio::test]
    async fn test_create_flight_builds_code_and_seat_grid() {
        let db = MemoryDatabase::new();
        let mut session = db.begin().await.unwrap();
        let (bog, mia) = seed_cities(session.as_mut()).await;

        let created = create_flight(session.as_mut(), &ADMIN, &SeatGrid::default(), request(&bog, &mia))
            .await
            .unwrap();
        assert_eq!(created.flight.code, "BOG-MIA-20250601");
        assert_eq!(created.seats_created, 100);

        let seats = list_seats(session.as_mut(), created.flight.id).await.unwrap();
        assert_eq!(seats.len(), 100);
        assert!(seats.iter().all(|s| s.available && s.flight_id == created.flight.id));

        let details = get_flight(session.as_mut(), created.flight.id).await.unwrap();
        assert_eq!(details.origin_city, "Bogota");
        assert_eq!(details.destination_city, "Miami");
        assert_eq!(details.available_seats, 100);
    }

    #[tokio::test]
    async fn test_create_flight_with_custom_grid() {
        let db = MemoryDatabase::new();
        let mut session = db.begin().await.unwrap();
        let (bog, mia) = seed_cities(session.as_mut()).await;
        let grid = SeatGrid::new(12, "ABCDE").unwrap();

        let created = create_flight(session.as_mut(), &ADMIN, &grid, request(&bog, &mia)).await.unwrap();
        assert_eq!(created.seats_created, 60);
    }

    #[tokio::test]
    async fn test_create_flight_failures() {
        let db = MemoryDatabase::new();
        let mut session = db.begin().await.unwrap();
        let (bog, mia) = seed_cities(session.as_mut()).await;
        let grid = SeatGrid::default();

        let user = Caller { id: 5, role: Role::User };
        let forbidden = create_flight(session.as_mut(), &user, &grid, request(&bog, &mia)).await;
        assert!(matches!(forbidden, Err(CoreError::Forbidden(_))));

        let mut unknown = request(&bog, &mia);
        unknown.destination_city_id = 999;
        let missing = create_flight(session.as_mut(), &ADMIN, &grid, unknown).await;
        assert_eq!(missing.unwrap_err(), CoreError::NotFound("city"));

        let mut backwards = request(&bog, &mia);
        backwards.arrival = backwards.departure - Duration::hours(1);
        let invalid = create_flight(session.as_mut(), &ADMIN, &grid, backwards).await;
        assert!(matches!(invalid, Err(CoreError::ValidationError(_))));

        for price in [-1, crate::models::MAX_PRICE_CENTS + 1, i64::MAX] {
            let mut priced = request(&bog, &mia);
            priced.base_price_cents = price;
            let rejected = create_flight(session.as_mut(), &ADMIN, &grid, priced).await;
            assert!(matches!(rejected, Err(CoreError::ValidationError(_))), "price {price}");
        }
    }

    #[tokio::test]
    async fn test_search_flights_by_day() {
        let db = MemoryDatabase::new();
        let mut session = db.begin().await.unwrap();
        let (bog, mia) = seed_cities(session.as_mut()).await;
        let grid = SeatGrid::new(1, "A").unwrap();

        let created = create_flight(session.as_mut(), &ADMIN, &grid, request(&bog, &mia)).await.unwrap();

        let hit = search_flights(session.as_mut(), bog.id, mia.id, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].id, created.flight.id);

        let other_day = search_flights(session.as_mut(), bog.id, mia.id, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap())
            .await
            .unwrap();
        assert!(other_day.is_empty());

        let reversed = search_flights(session.as_mut(), mia.id, bog.id, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
            .await
            .unwrap();
        assert!(reversed.is_empty());
    }
}
