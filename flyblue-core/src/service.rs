use chrono::NaiveDate;
use std::sync::Arc;

use crate::catalog::{self, CreatedFlight, FlightDetails, FlightRequest, SeatGrid};
use crate::gate::{self, Caller};
use crate::identity::{self, CredentialService, LoginOutcome, PasswordHasher};
use crate::models::{City, Flight, LuggageOption, NewCity, NewLuggageOption, Payment, Reservation, ReservationSummary, Seat, User};
use crate::payment;
use crate::repository::Database;
use crate::reservation::{self, ReservationRequest};
use crate::CoreResult;

/// Entry point for every operation. Each method opens one session, runs the
/// operation against it and commits; any error drops the session, which
/// rolls it back.
#[derive(Clone)]
pub struct BookingService {
    db: Arc<dyn Database>,
    hasher: Arc<dyn PasswordHasher>,
    credentials: Arc<dyn CredentialService>,
    seat_grid: SeatGrid,
}

impl BookingService {
    pub fn new(
        db: Arc<dyn Database>,
        hasher: Arc<dyn PasswordHasher>,
        credentials: Arc<dyn CredentialService>,
        seat_grid: SeatGrid,
    ) -> Self {
        Self {
            db,
            hasher,
            credentials,
            seat_grid,
        }
    }

    pub fn seat_grid(&self) -> &SeatGrid {
        &self.seat_grid
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    pub async fn register(&self, name: &str, email: &str, password: &str) -> CoreResult<User> {
        let mut session = self.db.begin().await?;
        let user = identity::register(session.as_mut(), self.hasher.as_ref(), name, email, password).await?;
        session.commit().await?;
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> CoreResult<LoginOutcome> {
        let mut session = self.db.begin().await?;
        let outcome = identity::login(
            session.as_mut(),
            self.hasher.as_ref(),
            self.credentials.as_ref(),
            email,
            password,
        )
        .await?;
        session.commit().await?;
        Ok(outcome)
    }

    pub async fn ensure_admin(&self, name: &str, email: &str, password: &str) -> CoreResult<User> {
        let mut session = self.db.begin().await?;
        let admin = identity::ensure_admin(session.as_mut(), self.hasher.as_ref(), name, email, password).await?;
        session.commit().await?;
        Ok(admin)
    }

    /// Bearer credential to the stored user behind it.
    pub async fn authenticate(&self, token: &str) -> CoreResult<User> {
        let mut session = self.db.begin().await?;
        let user = gate::current_user(session.as_mut(), self.credentials.as_ref(), token).await?;
        session.commit().await?;
        Ok(user)
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    pub async fn create_city(&self, caller: &Caller, city: NewCity) -> CoreResult<City> {
        let mut session = self.db.begin().await?;
        let city = catalog::create_city(session.as_mut(), caller, city).await?;
        session.commit().await?;
        Ok(city)
    }

    pub async fn create_luggage_option(&self, caller: &Caller, option: NewLuggageOption) -> CoreResult<LuggageOption> {
        let mut session = self.db.begin().await?;
        let option = catalog::create_luggage_option(session.as_mut(), caller, option).await?;
        session.commit().await?;
        Ok(option)
    }

    pub async fn create_flight(&self, caller: &Caller, req: FlightRequest) -> CoreResult<CreatedFlight> {
        let mut session = self.db.begin().await?;
        let created = catalog::create_flight(session.as_mut(), caller, &self.seat_grid, req).await?;
        session.commit().await?;
        Ok(created)
    }

    pub async fn get_flight(&self, flight_id: i64) -> CoreResult<FlightDetails> {
        let mut session = self.db.begin().await?;
        let details = catalog::get_flight(session.as_mut(), flight_id).await?;
        session.commit().await?;
        Ok(details)
    }

    pub async fn list_seats(&self, flight_id: i64) -> CoreResult<Vec<Seat>> {
        let mut session = self.db.begin().await?;
        let seats = catalog::list_seats(session.as_mut(), flight_id).await?;
        session.commit().await?;
        Ok(seats)
    }

    pub async fn search_flights(&self, origin_city_id: i64, destination_city_id: i64, date: NaiveDate) -> CoreResult<Vec<Flight>> {
        let mut session = self.db.begin().await?;
        let flights = catalog::search_flights(session.as_mut(), origin_city_id, destination_city_id, date).await?;
        session.commit().await?;
        Ok(flights)
    }

    pub async fn list_cities(&self) -> CoreResult<Vec<City>> {
        let mut session = self.db.begin().await?;
        let cities = catalog::list_cities(session.as_mut()).await?;
        session.commit().await?;
        Ok(cities)
    }

    pub async fn list_luggage_options(&self) -> CoreResult<Vec<LuggageOption>> {
        let mut session = self.db.begin().await?;
        let options = catalog::list_luggage_options(session.as_mut()).await?;
        session.commit().await?;
        Ok(options)
    }

    // ------------------------------------------------------------------
    // Reservations & payments
    // ------------------------------------------------------------------

    pub async fn create_reservation(&self, caller: &Caller, req: &ReservationRequest) -> CoreResult<Reservation> {
        let mut session = self.db.begin().await?;
        let reservation = reservation::create_reservation(session.as_mut(), caller, req).await?;
        session.commit().await?;
        Ok(reservation)
    }

    pub async fn get_reservations(&self, caller: &Caller, user_id: i64) -> CoreResult<Vec<ReservationSummary>> {
        let mut session = self.db.begin().await?;
        let reservations = reservation::get_reservations(session.as_mut(), caller, user_id).await?;
        session.commit().await?;
        Ok(reservations)
    }

    pub async fn process_payment(&self, caller: &Caller, reservation_id: i64) -> CoreResult<Payment> {
        let mut session = self.db.begin().await?;
        let payment = payment::process_payment(session.as_mut(), caller, reservation_id).await?;
        session.commit().await?;
        Ok(payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{BcryptHasher, StaticCredentials};
    use crate::memory::MemoryDatabase;
    use crate::models::PaymentStatus;
    use crate::CoreError;
    use chrono::{TimeZone, Utc};

    fn service() -> BookingService {
        BookingService::new(
            Arc::new(MemoryDatabase::new()),
            Arc::new(BcryptHasher::new(4)),
            Arc::new(StaticCredentials),
            SeatGrid::default(),
        )
    }

    #[tokio::test]
    async fn test_booking_scenario_end_to_end() {
        let service = service();
        let admin = service.ensure_admin("Root", "root@example.com", "rootpw").await.unwrap();
        let admin = Caller::from(&admin);

        service.register("Ana", "ana@example.com", "anapw").await.unwrap();
        let login = service.login("ana@example.com", "anapw").await.unwrap();
        let ana = service.authenticate(&login.token).await.unwrap();
        let caller = gate::require_user(&ana);

        let bog = service.create_city(&admin, NewCity::new("Bogota", "BOG").unwrap()).await.unwrap();
        let mia = service.create_city(&admin, NewCity::new("Miami", "MIA").unwrap()).await.unwrap();
        let luggage = service
            .create_luggage_option(&admin, NewLuggageOption::new("checked", 5_000, "23kg bag", 23).unwrap())
            .await
            .unwrap();
        let created = service
            .create_flight(
                &admin,
                FlightRequest {
                    origin_city_id: bog.id,
                    destination_city_id: mia.id,
                    departure: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
                    arrival: Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap(),
                    base_price_cents: 30_000,
                },
            )
            .await
            .unwrap();
        assert_eq!(created.flight.code, "BOG-MIA-20250601");
        assert_eq!(created.seats_created, 100);

        let seats = service.list_seats(created.flight.id).await.unwrap();
        let req = ReservationRequest {
            user_id: ana.id,
            flight_id: created.flight.id,
            seat_id: seats[0].id,
            luggage_option_id: luggage.id,
        };
        let reservation = service.create_reservation(&caller, &req).await.unwrap();
        assert_eq!(reservation.total_cents, 35_000);

        let retry = service.create_reservation(&caller, &req).await;
        assert!(matches!(retry, Err(CoreError::InvalidState(_))));

        let details = service.get_flight(created.flight.id).await.unwrap();
        assert_eq!(details.available_seats, 99);

        let payment = service.process_payment(&caller, reservation.id).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Paid);
        assert_eq!(payment.amount_cents, 35_000);
        assert!(matches!(
            service.process_payment(&caller, reservation.id).await,
            Err(CoreError::Conflict(_))
        ));

        let listed = service.get_reservations(&caller, ana.id).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_flight_creation_leaves_nothing_behind() {
        let service = service();
        let admin = Caller::from(&service.ensure_admin("Root", "root@example.com", "pw").await.unwrap());
        let bog = service.create_city(&admin, NewCity::new("Bogota", "BOG").unwrap()).await.unwrap();

        let result = service
            .create_flight(
                &admin,
                FlightRequest {
                    origin_city_id: bog.id,
                    destination_city_id: 404,
                    departure: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
                    arrival: Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap(),
                    base_price_cents: 30_000,
                },
            )
            .await;
        assert_eq!(result.unwrap_err(), CoreError::NotFound("city"));
        assert!(matches!(service.get_flight(1).await, Err(CoreError::NotFound("flight"))));
    }
}
