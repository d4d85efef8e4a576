use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    City, Flight, LuggageOption, NewCity, NewFlight, NewLuggageOption, NewPayment, NewReservation,
    NewUser, Payment, Reservation, ReservationView, Seat, SeatPosition, User,
};
use crate::CoreResult;

/// User records
#[async_trait]
pub trait IdentityRepository: Send {
    async fn find_user(&mut self, id: i64) -> CoreResult<Option<User>>;

    async fn find_user_by_email(&mut self, email: &str) -> CoreResult<Option<User>>;

    /// Fails with `Conflict` when the email is already registered.
    async fn insert_user(&mut self, user: &NewUser) -> CoreResult<User>;
}

/// Cities, flights, seats and luggage options
#[async_trait]
pub trait CatalogRepository: Send {
    async fn insert_city(&mut self, city: &NewCity) -> CoreResult<City>;

    async fn find_city(&mut self, id: i64) -> CoreResult<Option<City>>;

    async fn list_cities(&mut self) -> CoreResult<Vec<City>>;

    async fn insert_luggage_option(&mut self, option: &NewLuggageOption) -> CoreResult<LuggageOption>;

    async fn find_luggage_option(&mut self, id: i64) -> CoreResult<Option<LuggageOption>>;

    async fn list_luggage_options(&mut self) -> CoreResult<Vec<LuggageOption>>;

    async fn insert_flight(&mut self, flight: &NewFlight) -> CoreResult<Flight>;

    async fn find_flight(&mut self, id: i64) -> CoreResult<Option<Flight>>;

    /// Flights on the route whose departure falls in `[from, until)`.
    async fn search_flights(
        &mut self,
        origin_city_id: i64,
        destination_city_id: i64,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> CoreResult<Vec<Flight>>;

    /// Inserts every position as an available seat of `flight_id`, returns the row count.
    async fn insert_seats(&mut self, flight_id: i64, positions: &[SeatPosition]) -> CoreResult<u64>;

    async fn find_seat(&mut self, id: i64) -> CoreResult<Option<Seat>>;

    async fn list_seats(&mut self, flight_id: i64) -> CoreResult<Vec<Seat>>;
}

/// Seat claims and reservation rows
#[async_trait]
pub trait ReservationRepository: Send {
    /// Flips the seat to unavailable only if it belongs to `flight_id` and is
    /// still available. Returns `false` when no row matched.
    async fn claim_seat(&mut self, seat_id: i64, flight_id: i64) -> CoreResult<bool>;

    async fn insert_reservation(&mut self, reservation: &NewReservation) -> CoreResult<Reservation>;

    async fn find_reservation_for_user(&mut self, id: i64, user_id: i64) -> CoreResult<Option<Reservation>>;

    async fn list_reservations(&mut self, user_id: i64) -> CoreResult<Vec<ReservationView>>;
}

/// Payment ledger rows
#[async_trait]
pub trait PaymentRepository: Send {
    async fn find_payment(&mut self, reservation_id: i64) -> CoreResult<Option<Payment>>;

    /// Returns `None` if the reservation already has a payment.
    async fn insert_payment(&mut self, payment: &NewPayment) -> CoreResult<Option<Payment>>;
}

/// One open transaction. Dropping it without `commit` discards every write.
#[async_trait]
pub trait Session: IdentityRepository + CatalogRepository + ReservationRepository + PaymentRepository {
    async fn commit(self: Box<Self>) -> CoreResult<()>;
}

/// Opens sessions against the backing store.
#[async_trait]
pub trait Database: Send + Sync {
    async fn begin(&self) -> CoreResult<Box<dyn Session>>;
}
