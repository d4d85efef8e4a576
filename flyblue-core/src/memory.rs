//! In-process [`Database`] backing the test suites.
//!
//! Each repository call locks the shared state only for its own duration and
//! yields before touching it, so concurrent sessions interleave between calls
//! the way they would against PostgreSQL. Writes land immediately and are
//! recorded in an undo log; dropping a session without `commit` replays the
//! log backwards. Seat claims and payment inserts check and write under one
//! lock, which makes them the only thing that settles a race.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::models::{
    City, Flight, LuggageOption, NewCity, NewFlight, NewLuggageOption, NewPayment, NewReservation, NewUser,
    Payment, Reservation, ReservationView, Seat, SeatPosition, User,
};
use crate::repository::{
    CatalogRepository, Database, IdentityRepository, PaymentRepository, ReservationRepository, Session,
};
use crate::{CoreError, CoreResult};

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<i64, User>,
    cities: BTreeMap<i64, City>,
    flights: BTreeMap<i64, Flight>,
    seats: BTreeMap<i64, Seat>,
    luggage_options: BTreeMap<i64, LuggageOption>,
    reservations: BTreeMap<i64, Reservation>,
    payments: BTreeMap<i64, Payment>,
}

fn next_id<T>(table: &BTreeMap<i64, T>) -> i64 {
    table.keys().next_back().map_or(1, |id| id + 1)
}

/// One write to reverse on rollback.
#[derive(Debug, Clone, Copy)]
enum Undo {
    User(i64),
    City(i64),
    Flight(i64),
    Seat(i64),
    LuggageOption(i64),
    Reservation(i64),
    Payment(i64),
    SeatClaim(i64),
}

impl Undo {
    fn apply(self, state: &mut MemoryState) {
        match self {
            Undo::User(id) => drop(state.users.remove(&id)),
            Undo::City(id) => drop(state.cities.remove(&id)),
            Undo::Flight(id) => drop(state.flights.remove(&id)),
            Undo::Seat(id) => drop(state.seats.remove(&id)),
            Undo::LuggageOption(id) => drop(state.luggage_options.remove(&id)),
            Undo::Reservation(id) => drop(state.reservations.remove(&id)),
            Undo::Payment(id) => drop(state.payments.remove(&id)),
            Undo::SeatClaim(id) => {
                if let Some(seat) = state.seats.get_mut(&id) {
                    seat.available = true;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn begin(&self) -> CoreResult<Box<dyn Session>> {
        Ok(Box::new(MemorySession {
            state: self.state.clone(),
            undo: Vec::new(),
        }))
    }
}

pub struct MemorySession {
    state: Arc<Mutex<MemoryState>>,
    undo: Vec<Undo>,
}

impl MemorySession {
    /// Runs `f` under the state lock after giving other sessions a turn.
    async fn with_state<R>(&mut self, f: impl FnOnce(&mut MemoryState, &mut Vec<Undo>) -> R) -> R {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state, &mut self.undo)
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        if self.undo.is_empty() {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for undo in self.undo.drain(..).rev() {
            undo.apply(&mut state);
        }
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn commit(self: Box<Self>) -> CoreResult<()> {
        let mut session = self;
        session.undo.clear();
        Ok(())
    }
}

#[async_trait]
impl IdentityRepository for MemorySession {
    async fn find_user(&mut self, id: i64) -> CoreResult<Option<User>> {
        Ok(self.with_state(|state, _| state.users.get(&id).cloned()).await)
    }

    async fn find_user_by_email(&mut self, email: &str) -> CoreResult<Option<User>> {
        Ok(self
            .with_state(|state, _| state.users.values().find(|u| u.email.expose() == email).cloned())
            .await)
    }

    async fn insert_user(&mut self, user: &NewUser) -> CoreResult<User> {
        self.with_state(|state, undo| {
            if state.users.values().any(|u| u.email == user.email) {
                return Err(CoreError::Conflict("email already registered".into()));
            }
            let stored = User {
                id: next_id(&state.users),
                name: user.name.clone(),
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
                role: user.role,
            };
            state.users.insert(stored.id, stored.clone());
            undo.push(Undo::User(stored.id));
            Ok(stored)
        })
        .await
    }
}

#[async_trait]
impl CatalogRepository for MemorySession {
    async fn insert_city(&mut self, city: &NewCity) -> CoreResult<City> {
        Ok(self
            .with_state(|state, undo| {
                let stored = City {
                    id: next_id(&state.cities),
                    name: city.name.clone(),
                    code: city.code.clone(),
                };
                state.cities.insert(stored.id, stored.clone());
                undo.push(Undo::City(stored.id));
                stored
            })
            .await)
    }

    async fn find_city(&mut self, id: i64) -> CoreResult<Option<City>> {
        Ok(self.with_state(|state, _| state.cities.get(&id).cloned()).await)
    }

    async fn list_cities(&mut self) -> CoreResult<Vec<City>> {
        Ok(self.with_state(|state, _| state.cities.values().cloned().collect()).await)
    }

    async fn insert_luggage_option(&mut self, option: &NewLuggageOption) -> CoreResult<LuggageOption> {
        Ok(self
            .with_state(|state, undo| {
                let stored = LuggageOption {
                    id: next_id(&state.luggage_options),
                    kind: option.kind.clone(),
                    price_cents: option.price_cents,
                    description: option.description.clone(),
                    max_weight_kg: option.max_weight_kg,
                };
                state.luggage_options.insert(stored.id, stored.clone());
                undo.push(Undo::LuggageOption(stored.id));
                stored
            })
            .await)
    }

    async fn find_luggage_option(&mut self, id: i64) -> CoreResult<Option<LuggageOption>> {
        Ok(self.with_state(|state, _| state.luggage_options.get(&id).cloned()).await)
    }

    async fn list_luggage_options(&mut self) -> CoreResult<Vec<LuggageOption>> {
        Ok(self.with_state(|state, _| state.luggage_options.values().cloned().collect()).await)
    }

    async fn insert_flight(&mut self, flight: &NewFlight) -> CoreResult<Flight> {
        self.with_state(|state, undo| {
            for city_id in [flight.origin_city_id, flight.destination_city_id] {
                if !state.cities.contains_key(&city_id) {
                    return Err(CoreError::Storage(format!("city {} does not exist", city_id)));
                }
            }
            let stored = Flight {
                id: next_id(&state.flights),
                code: flight.code.clone(),
                origin_city_id: flight.origin_city_id,
                destination_city_id: flight.destination_city_id,
                departure: flight.departure,
                arrival: flight.arrival,
                base_price_cents: flight.base_price_cents,
            };
            state.flights.insert(stored.id, stored.clone());
            undo.push(Undo::Flight(stored.id));
            Ok(stored)
        })
        .await
    }

    async fn find_flight(&mut self, id: i64) -> CoreResult<Option<Flight>> {
        Ok(self.with_state(|state, _| state.flights.get(&id).cloned()).await)
    }

    async fn search_flights(
        &mut self,
        origin_city_id: i64,
        destination_city_id: i64,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> CoreResult<Vec<Flight>> {
        let mut flights: Vec<Flight> = self
            .with_state(|state, _| {
                state
                    .flights
                    .values()
                    .filter(|f| {
                        f.origin_city_id == origin_city_id
                            && f.destination_city_id == destination_city_id
                            && f.departure >= from
                            && f.departure < until
                    })
                    .cloned()
                    .collect()
            })
            .await;
        flights.sort_by_key(|f| (f.departure, f.id));
        Ok(flights)
    }

    async fn insert_seats(&mut self, flight_id: i64, positions: &[SeatPosition]) -> CoreResult<u64> {
        self.with_state(|state, undo| {
            if !state.flights.contains_key(&flight_id) {
                return Err(CoreError::Storage(format!("flight {} does not exist", flight_id)));
            }
            for position in positions {
                let taken = state
                    .seats
                    .values()
                    .any(|s| s.flight_id == flight_id && s.row == position.row && s.column == position.column);
                if taken {
                    return Err(CoreError::Conflict(format!(
                        "seat {}{} already exists on flight {}",
                        position.row, position.column, flight_id
                    )));
                }
                let seat = Seat {
                    id: next_id(&state.seats),
                    flight_id,
                    row: position.row,
                    column: position.column,
                    available: true,
                };
                undo.push(Undo::Seat(seat.id));
                state.seats.insert(seat.id, seat);
            }
            Ok(positions.len() as u64)
        })
        .await
    }

    async fn find_seat(&mut self, id: i64) -> CoreResult<Option<Seat>> {
        Ok(self.with_state(|state, _| state.seats.get(&id).cloned()).await)
    }

    async fn list_seats(&mut self, flight_id: i64) -> CoreResult<Vec<Seat>> {
        let mut seats: Vec<Seat> = self
            .with_state(|state, _| state.seats.values().filter(|s| s.flight_id == flight_id).cloned().collect())
            .await;
        seats.sort_by_key(|s| (s.row, s.column));
        Ok(seats)
    }
}

#[async_trait]
impl ReservationRepository for MemorySession {
    async fn claim_seat(&mut self, seat_id: i64, flight_id: i64) -> CoreResult<bool> {
        Ok(self
            .with_state(|state, undo| match state.seats.get_mut(&seat_id) {
                Some(seat) if seat.flight_id == flight_id && seat.available => {
                    seat.available = false;
                    undo.push(Undo::SeatClaim(seat_id));
                    true
                }
                _ => false,
            })
            .await)
    }

    async fn insert_reservation(&mut self, reservation: &NewReservation) -> CoreResult<Reservation> {
        self.with_state(|state, undo| {
            if state.reservations.values().any(|r| r.seat_id == reservation.seat_id) {
                return Err(CoreError::Conflict(format!("seat {} is already reserved", reservation.seat_id)));
            }
            let stored = Reservation {
                id: next_id(&state.reservations),
                user_id: reservation.user_id,
                flight_id: reservation.flight_id,
                seat_id: reservation.seat_id,
                luggage_option_id: reservation.luggage_option_id,
                total_cents: reservation.total_cents,
            };
            state.reservations.insert(stored.id, stored.clone());
            undo.push(Undo::Reservation(stored.id));
            Ok(stored)
        })
        .await
    }

    async fn find_reservation_for_user(&mut self, id: i64, user_id: i64) -> CoreResult<Option<Reservation>> {
        Ok(self
            .with_state(|state, _| state.reservations.get(&id).filter(|r| r.user_id == user_id).cloned())
            .await)
    }

    async fn list_reservations(&mut self, user_id: i64) -> CoreResult<Vec<ReservationView>> {
        let mut views: Vec<ReservationView> = self
            .with_state(|state, _| {
                let code = |city_id: i64| state.cities.get(&city_id).map(|c| c.code.clone()).unwrap_or_default();
                state
                    .reservations
                    .values()
                    .filter(|r| r.user_id == user_id)
                    .filter_map(|r| {
                        let flight = state.flights.get(&r.flight_id)?;
                        Some(ReservationView {
                            id: r.id,
                            origin_code: code(flight.origin_city_id),
                            destination_code: code(flight.destination_city_id),
                            departure: flight.departure,
                            total_cents: r.total_cents,
                        })
                    })
                    .collect()
            })
            .await;
        views.sort_by_key(|v| (v.departure, v.id));
        Ok(views)
    }
}

#[async_trait]
impl PaymentRepository for MemorySession {
    async fn find_payment(&mut self, reservation_id: i64) -> CoreResult<Option<Payment>> {
        Ok(self
            .with_state(|state, _| state.payments.values().find(|p| p.reservation_id == reservation_id).cloned())
            .await)
    }

    async fn insert_payment(&mut self, payment: &NewPayment) -> CoreResult<Option<Payment>> {
        Ok(self
            .with_state(|state, undo| {
                if state.payments.values().any(|p| p.reservation_id == payment.reservation_id) {
                    return None;
                }
                let stored = Payment {
                    id: next_id(&state.payments),
                    reservation_id: payment.reservation_id,
                    amount_cents: payment.amount_cents,
                    status: payment.status,
                    paid_at: payment.paid_at,
                };
                state.payments.insert(stored.id, stored.clone());
                undo.push(Undo::Payment(stored.id));
                Some(stored)
            })
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentStatus, SeatColumn};
    use chrono::TimeZone;

    async fn seed_seat(db: &MemoryDatabase) -> (i64, i64) {
        let mut session = db.begin().await.unwrap();
        let bog = session.insert_city(&NewCity::new("Bogota", "BOG").unwrap()).await.unwrap();
        let mia = session.insert_city(&NewCity::new("Miami", "MIA").unwrap()).await.unwrap();
        let flight = session
            .insert_flight(&NewFlight {
                code: "BOG-MIA-20250601".into(),
                origin_city_id: bog.id,
                destination_city_id: mia.id,
                departure: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
                arrival: Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap(),
                base_price_cents: 30_000,
            })
            .await
            .unwrap();
        session
            .insert_seats(flight.id, &[SeatPosition { row: 1, column: SeatColumn::A }])
            .await
            .unwrap();
        let seat = session.list_seats(flight.id).await.unwrap().remove(0);
        session.commit().await.unwrap();
        (flight.id, seat.id)
    }

    fn payment(reservation_id: i64) -> NewPayment {
        NewPayment {
            reservation_id,
            amount_cents: 35_000,
            status: PaymentStatus::Paid,
            paid_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_discarded() {
        let db = MemoryDatabase::new();
        {
            let mut session = db.begin().await.unwrap();
            session.insert_city(&NewCity::new("Bogota", "BOG").unwrap()).await.unwrap();
        }
        let mut session = db.begin().await.unwrap();
        assert!(session.list_cities().await.unwrap().is_empty());

        session.insert_city(&NewCity::new("Bogota", "BOG").unwrap()).await.unwrap();
        session.commit().await.unwrap();

        let mut session = db.begin().await.unwrap();
        assert_eq!(session.list_cities().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_open_sessions_race_on_seat_claim() {
        let db = MemoryDatabase::new();
        let (flight_id, seat_id) = seed_seat(&db).await;

        let mut first = db.begin().await.unwrap();
        let mut second = db.begin().await.unwrap();
        assert!(first.find_seat(seat_id).await.unwrap().unwrap().available);
        assert!(second.find_seat(seat_id).await.unwrap().unwrap().available);

        assert!(first.claim_seat(seat_id, flight_id).await.unwrap());
        assert!(!second.claim_seat(seat_id, flight_id).await.unwrap());
        assert!(!second.claim_seat(seat_id, flight_id + 1).await.unwrap());

        // The winner rolls back, so the seat is free again.
        drop(first);
        assert!(second.claim_seat(seat_id, flight_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_open_sessions_race_on_payment_insert() {
        let db = MemoryDatabase::new();
        let mut first = db.begin().await.unwrap();
        let mut second = db.begin().await.unwrap();
        assert!(first.find_payment(7).await.unwrap().is_none());
        assert!(second.find_payment(7).await.unwrap().is_none());

        let winner = first.insert_payment(&payment(7)).await.unwrap();
        assert!(winner.is_some());
        assert!(second.insert_payment(&payment(7)).await.unwrap().is_none());
        first.commit().await.unwrap();

        assert_eq!(second.find_payment(7).await.unwrap(), winner);
    }
}
