use serde::Deserialize;
use tracing::{info, warn};

use crate::gate::Caller;
use crate::models::{NewReservation, Reservation, ReservationSummary};
use crate::repository::Session;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Deserialize)]
pub struct ReservationRequest {
    pub user_id: i64,
    pub flight_id: i64,
    pub seat_id: i64,
    pub luggage_option_id: i64,
}

/// Claims a seat and records the reservation.
///
/// Checks run in a fixed order and each maps to its own error:
/// caller rights (`Forbidden`), flight (`NotFound`), seat (`InvalidState`),
/// luggage option (`NotFound`), then the target user (`NotFound`).
///
/// The seat flip is a conditional update, so when two sessions race for the
/// same seat only one sees it match; the loser gets `InvalidState`.
pub async fn create_reservation(
    session: &mut dyn Session,
    caller: &Caller,
    req: &ReservationRequest,
) -> CoreResult<Reservation> {
    if !caller.can_act_for(req.user_id) {
        return Err(CoreError::Forbidden("cannot reserve on behalf of another user".into()));
    }

    let flight = session
        .find_flight(req.flight_id)
        .await?
        .ok_or(CoreError::NotFound("flight"))?;

    match session.find_seat(req.seat_id).await? {
        Some(seat) if seat.flight_id == flight.id && seat.available => {}
        Some(seat) if seat.flight_id != flight.id => {
            return Err(CoreError::InvalidState(format!(
                "seat {} does not belong to flight {}",
                seat.id, flight.id
            )));
        }
        _ => return Err(CoreError::InvalidState(format!("seat {} is not available", req.seat_id))),
    }

    let luggage = session
        .find_luggage_option(req.luggage_option_id)
        .await?
        .ok_or(CoreError::NotFound("luggage option"))?;

    if session.find_user(req.user_id).await?.is_none() {
        return Err(CoreError::NotFound("user"));
    }

    let total_cents = flight
        .base_price_cents
        .checked_add(luggage.price_cents)
        .ok_or_else(|| CoreError::ValidationError(format!("total price of flight {} overflows", flight.id)))?;

    if !session.claim_seat(req.seat_id, flight.id).await? {
        warn!(seat_id = req.seat_id, flight_id = flight.id, "Seat claimed by a concurrent reservation");
        return Err(CoreError::InvalidState(format!("seat {} is not available", req.seat_id)));
    }

    let reservation = session
        .insert_reservation(&NewReservation {
            user_id: req.user_id,
            flight_id: flight.id,
            seat_id: req.seat_id,
            luggage_option_id: luggage.id,
            total_cents,
        })
        .await?;

    info!(
        reservation_id = reservation.id,
        user_id = reservation.user_id,
        seat_id = reservation.seat_id,
        total_cents,
        "Reservation created"
    );
    Ok(reservation)
}

/// Reservations of `user_id`, newest departure last.
pub async fn get_reservations(
    session: &mut dyn Session,
    caller: &Caller,
    user_id: i64,
) -> CoreResult<Vec<ReservationSummary>> {
    if !caller.can_act_for(user_id) {
        return Err(CoreError::Forbidden("cannot list reservations of another user".into()));
    }

    let views = session.list_reservations(user_id).await?;
    Ok(views.into_iter().map(ReservationSummary::from).collect())
}
