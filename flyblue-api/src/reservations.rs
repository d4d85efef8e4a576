use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use flyblue_core::gate::Caller;
use flyblue_core::models::{Payment, Reservation, ReservationSummary};
use flyblue_core::reservation::ReservationRequest;
use flyblue_shared::models::events::SeatClaimedEvent;
use tracing::debug;

use crate::{error::AppError, state::AppState};

/// Customer reservations and payments; mounted behind the user middleware.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/cliente/reservas", post(create_reservation))
        .route("/v1/cliente/reservas/{id}", get(list_reservations))
        .route("/v1/cliente/reservas/{id}/pago", post(pay_reservation))
}

async fn create_reservation(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<ReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), AppError> {
    let reservation = state.service.create_reservation(&caller, &req).await?;

    let event = SeatClaimedEvent {
        flight_id: reservation.flight_id,
        seat_id: reservation.seat_id,
        reservation_id: reservation.id,
        claimed_at: Utc::now(),
    };
    // No subscribers is fine
    if state.seat_events.send(event).is_err() {
        debug!(flight_id = reservation.flight_id, "No seat stream listeners");
    }

    Ok((StatusCode::CREATED, Json(reservation)))
}

/// `id` is the user whose reservations are listed.
async fn list_reservations(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<ReservationSummary>>, AppError> {
    Ok(Json(state.service.get_reservations(&caller, user_id).await?))
}

/// `id` is the reservation being paid.
async fn pay_reservation(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(reservation_id): Path<i64>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    let payment = state.service.process_payment(&caller, reservation_id).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}
